//! Audit logger implementation.
//!
//! Provides the main `AuditLogger` type with one helper per workflow event.

use netmend_core::{ActionType, AuditConfig, NextActionType, TroubleshootingStep};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType};
use crate::storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};

/// File name used inside `audit.directory`.
pub const AUDIT_FILE_NAME: &str = "audit.jsonl";

/// The main audit logger.
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    ///
    /// With a `directory`, events go to `<directory>/audit.jsonl` (and the
    /// console too if `stdout` is set). Without one, events go to the console.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = if !config.enabled {
            Arc::new(NullStorage::new())
        } else {
            match Self::resolve_log_path(&config) {
                Some(path) if config.stdout => Arc::new(DualStorage::new(&path)?),
                Some(path) => Arc::new(FileStorage::new(&path)?),
                None => Arc::new(ConsoleStorage::new()),
            }
        };

        Ok(Self { config, storage })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Self {
        Self { config, storage }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            config: AuditConfig {
                enabled: false,
                ..Default::default()
            },
            storage: Arc::new(NullStorage::new()),
        }
    }

    /// Create a console-only logger (useful for development).
    pub fn console_only() -> Self {
        Self {
            config: AuditConfig {
                enabled: true,
                stdout: true,
                ..Default::default()
            },
            storage: Arc::new(ConsoleStorage::new()),
        }
    }

    fn resolve_log_path(config: &AuditConfig) -> Option<PathBuf> {
        config
            .directory
            .as_ref()
            .map(|dir| dir.join(AUDIT_FILE_NAME))
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.config.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            session_id = %event.session_id,
            "Audit event"
        );

        self.storage.store(event).await
    }

    pub async fn log_session_started(
        &self,
        session_id: &str,
        device: &str,
        alert: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::SessionStarted, session_id)
            .device(device)
            .meta(serde_json::json!({ "alert_bytes": alert.len() }))
            .build();
        self.log(event).await
    }

    pub async fn log_plan_created(
        &self,
        session_id: &str,
        steps: &[TroubleshootingStep],
    ) -> Result<(), AuditError> {
        let descriptions: Vec<&str> = steps.iter().map(|s| s.description.as_str()).collect();
        let event = AuditEvent::builder(AuditEventType::PlanCreated, session_id)
            .meta(serde_json::json!({ "steps": descriptions }))
            .build();
        self.log(event).await
    }

    /// Log that a step is waiting on a human.
    pub async fn log_approval_requested(
        &self,
        session_id: &str,
        step_number: usize,
        step: &TroubleshootingStep,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::ApprovalRequested, session_id)
            .step_number(step_number)
            .step(&step.description)
            .action_type(step.action_type)
            .commands(step.commands.clone())
            .build();
        self.log(event).await
    }

    pub async fn log_approved(
        &self,
        session_id: &str,
        step_number: usize,
        step: &TroubleshootingStep,
        response: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::Approved, session_id)
            .step_number(step_number)
            .step(&step.description)
            .action_type(step.action_type)
            .reason(response)
            .build();
        self.log(event).await
    }

    pub async fn log_rejected(
        &self,
        session_id: &str,
        step_number: usize,
        step: &TroubleshootingStep,
        response: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::Rejected, session_id)
            .step_number(step_number)
            .step(&step.description)
            .action_type(step.action_type)
            .reason(response)
            .build();
        self.log(event).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn log_step_executed(
        &self,
        session_id: &str,
        device: &str,
        step_number: usize,
        step: &TroubleshootingStep,
        errors: &[String],
        duration_ms: u64,
        simulated: bool,
    ) -> Result<(), AuditError> {
        let mut builder = AuditEvent::builder(AuditEventType::StepExecuted, session_id)
            .device(device)
            .step_number(step_number)
            .step(&step.description)
            .action_type(step.action_type)
            .commands(step.commands.clone())
            .duration_ms(duration_ms)
            .simulated(simulated);

        if !errors.is_empty() {
            builder = builder.error(errors.join("; "));
        }

        self.log(builder.build()).await
    }

    pub async fn log_step_analyzed(
        &self,
        session_id: &str,
        step_number: usize,
        step: &TroubleshootingStep,
        verdict: NextActionType,
        reason: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::StepAnalyzed, session_id)
            .step_number(step_number)
            .step(&step.description)
            .verdict(verdict)
            .reason(reason)
            .build();
        self.log(event).await
    }

    /// Log a replacement of the remaining plan. `label` distinguishes a
    /// template fill from a replan.
    pub async fn log_plan_replaced(
        &self,
        session_id: &str,
        label: &str,
        installed: usize,
        discarded: usize,
        dropped_duplicate: bool,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::PlanReplaced, session_id)
            .reason(label)
            .meta(serde_json::json!({
                "installed": installed,
                "discarded": discarded,
                "dropped_duplicate": dropped_duplicate,
            }))
            .build();
        self.log(event).await
    }

    pub async fn log_replan_rejected(
        &self,
        session_id: &str,
        verdict: NextActionType,
        reason: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::ReplanRejected, session_id)
            .verdict(verdict)
            .reason(reason)
            .build();
        self.log(event).await
    }

    pub async fn log_session_terminated(
        &self,
        session_id: &str,
        outcome: &str,
        detail: &str,
        steps_in_history: usize,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::SessionTerminated, session_id)
            .verdict(outcome)
            .reason(detail)
            .meta(serde_json::json!({ "history": steps_in_history }))
            .build();
        self.log(event).await
    }

    /// Query audit events with filters.
    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.query(filter).await
    }

    /// All events recorded for one session, oldest first.
    pub async fn session_trail(&self, session_id: &str) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(AuditFilter {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        })
        .await
    }
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by session ID.
    pub session_id: Option<String>,
    /// Filter by event type.
    pub event_type: Option<AuditEventType>,
    /// Filter by action type of the step.
    pub action_type: Option<ActionType>,
    /// Filter by start time.
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Filter by end time.
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref session) = self.session_id {
            if &event.session_id != session {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        if let Some(action_type) = self.action_type {
            if event.action_type.as_deref() != Some(action_type.to_string().as_str()) {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if event.occurred_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.occurred_at > end {
                return false;
            }
        }
        true
    }

    pub(crate) fn paginate(&self, events: Vec<AuditEvent>) -> Vec<AuditEvent> {
        let offset = self.offset.unwrap_or(0);
        let iter = events.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> TroubleshootingStep {
        TroubleshootingStep::new(
            "Clear BGP session",
            ActionType::Exec,
            vec!["clear ip bgp 10.0.0.2 soft".into()],
            "Session re-establishes",
            true,
        )
    }

    #[tokio::test]
    async fn test_disabled_logger() {
        let logger = AuditLogger::disabled();
        assert!(!logger.is_enabled());

        logger
            .log_session_started("s1", "core-rtr-01:22", "{}")
            .await
            .unwrap();
        assert!(logger.session_trail("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_console_only_logger() {
        let logger = AuditLogger::console_only();
        assert!(logger.is_enabled());
        logger
            .log_approval_requested("s1", 1, &step())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_file_logger_records_approval_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(AuditConfig {
            enabled: true,
            directory: Some(dir.path().to_path_buf()),
            stdout: false,
        })
        .unwrap();

        let s = step();
        logger.log_approval_requested("s1", 1, &s).await.unwrap();
        logger.log_rejected("s1", 1, &s, "no").await.unwrap();
        logger
            .log_session_terminated("s1", "escalated", "rejected by user", 1)
            .await
            .unwrap();
        logger.log_session_started("s2", "edge:22", "{}").await.unwrap();

        let trail = logger.session_trail("s1").await.unwrap();
        let types: Vec<_> = trail.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                AuditEventType::ApprovalRequested,
                AuditEventType::Rejected,
                AuditEventType::SessionTerminated
            ]
        );

        let exec_only = logger
            .query(AuditFilter {
                action_type: Some(ActionType::Exec),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(exec_only.len(), 2);
    }

    #[tokio::test]
    async fn test_plan_replaced_records_duplicate_flag() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(AuditConfig {
            enabled: true,
            directory: Some(dir.path().to_path_buf()),
            stdout: false,
        })
        .unwrap();

        logger
            .log_plan_replaced("s1", "replan", 2, 3, true)
            .await
            .unwrap();
        let trail = logger.session_trail("s1").await.unwrap();
        assert_eq!(trail[0].meta["dropped_duplicate"], true);
        assert_eq!(trail[0].meta["discarded"], 3);
    }

    #[test]
    fn test_filter_pagination() {
        let events: Vec<AuditEvent> = (0..5)
            .map(|i| AuditEvent::new(AuditEventType::StepExecuted, format!("s{i}")))
            .collect();
        let filter = AuditFilter {
            offset: Some(1),
            limit: Some(2),
            ..Default::default()
        };
        let page = filter.paginate(events);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].session_id, "s1");
    }
}
