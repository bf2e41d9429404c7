//! Audit event types.
//!
//! One event is recorded for every observable transition of a troubleshooting
//! session. All events of a session share its `session_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // ===== Session lifecycle =====
    /// A new alert started a session.
    SessionStarted,
    /// The planner produced the initial plan.
    PlanCreated,
    /// The session reached a terminal state.
    SessionTerminated,

    // ===== Approval gate =====
    /// A step is waiting for a human decision.
    ApprovalRequested,
    /// The human approved the step.
    Approved,
    /// The human rejected the step.
    Rejected,

    // ===== Step cycle =====
    /// A step's commands ran against the device.
    StepExecuted,
    /// The analyzer returned a verdict for a step.
    StepAnalyzed,
    /// The remaining plan was replaced.
    PlanReplaced,
    /// A replacement plan was refused (adaptive mode off, invalid steps).
    ReplanRejected,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionStarted => write!(f, "SESSION_STARTED"),
            Self::PlanCreated => write!(f, "PLAN_CREATED"),
            Self::SessionTerminated => write!(f, "SESSION_TERMINATED"),
            Self::ApprovalRequested => write!(f, "APPROVAL_REQUESTED"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::StepExecuted => write!(f, "STEP_EXECUTED"),
            Self::StepAnalyzed => write!(f, "STEP_ANALYZED"),
            Self::PlanReplaced => write!(f, "PLAN_REPLACED"),
            Self::ReplanRejected => write!(f, "REPLAN_REJECTED"),
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event_type: AuditEventType,

    /// Session the event belongs to.
    pub session_id: String,

    /// Target device key (`user@host:port`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    // ===== Step fields =====
    /// 1-indexed position of the step in the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_number: Option<usize>,

    /// Step description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    /// Step action type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,

    /// Commands sent to the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,

    // ===== Outcome fields =====
    /// Analyzer verdict or termination reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,

    /// Human-readable justification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Error message, if the event records a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Whether device output was simulated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated: Option<bool>,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl AuditEvent {
    /// Create a new audit event for a session.
    pub fn new(event_type: AuditEventType, session_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            session_id: session_id.into(),
            device: None,
            step_number: None,
            step: None,
            action_type: None,
            commands: None,
            verdict: None,
            reason: None,
            error: None,
            duration_ms: None,
            simulated: None,
            meta: serde_json::Value::Null,
        }
    }

    /// Create a builder for an audit event.
    pub fn builder(event_type: AuditEventType, session_id: impl Into<String>) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type, session_id)
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE session=... [step=N "..."] [verdict=...]`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {} session={}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
            self.session_id,
        );

        if let Some(ref device) = self.device {
            line.push_str(&format!(" device={}", device));
        }

        if let Some(n) = self.step_number {
            line.push_str(&format!(" step={}", n));
        }

        if let Some(ref step) = self.step {
            let preview = if step.chars().count() > 80 {
                format!("{}...", step.chars().take(80).collect::<String>())
            } else {
                step.clone()
            };
            line.push_str(&format!(" desc=\"{}\"", preview.replace('"', "'")));
        }

        if let Some(ref action_type) = self.action_type {
            line.push_str(&format!(" type={}", action_type));
        }

        if let Some(ref verdict) = self.verdict {
            line.push_str(&format!(" verdict={}", verdict));
        }

        if let Some(ref reason) = self.reason {
            line.push_str(&format!(" reason=\"{}\"", reason.replace('"', "'")));
        }

        if let Some(duration) = self.duration_ms {
            line.push_str(&format!(" duration_ms={}", duration));
        }

        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        if self.simulated == Some(true) {
            line.push_str(" simulated=true");
        }

        line
    }
}

/// Builder for creating audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    /// Create a new builder with required fields.
    pub fn new(event_type: AuditEventType, session_id: impl Into<String>) -> Self {
        Self {
            event: AuditEvent::new(event_type, session_id),
        }
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.event.device = Some(device.into());
        self
    }

    pub fn step_number(mut self, n: usize) -> Self {
        self.event.step_number = Some(n);
        self
    }

    pub fn step(mut self, description: impl Into<String>) -> Self {
        self.event.step = Some(description.into());
        self
    }

    pub fn action_type(mut self, action_type: impl ToString) -> Self {
        self.event.action_type = Some(action_type.to_string());
        self
    }

    pub fn commands(mut self, commands: Vec<String>) -> Self {
        self.event.commands = Some(commands);
        self
    }

    pub fn verdict(mut self, verdict: impl ToString) -> Self {
        self.event.verdict = Some(verdict.to_string());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.event.reason = Some(reason.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn duration_ms(mut self, duration: u64) -> Self {
        self.event.duration_ms = Some(duration);
        self
    }

    pub fn simulated(mut self, simulated: bool) -> Self {
        self.event.simulated = Some(simulated);
        self
    }

    /// Set additional metadata.
    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.event.meta = meta;
        self
    }

    /// Build the audit event.
    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::builder(AuditEventType::StepExecuted, "sess-1")
            .device("netops@core-rtr-01:22")
            .step_number(2)
            .step("Check BGP summary")
            .commands(vec!["show ip bgp summary".into()])
            .duration_ms(120)
            .build();

        assert_eq!(event.event_type, AuditEventType::StepExecuted);
        assert_eq!(event.session_id, "sess-1");
        assert_eq!(event.step_number, Some(2));
        assert_eq!(event.duration_ms, Some(120));
    }

    #[test]
    fn test_to_log_line() {
        let event = AuditEvent::builder(AuditEventType::StepAnalyzed, "sess-1")
            .step_number(1)
            .verdict("new_action")
            .reason("Neighbor is \"Idle\"")
            .simulated(true)
            .build();

        let line = event.to_log_line();
        assert!(line.contains("STEP_ANALYZED"));
        assert!(line.contains("session=sess-1"));
        assert!(line.contains("verdict=new_action"));
        assert!(line.contains("reason=\"Neighbor is 'Idle'\""));
        assert!(line.contains("simulated=true"));
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(format!("{}", AuditEventType::SessionStarted), "SESSION_STARTED");
        assert_eq!(format!("{}", AuditEventType::ReplanRejected), "REPLAN_REJECTED");
        assert_eq!(format!("{}", AuditEventType::Rejected), "REJECTED");
    }

    #[test]
    fn test_serializes_snake_case_type() {
        let event = AuditEvent::new(AuditEventType::PlanReplaced, "s");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "plan_replaced");
        assert!(json.get("device").is_none());
    }
}
