//! Fault summaries, device facts and final result summaries.

use crate::step::TroubleshootingStep;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

/// Structured view of a raw alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSummary {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_summary")]
    pub summary: String,

    /// Device the alert points at.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub severity: Severity,

    /// Anything else extracted from the alert (interface, peer, counters).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Default for FaultSummary {
    fn default() -> Self {
        Self {
            title: default_title(),
            summary: default_summary(),
            hostname: default_hostname(),
            timestamp: Utc::now(),
            severity: Severity::default(),
            metadata: serde_json::Map::new(),
        }
    }
}

impl FaultSummary {
    /// Whether the summarizer failed to name a device.
    pub fn has_unknown_device(&self) -> bool {
        self.hostname.trim().is_empty() || self.hostname == default_hostname()
    }
}

fn default_title() -> String {
    "Default Title".to_string()
}

fn default_summary() -> String {
    "Unspecified network issue detected".to_string()
}

fn default_hostname() -> String {
    "unknown-device".to_string()
}

/// What is known about the target device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFacts {
    pub hostname: String,

    #[serde(default)]
    pub vendor: Option<String>,

    #[serde(default)]
    pub os: Option<String>,

    #[serde(default)]
    pub os_version: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    /// Cleared when the transport fails; rechecked every router cycle.
    #[serde(default = "default_true")]
    pub reachable: bool,

    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceFacts {
    /// Minimal facts for a device with no inventory entry. The vendor is the
    /// `device_type` prefix (`cisco_ios` -> `cisco`).
    pub fn from_device_type(hostname: impl Into<String>, device_type: &str) -> Self {
        let vendor = device_type
            .split('_')
            .next()
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let os = device_type
            .split_once('_')
            .map(|(_, os)| os.to_string())
            .filter(|os| !os.is_empty());
        Self {
            hostname: hostname.into(),
            vendor,
            os,
            os_version: None,
            model: None,
            reachable: true,
            extra: serde_json::Map::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// How a session ended, from the operator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStatus {
    Resolved,
    #[serde(rename = "Partially Resolved")]
    PartiallyResolved,
    Unresolved,
    Escalated,
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Resolved => "Resolved",
            Self::PartiallyResolved => "Partially Resolved",
            Self::Unresolved => "Unresolved",
            Self::Escalated => "Escalated",
        })
    }
}

/// Final report produced when a session terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub summary_title: String,
    pub fault_recap: String,
    pub resolution_status: ResolutionStatus,

    #[serde(default)]
    pub key_findings: Vec<String>,

    #[serde(default)]
    pub successful_actions: Vec<String>,

    #[serde(default)]
    pub failed_actions: Vec<String>,

    #[serde(default)]
    pub root_cause: Option<String>,

    #[serde(default)]
    pub recommended_next_steps: Vec<String>,

    #[serde(default)]
    pub escalation_details: Option<String>,

    #[serde(default)]
    pub steps_executed: usize,
}

impl ResultSummary {
    /// Build a report straight from the executed history. Used when the
    /// summarizing collaborator is unavailable.
    pub fn from_history(
        fault: &FaultSummary,
        history: &[TroubleshootingStep],
        status: ResolutionStatus,
        detail: &str,
    ) -> Self {
        let mut key_findings = Vec::new();
        let mut successful_actions = Vec::new();
        let mut failed_actions = Vec::new();

        for step in history {
            let Some(report) = &step.analysis_report else {
                continue;
            };
            key_findings.extend(report.findings.iter().cloned());
            if step.commands.is_empty() {
                continue;
            }
            match report.next_action_type {
                crate::NextActionType::Escalate => failed_actions.push(step.description.clone()),
                _ => successful_actions.push(step.description.clone()),
            }
        }
        key_findings.truncate(crate::analysis::MAX_FINDINGS);

        let escalation_details = match status {
            ResolutionStatus::Escalated | ResolutionStatus::Unresolved => {
                Some(detail.to_string())
            }
            _ => None,
        };
        let recommended_next_steps = match status {
            ResolutionStatus::Resolved => Vec::new(),
            _ => vec![format!("Review session history for {}", fault.hostname)],
        };

        Self {
            summary_title: fault.title.clone(),
            fault_recap: fault.summary.clone(),
            resolution_status: status,
            key_findings,
            successful_actions,
            failed_actions,
            root_cause: None,
            recommended_next_steps,
            escalation_details,
            steps_executed: history
                .iter()
                .filter(|s| !s.commands.is_empty())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionAnalysisReport, NextActionType};

    #[test]
    fn fault_summary_defaults_fill_missing_fields() {
        let fs: FaultSummary = serde_json::from_str(r#"{"title":"BGP down"}"#).unwrap();
        assert_eq!(fs.title, "BGP down");
        assert_eq!(fs.summary, "Unspecified network issue detected");
        assert_eq!(fs.severity, Severity::Medium);
        assert!(fs.has_unknown_device());
    }

    #[test]
    fn vendor_comes_from_device_type_prefix() {
        let facts = DeviceFacts::from_device_type("r1", "cisco_ios");
        assert_eq!(facts.vendor.as_deref(), Some("cisco"));
        assert_eq!(facts.os.as_deref(), Some("ios"));
        assert!(facts.reachable);
    }

    #[test]
    fn partially_resolved_uses_spaced_name() {
        let json = serde_json::to_string(&ResolutionStatus::PartiallyResolved).unwrap();
        assert_eq!(json, "\"Partially Resolved\"");
    }

    #[test]
    fn fallback_summary_counts_executed_steps() {
        let mut ok = TroubleshootingStep::diagnostic("Check interface", ["show ip int brief"]);
        ok.analysis_report = Some(
            ActionAnalysisReport::new("up", NextActionType::Continue, "fine")
                .with_findings(["Gi0/1 up/up"]),
        );
        let mut esc = TroubleshootingStep::escalation("Call carrier");
        esc.analysis_report = Some(ActionAnalysisReport::synthetic_escalation("escalation step"));

        let summary = ResultSummary::from_history(
            &FaultSummary::default(),
            &[ok, esc],
            ResolutionStatus::Escalated,
            "escalation step",
        );
        assert_eq!(summary.steps_executed, 1);
        assert_eq!(summary.successful_actions, vec!["Check interface"]);
        assert_eq!(summary.key_findings, vec!["Gi0/1 up/up"]);
        assert_eq!(summary.escalation_details.as_deref(), Some("escalation step"));
    }
}
