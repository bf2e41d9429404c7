//! Analysis verdicts for executed steps.

use crate::step::TroubleshootingStep;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Upper bound on the evidence excerpts kept per report.
pub const MAX_FINDINGS: usize = 5;

/// What the workflow should do after a step has been analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextActionType {
    /// Proceed with the next remaining step.
    Continue,
    /// Replace the remaining plan with a new one.
    NewAction,
    /// Hand the fault to a human.
    Escalate,
    /// The fault is fixed.
    Resolve,
}

impl NextActionType {
    /// Whether this verdict ends the session.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Escalate | Self::Resolve)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::NewAction => "new_action",
            Self::Escalate => "escalate",
            Self::Resolve => "resolve",
        }
    }
}

impl std::fmt::Display for NextActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdict string that is not one of the four known values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verdict '{0}' (expected continue, new_action, escalate or resolve)")]
pub struct UnknownVerdict(pub String);

impl FromStr for NextActionType {
    type Err = UnknownVerdict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "new_action" => Ok(Self::NewAction),
            "escalate" => Ok(Self::Escalate),
            "resolve" => Ok(Self::Resolve),
            other => Err(UnknownVerdict(other.to_string())),
        }
    }
}

/// The verdict for one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionAnalysisReport {
    /// Short technical narrative.
    pub analysis: String,

    /// Evidence excerpts, most relevant first.
    #[serde(default)]
    pub findings: Vec<String>,

    pub next_action_type: NextActionType,

    /// One-sentence justification for the verdict.
    pub next_action_reason: String,

    /// Replacement for the remaining plan. Never includes the step that was
    /// just executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_action_plan_remaining: Option<Vec<TroubleshootingStep>>,
}

impl ActionAnalysisReport {
    pub fn new(
        analysis: impl Into<String>,
        next_action_type: NextActionType,
        next_action_reason: impl Into<String>,
    ) -> Self {
        Self {
            analysis: analysis.into(),
            findings: Vec::new(),
            next_action_type,
            next_action_reason: next_action_reason.into(),
            updated_action_plan_remaining: None,
        }
    }

    /// A report the workflow writes itself when a step cannot run or may not
    /// continue (budget, rejection, escalation step, transport failure).
    pub fn synthetic_escalation(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            analysis: format!("Automation halted: {reason}"),
            findings: Vec::new(),
            next_action_type: NextActionType::Escalate,
            next_action_reason: reason,
            updated_action_plan_remaining: None,
        }
    }

    pub fn with_findings<I, S>(mut self, findings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.findings = findings.into_iter().map(Into::into).collect();
        self.truncate_findings();
        self
    }

    pub fn with_replacement(mut self, steps: Vec<TroubleshootingStep>) -> Self {
        self.updated_action_plan_remaining = Some(steps);
        self
    }

    /// Enforce [`MAX_FINDINGS`].
    pub fn truncate_findings(&mut self) {
        self.findings.truncate(MAX_FINDINGS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parsing_is_case_insensitive() {
        assert_eq!("Continue".parse(), Ok(NextActionType::Continue));
        assert_eq!(" NEW_ACTION ".parse(), Ok(NextActionType::NewAction));
        assert!("retry".parse::<NextActionType>().is_err());
    }

    #[test]
    fn verdict_serializes_snake_case() {
        let json = serde_json::to_string(&NextActionType::NewAction).unwrap();
        assert_eq!(json, "\"new_action\"");
    }

    #[test]
    fn findings_are_bounded() {
        let report = ActionAnalysisReport::new("ok", NextActionType::Continue, "fine")
            .with_findings((0..9).map(|i| format!("line {i}")));
        assert_eq!(report.findings.len(), MAX_FINDINGS);
        assert_eq!(report.findings[0], "line 0");
    }

    #[test]
    fn missing_verdict_fails_to_deserialize() {
        let raw = r#"{"analysis":"x","findings":[],"next_action_reason":"y"}"#;
        assert!(serde_json::from_str::<ActionAnalysisReport>(raw).is_err());
    }
}
