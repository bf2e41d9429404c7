//! Troubleshooting steps.
//!
//! A step is one planned action against a device. Steps are produced by the
//! planner (or by the analyzer when it replans) and are immutable once
//! created, except for the analysis report which is written exactly once
//! after the step has been executed and analyzed.
//!
//! The serialized key order (`description`, `action_type`, `commands`,
//! `output_expectation`, `requires_approval`) is part of the LLM-facing
//! contract and must not change.

use crate::analysis::ActionAnalysisReport;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TEMPLATE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("template pattern is valid")
});

/// Kind of action a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Read-only commands (show, ping, traceroute).
    Diagnostic,
    /// Configuration changes.
    Config,
    /// Operational commands (clear, reload, test, rollback).
    Exec,
    /// Hand-off to a human. Carries no commands.
    Escalation,
}

impl ActionType {
    /// Whether this kind of step can affect live traffic.
    pub fn is_intrusive(self) -> bool {
        matches!(self, Self::Config | Self::Exec)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diagnostic => write!(f, "diagnostic"),
            Self::Config => write!(f, "config"),
            Self::Exec => write!(f, "exec"),
            Self::Escalation => write!(f, "escalation"),
        }
    }
}

/// One planned troubleshooting action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TroubleshootingStep {
    /// What this step checks or accomplishes.
    pub description: String,

    /// Kind of action.
    pub action_type: ActionType,

    /// CLI commands, executed in order. Empty only for escalation steps.
    #[serde(default)]
    pub commands: Vec<String>,

    /// What success looks like. Only the analyzer reads this.
    pub output_expectation: String,

    /// Whether a human must approve the step before it runs.
    pub requires_approval: bool,

    /// Populated once the step has been executed and analyzed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_report: Option<ActionAnalysisReport>,
}

impl TroubleshootingStep {
    /// Create a step with no analysis report.
    pub fn new(
        description: impl Into<String>,
        action_type: ActionType,
        commands: Vec<String>,
        output_expectation: impl Into<String>,
        requires_approval: bool,
    ) -> Self {
        Self {
            description: description.into(),
            action_type,
            commands,
            output_expectation: output_expectation.into(),
            requires_approval,
            analysis_report: None,
        }
    }

    /// Convenience constructor for a read-only step.
    pub fn diagnostic<I, S>(description: impl Into<String>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            description,
            ActionType::Diagnostic,
            commands.into_iter().map(Into::into).collect(),
            "",
            false,
        )
    }

    /// Convenience constructor for a human hand-off step.
    pub fn escalation(description: impl Into<String>) -> Self {
        Self::new(description, ActionType::Escalation, Vec::new(), "", false)
    }

    /// Structural validation.
    pub fn validate(&self) -> Result<(), StepValidationError> {
        if self.description.trim().is_empty() {
            return Err(StepValidationError::EmptyDescription);
        }
        match self.action_type {
            ActionType::Escalation if !self.commands.is_empty() => {
                Err(StepValidationError::EscalationWithCommands {
                    description: self.description.clone(),
                })
            }
            ActionType::Escalation => Ok(()),
            _ if self.commands.is_empty() => Err(StepValidationError::MissingCommands {
                description: self.description.clone(),
            }),
            _ if self.commands.iter().any(|c| c.trim().is_empty()) => {
                Err(StepValidationError::BlankCommand {
                    description: self.description.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Names of `{{var}}` placeholders still present in the commands.
    pub fn unresolved_templates(&self) -> Vec<String> {
        let mut names = Vec::new();
        for command in &self.commands {
            for caps in TEMPLATE_VAR.captures_iter(command) {
                let name = caps[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Set the analysis report. A report can only be written once.
    pub fn attach_report(&mut self, report: ActionAnalysisReport) -> Result<(), StepValidationError> {
        if self.analysis_report.is_some() {
            return Err(StepValidationError::ReportAlreadySet {
                description: self.description.clone(),
            });
        }
        self.analysis_report = Some(report);
        Ok(())
    }

    /// Whether two steps describe the same action, ignoring any report.
    pub fn same_action(&self, other: &TroubleshootingStep) -> bool {
        self.description.trim() == other.description.trim()
            && self.action_type == other.action_type
            && self.commands == other.commands
    }

    /// Whether `self` is `original` with template variables filled in and
    /// nothing else changed.
    pub fn is_template_fill_of(&self, original: &TroubleshootingStep) -> bool {
        if self.action_type != original.action_type
            || self.requires_approval != original.requires_approval
            || self.commands.len() != original.commands.len()
        {
            return false;
        }
        self.commands
            .iter()
            .zip(&original.commands)
            .all(|(filled, template)| filled == template || template_matches(template, filled))
    }
}

/// Match `filled` against `template`, treating each `{{var}}` as a wildcard.
fn template_matches(template: &str, filled: &str) -> bool {
    if !TEMPLATE_VAR.is_match(template) {
        return false;
    }
    let mut pattern = String::from("^");
    let mut last = 0;
    for m in TEMPLATE_VAR.find_iter(template) {
        pattern.push_str(&regex::escape(&template[last..m.start()]));
        pattern.push_str(r"\S.*?");
        last = m.end();
    }
    pattern.push_str(&regex::escape(&template[last..]));
    pattern.push('$');

    Regex::new(&pattern)
        .map(|re| re.is_match(filled) && !TEMPLATE_VAR.is_match(filled))
        .unwrap_or(false)
}

/// Check a whole plan, reporting the first invalid step.
pub fn validate_plan(steps: &[TroubleshootingStep]) -> Result<(), PlanValidationError> {
    for (index, step) in steps.iter().enumerate() {
        step.validate()
            .map_err(|source| PlanValidationError { index, source })?;
    }
    Ok(())
}

/// Structural problems with a single step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepValidationError {
    #[error("step description must be non-empty")]
    EmptyDescription,

    #[error("escalation step '{description}' must not carry commands")]
    EscalationWithCommands { description: String },

    #[error("step '{description}' has no commands")]
    MissingCommands { description: String },

    #[error("step '{description}' contains a blank command")]
    BlankCommand { description: String },

    #[error("step '{description}' already has an analysis report")]
    ReportAlreadySet { description: String },
}

/// A plan-level validation failure, locating the offending step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("step {index}: {source}")]
pub struct PlanValidationError {
    pub index: usize,
    #[source]
    pub source: StepValidationError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(commands: &[&str]) -> TroubleshootingStep {
        TroubleshootingStep::new(
            "Check BGP neighbor",
            ActionType::Diagnostic,
            commands.iter().map(|c| c.to_string()).collect(),
            "Neighbor is Established",
            false,
        )
    }

    #[test]
    fn escalation_with_commands_is_invalid() {
        let mut s = TroubleshootingStep::escalation("Replace optic");
        assert!(s.validate().is_ok());

        s.commands.push("show inventory".to_string());
        assert!(matches!(
            s.validate(),
            Err(StepValidationError::EscalationWithCommands { .. })
        ));
    }

    #[test]
    fn diagnostic_without_commands_is_invalid() {
        assert!(matches!(
            step(&[]).validate(),
            Err(StepValidationError::MissingCommands { .. })
        ));
    }

    #[test]
    fn finds_unresolved_templates() {
        let s = step(&[
            "show bgp neighbor {{ neighbor_ip }}",
            "show run | section router bgp {{asn}}",
            "ping {{neighbor_ip}}",
        ]);
        assert_eq!(s.unresolved_templates(), vec!["neighbor_ip", "asn"]);
        assert!(step(&["show ip bgp summary"]).unresolved_templates().is_empty());
    }

    #[test]
    fn report_is_write_once() {
        let mut s = step(&["show version"]);
        s.attach_report(ActionAnalysisReport::synthetic_escalation("first"))
            .unwrap();
        let err = s
            .attach_report(ActionAnalysisReport::synthetic_escalation("second"))
            .unwrap_err();
        assert!(matches!(err, StepValidationError::ReportAlreadySet { .. }));
        assert_eq!(
            s.analysis_report.unwrap().next_action_reason,
            "first".to_string()
        );
    }

    #[test]
    fn template_fill_detection() {
        let original = step(&["show bgp neighbor {{neighbor_ip}} detail"]);
        let filled = step(&["show bgp neighbor 10.0.0.2 detail"]);
        let changed = step(&["clear bgp neighbor 10.0.0.2"]);
        let unfilled = step(&["show bgp neighbor {{other}} detail"]);

        assert!(filled.is_template_fill_of(&original));
        assert!(original.is_template_fill_of(&original));
        assert!(!changed.is_template_fill_of(&original));
        assert!(!unfilled.is_template_fill_of(&original));
    }

    #[test]
    fn serializes_in_contract_key_order() {
        let json = serde_json::to_string(&step(&["show version"])).unwrap();
        let keys = [
            "\"description\"",
            "\"action_type\"",
            "\"commands\"",
            "\"output_expectation\"",
            "\"requires_approval\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(!json.contains("analysis_report"));
    }

    #[test]
    fn step_json_validates_against_schema() {
        let s = TroubleshootingStep::new(
            "Bounce interface",
            ActionType::Config,
            vec!["interface Gi0/1".into(), "shutdown".into(), "no shutdown".into()],
            "Interface returns to up/up",
            true,
        );
        let instance = serde_json::to_value(&s).expect("step must serialize");
        let schema: serde_json::Value = serde_json::from_str(include_str!(
            "../../../schemas/TroubleshootingStep.schema.json"
        ))
        .expect("schema must parse");

        let validator = jsonschema::draft202012::options()
            .build(&schema)
            .expect("schema must compile");

        if !validator.is_valid(&instance) {
            let msgs: Vec<String> = validator
                .iter_errors(&instance)
                .take(20)
                .map(|e| e.to_string())
                .collect();
            panic!("step did not validate: {}", msgs.join("; "));
        }
    }
}
