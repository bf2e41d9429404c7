//! Workflow settings consumed by the router and the collaborators.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the approval gate decides which steps need a human.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Trust each step's `requires_approval` flag.
    StepFlag,
    /// Also require approval for every config/exec step.
    #[default]
    Intrusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Maximum number of steps a session may run. Must be at least 1.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Whether the analyzer may replace the remaining plan.
    #[serde(default = "default_true")]
    pub adaptive_mode: bool,

    /// Use the simulator instead of a real device.
    #[serde(default = "default_true")]
    pub simulation_mode: bool,

    /// Use a YAML fixture instead of a real device. Takes precedence over
    /// `simulation_mode`.
    #[serde(default)]
    pub test_mode: bool,

    #[serde(default)]
    pub fixture_file: Option<PathBuf>,

    #[serde(default)]
    pub approval_mode: ApprovalMode,

    /// Rules handed verbatim to the planner and analyzer.
    #[serde(default)]
    pub golden_rules: Vec<String>,

    #[serde(default)]
    pub custom_instructions: Option<String>,

    /// Log full collaborator payloads at debug level.
    #[serde(default)]
    pub debug_mode: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            adaptive_mode: true,
            simulation_mode: true,
            test_mode: false,
            fixture_file: None,
            approval_mode: ApprovalMode::default(),
            golden_rules: Vec::new(),
            custom_instructions: None,
            debug_mode: false,
        }
    }
}

fn default_max_steps() -> usize {
    15
}

fn default_true() -> bool {
    true
}
