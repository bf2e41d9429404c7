//! Analysis collaborators.
//!
//! The four analysis stages are opaque to the workflow: each takes a typed
//! request and returns a typed response. How they produce it (an LLM, a rule
//! table, a test double) is up to the implementation.
//!
//! The request types are built from [`WorkflowState`] by explicit
//! constructors so that each stage sees exactly the fields it is meant to.

use crate::state::{Termination, WorkflowState};
use async_trait::async_trait;
use netmend_core::{
    ActionAnalysisReport, CommandOutput, DeviceFacts, ExecutionResult, FaultSummary,
    ResultSummary, TroubleshootingStep, WorkflowSettings,
};
use serde::{Deserialize, Serialize};

/// Turns a raw alert into a [`FaultSummary`].
#[async_trait]
pub trait FaultSummarizer: Send + Sync {
    async fn summarize(&self, alert: &str) -> Result<FaultSummary, AgentError>;
}

/// Produces the initial plan.
#[async_trait]
pub trait ActionPlanner: Send + Sync {
    async fn plan(&self, request: &PlanningRequest) -> Result<Vec<TroubleshootingStep>, AgentError>;
}

/// Judges one executed step.
#[async_trait]
pub trait ActionAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ActionAnalysisReport, AgentError>;
}

/// Writes the final report.
#[async_trait]
pub trait ResultSummarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<ResultSummary, AgentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("could not parse response: {0}")]
    Parse(String),

    /// The response parsed but breaks the stage's contract (missing or
    /// unknown verdict, invalid steps).
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl AgentError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_) | Self::Parse(_))
    }
}

/// Input to the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningRequest {
    pub fault_summary: FaultSummary,
    pub device_facts: DeviceFacts,
    pub max_steps: usize,
    pub golden_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

impl PlanningRequest {
    pub fn new(
        fault_summary: &FaultSummary,
        device_facts: &DeviceFacts,
        settings: &WorkflowSettings,
    ) -> Self {
        Self {
            fault_summary: fault_summary.clone(),
            device_facts: device_facts.clone(),
            max_steps: settings.max_steps,
            golden_rules: settings.golden_rules.clone(),
            custom_instructions: settings.custom_instructions.clone(),
        }
    }
}

/// Input to the analyzer for the step currently in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub fault_summary: FaultSummary,
    pub device_facts: DeviceFacts,

    /// The step that was executed, without a report.
    pub current_step: TroubleshootingStep,
    /// 1-indexed.
    pub current_step_index: usize,
    pub max_steps: usize,

    pub command_output: Vec<CommandOutput>,
    pub errors: Vec<String>,
    pub simulated: bool,

    /// Steps already analyzed, with their reports.
    pub history: Vec<TroubleshootingStep>,
    /// Steps still pending after the current one.
    pub remaining: Vec<TroubleshootingStep>,

    pub adaptive_mode: bool,
    pub golden_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

impl AnalysisRequest {
    /// Map the in-flight step and its execution result to analyzer input.
    pub fn from_state(
        state: &WorkflowState,
        step: &TroubleshootingStep,
        execution: &ExecutionResult,
    ) -> Self {
        let mut current_step = step.clone();
        current_step.analysis_report = None;
        Self {
            fault_summary: state.fault_summary.clone(),
            device_facts: state.device_facts.clone(),
            current_step,
            current_step_index: state.step_number(),
            max_steps: state.settings.max_steps,
            command_output: execution.command_outputs.clone(),
            errors: execution.errors.clone(),
            simulated: execution.simulated,
            history: state.plan.history().to_vec(),
            remaining: state.plan.remaining().iter().cloned().collect(),
            adaptive_mode: state.settings.adaptive_mode,
            golden_rules: state.settings.golden_rules.clone(),
            custom_instructions: state.settings.custom_instructions.clone(),
        }
    }
}

/// Input to the result summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub fault_summary: FaultSummary,
    pub device_facts: DeviceFacts,
    pub termination: Termination,
    pub history: Vec<TroubleshootingStep>,
    /// Steps that never ran.
    pub remaining: Vec<TroubleshootingStep>,
}

impl SummaryRequest {
    pub fn from_state(state: &WorkflowState, termination: &Termination) -> Self {
        Self {
            fault_summary: state.fault_summary.clone(),
            device_facts: state.device_facts.clone(),
            termination: termination.clone(),
            history: state.plan.history().to_vec(),
            remaining: state.plan.remaining().iter().cloned().collect(),
        }
    }
}
