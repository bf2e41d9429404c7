//! # netmend-core
//!
//! Shared data model for the netmend troubleshooting workflow.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`step`] | [`TroubleshootingStep`] and its validation |
//! | [`analysis`] | [`ActionAnalysisReport`] and the [`NextActionType`] verdict |
//! | [`plan`] | [`ActionPlan`], the history/current/remaining partition |
//! | [`execution`] | [`ExecutionResult`] returned by execution adapters |
//! | [`fault`] | [`FaultSummary`], [`DeviceFacts`], [`ResultSummary`] |
//! | [`device`] | [`DeviceTarget`], the identity transports are keyed by |
//! | [`config`] | YAML configuration ([`NetmendConfig`]) |

pub mod analysis;
pub mod config;
pub mod device;
pub mod execution;
pub mod fault;
pub mod plan;
pub mod step;

pub use analysis::{ActionAnalysisReport, NextActionType, UnknownVerdict, MAX_FINDINGS};
pub use config::{
    ApprovalMode, AuditConfig, ConfigError, DeviceConfig, LlmConfig, NetmendConfig, QueueConfig,
    SessionsConfig, WorkflowSettings,
};
pub use device::DeviceTarget;
pub use execution::{CommandOutput, ExecutionResult};
pub use fault::{DeviceFacts, FaultSummary, ResolutionStatus, ResultSummary, Severity};
pub use plan::{ActionPlan, PlanError, ReplaceOutcome};
pub use step::{
    validate_plan, ActionType, PlanValidationError, StepValidationError, TroubleshootingStep,
};
