//! Workflow runtime for netmend.
//!
//! | Module | Role |
//! |--------|------|
//! | [`router`] | Pure state machine deciding what happens after each step |
//! | [`orchestrator`] | Runs the pipeline, suspends for approval, resumes |
//! | [`store`] | Where suspended sessions live between calls |
//! | [`adapter`] | The execution seam ([`StepExecutor`]) |
//! | [`agents`] | The four analysis collaborator seams |
//! | [`approval`] | Parsing of human approval responses |
//! | [`state`] | Serializable session state and termination reasons |

pub mod adapter;
pub mod agents;
pub mod approval;
pub mod error;
pub mod orchestrator;
pub mod router;
pub mod state;
pub mod store;

pub use adapter::{StepExecutor, TransportError};
pub use agents::{
    ActionAnalyzer, ActionPlanner, AgentError, AnalysisRequest, FaultSummarizer,
    PlanningRequest, ResultSummarizer, SummaryRequest,
};
pub use approval::{approval_prompt, ApprovalDecision};
pub use error::RuntimeError;
pub use orchestrator::{Collaborators, Orchestrator, SessionOutcome};
pub use router::{
    IngestOutcome, ReplacementKind, ResumeSignal, RouteOutcome, RouterError, RouterSignal,
};
pub use state::{EscalationCode, Phase, Termination, TerminationReason, WorkflowState};
pub use store::{
    validate_session_id, FileSessionStore, MemorySessionStore, SessionInfo, SessionStore,
    StoreError,
};
