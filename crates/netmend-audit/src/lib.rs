//! # netmend-audit
//!
//! Audit trail for troubleshooting sessions.
//!
//! Every observable transition of a session (plan creation, approval
//! decisions, step execution, verdicts, replans, termination) is recorded as
//! an [`AuditEvent`] correlated by session id.
//!
//! - **File output**: JSON Lines under `audit.directory`
//! - **Console output**: Human-readable log lines
//!
//! ## Event Types
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `SessionStarted` | An alert opened a session |
//! | `PlanCreated` | The planner produced the initial plan |
//! | `ApprovalRequested` | A step waits for a human decision |
//! | `Approved` / `Rejected` | The human answered |
//! | `StepExecuted` | Commands ran against the device |
//! | `StepAnalyzed` | The analyzer returned a verdict |
//! | `PlanReplaced` | The remaining plan was swapped |
//! | `ReplanRejected` | A replacement was refused |
//! | `SessionTerminated` | The session reached a terminal state |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netmend_audit::AuditLogger;
//! use netmend_core::AuditConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(AuditConfig::default())?;
//! logger
//!     .log_session_started("a1b2c3", "netops@core-rtr-01:22", "{\"alert\":\"BGP down\"}")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::{AuditFilter, AuditLogger, AUDIT_FILE_NAME};
pub use storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};
