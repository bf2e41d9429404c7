use crate::router::RouterError;
use crate::store::StoreError;

/// Errors surfaced by the [`Orchestrator`](crate::Orchestrator).
///
/// Collaborator and transport failures never appear here; they end the
/// session with a termination instead.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    #[error("workflow error: {0}")]
    Router(#[from] RouterError),

    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("session '{0}' already exists")]
    SessionExists(String),

    #[error("session lock poisoned")]
    LockPoisoned,
}

impl From<netmend_core::PlanError> for RuntimeError {
    fn from(e: netmend_core::PlanError) -> Self {
        Self::Router(RouterError::Plan(e))
    }
}
