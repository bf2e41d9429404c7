use async_trait::async_trait;
use netmend_core::{DeviceTarget, ExecutionResult, TroubleshootingStep};

/// Runs a step's commands against a device (or a stand-in for one).
///
/// Command-level failures are reported in [`ExecutionResult::errors`]. An
/// `Err` means the transport itself failed and the device should be treated
/// as unreachable.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Execute every command of `step`, in order, on behalf of `session_id`.
    async fn execute(
        &self,
        session_id: &str,
        target: &DeviceTarget,
        step: &TroubleshootingStep,
    ) -> Result<ExecutionResult, TransportError>;

    /// Close whatever handle `session_id` holds for `target`. Called once per
    /// session, when it terminates, possibly from a different process than
    /// the one that opened the handle. Handles of other sessions stay open.
    async fn release(&self, session_id: &str, target: &DeviceTarget) -> Result<(), TransportError>;

    /// Short name for logs (`simulator`, `fixture`, `ssh`).
    fn kind(&self) -> &'static str;
}

/// The device could not be reached or talked to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection to {device} failed: {message}")]
    Connection { device: String, message: String },

    #[error("authentication to {device} failed: {message}")]
    Authentication { device: String, message: String },

    #[error("{device} did not respond within {seconds}s")]
    Timeout { device: String, seconds: u64 },

    #[error("transport error: {0}")]
    Other(String),
}
