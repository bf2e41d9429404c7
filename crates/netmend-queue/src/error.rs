//! Error types for the alert queue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to start queue server: {0}")]
    StartupFailed(String),
}
