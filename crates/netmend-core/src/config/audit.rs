//! Audit trail configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit events are recorded at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Directory for the JSON Lines audit file. Console output when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Also print events to stdout.
    #[serde(default)]
    pub stdout: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            directory: None,
            stdout: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}
