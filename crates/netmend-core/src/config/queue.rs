//! Alert queue configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// JSON Lines file backing the queue.
    #[serde(default = "default_file")]
    pub file: PathBuf,

    /// How often `process-queue` polls an empty queue.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            file: default_file(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl QueueConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_file() -> PathBuf {
    PathBuf::from("workbench/alert_queue.jsonl")
}

fn default_poll_interval() -> u64 {
    5
}
