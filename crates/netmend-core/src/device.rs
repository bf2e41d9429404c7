//! Device identity used to key transports.

use serde::{Deserialize, Serialize};

/// Where commands for a session are sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceTarget {
    pub hostname: String,

    /// Driver name, e.g. `cisco_ios`, `juniper_junos`.
    pub device_type: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,
}

impl DeviceTarget {
    pub fn new(hostname: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            device_type: device_type.into(),
            port: default_port(),
            username: None,
        }
    }

    /// Registry key: `user@host:port` (or `host:port` without a user).
    pub fn key(&self) -> String {
        match &self.username {
            Some(user) => format!("{user}@{}:{}", self.hostname, self.port),
            None => format!("{}:{}", self.hostname, self.port),
        }
    }
}

impl std::fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

fn default_port() -> u16 {
    22
}
