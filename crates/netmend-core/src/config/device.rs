//! Default device connection settings.

use crate::device::DeviceTarget;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Fallback hostname when the fault summary does not name a device.
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default = "default_device_type")]
    pub device_type: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    /// Environment variable holding the device password.
    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            device_type: default_device_type(),
            port: default_port(),
            username: None,
            password_env: None,
            identity_file: None,
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("hostname", &self.hostname)
            .field("device_type", &self.device_type)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password_env", &self.password_env.as_ref().map(|_| "[set]"))
            .field("identity_file", &self.identity_file)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .finish()
    }
}

impl DeviceConfig {
    /// Target for `hostname`, using this config's port, user and driver.
    pub fn target(&self, hostname: &str) -> DeviceTarget {
        DeviceTarget {
            hostname: hostname.to_string(),
            device_type: self.device_type.clone(),
            port: self.port,
            username: self.username.clone(),
        }
    }

    /// Read the password from `password_env`, if configured and set.
    pub fn password(&self) -> Option<String> {
        self.password_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|p| !p.is_empty())
    }
}

fn default_device_type() -> String {
    "cisco_ios".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    30
}
