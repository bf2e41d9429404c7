//! Configuration types for netmend.
//!
//! Everything is loaded from a single YAML file (`netmend.yaml` by default).
//! Every section is optional; missing sections take their defaults.
//!
//! ```yaml
//! settings:
//!   max_steps: 15
//!   adaptive_mode: true
//!   simulation_mode: false
//!   approval_mode: intrusive
//!   golden_rules:
//!     - Never reload a device without approval
//! device:
//!   device_type: cisco_ios
//!   username: netops
//!   password_env: NETMEND_DEVICE_PASSWORD
//! inventory:
//!   core-rtr-01:
//!     hostname: core-rtr-01
//!     vendor: cisco
//!     os: ios-xe
//! sessions:
//!   directory: workbench/sessions
//! queue:
//!   port: 8001
//! llm:
//!   model: gpt-4o-mini
//! ```

pub mod audit;
pub mod device;
pub mod llm;
pub mod queue;
pub mod settings;

use crate::fault::DeviceFacts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use audit::AuditConfig;
pub use device::DeviceConfig;
pub use llm::LlmConfig;
pub use queue::QueueConfig;
pub use settings::{ApprovalMode, WorkflowSettings};

/// Complete netmend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetmendConfig {
    #[serde(default)]
    pub settings: WorkflowSettings,

    /// Default connection parameters for target devices.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Known devices, keyed by hostname.
    #[serde(default)]
    pub inventory: HashMap<String, DeviceFacts>,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

/// Where suspended sessions are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_dir")]
    pub directory: PathBuf,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            directory: default_sessions_dir(),
        }
    }
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("workbench/sessions")
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NetmendConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// A relative `fixture_file` is resolved against the config file's
    /// directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let resolved = config
            .settings
            .fixture_file
            .as_ref()
            .filter(|f| f.is_relative())
            .map(|f| base_dir.join(f));
        if resolved.is_some() {
            config.settings.fixture_file = resolved;
        }
        Ok(config)
    }

    /// Parse and validate configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.max_steps == 0 {
            return Err(ConfigError::Config(
                "settings.max_steps must be at least 1".to_string(),
            ));
        }
        if self.settings.test_mode && self.settings.fixture_file.is_none() {
            return Err(ConfigError::Config(
                "settings.test_mode requires settings.fixture_file".to_string(),
            ));
        }
        if self.device.port == 0 {
            return Err(ConfigError::Config("device.port must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Facts for `hostname`: the inventory entry if one exists, otherwise
    /// facts derived from the default device type.
    pub fn device_facts(&self, hostname: &str) -> DeviceFacts {
        self.inventory
            .get(hostname)
            .cloned()
            .unwrap_or_else(|| DeviceFacts::from_device_type(hostname, &self.device.device_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = NetmendConfig::from_yaml("{}").unwrap();
        assert_eq!(config.settings.max_steps, 15);
        assert!(config.settings.adaptive_mode);
        assert!(config.settings.simulation_mode);
        assert_eq!(config.settings.approval_mode, ApprovalMode::Intrusive);
        assert_eq!(config.queue.port, 8001);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.device.port, 22);
    }

    #[test]
    fn rejects_zero_max_steps() {
        let err = NetmendConfig::from_yaml("settings:\n  max_steps: 0\n").unwrap_err();
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn test_mode_requires_fixture() {
        assert!(NetmendConfig::from_yaml("settings:\n  test_mode: true\n").is_err());
        assert!(
            NetmendConfig::from_yaml(
                "settings:\n  test_mode: true\n  fixture_file: fixtures/bgp.yaml\n"
            )
            .is_ok()
        );
    }

    #[test]
    fn inventory_facts_take_precedence() {
        let yaml = r#"
device:
  device_type: juniper_junos
inventory:
  edge-01:
    hostname: edge-01
    vendor: arista
    os: eos
"#;
        let config = NetmendConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.device_facts("edge-01").vendor.as_deref(), Some("arista"));
        assert_eq!(config.device_facts("edge-02").vendor.as_deref(), Some("juniper"));
    }

    #[test]
    fn relative_fixture_resolves_against_config_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let path = dir.join("netmend.yaml");
        fs::write(&path, "settings:\n  test_mode: true\n  fixture_file: bgp.yaml\n").unwrap();

        let config = NetmendConfig::from_file(&path).unwrap();
        assert_eq!(config.settings.fixture_file, Some(dir.join("bgp.yaml")));
    }
}
