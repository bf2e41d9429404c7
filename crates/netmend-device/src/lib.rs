//! Execution adapters for netmend.
//!
//! | Adapter | Used when | Output |
//! |---------|-----------|--------|
//! | [`FixtureExecutor`] | `settings.test_mode` | Recorded output from a YAML fixture |
//! | [`SimulatedExecutor`] | `settings.simulation_mode` | Deterministic synthetic output |
//! | [`ConnectionRegistry`]`<`[`SshConnector`]`>` | otherwise | The real device, over `ssh` |
//!
//! [`create_executor`] picks one from configuration.

pub mod error;
pub mod fixture;
pub mod registry;
pub mod simulator;
pub mod ssh;

pub use error::DeviceError;
pub use fixture::{Fixture, FixtureExecutor};
pub use registry::{CommandReply, ConnectionRegistry, Connector, DeviceConnection};
pub use simulator::SimulatedExecutor;
pub use ssh::{SshConnection, SshConnector, SshOptions};

use netmend_core::NetmendConfig;
use netmend_runtime::StepExecutor;
use std::sync::Arc;

/// Build the executor selected by `config.settings`.
pub fn create_executor(config: &NetmendConfig) -> Result<Arc<dyn StepExecutor>, DeviceError> {
    let settings = &config.settings;
    if settings.test_mode {
        let path = settings.fixture_file.as_ref().ok_or_else(|| {
            DeviceError::Config("settings.test_mode requires settings.fixture_file".into())
        })?;
        tracing::info!(fixture = %path.display(), "Using fixture executor");
        return Ok(Arc::new(FixtureExecutor::from_file(path)?));
    }
    if settings.simulation_mode {
        tracing::info!("Using simulated executor");
        return Ok(Arc::new(SimulatedExecutor::new()));
    }

    tracing::info!(
        device_type = %config.device.device_type,
        port = config.device.port,
        "Using SSH executor"
    );
    let options = SshOptions::from_config(&config.device);
    Ok(Arc::new(ConnectionRegistry::new(SshConnector::new(options))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_executor_from_settings() {
        let mut config = NetmendConfig::default();
        assert_eq!(create_executor(&config).unwrap().kind(), "simulator");

        config.settings.simulation_mode = false;
        assert_eq!(create_executor(&config).unwrap().kind(), "ssh");

        config.settings.test_mode = true;
        assert!(matches!(
            create_executor(&config),
            Err(DeviceError::Config(_))
        ));
    }

    #[test]
    fn test_mode_loads_the_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bgp.yaml");
        std::fs::write(&path, "alert_payload: down\ncommands:\n  show clock: '12:00'\n").unwrap();

        let mut config = NetmendConfig::default();
        config.settings.test_mode = true;
        config.settings.fixture_file = Some(path);
        assert_eq!(create_executor(&config).unwrap().kind(), "fixture");
    }
}
