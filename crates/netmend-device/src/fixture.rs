//! Replay of recorded device output.
//!
//! A fixture is a YAML file describing one fault scenario:
//!
//! ```yaml
//! alert_payload: '{"alert": "BGP neighbor down", "device": "core-rtr-01"}'
//! custom_instructions: |
//!   Check BGP state first.
//! expected_rca: Peer 192.0.2.7 was shut down administratively.
//! commands:
//!   show ip bgp summary: |
//!     Neighbor        V    AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
//!     192.0.2.7       4 65001       0       0        1    0    0 00:02:11 Idle (Admin)
//! ```
//!
//! Commands are looked up with whitespace collapsed and case ignored. A
//! command the fixture does not know is a command error for that command
//! only.

use crate::error::DeviceError;
use async_trait::async_trait;
use netmend_core::{DeviceTarget, ExecutionResult, TroubleshootingStep};
use netmend_runtime::{StepExecutor, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// The alert to start the session with.
    #[serde(default)]
    pub alert_payload: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,

    /// The root cause a correct run should reach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_rca: Option<String>,

    /// Command -> recorded output.
    #[serde(default)]
    pub commands: HashMap<String, String>,
}

impl Fixture {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DeviceError::FixtureIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| DeviceError::FixtureYaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn normalize(cmd: &str) -> String {
    cmd.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Answers commands from a [`Fixture`].
#[derive(Debug, Clone)]
pub struct FixtureExecutor {
    fixture: Fixture,
    outputs: HashMap<String, String>,
}

impl FixtureExecutor {
    pub fn new(fixture: Fixture) -> Self {
        let outputs = fixture
            .commands
            .iter()
            .map(|(cmd, out)| (normalize(cmd), out.clone()))
            .collect();
        Self { fixture, outputs }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        Ok(Self::new(Fixture::from_file(path)?))
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub fn lookup(&self, cmd: &str) -> Option<&str> {
        self.outputs.get(&normalize(cmd)).map(String::as_str)
    }
}

#[async_trait]
impl StepExecutor for FixtureExecutor {
    async fn execute(
        &self,
        _session_id: &str,
        target: &DeviceTarget,
        step: &TroubleshootingStep,
    ) -> Result<ExecutionResult, TransportError> {
        let mut result = ExecutionResult::new(&step.description);
        result.simulated = true;
        for cmd in &step.commands {
            match self.lookup(cmd) {
                Some(output) => result.push_output(cmd, output),
                None => {
                    tracing::warn!(device = %target, command = %cmd, "Command not in fixture");
                    result.push_output(cmd, "");
                    result.push_error(format!("{cmd}: no recorded output in fixture"));
                }
            }
        }
        Ok(result)
    }

    async fn release(&self, _session_id: &str, _target: &DeviceTarget) -> Result<(), TransportError> {
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
alert_payload: '{"alert": "BGP neighbor down", "device": "core-rtr-01"}'
custom_instructions: Check BGP first.
expected_rca: Peer shut down.
commands:
  show ip bgp summary: |
    192.0.2.7  4 65001  0  0  1  0  0 00:02:11 Idle (Admin)
  "show running-config | section router bgp": |
    router bgp 65000
     neighbor 192.0.2.7 shutdown
"#;

    fn executor() -> FixtureExecutor {
        FixtureExecutor::new(serde_yaml::from_str(FIXTURE).unwrap())
    }

    #[test]
    fn parses_all_sections() {
        let e = executor();
        let f = e.fixture();
        assert!(f.alert_payload.contains("BGP neighbor down"));
        assert_eq!(f.custom_instructions.as_deref(), Some("Check BGP first."));
        assert_eq!(f.commands.len(), 2);
    }

    #[test]
    fn lookup_ignores_spacing_and_case() {
        let e = executor();
        assert!(e.lookup("SHOW  ip bgp   summary").unwrap().contains("Idle (Admin)"));
        assert!(e.lookup("show ip route").is_none());
    }

    #[tokio::test]
    async fn unknown_command_is_a_command_error() {
        let step = TroubleshootingStep::diagnostic(
            "bgp",
            ["show ip bgp summary", "show ip route 192.0.2.7"],
        );
        let r = executor()
            .execute("s1", &DeviceTarget::new("core-rtr-01", "cisco_ios"), &step)
            .await
            .unwrap();
        assert!(r.simulated);
        assert_eq!(r.command_outputs.len(), 2);
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].starts_with("show ip route 192.0.2.7"));
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let err = Fixture::from_file("/nonexistent/fixture.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fixture.yaml"));
    }
}
