//! Simulated execution.
//!
//! Nothing is sent anywhere. Every command gets deterministic, vaguely
//! device-shaped output so the rest of the workflow can be exercised end to
//! end. Results are always marked `simulated`.

use async_trait::async_trait;
use netmend_core::{ActionType, DeviceTarget, ExecutionResult, TroubleshootingStep};
use netmend_runtime::{StepExecutor, TransportError};

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedExecutor;

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepExecutor for SimulatedExecutor {
    async fn execute(
        &self,
        _session_id: &str,
        target: &DeviceTarget,
        step: &TroubleshootingStep,
    ) -> Result<ExecutionResult, TransportError> {
        let mut result = ExecutionResult::new(&step.description);
        result.simulated = true;
        for cmd in &step.commands {
            let output = match step.action_type {
                ActionType::Config => format!("{}(config)#{}\n{}(config)#", target.hostname, cmd, target.hostname),
                _ => simulate(target, cmd),
            };
            result.push_output(cmd, output);
        }
        tracing::debug!(device = %target, commands = step.commands.len(), "Simulated step");
        Ok(result)
    }

    async fn release(&self, _session_id: &str, _target: &DeviceTarget) -> Result<(), TransportError> {
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "simulator"
    }
}

fn simulate(target: &DeviceTarget, cmd: &str) -> String {
    let host = &target.hostname;
    let vendor = target
        .device_type
        .split('_')
        .next()
        .unwrap_or("generic");
    let normalized = cmd.trim().to_lowercase();

    let body = if normalized.starts_with("show version") {
        format!("{vendor} network operating system\n{host} uptime is 12 weeks, 3 days, 4 hours")
    } else if normalized.starts_with("show ip interface brief") {
        [
            "Interface              IP-Address      OK? Method Status                Protocol",
            "GigabitEthernet0/0     10.0.0.1        YES NVRAM  up                    up",
            "GigabitEthernet0/1     10.0.1.1        YES NVRAM  up                    up",
            "Loopback0              192.0.2.1       YES NVRAM  up                    up",
        ]
        .join("\n")
    } else if normalized.starts_with("ping") || normalized.starts_with("traceroute") {
        "Type escape sequence to abort.\nSuccess rate is 100 percent (5/5), round-trip min/avg/max = 1/1/2 ms"
            .to_string()
    } else if normalized.starts_with("show") {
        format!("{host}: no entries found")
    } else {
        String::new()
    };

    format!("{host}#{cmd}\n{body}").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_is_deterministic_and_marked() {
        let target = DeviceTarget::new("edge-1", "cisco_ios");
        let step = TroubleshootingStep::diagnostic("check", ["show version", "ping 10.0.0.2"]);

        let a = SimulatedExecutor.execute("s1", &target, &step).await.unwrap();
        let b = SimulatedExecutor.execute("s1", &target, &step).await.unwrap();
        assert_eq!(a, b);
        assert!(a.simulated);
        assert!(!a.has_errors());
        assert_eq!(a.command_outputs.len(), 2);
        assert!(a.command_outputs[0].output.contains("cisco network operating system"));
        assert!(a.command_outputs[1].output.contains("Success rate is 100 percent"));
    }

    #[tokio::test]
    async fn config_steps_echo_in_config_mode() {
        let target = DeviceTarget::new("edge-1", "arista_eos");
        let step = TroubleshootingStep::new(
            "bounce",
            ActionType::Config,
            vec!["interface Ethernet1".into(), "no shutdown".into()],
            "",
            true,
        );
        let r = SimulatedExecutor.execute("s1", &target, &step).await.unwrap();
        assert!(r.command_outputs[1].output.starts_with("edge-1(config)#no shutdown"));
    }
}
