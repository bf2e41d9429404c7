//! SSH transport over the system `ssh` client.
//!
//! Connecting starts a detached OpenSSH control master (`-M -N -f`) on a
//! socket named after the workflow session; commands then run as
//! `ssh -S <socket> <dest> <command>` over that master, and closing sends
//! `-O exit`. The master outlives the process that started it, so a
//! suspended session resumed (or reset) by a later `netmend` invocation
//! finds its socket again: `connect` reuses a master that answers
//! `-O check`, and releasing a session this process never connected closes
//! the master through the socket. Key authentication runs in batch mode.
//! With `password_env` set, `sshpass -e` supplies the password via the
//! environment.
//!
//! Exit status 255 (or failing to spawn `ssh` at all) is a transport
//! failure. Any other non-zero status is a command error.

use crate::registry::{CommandReply, Connector, DeviceConnection};
use async_trait::async_trait;
use netmend_core::{DeviceConfig, DeviceTarget};
use netmend_runtime::TransportError;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const SSH_CONNECTION_FAILED: i32 = 255;

/// Options shared by every connection.
#[derive(Clone)]
pub struct SshOptions {
    pub identity_file: Option<PathBuf>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub control_dir: PathBuf,
}

impl std::fmt::Debug for SshOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshOptions")
            .field("identity_file", &self.identity_file)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("control_dir", &self.control_dir)
            .finish()
    }
}

impl SshOptions {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            identity_file: config.identity_file.clone(),
            password: config.password(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            control_dir: std::env::temp_dir().join("netmend-ssh"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    fn connection(&self, session_id: &str, target: &DeviceTarget) -> SshConnection {
        SshConnection {
            target: target.clone(),
            control_path: control_path(&self.options.control_dir, session_id),
            options: self.options.clone(),
        }
    }
}

fn destination(target: &DeviceTarget) -> String {
    match &target.username {
        Some(user) => format!("{user}@{}", target.hostname),
        None => target.hostname.clone(),
    }
}

/// A session talks to exactly one device, so its id names the socket.
fn control_path(dir: &Path, session_id: &str) -> PathBuf {
    let name: String = session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{name}.sock"))
}

/// First line of stderr, or `fallback`.
fn stderr_message(output: &Output, fallback: &str) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    match stderr.trim() {
        "" => fallback.to_string(),
        s => s.lines().next().unwrap_or(fallback).to_string(),
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Connection = SshConnection;

    async fn connect(
        &self,
        session_id: &str,
        target: &DeviceTarget,
    ) -> Result<SshConnection, TransportError> {
        tokio::fs::create_dir_all(&self.options.control_dir)
            .await
            .map_err(|e| TransportError::Other(format!("cannot create control dir: {e}")))?;

        let conn = self.connection(session_id, target);
        if conn.control_path.exists() {
            if conn.master_alive().await {
                tracing::debug!(session_id, device = %target, socket = %conn.control_path.display(), "Reusing control master");
                return Ok(conn);
            }
            tracing::debug!(session_id, socket = %conn.control_path.display(), "Removing stale control socket");
            if let Err(e) = tokio::fs::remove_file(&conn.control_path).await {
                tracing::debug!(session_id, error = %e, "Stale control socket already gone");
            }
        }

        let mut cmd = conn.base_command(true);
        cmd.arg("-M").arg("-N").arg("-f").arg(destination(target));

        let output = conn.output(cmd, None, self.options.connect_timeout).await?;
        if output.status.success() {
            tracing::debug!(session_id, device = %target, socket = %conn.control_path.display(), "Control master started");
            return Ok(conn);
        }

        let message = stderr_message(&output, "ssh connection failed");
        if message.contains("Permission denied") {
            Err(TransportError::Authentication {
                device: target.key(),
                message,
            })
        } else {
            Err(TransportError::Connection {
                device: target.key(),
                message,
            })
        }
    }

    async fn release_detached(
        &self,
        session_id: &str,
        target: &DeviceTarget,
    ) -> Result<(), TransportError> {
        let mut conn = self.connection(session_id, target);
        if !conn.control_path.exists() {
            return Ok(());
        }
        tracing::info!(session_id, device = %target, "Closing control master left by an earlier run");
        conn.close().await
    }

    fn kind(&self) -> &'static str {
        "ssh"
    }
}

/// A running control master for one device.
#[derive(Debug)]
pub struct SshConnection {
    target: DeviceTarget,
    control_path: PathBuf,
    options: SshOptions,
}

impl SshConnection {
    /// `ssh` (or `sshpass -e ssh` when `with_password`) with the common
    /// options applied.
    fn base_command(&self, with_password: bool) -> Command {
        let mut cmd = match (&self.options.password, with_password) {
            (Some(password), true) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg("ssh").env("SSHPASS", password);
                cmd
            }
            _ => {
                let mut cmd = Command::new("ssh");
                cmd.arg("-o").arg("BatchMode=yes");
                cmd
            }
        };
        cmd.arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.options.connect_timeout.as_secs()))
            .arg("-p")
            .arg(self.target.port.to_string())
            .arg("-S")
            .arg(&self.control_path);
        if let Some(identity) = &self.options.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        cmd
    }

    async fn output(
        &self,
        mut cmd: Command,
        stdin: Option<String>,
        timeout: Duration,
    ) -> Result<Output, TransportError> {
        cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });
        let mut child = cmd.spawn().map_err(|e| TransportError::Connection {
            device: self.target.key(),
            message: format!("failed to launch ssh: {e}"),
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|e| TransportError::Other(format!("failed to write to ssh: {e}")))?;
        }

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(TransportError::Other(format!("ssh failed: {e}"))),
            Err(_) => Err(TransportError::Timeout {
                device: self.target.key(),
                seconds: timeout.as_secs(),
            }),
        }
    }

    /// Whether a master is listening on the control socket.
    async fn master_alive(&self) -> bool {
        let mut cmd = self.base_command(false);
        cmd.arg("-O").arg("check").arg(destination(&self.target));
        match self.output(cmd, None, self.options.connect_timeout).await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    fn reply(&self, output: Output) -> Result<CommandReply, TransportError> {
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        match output.status.code() {
            Some(0) => Ok(CommandReply::Output(stdout)),
            Some(SSH_CONNECTION_FAILED) | None => Err(TransportError::Connection {
                device: self.target.key(),
                message: stderr_message(&output, "ssh connection lost"),
            }),
            Some(code) => Ok(CommandReply::Failed {
                output: stdout,
                message: format!("exit status {code}: {}", stderr_message(&output, "no stderr")),
            }),
        }
    }
}

#[async_trait]
impl DeviceConnection for SshConnection {
    async fn run(&mut self, command: &str) -> Result<CommandReply, TransportError> {
        let mut cmd = self.base_command(false);
        cmd.arg(destination(&self.target)).arg(command);
        let output = self.output(cmd, None, self.options.command_timeout).await?;
        self.reply(output)
    }

    async fn configure(&mut self, commands: &[String]) -> Result<CommandReply, TransportError> {
        let mut script = String::from("configure terminal\n");
        for line in commands {
            script.push_str(line);
            script.push('\n');
        }
        script.push_str("end\nexit\n");

        let mut cmd = self.base_command(false);
        cmd.arg("-T").arg(destination(&self.target));
        let output = self
            .output(cmd, Some(script), self.options.command_timeout)
            .await?;
        self.reply(output)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut cmd = self.base_command(false);
        cmd.arg("-O").arg("exit").arg(destination(&self.target));
        let output = self.output(cmd, None, self.options.connect_timeout).await?;
        if !output.status.success() {
            tracing::debug!(
                device = %self.target,
                stderr = %stderr_message(&output, ""),
                "Control master was already gone"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_path_is_per_session() {
        let dir = Path::new("/tmp/x");
        assert_eq!(
            control_path(dir, "3f2a-b_9"),
            PathBuf::from("/tmp/x/3f2a-b_9.sock")
        );
        assert_ne!(control_path(dir, "a"), control_path(dir, "b"));
    }

    #[tokio::test]
    async fn releasing_a_session_without_a_socket_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let connector = SshConnector::new(SshOptions {
            identity_file: None,
            password: None,
            connect_timeout: Duration::from_secs(1),
            command_timeout: Duration::from_secs(1),
            control_dir: dir.path().to_path_buf(),
        });
        let target = DeviceTarget::new("r1", "cisco_ios");
        connector.release_detached("never-connected", &target).await.unwrap();
    }

    #[test]
    fn destination_includes_user_when_set() {
        let mut target = DeviceTarget::new("r1", "cisco_ios");
        assert_eq!(destination(&target), "r1");
        target.username = Some("admin".into());
        assert_eq!(destination(&target), "admin@r1");
    }

    #[test]
    fn debug_masks_password() {
        let options = SshOptions {
            identity_file: None,
            password: Some("hunter2".into()),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
            control_dir: PathBuf::from("/tmp"),
        };
        let dbg = format!("{options:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("***"));
    }
}
