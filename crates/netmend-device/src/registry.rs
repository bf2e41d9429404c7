//! Per-device connection registry.
//!
//! Each device identity (`user@host:port`) gets one entry behind its own
//! async mutex, so steps against the same device are serialized while
//! different devices proceed independently. Inside an entry every session
//! owns its own lazily opened connection: one session ending never closes
//! another's. A transport error drops the failing session's connection so
//! its next step reconnects.
//!
//! [`StepExecutor::release`] closes the session's connection. When this
//! process never opened one (the session was started by an earlier
//! process), [`Connector::release_detached`] closes whatever that process
//! left behind.

use async_trait::async_trait;
use netmend_core::{ActionType, DeviceTarget, ExecutionResult, TroubleshootingStep};
use netmend_runtime::{StepExecutor, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What the device said about one command (or one config batch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Output(String),
    /// The device ran it and reported a failure.
    Failed { output: String, message: String },
}

/// An open session to one device.
#[async_trait]
pub trait DeviceConnection: Send {
    async fn run(&mut self, command: &str) -> Result<CommandReply, TransportError>;

    /// Apply `commands` as one configuration batch.
    async fn configure(&mut self, commands: &[String]) -> Result<CommandReply, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens connections on behalf of a workflow session.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: DeviceConnection;

    /// Open (or pick up a still-running) connection for `session_id`.
    async fn connect(
        &self,
        session_id: &str,
        target: &DeviceTarget,
    ) -> Result<Self::Connection, TransportError>;

    /// Close a connection `session_id` opened in another process.
    async fn release_detached(
        &self,
        _session_id: &str,
        _target: &DeviceTarget,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    fn kind(&self) -> &'static str;
}

/// Connections to one device, by session id.
type Slot<C> = Arc<tokio::sync::Mutex<HashMap<String, C>>>;

pub struct ConnectionRegistry<C: Connector> {
    connector: C,
    entries: Mutex<HashMap<String, Slot<C::Connection>>>,
}

impl<C: Connector> std::fmt::Debug for ConnectionRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("kind", &self.connector.kind())
            .field("devices", &self.len())
            .finish()
    }
}

impl<C: Connector> ConnectionRegistry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of devices with an entry.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sessions holding an open connection to `target`.
    pub async fn holders(&self, target: &DeviceTarget) -> usize {
        match self.existing(&target.key()) {
            Some(slot) => slot.lock().await.len(),
            None => 0,
        }
    }

    fn slot(&self, key: &str) -> Result<Slot<C::Connection>, TransportError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TransportError::Other("connection registry lock poisoned".into()))?;
        Ok(entries.entry(key.to_string()).or_default().clone())
    }

    fn existing(&self, key: &str) -> Option<Slot<C::Connection>> {
        self.entries.lock().ok().and_then(|e| e.get(key).cloned())
    }

    /// Forget the device entry once no session holds a connection in it and
    /// no step is about to open one.
    fn prune(&self, key: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let idle = entries.get(key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|conns| conns.is_empty())
        });
        if idle {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl<C: Connector> StepExecutor for ConnectionRegistry<C> {
    async fn execute(
        &self,
        session_id: &str,
        target: &DeviceTarget,
        step: &TroubleshootingStep,
    ) -> Result<ExecutionResult, TransportError> {
        let key = target.key();
        let slot = self.slot(&key)?;
        let mut conns = slot.lock().await;

        if !conns.contains_key(session_id) {
            tracing::info!(session_id, device = %key, transport = self.connector.kind(), "Opening connection");
            let conn = self.connector.connect(session_id, target).await?;
            conns.insert(session_id.to_string(), conn);
        }
        let Some(conn) = conns.get_mut(session_id) else {
            return Err(TransportError::Other(format!("no connection for {key}")));
        };

        let mut result = ExecutionResult::new(&step.description);
        let replies: Vec<(String, Result<CommandReply, TransportError>)> =
            if step.action_type == ActionType::Config {
                vec![(step.commands.join("\n"), conn.configure(&step.commands).await)]
            } else {
                let mut replies = Vec::with_capacity(step.commands.len());
                for cmd in &step.commands {
                    let reply = conn.run(cmd).await;
                    let failed = reply.is_err();
                    replies.push((cmd.clone(), reply));
                    if failed {
                        break;
                    }
                }
                replies
            };

        for (cmd, reply) in replies {
            match reply {
                Ok(CommandReply::Output(output)) => result.push_output(cmd, output),
                Ok(CommandReply::Failed { output, message }) => {
                    result.push_error(format!("{cmd}: {message}"));
                    result.push_output(cmd, output);
                }
                Err(e) => {
                    tracing::warn!(session_id, device = %key, error = %e, "Dropping connection after transport error");
                    if let Some(mut broken) = conns.remove(session_id) {
                        if let Err(close) = broken.close().await {
                            tracing::debug!(session_id, device = %key, error = %close, "Broken connection did not close cleanly");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(result)
    }

    async fn release(&self, session_id: &str, target: &DeviceTarget) -> Result<(), TransportError> {
        let key = target.key();
        let held = match self.existing(&key) {
            Some(slot) => slot.lock().await.remove(session_id),
            None => None,
        };
        self.prune(&key);

        match held {
            Some(mut conn) => {
                tracing::info!(session_id, device = %key, "Closing connection");
                conn.close().await
            }
            None => self.connector.release_detached(session_id, target).await,
        }
    }

    fn kind(&self) -> &'static str {
        self.connector.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
        detached: AtomicUsize,
    }

    struct FakeConnector {
        counters: Arc<Counters>,
        fail_command: Option<&'static str>,
    }

    struct FakeConnection {
        counters: Arc<Counters>,
        fail_command: Option<&'static str>,
    }

    #[async_trait]
    impl DeviceConnection for FakeConnection {
        async fn run(&mut self, command: &str) -> Result<CommandReply, TransportError> {
            if Some(command) == self.fail_command {
                return Err(TransportError::Connection {
                    device: "fake".into(),
                    message: "reset by peer".into(),
                });
            }
            if command.starts_with("bogus") {
                return Ok(CommandReply::Failed {
                    output: "% Invalid input".into(),
                    message: "exit status 1".into(),
                });
            }
            Ok(CommandReply::Output(format!("ran {command}")))
        }

        async fn configure(&mut self, commands: &[String]) -> Result<CommandReply, TransportError> {
            Ok(CommandReply::Output(format!("applied {}", commands.len())))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        type Connection = FakeConnection;

        async fn connect(
            &self,
            _session_id: &str,
            _target: &DeviceTarget,
        ) -> Result<FakeConnection, TransportError> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConnection {
                counters: self.counters.clone(),
                fail_command: self.fail_command,
            })
        }

        async fn release_detached(
            &self,
            _session_id: &str,
            _target: &DeviceTarget,
        ) -> Result<(), TransportError> {
            self.counters.detached.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "fake"
        }
    }

    fn registry(fail_command: Option<&'static str>) -> (ConnectionRegistry<FakeConnector>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let registry = ConnectionRegistry::new(FakeConnector {
            counters: counters.clone(),
            fail_command,
        });
        (registry, counters)
    }

    #[tokio::test]
    async fn connection_is_opened_once_and_closed_once() {
        let (registry, counters) = registry(None);
        let target = DeviceTarget::new("r1", "cisco_ios");
        let step = TroubleshootingStep::diagnostic("two", ["show a", "bogus b"]);

        let r = registry.execute("s1", &target, &step).await.unwrap();
        assert_eq!(r.command_outputs[0].output, "ran show a");
        assert_eq!(r.errors, vec!["bogus b: exit status 1"]);
        registry.execute("s1", &target, &step).await.unwrap();
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);

        registry.release("s1", &target).await.unwrap();
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn ending_one_session_keeps_another_sessions_connection() {
        let (registry, counters) = registry(None);
        let target = DeviceTarget::new("r1", "cisco_ios");
        let step = TroubleshootingStep::diagnostic("one", ["show a"]);

        registry.execute("a", &target, &step).await.unwrap();
        registry.release("b", &target).await.unwrap();
        registry.execute("a", &target, &step).await.unwrap();

        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
        assert_eq!(registry.holders(&target).await, 1);

        registry.execute("b", &target, &step).await.unwrap();
        assert_eq!(registry.holders(&target).await, 2);
        registry.release("a", &target).await.unwrap();
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert_eq!(registry.holders(&target).await, 1);
        registry.release("b", &target).await.unwrap();
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn release_without_a_local_connection_closes_the_detached_one() {
        let (registry, counters) = registry(None);
        let target = DeviceTarget::new("r1", "cisco_ios");

        registry.release("from-earlier-run", &target).await.unwrap();
        assert_eq!(counters.detached.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);

        let step = TroubleshootingStep::diagnostic("one", ["show a"]);
        registry.execute("live", &target, &step).await.unwrap();
        registry.release("live", &target).await.unwrap();
        assert_eq!(counters.detached.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn devices_get_separate_entries() {
        let (registry, counters) = registry(None);
        let step = TroubleshootingStep::diagnostic("one", ["show a"]);
        let mut alice = DeviceTarget::new("r1", "cisco_ios");
        alice.username = Some("alice".into());
        let mut bob = alice.clone();
        bob.username = Some("bob".into());

        registry.execute("s1", &alice, &step).await.unwrap();
        registry.execute("s1", &bob, &step).await.unwrap();
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn transport_error_drops_the_connection() {
        let (registry, counters) = registry(Some("show b"));
        let target = DeviceTarget::new("r1", "cisco_ios");
        let step = TroubleshootingStep::diagnostic("two", ["show a", "show b"]);

        assert!(registry.execute("s1", &target, &step).await.is_err());
        assert_eq!(registry.holders(&target).await, 0);
        let ok = TroubleshootingStep::diagnostic("one", ["show a"]);
        registry.execute("s1", &target, &ok).await.unwrap();
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn config_steps_are_sent_as_one_batch() {
        let (registry, _) = registry(None);
        let step = TroubleshootingStep::new(
            "bounce",
            ActionType::Config,
            vec!["interface Gi0/1".into(), "shutdown".into(), "no shutdown".into()],
            "",
            true,
        );
        let r = registry
            .execute("s1", &DeviceTarget::new("r1", "cisco_ios"), &step)
            .await
            .unwrap();
        assert_eq!(r.command_outputs.len(), 1);
        assert_eq!(r.command_outputs[0].output, "applied 3");
    }
}
