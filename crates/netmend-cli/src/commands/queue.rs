//! `process-queue` and `serve-queue`.

use super::context;
use super::session::print_outcome;
use anyhow::Result;
use netmend_queue::{AlertQueue, QueueServer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Run queued alerts one at a time as new sessions.
///
/// A session that stops at the approval gate stays in the session store to
/// be resumed later; the next alert is taken regardless.
pub async fn process(config_path: &Path, once: bool) -> Result<()> {
    let config = context::load_config(config_path)?;
    let queue = AlertQueue::new(&config.queue.file);
    let poll = Duration::from_secs(config.queue.poll_interval_secs.max(1));
    let orchestrator = context::orchestrator(config)?;

    tracing::info!(file = %queue.path().display(), once, "Processing alert queue");
    let mut processed = 0usize;

    loop {
        let Some(alert) = queue.dequeue().await? else {
            if once {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted");
                    break;
                }
            }
            continue;
        };

        processed += 1;
        match orchestrator.start(&alert).await {
            Ok(outcome) => {
                if outcome.is_suspended() {
                    tracing::warn!(
                        session_id = outcome.session_id(),
                        "Session waiting for approval; resume it with `netmend resume`"
                    );
                }
                print_outcome(&outcome);
            }
            Err(e) => tracing::error!(error = %e, "Alert could not be processed"),
        }
    }

    tracing::info!(processed, "Alert queue drained");
    Ok(())
}

pub async fn serve(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut queue_config = context::load_config(config_path)?.queue;
    if let Some(host) = host {
        queue_config.host = host;
    }
    if let Some(port) = port {
        queue_config.port = port;
    }

    let queue = Arc::new(AlertQueue::new(&queue_config.file));
    QueueServer::new(queue_config.bind_addr(), queue)
        .run(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down alert queue");
}
