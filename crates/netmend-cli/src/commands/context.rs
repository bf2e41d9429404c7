//! Wiring configuration into an [`Orchestrator`].

use anyhow::{Context, Result};
use netmend_audit::AuditLogger;
use netmend_core::NetmendConfig;
use netmend_device::Fixture;
use netmend_runtime::{FileSessionStore, Orchestrator};
use std::path::Path;
use std::sync::Arc;

pub fn load_config(path: &Path) -> Result<NetmendConfig> {
    NetmendConfig::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

pub fn session_store(config: &NetmendConfig) -> Result<FileSessionStore> {
    FileSessionStore::new(&config.sessions.directory).with_context(|| {
        format!(
            "failed to open session directory {}",
            config.sessions.directory.display()
        )
    })
}

/// Everything a session needs: executor, collaborators, store and audit.
///
/// In test mode the fixture's alert becomes the default alert and its
/// custom instructions apply unless the configuration sets its own.
pub fn orchestrator(mut config: NetmendConfig) -> Result<Orchestrator> {
    let fixture = match (&config.settings.fixture_file, config.settings.test_mode) {
        (Some(path), true) => Some(
            Fixture::from_file(path)
                .with_context(|| format!("failed to load fixture {}", path.display()))?,
        ),
        _ => None,
    };
    if let Some(fixture) = &fixture {
        if config.settings.custom_instructions.is_none() {
            config.settings.custom_instructions = fixture.custom_instructions.clone();
        }
    }

    let executor = netmend_device::create_executor(&config).context("failed to set up execution")?;
    let agents = netmend_agents::from_llm_config(&config.llm)
        .context("failed to set up the analysis collaborators")?;
    let store = Arc::new(session_store(&config)?);
    let audit = Arc::new(AuditLogger::new(config.audit.clone()).context("failed to open audit log")?);

    tracing::info!(
        executor = executor.kind(),
        max_steps = config.settings.max_steps,
        adaptive = config.settings.adaptive_mode,
        sessions = %config.sessions.directory.display(),
        "Workflow ready"
    );

    let orchestrator = Orchestrator::new(config, executor, agents, store).with_audit(audit);
    Ok(match fixture {
        Some(fixture) => orchestrator.with_default_alert(fixture.alert_payload),
        None => orchestrator,
    })
}
