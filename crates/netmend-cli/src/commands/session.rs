//! `run`, `resume`, `status`, `reset` and `sessions`.

use super::context;
use anyhow::{bail, Context, Result};
use netmend_core::ResultSummary;
use netmend_runtime::{Orchestrator, SessionOutcome, SessionStore};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Alert text from `--alert`, `--alert-file`, or empty (fixture alert).
pub fn read_alert(alert: Option<String>, alert_file: Option<&Path>) -> Result<String> {
    match (alert, alert_file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read alert from {}", path.display())),
        (None, None) => Ok(String::new()),
    }
}

pub async fn run(
    config_path: &Path,
    alert: &str,
    session_id: Option<&str>,
    interactive: bool,
) -> Result<()> {
    let config = context::load_config(config_path)?;
    if alert.trim().is_empty() && !config.settings.test_mode {
        bail!("no alert given; pass --alert or --alert-file");
    }
    let orchestrator = context::orchestrator(config)?;

    let outcome = match session_id {
        Some(id) => orchestrator.start_with_id(id, alert).await?,
        None => orchestrator.start(alert).await?,
    };

    if interactive {
        answer_interactively(&orchestrator, outcome).await
    } else {
        print_outcome(&outcome);
        Ok(())
    }
}

/// Keep prompting on stdin until the session completes or input ends.
async fn answer_interactively(orchestrator: &Orchestrator, mut outcome: SessionOutcome) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_outcome(&outcome);
        if !outcome.is_suspended() {
            return Ok(());
        }
        let Some(response) = lines.next_line().await? else {
            println!("\nInput closed; session {} stays suspended.", outcome.session_id());
            return Ok(());
        };
        let session_id = outcome.session_id().to_string();
        outcome = orchestrator.resume(&session_id, &response).await?;
    }
}

pub async fn resume(config_path: &Path, session_id: &str, response: &str) -> Result<()> {
    let orchestrator = context::orchestrator(context::load_config(config_path)?)?;
    let outcome = orchestrator.resume(session_id, response).await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn status(config_path: &Path, session_id: &str) -> Result<()> {
    let config = context::load_config(config_path)?;
    let store = context::session_store(&config)?;
    let Some(state) = store.load(session_id).await? else {
        bail!("no suspended session '{session_id}'");
    };

    println!("Session:   {}", state.session_id);
    println!("Phase:     {}", state.phase.label());
    println!("Device:    {}", state.target);
    println!("Fault:     {}", state.fault_summary.title);
    println!("Executed:  {}", state.executions);
    println!("Remaining: {}", state.plan.remaining().len());
    println!("Updated:   {}", state.updated_at.to_rfc3339());
    if let Some(prompt) = state.pending_prompt() {
        println!("\n{prompt}");
    }
    Ok(())
}

pub async fn reset(config_path: &Path, session_id: &str) -> Result<()> {
    let orchestrator = context::orchestrator(context::load_config(config_path)?)?;
    if orchestrator.reset(session_id).await? {
        println!("Session {session_id} discarded.");
    } else {
        println!("No session '{session_id}'.");
    }
    Ok(())
}

pub async fn list(config_path: &Path) -> Result<()> {
    let config = context::load_config(config_path)?;
    let sessions = context::session_store(&config)?.list().await?;
    if sessions.is_empty() {
        println!("No suspended sessions.");
        return Ok(());
    }

    println!(
        "{:<38} {:<18} {:<20} {:>4} {:>4}  UPDATED",
        "SESSION", "PHASE", "DEVICE", "DONE", "LEFT"
    );
    for s in sessions {
        println!(
            "{:<38} {:<18} {:<20} {:>4} {:>4}  {}",
            s.session_id,
            s.phase,
            s.device,
            s.steps_completed,
            s.steps_remaining,
            s.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub fn print_outcome(outcome: &SessionOutcome) {
    match outcome {
        SessionOutcome::AwaitingApproval {
            session_id, prompt, ..
        } => {
            println!("\n{prompt}");
            println!("(session {session_id}; answer with `netmend resume {session_id} <yes|no>`)");
        }
        SessionOutcome::Reprompt { session_id, prompt } => {
            println!("\nResponse not understood. Session {session_id} is still waiting.");
            println!("{prompt}");
        }
        SessionOutcome::Completed(state) => {
            if let Some(termination) = state.termination() {
                println!("\nSession {} finished: {termination}", state.session_id);
            }
            if let Some(result) = &state.result {
                print_result(result);
            }
        }
    }
}

fn print_result(result: &ResultSummary) {
    println!("\n== {} ==", result.summary_title);
    println!("Status:  {}", result.resolution_status);
    println!("Steps:   {}", result.steps_executed);
    println!("Fault:   {}", result.fault_recap);
    if let Some(cause) = &result.root_cause {
        println!("Root cause: {cause}");
    }
    print_list("Key findings", &result.key_findings);
    print_list("Successful actions", &result.successful_actions);
    print_list("Failed actions", &result.failed_actions);
    print_list("Next steps", &result.recommended_next_steps);
    if let Some(details) = &result.escalation_details {
        println!("\nEscalation: {details}");
    }
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{title}:");
    for item in items {
        println!("  - {item}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_comes_from_flag_or_file() {
        assert_eq!(read_alert(Some("down".into()), None).unwrap(), "down");
        assert_eq!(read_alert(None, None).unwrap(), "");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert.json");
        std::fs::write(&path, r#"{"host": "r1"}"#).unwrap();
        assert_eq!(read_alert(None, Some(&path)).unwrap(), r#"{"host": "r1"}"#);
        assert!(read_alert(None, Some(&dir.path().join("missing"))).is_err());
    }
}
