//! The graph runner.
//!
//! [`Orchestrator`] wires the pipeline together:
//!
//! ```text
//! fault summary → init deps → planner → router ⇄ { executor → analyzer } → result summary
//! ```
//!
//! It owns every side effect the router deliberately does not: calling the
//! collaborators, running steps on the device, writing the audit trail and
//! persisting suspended sessions. A session that needs approval is saved to
//! the [`SessionStore`] and the call returns; [`Orchestrator::resume`] loads
//! it and continues at the suspended step.

use crate::adapter::StepExecutor;
use crate::agents::{
    ActionAnalyzer, ActionPlanner, AnalysisRequest, FaultSummarizer, PlanningRequest,
    ResultSummarizer, SummaryRequest,
};
use crate::error::RuntimeError;
use crate::router::{self, ResumeSignal, RouterError, RouterSignal};
use crate::state::{EscalationCode, Termination, TerminationReason, WorkflowState};
use crate::store::{validate_session_id, SessionInfo, SessionStore};
use netmend_audit::{AuditError, AuditLogger};
use netmend_core::{
    validate_plan, ActionPlan, FaultSummary, NetmendConfig, PlanError, ResultSummary,
    TroubleshootingStep,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// The four analysis stages.
#[derive(Clone)]
pub struct Collaborators {
    pub fault_summarizer: Arc<dyn FaultSummarizer>,
    pub planner: Arc<dyn ActionPlanner>,
    pub analyzer: Arc<dyn ActionAnalyzer>,
    pub result_summarizer: Arc<dyn ResultSummarizer>,
}

/// Where a call into the orchestrator left the session.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// Suspended at the approval gate. The state has been saved.
    AwaitingApproval {
        session_id: String,
        step_number: usize,
        step: TroubleshootingStep,
        prompt: String,
    },

    /// The response was not understood. Nothing changed.
    Reprompt { session_id: String, prompt: String },

    /// The session is over. `result` is always set on the final state.
    Completed(Box<WorkflowState>),
}

impl SessionOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            Self::AwaitingApproval { session_id, .. } | Self::Reprompt { session_id, .. } => {
                session_id
            }
            Self::Completed(state) => &state.session_id,
        }
    }

    pub fn termination(&self) -> Option<&Termination> {
        match self {
            Self::Completed(state) => state.termination(),
            _ => None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        !matches!(self, Self::Completed(_))
    }
}

pub struct Orchestrator {
    config: NetmendConfig,
    executor: Arc<dyn StepExecutor>,
    agents: Collaborators,
    store: Arc<dyn SessionStore>,
    audit: Arc<AuditLogger>,
    default_alert: Option<String>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("executor", &self.executor.kind())
            .field("settings", &self.config.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        config: NetmendConfig,
        executor: Arc<dyn StepExecutor>,
        agents: Collaborators,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            executor,
            agents,
            store,
            audit: Arc::new(AuditLogger::disabled()),
            default_alert: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Alert used when [`start`](Self::start) is given blank text (fixture
    /// replays).
    pub fn with_default_alert(mut self, alert: impl Into<String>) -> Self {
        self.default_alert = Some(alert.into());
        self
    }

    pub fn config(&self) -> &NetmendConfig {
        &self.config
    }

    /// Start a session under a fresh id.
    pub async fn start(&self, alert: &str) -> Result<SessionOutcome, RuntimeError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.start_with_id(&session_id, alert).await
    }

    /// Start a session under `session_id` and run it until it terminates or
    /// suspends.
    pub async fn start_with_id(
        &self,
        session_id: &str,
        alert: &str,
    ) -> Result<SessionOutcome, RuntimeError> {
        validate_session_id(session_id)?;
        let lock = self.session_lock(session_id)?;
        let _guard = lock.lock().await;
        if self.store.load(session_id).await?.is_some() {
            return Err(RuntimeError::SessionExists(session_id.to_string()));
        }

        let alert = match &self.default_alert {
            Some(default) if alert.trim().is_empty() => {
                tracing::info!(session_id, "Empty alert; using the fixture alert payload");
                default.as_str()
            }
            _ => alert,
        };

        let mut state = self.init_session(session_id, alert).await;
        audited(
            self.audit
                .log_session_started(session_id, &state.target.key(), alert)
                .await,
        );

        let request = PlanningRequest::new(&state.fault_summary, &state.device_facts, &state.settings);
        match self.agents.planner.plan(&request).await {
            Ok(steps) if steps.is_empty() => {
                router::terminate(
                    &mut state,
                    Termination::new(
                        TerminationReason::Escalated,
                        Some(EscalationCode::PlanningFailed),
                        "planner returned no steps",
                    ),
                );
            }
            Ok(steps) => match validate_plan(&steps) {
                Ok(()) => {
                    tracing::info!(session_id, steps = steps.len(), "Plan created");
                    audited(self.audit.log_plan_created(session_id, &steps).await);
                    state.plan = ActionPlan::new(steps);
                }
                Err(e) => {
                    tracing::error!(session_id, error = %e, "Planner returned an invalid plan");
                    router::terminate(
                        &mut state,
                        Termination::new(
                            TerminationReason::Escalated,
                            Some(EscalationCode::ContractViolation),
                            format!("invalid plan: {e}"),
                        ),
                    );
                }
            },
            Err(e) => {
                tracing::error!(session_id, error = %e, "Planning failed");
                router::terminate(
                    &mut state,
                    Termination::new(
                        TerminationReason::Escalated,
                        Some(EscalationCode::PlanningFailed),
                        e.to_string(),
                    ),
                );
            }
        }

        self.drive(state).await
    }

    /// Answer the approval prompt of a suspended session.
    pub async fn resume(
        &self,
        session_id: &str,
        response: &str,
    ) -> Result<SessionOutcome, RuntimeError> {
        let lock = self
            .stored_session_lock(session_id)
            .await?
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))?;
        let _guard = lock.lock().await;
        let Some(mut state) = self.store.load(session_id).await? else {
            self.forget_lock(session_id);
            return Err(RuntimeError::SessionNotFound(session_id.to_string()));
        };

        let step = state.plan.current().cloned();
        let number = state.step_number();

        match router::resume(&mut state, response)? {
            ResumeSignal::Reprompt => {
                tracing::warn!(session_id, response, "Unrecognized approval response");
                let prompt = state.pending_prompt().unwrap_or_default().to_string();
                return Ok(SessionOutcome::Reprompt {
                    session_id: session_id.to_string(),
                    prompt,
                });
            }
            ResumeSignal::Execute => {
                tracing::info!(session_id, step = number, "Step approved");
                if let Some(step) = &step {
                    audited(self.audit.log_approved(session_id, number, step, response).await);
                }
            }
            ResumeSignal::Terminate => {
                tracing::info!(session_id, step = number, "Step rejected");
                if let Some(step) = &step {
                    audited(self.audit.log_rejected(session_id, number, step, response).await);
                }
            }
        }

        self.drive(state).await
    }

    /// Current state of a stored session.
    pub async fn status(&self, session_id: &str) -> Result<WorkflowState, RuntimeError> {
        self.store
            .load(session_id)
            .await?
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))
    }

    /// Discard a stored session, releasing its transport. Returns whether one
    /// existed.
    pub async fn reset(&self, session_id: &str) -> Result<bool, RuntimeError> {
        let Some(lock) = self.stored_session_lock(session_id).await? else {
            return Ok(false);
        };
        let _guard = lock.lock().await;
        let Some(mut state) = self.store.load(session_id).await? else {
            self.forget_lock(session_id);
            return Ok(false);
        };

        self.release_transport(&mut state).await;
        audited(
            self.audit
                .log_session_terminated(session_id, "reset", "session reset", state.plan.history().len())
                .await,
        );
        let removed = self.store.delete(session_id).await?;
        self.forget_lock(session_id);
        tracing::info!(session_id, "Session reset");
        Ok(removed)
    }

    /// Sessions this orchestrator holds a lock entry for.
    pub fn tracked_sessions(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub async fn sessions(&self) -> Result<Vec<SessionInfo>, RuntimeError> {
        Ok(self.store.list().await?)
    }

    /// Summarize the alert and resolve the target device.
    async fn init_session(&self, session_id: &str, alert: &str) -> WorkflowState {
        let fault_summary = match self.agents.fault_summarizer.summarize(alert).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Fault summary failed; using defaults");
                FaultSummary::default()
            }
        };

        let hostname = match &self.config.device.hostname {
            Some(default) if fault_summary.has_unknown_device() => {
                tracing::info!(session_id, device = %default, "Alert names no device; using the configured default");
                default.clone()
            }
            _ => fault_summary.hostname.clone(),
        };

        let target = self.config.device.target(&hostname);
        let device_facts = self.config.device_facts(&hostname);
        tracing::info!(
            session_id,
            device = %target,
            title = %fault_summary.title,
            severity = ?fault_summary.severity,
            "Session started"
        );

        WorkflowState::new(
            session_id,
            alert,
            fault_summary,
            target,
            device_facts,
            self.config.settings.clone(),
        )
    }

    /// Route until the session suspends or terminates.
    async fn drive(&self, mut state: WorkflowState) -> Result<SessionOutcome, RuntimeError> {
        loop {
            let routed = router::route(&mut state)?;

            if let Some(replacement) = routed.replacement {
                audited(
                    self.audit
                        .log_plan_replaced(
                            &state.session_id,
                            &replacement.kind.to_string(),
                            replacement.outcome.installed,
                            replacement.outcome.discarded,
                            replacement.outcome.dropped_duplicate,
                        )
                        .await,
                );
            }

            match routed.signal {
                RouterSignal::Execute => self.execute_current(&mut state).await?,
                RouterSignal::AwaitApproval => return self.suspend(state).await,
                RouterSignal::Terminate => return self.finish(state).await,
            }
        }
    }

    /// Run the in-flight step and feed the outcome to the analyzer.
    async fn execute_current(&self, state: &mut WorkflowState) -> Result<(), RuntimeError> {
        let step = state
            .plan
            .current()
            .cloned()
            .ok_or(PlanError::NoStepInFlight)?;
        let number = state.step_number();
        let session_id = state.session_id.clone();
        let device = state.target.key();

        tracing::info!(
            session_id = %session_id,
            step = number,
            device = %device,
            executor = self.executor.kind(),
            "Executing step: {}",
            step.description
        );

        let started = Instant::now();
        let result = self.executor.execute(&session_id, &state.target, &step).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let execution = match result {
            Ok(execution) => execution,
            Err(e) => {
                tracing::error!(session_id = %session_id, step = number, error = %e, "Transport failure");
                audited(
                    self.audit
                        .log_step_executed(
                            &session_id,
                            &device,
                            number,
                            &step,
                            &[e.to_string()],
                            duration_ms,
                            false,
                        )
                        .await,
                );
                router::ingest_transport_failure(state, &e.to_string())?;
                self.audit_analysis(state, number, &step).await;
                return Ok(());
            }
        };

        state.executions += 1;
        if execution.has_errors() {
            tracing::warn!(session_id = %session_id, step = number, errors = ?execution.errors, "Step reported command errors");
        }
        audited(
            self.audit
                .log_step_executed(
                    &session_id,
                    &device,
                    number,
                    &step,
                    &execution.errors,
                    duration_ms,
                    execution.simulated,
                )
                .await,
        );

        router::begin_analysis(state)?;
        let request = AnalysisRequest::from_state(state, &step, &execution);
        state.last_execution = Some(execution);

        match self.agents.analyzer.analyze(&request).await {
            Ok(report) => {
                let outcome = router::ingest_analysis(state, report)?;
                if let Some(from) = outcome.downgraded_from {
                    tracing::warn!(session_id = %session_id, from = %from, to = %outcome.verdict, "Verdict changed");
                }
                if let Some(reason) = &outcome.replan_rejected {
                    audited(
                        self.audit
                            .log_replan_rejected(
                                &session_id,
                                outcome.downgraded_from.unwrap_or(outcome.verdict),
                                reason,
                            )
                            .await,
                    );
                }
            }
            Err(e) if e.is_contract_violation() => {
                router::ingest_contract_violation(state, &e.to_string())?;
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, step = number, error = %e, "Analyzer unavailable");
                router::ingest_analysis_unavailable(state, &e.to_string())?;
            }
        }

        self.audit_analysis(state, number, &step).await;
        Ok(())
    }

    async fn audit_analysis(&self, state: &WorkflowState, number: usize, step: &TroubleshootingStep) {
        let Some(report) = state.plan.current().and_then(|s| s.analysis_report.as_ref()) else {
            return;
        };
        tracing::info!(
            session_id = %state.session_id,
            step = number,
            verdict = %report.next_action_type,
            "Step analyzed: {}",
            report.next_action_reason
        );
        audited(
            self.audit
                .log_step_analyzed(
                    &state.session_id,
                    number,
                    step,
                    report.next_action_type,
                    &report.next_action_reason,
                )
                .await,
        );
    }

    async fn suspend(&self, mut state: WorkflowState) -> Result<SessionOutcome, RuntimeError> {
        let step = state
            .plan
            .current()
            .cloned()
            .ok_or(PlanError::NoStepInFlight)?;
        let number = state.step_number();
        let prompt = state.pending_prompt().unwrap_or_default().to_string();

        audited(
            self.audit
                .log_approval_requested(&state.session_id, number, &step)
                .await,
        );
        state.touch();
        self.store.save(&state).await?;
        tracing::info!(session_id = %state.session_id, step = number, "Waiting for approval");

        Ok(SessionOutcome::AwaitingApproval {
            session_id: state.session_id,
            step_number: number,
            step,
            prompt,
        })
    }

    async fn finish(&self, mut state: WorkflowState) -> Result<SessionOutcome, RuntimeError> {
        let termination = match state.termination() {
            Some(t) => t.clone(),
            None => return Err(RouterError::InFlight(state.phase.label()).into()),
        };

        self.release_transport(&mut state).await;

        let request = SummaryRequest::from_state(&state, &termination);
        let mut summary = match self.agents.result_summarizer.summarize(&request).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "Result summary failed; building it from history");
                ResultSummary::from_history(
                    &state.fault_summary,
                    state.plan.history(),
                    termination.resolution_status(),
                    &termination.detail,
                )
            }
        };
        summary.steps_executed = state.executions;
        state.result = Some(summary);
        state.touch();

        audited(
            self.audit
                .log_session_terminated(
                    &state.session_id,
                    &termination.reason.to_string(),
                    &termination.to_string(),
                    state.plan.history().len(),
                )
                .await,
        );

        self.store.delete(&state.session_id).await?;
        self.forget_lock(&state.session_id);
        Ok(SessionOutcome::Completed(Box::new(state)))
    }

    /// Release the device handle, at most once per session.
    async fn release_transport(&self, state: &mut WorkflowState) {
        if state.transport_released {
            return;
        }
        if let Err(e) = self.executor.release(&state.session_id, &state.target).await {
            tracing::warn!(session_id = %state.session_id, device = %state.target, error = %e, "Failed to release transport");
        }
        state.transport_released = true;
    }

    /// Lock for a session that is in the store; `None` (and no lock entry)
    /// when there is nothing to resume.
    async fn stored_session_lock(
        &self,
        session_id: &str,
    ) -> Result<Option<Arc<tokio::sync::Mutex<()>>>, RuntimeError> {
        validate_session_id(session_id)?;
        if self.store.load(session_id).await?.is_none() {
            return Ok(None);
        }
        self.session_lock(session_id).map(Some)
    }

    fn session_lock(&self, session_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, RuntimeError> {
        let mut locks = self.locks.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(locks.entry(session_id.to_string()).or_default().clone())
    }

    fn forget_lock(&self, session_id: &str) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(session_id);
        }
    }
}

/// Audit failures never stop a session.
fn audited(result: Result<(), AuditError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to write audit event");
    }
}
