//! The workflow router.
//!
//! The router is a pure state machine over [`WorkflowState`]: every function
//! here takes the state, mutates it, and returns a signal telling the
//! orchestrator what to do next. Nothing in this module performs I/O or
//! suspends; suspension is the orchestrator's job.
//!
//! ```text
//!   AwaitingStep ──► AwaitingApproval ──yes──► Executing ──► Analyzing ──┐
//!     ▲   │                 │ no                    ▲                     │
//!     │   │                 ▼                       │                     │
//!     │   └──────────► Terminated        (no approval needed)             │
//!     │   └─────────────────────────────────────────┘                     │
//!     └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One call to [`route`] runs these checks in order:
//!
//! 1. Commit the in-flight step (it must carry its report) and apply any
//!    replacement plan the report carries.
//! 2. `resolve` / `escalate` verdicts terminate.
//! 3. An unreachable device terminates.
//! 4. An empty plan terminates as exhausted.
//! 5. If the step budget is spent, the next step is popped, annotated with a
//!    synthetic escalation and committed, and the session terminates.
//! 6. The next step is dequeued.
//! 7. Escalation steps, structurally invalid steps and steps with unresolved
//!    `{{var}}` placeholders are annotated, committed and terminate.
//! 8. Steps needing approval suspend; everything else is dispatched.

use crate::approval::{approval_prompt, ApprovalDecision};
use crate::state::{EscalationCode, Phase, Termination, TerminationReason, WorkflowState};
use netmend_core::{
    validate_plan, ActionAnalysisReport, ActionType, ApprovalMode, NextActionType, PlanError,
    ReplaceOutcome,
};

/// What the orchestrator should do after a router call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterSignal {
    /// Run the current step.
    Execute,
    /// Persist the state and wait for a human.
    AwaitApproval,
    /// The session is over.
    Terminate,
}

/// How a remaining-plan replacement is labelled for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementKind {
    /// The same steps with `{{var}}` placeholders filled in.
    TemplateFill,
    /// A different plan.
    Replan,
}

impl std::fmt::Display for ReplacementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateFill => write!(f, "template_fill"),
            Self::Replan => write!(f, "replan"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replacement {
    pub kind: ReplacementKind,
    pub outcome: ReplaceOutcome,
}

/// Result of one [`route`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    pub signal: RouterSignal,
    /// Set when the ingested report replaced the remaining plan.
    pub replacement: Option<Replacement>,
}

/// Result of [`resume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSignal {
    /// Approved; run the current step.
    Execute,
    /// Rejected; the session is over.
    Terminate,
    /// Response not understood; still waiting.
    Reprompt,
}

/// Result of ingesting an analysis report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// The verdict the router will act on.
    pub verdict: NextActionType,
    /// The analyzer's verdict, when it was changed.
    pub downgraded_from: Option<NextActionType>,
    /// Why a replacement plan was refused, if one was.
    pub replan_rejected: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("session is {0}, not awaiting approval")]
    NotAwaitingApproval(&'static str),

    #[error("cannot route while {0}")]
    InFlight(&'static str),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Run one routing cycle.
pub fn route(state: &mut WorkflowState) -> Result<RouteOutcome, RouterError> {
    match &state.phase {
        Phase::Terminated(_) => return Ok(signal(RouterSignal::Terminate)),
        Phase::AwaitingApproval { .. } => return Ok(signal(RouterSignal::AwaitApproval)),
        Phase::Executing => return Ok(signal(RouterSignal::Execute)),
        Phase::Analyzing => return Err(RouterError::InFlight(state.phase.label())),
        Phase::AwaitingStep => {}
    }

    // 1. Ingest the analyzed step.
    let mut replacement = None;
    let mut ingested: Option<ActionAnalysisReport> = None;
    if state.plan.current().is_some() {
        let step = state.plan.commit_current()?;
        let report = step
            .analysis_report
            .clone()
            .ok_or(PlanError::MissingReport)?;

        if !report.next_action_type.is_terminal() {
            if let Some(steps) = report.updated_action_plan_remaining.clone() {
                let kind = if state.plan.is_template_fill(&steps) {
                    ReplacementKind::TemplateFill
                } else {
                    ReplacementKind::Replan
                };
                let outcome = state.plan.replace_remaining(steps);
                if outcome.dropped_duplicate {
                    tracing::warn!(
                        session_id = %state.session_id,
                        "Replacement plan repeated the step just executed; dropped it"
                    );
                }
                tracing::info!(
                    session_id = %state.session_id,
                    kind = %kind,
                    installed = outcome.installed,
                    discarded = outcome.discarded,
                    "Remaining plan replaced"
                );
                replacement = Some(Replacement { kind, outcome });
            }
        }
        state.last_analysis = Some(report.clone());
        ingested = Some(report);
    }
    let code = state.pending_code.take();
    let routed = |signal| RouteOutcome {
        signal,
        replacement,
    };

    // 2. Terminal verdicts.
    if let Some(report) = ingested {
        match report.next_action_type {
            NextActionType::Resolve => {
                terminate(
                    state,
                    Termination::new(TerminationReason::Resolved, None, report.next_action_reason),
                );
                return Ok(routed(RouterSignal::Terminate));
            }
            NextActionType::Escalate => {
                let termination = if state.device_facts.reachable {
                    Termination::new(
                        TerminationReason::Escalated,
                        Some(code.unwrap_or(EscalationCode::AnalystVerdict)),
                        report.next_action_reason,
                    )
                } else {
                    Termination::new(
                        TerminationReason::Unreachable,
                        Some(code.unwrap_or(EscalationCode::TransportFailure)),
                        report.next_action_reason,
                    )
                };
                terminate(state, termination);
                return Ok(routed(RouterSignal::Terminate));
            }
            NextActionType::Continue | NextActionType::NewAction => {}
        }
    }

    // 3. Reachability, rechecked every cycle.
    if !state.device_facts.reachable {
        let detail = format!("device {} is unreachable", state.target.hostname);
        terminate(
            state,
            Termination::new(
                TerminationReason::Unreachable,
                Some(EscalationCode::TransportFailure),
                detail,
            ),
        );
        return Ok(routed(RouterSignal::Terminate));
    }

    // 4. Plan exhaustion.
    if state.plan.remaining().is_empty() {
        terminate(
            state,
            Termination::new(
                TerminationReason::Exhausted,
                None,
                "plan completed without a resolve or escalate verdict",
            ),
        );
        return Ok(routed(RouterSignal::Terminate));
    }

    // 5. Step budget.
    if state.plan.dequeued() >= state.settings.max_steps {
        state.plan.dequeue()?;
        let detail = format!("max steps exceeded ({})", state.settings.max_steps);
        tracing::warn!(session_id = %state.session_id, max_steps = state.settings.max_steps, "Step budget exhausted");
        close_current(
            state,
            "max steps exceeded",
            Termination::new(
                TerminationReason::Escalated,
                Some(EscalationCode::MaxStepsExceeded),
                detail,
            ),
        )?;
        return Ok(routed(RouterSignal::Terminate));
    }

    // 6. Dequeue.
    let step = state.plan.dequeue()?.clone();
    let number = state.plan.dequeued();

    // 7. Steps that must never reach the device.
    if step.action_type == ActionType::Escalation {
        close_current(
            state,
            format!("escalation step: {}", step.description),
            Termination::new(
                TerminationReason::Escalated,
                Some(EscalationCode::EscalationStep),
                step.description.clone(),
            ),
        )?;
        return Ok(routed(RouterSignal::Terminate));
    }
    if let Err(e) = step.validate() {
        tracing::error!(session_id = %state.session_id, step = number, error = %e, "Invalid step reached dispatch");
        close_current(
            state,
            format!("invalid step: {e}"),
            Termination::new(
                TerminationReason::Escalated,
                Some(EscalationCode::ContractViolation),
                e.to_string(),
            ),
        )?;
        return Ok(routed(RouterSignal::Terminate));
    }
    let unresolved = step.unresolved_templates();
    if !unresolved.is_empty() {
        let detail = format!("unresolved template variables: {}", unresolved.join(", "));
        tracing::error!(session_id = %state.session_id, step = number, variables = ?unresolved, "Unresolved templates at dispatch");
        close_current(
            state,
            detail.clone(),
            Termination::new(
                TerminationReason::Escalated,
                Some(EscalationCode::UnresolvedTemplate),
                detail,
            ),
        )?;
        return Ok(routed(RouterSignal::Terminate));
    }

    // 8. Approval gate.
    let forced = !step.requires_approval
        && state.settings.approval_mode == ApprovalMode::Intrusive
        && step.action_type.is_intrusive();
    if forced {
        tracing::warn!(
            session_id = %state.session_id,
            step = number,
            action_type = %step.action_type,
            "Intrusive step was not flagged for approval; requiring it anyway"
        );
    }
    if step.requires_approval || forced {
        state.phase = Phase::AwaitingApproval {
            prompt: approval_prompt(number, &step),
        };
        return Ok(routed(RouterSignal::AwaitApproval));
    }

    state.phase = Phase::Executing;
    Ok(routed(RouterSignal::Execute))
}

/// Apply a human's response to a suspended session.
pub fn resume(state: &mut WorkflowState, response: &str) -> Result<ResumeSignal, RouterError> {
    if !state.is_awaiting_approval() {
        return Err(RouterError::NotAwaitingApproval(state.phase.label()));
    }

    match ApprovalDecision::parse(response) {
        ApprovalDecision::Approve => {
            state.phase = Phase::Executing;
            Ok(ResumeSignal::Execute)
        }
        ApprovalDecision::Reject => {
            close_current(
                state,
                "rejected by user",
                Termination::new(
                    TerminationReason::Rejected,
                    Some(EscalationCode::RejectedByUser),
                    "rejected by user",
                ),
            )?;
            Ok(ResumeSignal::Terminate)
        }
        ApprovalDecision::Unrecognized => Ok(ResumeSignal::Reprompt),
    }
}

/// Mark the current step as being analyzed.
pub fn begin_analysis(state: &mut WorkflowState) -> Result<(), RouterError> {
    if state.plan.current().is_none() {
        return Err(PlanError::NoStepInFlight.into());
    }
    state.phase = Phase::Analyzing;
    Ok(())
}

/// Attach the analyzer's report to the in-flight step.
///
/// The report is checked before it is attached: findings are bounded, a
/// replacement plan must be structurally valid, `new_action` must carry a
/// replacement, and with adaptive mode off `new_action` is downgraded and
/// non-template replacements are dropped.
pub fn ingest_analysis(
    state: &mut WorkflowState,
    mut report: ActionAnalysisReport,
) -> Result<IngestOutcome, RouterError> {
    if state.plan.current().is_none() {
        return Err(PlanError::NoStepInFlight.into());
    }
    report.truncate_findings();

    let original = report.next_action_type;
    let mut downgraded_from = None;
    let mut replan_rejected = None;
    let mut code = None;

    if let Some(steps) = &report.updated_action_plan_remaining {
        if let Err(e) = validate_plan(steps) {
            let message = format!("invalid replacement plan: {e}");
            ingest_contract_violation(state, &message)?;
            return Ok(IngestOutcome {
                verdict: NextActionType::Escalate,
                downgraded_from: Some(original),
                replan_rejected: Some(message),
            });
        }
    }

    match report.next_action_type {
        NextActionType::NewAction if report.updated_action_plan_remaining.is_none() => {
            let message = "new_action verdict without a replacement plan";
            ingest_contract_violation(state, message)?;
            return Ok(IngestOutcome {
                verdict: NextActionType::Escalate,
                downgraded_from: Some(original),
                replan_rejected: None,
            });
        }
        NextActionType::NewAction if !state.settings.adaptive_mode => {
            report.updated_action_plan_remaining = None;
            replan_rejected = Some("adaptive mode is disabled".to_string());
            downgraded_from = Some(NextActionType::NewAction);
            if state.plan.remaining().is_empty() {
                report.next_action_type = NextActionType::Escalate;
                code = Some(EscalationCode::ReplanNotAllowed);
            } else {
                report.next_action_type = NextActionType::Continue;
            }
            report.next_action_reason = format!(
                "{} (new_action downgraded to {}: adaptive mode disabled)",
                report.next_action_reason, report.next_action_type
            );
        }
        NextActionType::Continue if !state.settings.adaptive_mode => {
            let is_fill = report
                .updated_action_plan_remaining
                .as_deref()
                .is_none_or(|steps| state.plan.is_template_fill(steps));
            if !is_fill {
                report.updated_action_plan_remaining = None;
                replan_rejected = Some(
                    "continue carried plan changes beyond template filling".to_string(),
                );
            }
        }
        NextActionType::Escalate | NextActionType::Resolve => {
            if report.updated_action_plan_remaining.take().is_some() {
                tracing::debug!(
                    session_id = %state.session_id,
                    verdict = %report.next_action_type,
                    "Ignoring replacement plan on terminal verdict"
                );
            }
            if report.next_action_type == NextActionType::Escalate {
                code = Some(EscalationCode::AnalystVerdict);
            }
        }
        _ => {}
    }

    if let Some(reason) = &replan_rejected {
        tracing::warn!(session_id = %state.session_id, verdict = %original, reason = %reason, "Replacement plan refused");
    }

    let verdict = report.next_action_type;
    state.plan.annotate_current(report)?;
    state.pending_code = code;
    state.phase = Phase::AwaitingStep;

    Ok(IngestOutcome {
        verdict,
        downgraded_from,
        replan_rejected,
    })
}

/// The execution adapter could not reach the device. The step gets a
/// synthetic escalation and the next cycle terminates as unreachable.
pub fn ingest_transport_failure(state: &mut WorkflowState, message: &str) -> Result<(), RouterError> {
    state.device_facts.reachable = false;
    ingest_synthetic(
        state,
        format!("transport failure: {message}"),
        EscalationCode::TransportFailure,
    )
}

/// The analyzer broke its contract (bad verdict, bad steps).
pub fn ingest_contract_violation(state: &mut WorkflowState, message: &str) -> Result<(), RouterError> {
    tracing::error!(session_id = %state.session_id, detail = message, "Analyzer contract violation");
    ingest_synthetic(
        state,
        format!("contract violation: {message}"),
        EscalationCode::ContractViolation,
    )
}

/// The analyzer could not be reached at all.
pub fn ingest_analysis_unavailable(state: &mut WorkflowState, message: &str) -> Result<(), RouterError> {
    ingest_synthetic(
        state,
        format!("analysis unavailable: {message}"),
        EscalationCode::AnalysisUnavailable,
    )
}

fn ingest_synthetic(
    state: &mut WorkflowState,
    reason: String,
    code: EscalationCode,
) -> Result<(), RouterError> {
    state
        .plan
        .annotate_current(ActionAnalysisReport::synthetic_escalation(reason))?;
    state.pending_code = Some(code);
    state.phase = Phase::AwaitingStep;
    Ok(())
}

/// End the session outside the normal cycle (planning failure, cancel).
/// A step still in flight stays where it is.
pub fn terminate(state: &mut WorkflowState, termination: Termination) {
    tracing::info!(
        session_id = %state.session_id,
        outcome = %termination,
        history = state.plan.history().len(),
        "Session terminated"
    );
    state.phase = Phase::Terminated(termination);
    state.touch();
}

/// Annotate the in-flight step with a synthetic escalation, commit it and
/// terminate.
fn close_current(
    state: &mut WorkflowState,
    reason: impl Into<String>,
    termination: Termination,
) -> Result<(), RouterError> {
    let report = ActionAnalysisReport::synthetic_escalation(reason);
    state.plan.annotate_current(report.clone())?;
    state.plan.commit_current()?;
    state.last_analysis = Some(report);
    terminate(state, termination);
    Ok(())
}

fn signal(signal: RouterSignal) -> RouteOutcome {
    RouteOutcome {
        signal,
        replacement: None,
    }
}
