//! Serializable workflow state.
//!
//! A [`WorkflowState`] is everything needed to continue a session. It is
//! written to the session store whenever the workflow suspends for approval
//! and read back on resume.

use chrono::{DateTime, Utc};
use netmend_core::{
    ActionAnalysisReport, ActionPlan, DeviceFacts, DeviceTarget, ExecutionResult, FaultSummary,
    NextActionType, ResolutionStatus, ResultSummary, WorkflowSettings,
};
use serde::{Deserialize, Serialize};

/// Router state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    /// Ready for the next routing cycle.
    AwaitingStep,
    /// Suspended until a human answers `prompt`.
    AwaitingApproval { prompt: String },
    /// The current step is with the execution adapter.
    Executing,
    /// The current step's output is with the analyzer.
    Analyzing,
    /// Finished. No further steps run.
    Terminated(Termination),
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AwaitingStep => "awaiting_step",
            Self::AwaitingApproval { .. } => "awaiting_approval",
            Self::Executing => "executing",
            Self::Analyzing => "analyzing",
            Self::Terminated(_) => "terminated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The analyzer declared the fault fixed.
    Resolved,
    /// Handed off to a human.
    Escalated,
    /// The plan ran out without an explicit verdict.
    Exhausted,
    /// A human refused an approval request.
    Rejected,
    /// The device could not be reached.
    Unreachable,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::Escalated => write!(f, "escalated"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Rejected => write!(f, "rejected"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Why an escalation happened. Lets operators tell an analyst's judgement
/// apart from automation faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCode {
    /// The analyzer returned `escalate`.
    AnalystVerdict,
    /// The plan reached an `escalation` step.
    EscalationStep,
    /// The step budget ran out.
    MaxStepsExceeded,
    /// A human rejected a step.
    RejectedByUser,
    /// The device transport failed.
    TransportFailure,
    /// A collaborator returned something that breaks its contract.
    ContractViolation,
    /// A step reached dispatch with `{{var}}` placeholders.
    UnresolvedTemplate,
    /// `new_action` arrived with adaptive mode off and nothing left to run.
    ReplanNotAllowed,
    /// The planner could not produce a plan.
    PlanningFailed,
    /// The analyzer could not be reached.
    AnalysisUnavailable,
}

impl std::fmt::Display for EscalationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AnalystVerdict => "analyst_verdict",
            Self::EscalationStep => "escalation_step",
            Self::MaxStepsExceeded => "max_steps_exceeded",
            Self::RejectedByUser => "rejected_by_user",
            Self::TransportFailure => "transport_failure",
            Self::ContractViolation => "contract_violation",
            Self::UnresolvedTemplate => "unresolved_template",
            Self::ReplanNotAllowed => "replan_not_allowed",
            Self::PlanningFailed => "planning_failed",
            Self::AnalysisUnavailable => "analysis_unavailable",
        };
        f.write_str(s)
    }
}

/// How and why a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub reason: TerminationReason,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<EscalationCode>,

    pub detail: String,
}

impl Termination {
    pub fn new(
        reason: TerminationReason,
        code: Option<EscalationCode>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            reason,
            code,
            detail: detail.into(),
        }
    }

    /// The verdict the session ended on.
    pub fn verdict(&self) -> NextActionType {
        match self.reason {
            TerminationReason::Resolved | TerminationReason::Exhausted => NextActionType::Resolve,
            _ => NextActionType::Escalate,
        }
    }

    /// Status used when the result summary has to be built locally.
    pub fn resolution_status(&self) -> ResolutionStatus {
        match self.reason {
            TerminationReason::Resolved | TerminationReason::Exhausted => {
                ResolutionStatus::Resolved
            }
            TerminationReason::Unreachable => ResolutionStatus::Unresolved,
            TerminationReason::Escalated | TerminationReason::Rejected => {
                ResolutionStatus::Escalated
            }
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({}): {}", self.reason, code, self.detail),
            None => write!(f, "{}: {}", self.reason, self.detail),
        }
    }
}

/// Everything known about one troubleshooting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Raw alert text as received.
    pub alert: String,
    pub fault_summary: FaultSummary,

    pub target: DeviceTarget,
    pub device_facts: DeviceFacts,

    pub settings: WorkflowSettings,

    pub plan: ActionPlan,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<ExecutionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_analysis: Option<ActionAnalysisReport>,

    pub phase: Phase,

    /// Code attached to the report on the in-flight step, consumed when the
    /// router ingests it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_code: Option<EscalationCode>,

    /// Steps actually handed to the execution adapter.
    #[serde(default)]
    pub executions: usize,

    /// Set once the device transport has been released for this session.
    #[serde(default)]
    pub transport_released: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultSummary>,
}

impl WorkflowState {
    pub fn new(
        session_id: impl Into<String>,
        alert: impl Into<String>,
        fault_summary: FaultSummary,
        target: DeviceTarget,
        device_facts: DeviceFacts,
        settings: WorkflowSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            created_at: now,
            updated_at: now,
            alert: alert.into(),
            fault_summary,
            target,
            device_facts,
            settings,
            plan: ActionPlan::default(),
            last_execution: None,
            last_analysis: None,
            phase: Phase::AwaitingStep,
            pending_code: None,
            executions: 0,
            transport_released: false,
            result: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn termination(&self) -> Option<&Termination> {
        match &self.phase {
            Phase::Terminated(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated(_))
    }

    pub fn is_awaiting_approval(&self) -> bool {
        matches!(self.phase, Phase::AwaitingApproval { .. })
    }

    /// The prompt of a suspended session.
    pub fn pending_prompt(&self) -> Option<&str> {
        match &self.phase {
            Phase::AwaitingApproval { prompt } => Some(prompt),
            _ => None,
        }
    }

    /// 1-indexed number of the step most recently dequeued.
    pub fn step_number(&self) -> usize {
        self.plan.dequeued()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netmend_core::TroubleshootingStep;

    fn state() -> WorkflowState {
        WorkflowState::new(
            "s1",
            "{\"alert\":\"BGP down\"}",
            FaultSummary::default(),
            DeviceTarget::new("core-rtr-01", "cisco_ios"),
            DeviceFacts::from_device_type("core-rtr-01", "cisco_ios"),
            WorkflowSettings::default(),
        )
    }

    #[test]
    fn suspended_state_round_trips() {
        let mut s = state();
        s.plan = ActionPlan::new(vec![TroubleshootingStep::diagnostic(
            "Check peer",
            ["show ip bgp summary"],
        )]);
        s.plan.dequeue().unwrap();
        s.phase = Phase::AwaitingApproval {
            prompt: "Approve?".into(),
        };

        let json = serde_json::to_string(&s).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert!(back.is_awaiting_approval());
    }

    #[test]
    fn terminated_phase_serializes_with_tag() {
        let mut s = state();
        s.phase = Phase::Terminated(Termination::new(
            TerminationReason::Escalated,
            Some(EscalationCode::MaxStepsExceeded),
            "max steps exceeded",
        ));
        let v = serde_json::to_value(&s.phase).unwrap();
        assert_eq!(v["state"], "terminated");
        assert_eq!(v["code"], "max_steps_exceeded");

        let back: Phase = serde_json::from_value(v).unwrap();
        assert_eq!(back, s.phase);
    }

    #[test]
    fn termination_maps_to_verdict_and_status() {
        let t = Termination::new(TerminationReason::Exhausted, None, "plan complete");
        assert_eq!(t.verdict(), NextActionType::Resolve);
        let t = Termination::new(
            TerminationReason::Rejected,
            Some(EscalationCode::RejectedByUser),
            "rejected by user",
        );
        assert_eq!(t.verdict(), NextActionType::Escalate);
        assert_eq!(t.resolution_status(), ResolutionStatus::Escalated);
        assert_eq!(t.to_string(), "rejected (rejected_by_user): rejected by user");
    }
}
