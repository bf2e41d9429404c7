//! Per-step verdicts.

use crate::client::ChatModel;
use crate::json::{extract_json, steps_from_value};
use crate::prompts;
use async_trait::async_trait;
use netmend_core::{ActionAnalysisReport, NextActionType};
use netmend_runtime::{ActionAnalyzer, AgentError, AnalysisRequest};
use serde_json::Value;
use std::sync::Arc;

pub struct LlmAnalyzer {
    model: Arc<dyn ChatModel>,
}

impl LlmAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ActionAnalyzer for LlmAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ActionAnalysisReport, AgentError> {
        let system = prompts::with_guidance(
            prompts::ACTION_ANALYZER,
            &request.golden_rules,
            request.custom_instructions.as_deref(),
        );
        let user = serde_json::to_string_pretty(request)
            .map_err(|e| AgentError::Request(format!("failed to encode analysis request: {e}")))?;

        let reply = self.model.complete(&system, &user).await?;
        let report = parse_report(extract_json(&reply)?)?;
        tracing::debug!(
            step = request.current_step_index,
            verdict = %report.next_action_type,
            replacement = report.updated_action_plan_remaining.as_ref().map(Vec::len),
            "Analyzed step"
        );
        Ok(report)
    }
}

/// Read a report field by field so that a bad verdict is reported as such
/// instead of as a generic deserialize error.
fn parse_report(value: Value) -> Result<ActionAnalysisReport, AgentError> {
    let Value::Object(mut fields) = value else {
        return Err(AgentError::ContractViolation(
            "analysis is not a JSON object".into(),
        ));
    };

    let verdict = match fields.remove("next_action_type") {
        Some(Value::String(s)) => s
            .parse::<NextActionType>()
            .map_err(|e| AgentError::ContractViolation(e.to_string()))?,
        Some(other) => {
            return Err(AgentError::ContractViolation(format!(
                "next_action_type must be a string, got {other}"
            )));
        }
        None => {
            return Err(AgentError::ContractViolation(
                "next_action_type is missing".into(),
            ));
        }
    };

    let analysis = string_field(&mut fields, "analysis");
    let reason = string_field(&mut fields, "next_action_reason");
    let findings: Vec<String> = match fields.remove("findings") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut report = ActionAnalysisReport::new(analysis, verdict, reason).with_findings(findings);
    match fields.remove("updated_action_plan_remaining") {
        None | Some(Value::Null) => {}
        Some(steps) => {
            report = report.with_replacement(steps_from_value(steps, "updated_action_plan_remaining")?);
        }
    }
    Ok(report)
}

fn string_field(fields: &mut serde_json::Map<String, Value>, key: &str) -> String {
    match fields.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use netmend_core::{
        DeviceFacts, DeviceTarget, ExecutionResult, FaultSummary, TroubleshootingStep,
        WorkflowSettings,
    };
    use netmend_runtime::WorkflowState;
    use serde_json::json;

    fn request() -> AnalysisRequest {
        let settings = WorkflowSettings {
            custom_instructions: Some("Prefer BGP checks".into()),
            ..Default::default()
        };
        let state = WorkflowState::new(
            "s1",
            "alert",
            FaultSummary::default(),
            DeviceTarget::new("r1", "cisco_ios"),
            DeviceFacts::from_device_type("r1", "cisco_ios"),
            settings,
        );
        let step = TroubleshootingStep::diagnostic("Check BGP", ["show ip bgp summary"]);
        let mut exec = ExecutionResult::new("Check BGP");
        exec.push_output("show ip bgp summary", "192.0.2.7 Idle (Admin)");
        AnalysisRequest::from_state(&state, &step, &exec)
    }

    #[tokio::test]
    async fn parses_verdict_and_replacement() {
        let reply = json!({
            "analysis": "Neighbor administratively down",
            "findings": ["192.0.2.7 Idle (Admin)"],
            "next_action_type": "new_action",
            "next_action_reason": "Neighbor is shut down",
            "updated_action_plan_remaining": [{
                "description": "Re-enable neighbor",
                "action_type": "config",
                "commands": ["router bgp 65000", "no neighbor 192.0.2.7 shutdown"],
                "output_expectation": "",
                "requires_approval": true
            }]
        });
        let model = ScriptedModel::new([reply.to_string()]);
        let report = LlmAnalyzer::new(model.clone()).analyze(&request()).await.unwrap();

        assert_eq!(report.next_action_type, NextActionType::NewAction);
        assert_eq!(report.findings, vec!["192.0.2.7 Idle (Admin)"]);
        let replacement = report.updated_action_plan_remaining.unwrap();
        assert!(replacement[0].requires_approval);

        let (system, user) = &model.calls()[0];
        assert!(system.ends_with("Prefer BGP checks\n"));
        assert!(user.contains("Idle (Admin)"));
    }

    #[test]
    fn missing_verdict_is_a_contract_violation() {
        let err = parse_report(json!({"analysis": "x"})).unwrap_err();
        assert!(matches!(err, AgentError::ContractViolation(m) if m.contains("missing")));
    }

    #[test]
    fn unknown_verdict_is_a_contract_violation() {
        let err = parse_report(json!({"next_action_type": "retry"})).unwrap_err();
        assert!(matches!(err, AgentError::ContractViolation(m) if m.contains("retry")));
    }

    #[test]
    fn null_replacement_means_none() {
        let report = parse_report(json!({
            "next_action_type": "Continue",
            "updated_action_plan_remaining": null
        }))
        .unwrap();
        assert_eq!(report.next_action_type, NextActionType::Continue);
        assert!(report.updated_action_plan_remaining.is_none());
    }

    #[test]
    fn invalid_replacement_is_a_contract_violation() {
        let err = parse_report(json!({
            "next_action_type": "continue",
            "updated_action_plan_remaining": [{"commands": "show clock"}]
        }))
        .unwrap_err();
        assert!(matches!(err, AgentError::ContractViolation(_)));
    }
}
