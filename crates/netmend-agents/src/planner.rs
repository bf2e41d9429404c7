//! Initial plan generation.

use crate::client::ChatModel;
use crate::json::{extract_json, steps_from_value};
use crate::prompts;
use async_trait::async_trait;
use netmend_core::TroubleshootingStep;
use netmend_runtime::{ActionPlanner, AgentError, PlanningRequest};
use serde_json::Value;
use std::sync::Arc;

pub struct LlmPlanner {
    model: Arc<dyn ChatModel>,
}

impl LlmPlanner {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ActionPlanner for LlmPlanner {
    async fn plan(&self, request: &PlanningRequest) -> Result<Vec<TroubleshootingStep>, AgentError> {
        let system = prompts::with_guidance(
            prompts::ACTION_PLANNER,
            &request.golden_rules,
            request.custom_instructions.as_deref(),
        );
        let user = serde_json::to_string_pretty(request)
            .map_err(|e| AgentError::Request(format!("failed to encode planning request: {e}")))?;

        let reply = self.model.complete(&system, &user).await?;
        let steps = match extract_json(&reply)? {
            Value::Object(mut obj) => obj.remove("action_plan").ok_or_else(|| {
                AgentError::ContractViolation("reply has no action_plan".into())
            })?,
            array @ Value::Array(_) => array,
            _ => {
                return Err(AgentError::ContractViolation(
                    "plan is neither an object nor an array".into(),
                ));
            }
        };

        // Over-long plans are kept whole; the step budget escalates them.
        let steps = steps_from_value(steps, "action_plan")?;
        if steps.len() > request.max_steps {
            tracing::warn!(
                planned = steps.len(),
                max_steps = request.max_steps,
                "Plan is longer than the step budget"
            );
        }
        tracing::debug!(steps = steps.len(), "Planned");
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use netmend_core::{ActionType, DeviceFacts, FaultSummary, WorkflowSettings};

    const STEP: &str = r#"{"description": "Check BGP", "action_type": "diagnostic",
        "commands": ["show ip bgp summary"], "output_expectation": "Established",
        "requires_approval": false}"#;

    fn request(max_steps: usize) -> PlanningRequest {
        let settings = WorkflowSettings {
            max_steps,
            golden_rules: vec!["Never reload the device".into()],
            ..Default::default()
        };
        PlanningRequest::new(
            &FaultSummary::default(),
            &DeviceFacts::from_device_type("r1", "cisco_ios"),
            &settings,
        )
    }

    #[tokio::test]
    async fn accepts_wrapped_plan_and_sends_rules() {
        let model = ScriptedModel::new([format!(r#"{{"action_plan": [{STEP}]}}"#)]);
        let steps = LlmPlanner::new(model.clone()).plan(&request(5)).await.unwrap();

        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action_type, ActionType::Diagnostic);

        let (system, user) = &model.calls()[0];
        assert!(system.contains("1. Never reload the device"));
        assert!(user.contains("\"max_steps\": 5"));
    }

    #[tokio::test]
    async fn accepts_bare_array_and_keeps_every_step() {
        let model = ScriptedModel::new([format!("[{STEP}, {STEP}, {STEP}]")]);
        let steps = LlmPlanner::new(model).plan(&request(2)).await.unwrap();
        assert_eq!(steps.len(), 3);
    }

    #[tokio::test]
    async fn missing_plan_key_is_a_contract_violation() {
        let model = ScriptedModel::new([r#"{"steps": []}"#]);
        let err = LlmPlanner::new(model).plan(&request(5)).await.unwrap_err();
        assert!(matches!(err, AgentError::ContractViolation(_)));
    }
}
