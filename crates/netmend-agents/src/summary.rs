//! Closing report.

use crate::client::ChatModel;
use crate::json::extract_json;
use crate::prompts;
use async_trait::async_trait;
use netmend_core::ResultSummary;
use netmend_runtime::{AgentError, ResultSummarizer, SummaryRequest};
use serde_json::Value;
use std::sync::Arc;

pub struct LlmResultSummarizer {
    model: Arc<dyn ChatModel>,
}

impl LlmResultSummarizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ResultSummarizer for LlmResultSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<ResultSummary, AgentError> {
        let user = serde_json::to_string_pretty(request)
            .map_err(|e| AgentError::Request(format!("failed to encode summary request: {e}")))?;
        let reply = self.model.complete(prompts::RESULT_SUMMARY, &user).await?;

        let mut value = extract_json(&reply)?;
        if let Some(status) = value.get_mut("resolution_status") {
            if let Some(canonical) = status.as_str().and_then(normalize_status) {
                *status = Value::String(canonical.into());
            }
        }
        if let Value::Object(fields) = &mut value {
            fields.retain(|_, v| !v.is_null());
        }

        serde_json::from_value(value)
            .map_err(|e| AgentError::ContractViolation(format!("invalid result summary: {e}")))
    }
}

fn normalize_status(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
        "resolved" => Some("Resolved"),
        "partially resolved" => Some("Partially Resolved"),
        "unresolved" => Some("Unresolved"),
        "escalated" => Some("Escalated"),
        _ => None,
    }
}
