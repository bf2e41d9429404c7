//! Alert to [`FaultSummary`].

use crate::client::ChatModel;
use crate::json::extract_json;
use crate::prompts;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netmend_core::FaultSummary;
use netmend_runtime::{AgentError, FaultSummarizer};
use serde_json::Value;
use std::sync::Arc;

pub struct LlmFaultSummarizer {
    model: Arc<dyn ChatModel>,
}

impl LlmFaultSummarizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl FaultSummarizer for LlmFaultSummarizer {
    async fn summarize(&self, alert: &str) -> Result<FaultSummary, AgentError> {
        let reply = self.model.complete(prompts::FAULT_SUMMARY, alert).await?;
        let mut value = extract_json(&reply)?;
        let Value::Object(fields) = &mut value else {
            return Err(AgentError::ContractViolation(
                "fault summary is not a JSON object".into(),
            ));
        };

        // Models are loose with casing and timestamp formats. Drop what
        // cannot be read and let the field defaults take over.
        if let Some(Value::String(s)) = fields.get("severity") {
            match normalize_severity(s) {
                Some(canonical) => {
                    fields.insert("severity".into(), Value::String(canonical.into()));
                }
                None => {
                    fields.remove("severity");
                }
            }
        }
        let timestamp_ok = match fields.get("timestamp") {
            Some(Value::String(s)) => s.parse::<DateTime<Utc>>().is_ok(),
            Some(_) => false,
            None => true,
        };
        if !timestamp_ok {
            fields.remove("timestamp");
        }
        if fields.get("metadata").is_some_and(|m| !m.is_object()) {
            fields.remove("metadata");
        }
        fields.retain(|_, v| !v.is_null());

        let summary: FaultSummary = serde_json::from_value(value)
            .map_err(|e| AgentError::ContractViolation(format!("invalid fault summary: {e}")))?;
        tracing::debug!(hostname = %summary.hostname, title = %summary.title, "Summarized alert");
        Ok(summary)
    }
}

fn normalize_severity(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "critical" => Some("Critical"),
        "high" | "major" => Some("High"),
        "medium" | "minor" | "warning" => Some("Medium"),
        "low" | "info" | "informational" => Some("Low"),
        _ => None,
    }
}
