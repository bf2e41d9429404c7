//! LLM-backed analysis collaborators.
//!
//! Each collaborator sends one system prompt and one JSON user message to a
//! [`ChatModel`] and validates the JSON it gets back. Responses that parse
//! but break the stage's contract (a missing or unknown verdict, malformed
//! steps) come back as [`AgentError::ContractViolation`].
//!
//! ```ignore
//! let collaborators = netmend_agents::from_llm_config(&config.llm)?;
//! let orchestrator = Orchestrator::new(config, executor, collaborators, store);
//! ```

pub mod analyzer;
pub mod client;
pub mod fault;
pub mod json;
pub mod planner;
pub mod prompts;
pub mod summary;

#[cfg(test)]
mod testing;

pub use analyzer::LlmAnalyzer;
pub use client::{mask_api_key, ChatModel, OpenAiClient, OpenAiConfig};
pub use fault::LlmFaultSummarizer;
pub use json::extract_json;
pub use planner::LlmPlanner;
pub use summary::LlmResultSummarizer;

use netmend_core::LlmConfig;
use netmend_runtime::{AgentError, Collaborators};
use std::sync::Arc;

/// All four collaborators over one model.
pub fn collaborators(model: Arc<dyn ChatModel>) -> Collaborators {
    Collaborators {
        fault_summarizer: Arc::new(LlmFaultSummarizer::new(model.clone())),
        planner: Arc::new(LlmPlanner::new(model.clone())),
        analyzer: Arc::new(LlmAnalyzer::new(model.clone())),
        result_summarizer: Arc::new(LlmResultSummarizer::new(model)),
    }
}

/// Collaborators backed by the OpenAI-compatible endpoint in `config`.
pub fn from_llm_config(config: &LlmConfig) -> Result<Collaborators, AgentError> {
    let client = OpenAiClient::from_llm_config(config)?;
    tracing::info!(model = %config.model, base_url = %config.base_url, "Using LLM collaborators");
    Ok(collaborators(Arc::new(client)))
}
