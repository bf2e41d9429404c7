//! Human approval responses.
//!
//! A suspended session is resumed with one line of free text. The text is
//! matched case-insensitively, after trimming, against fixed accept and
//! reject sets. Anything else leaves the session suspended and re-prompts.

use netmend_core::TroubleshootingStep;

const ACCEPT: [&str; 5] = ["yes", "y", "true", "approve", "1"];
const REJECT: [&str; 5] = ["no", "n", "false", "reject", "0"];

/// Interpretation of a human response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
    /// Not in either set. The gate asks again.
    Unrecognized,
}

impl ApprovalDecision {
    pub fn parse(response: &str) -> Self {
        let normalized = response.trim().to_lowercase();
        if ACCEPT.contains(&normalized.as_str()) {
            Self::Approve
        } else if REJECT.contains(&normalized.as_str()) {
            Self::Reject
        } else {
            Self::Unrecognized
        }
    }
}

/// Text shown to the human for a step waiting at the gate.
pub fn approval_prompt(step_number: usize, step: &TroubleshootingStep) -> String {
    let mut prompt = format!(
        "Step {} requires approval: {}\nType: {}\n",
        step_number, step.description, step.action_type
    );
    if !step.commands.is_empty() {
        prompt.push_str("Commands:\n");
        for cmd in &step.commands {
            prompt.push_str("  ");
            prompt.push_str(cmd);
            prompt.push('\n');
        }
    }
    if !step.output_expectation.is_empty() {
        prompt.push_str(&format!("Expected: {}\n", step.output_expectation));
    }
    prompt.push_str("Approve? (yes/no)");
    prompt
}
