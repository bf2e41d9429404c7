//! Pulling a JSON document out of model output.

use netmend_core::TroubleshootingStep;
use netmend_runtime::AgentError;
use serde_json::Value;

/// Parse the first JSON object or array in `text`.
///
/// Models are told to answer with bare JSON but regularly wrap it in a code
/// fence or a sentence. Everything before the first `{`/`[` and after the
/// matching last `}`/`]` is ignored.
pub fn extract_json(text: &str) -> Result<Value, AgentError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let start = trimmed
        .find(['{', '['])
        .ok_or_else(|| AgentError::Parse(format!("no JSON in response: {}", preview(trimmed))))?;
    let close = if trimmed[start..].starts_with('{') { '}' } else { ']' };
    let end = trimmed
        .rfind(close)
        .filter(|&end| end > start)
        .ok_or_else(|| AgentError::Parse(format!("unterminated JSON in response: {}", preview(trimmed))))?;

    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| AgentError::Parse(format!("invalid JSON in response: {e}")))
}

/// Deserialize a list of steps proposed by a model. Any analysis report the
/// model made up is dropped.
pub fn steps_from_value(value: Value, field: &str) -> Result<Vec<TroubleshootingStep>, AgentError> {
    let mut steps: Vec<TroubleshootingStep> = serde_json::from_value(value)
        .map_err(|e| AgentError::ContractViolation(format!("{field} is not a valid step list: {e}")))?;
    for step in &mut steps {
        step.analysis_report = None;
    }
    Ok(steps)
}

fn preview(text: &str) -> String {
    let p: String = text.chars().take(80).collect();
    if p.len() < text.len() { format!("{p}...") } else { p }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_json() {
        assert_eq!(extract_json(r#" {"a": 1} "#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn fenced_json() {
        let text = "```json\n{\"next_action_type\": \"continue\"}\n```";
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"next_action_type": "continue"})
        );
    }

    #[test]
    fn array_with_prose() {
        let text = "Here is the plan:\n[{\"description\": \"x\"}]\nGood luck.";
        assert_eq!(extract_json(text).unwrap(), json!([{"description": "x"}]));
    }

    #[test]
    fn malformed_steps_violate_the_contract() {
        let err = steps_from_value(json!([{"description": "x"}]), "action_plan").unwrap_err();
        assert!(matches!(err, AgentError::ContractViolation(m) if m.starts_with("action_plan")));
    }

    #[test]
    fn no_json_is_a_parse_error() {
        assert!(matches!(
            extract_json("I cannot help with that."),
            Err(AgentError::Parse(_))
        ));
    }
}
