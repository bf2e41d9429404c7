//! `validate-plan`: check a plan file before feeding it to anything.

use anyhow::{bail, Context, Result};
use netmend_core::{validate_plan, TroubleshootingStep};
use serde_json::Value;
use std::fs;
use std::path::Path;

const STEP_SCHEMA: &str = include_str!("../../../../schemas/TroubleshootingStep.schema.json");

/// What was found in one plan document.
#[derive(Debug, Default)]
pub struct PlanReport {
    pub steps: usize,
    pub problems: Vec<String>,
    /// `(step number, variables)` for steps still carrying `{{var}}`s.
    pub templates: Vec<(usize, Vec<String>)>,
}

pub fn validate(path: &Path, max_steps: Option<usize>) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read plan {}", path.display()))?;
    // YAML is a superset of JSON, so one parser covers both.
    let document: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse plan {}", path.display()))?;

    let report = check_plan(&document, max_steps)?;
    for (number, vars) in &report.templates {
        println!("note: step {number} has unresolved variables: {}", vars.join(", "));
    }
    if !report.problems.is_empty() {
        for problem in &report.problems {
            println!("error: {problem}");
        }
        bail!("plan {} is invalid ({} problem(s))", path.display(), report.problems.len());
    }

    println!("Plan {} is valid ({} step(s)).", path.display(), report.steps);
    Ok(())
}

/// Accepts either a bare list of steps or `{"action_plan": [...]}`.
pub fn check_plan(document: &Value, max_steps: Option<usize>) -> Result<PlanReport> {
    let steps = match document {
        Value::Array(_) => document,
        Value::Object(obj) => obj
            .get("action_plan")
            .context("plan object has no `action_plan` key")?,
        _ => bail!("plan must be a list of steps or an object with `action_plan`"),
    };
    let Value::Array(items) = steps else {
        bail!("`action_plan` must be a list");
    };

    let schema: Value = serde_json::from_str(STEP_SCHEMA).context("step schema is not valid JSON")?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| anyhow::anyhow!("failed to compile step schema: {e}"))?;

    let mut report = PlanReport {
        steps: items.len(),
        ..Default::default()
    };

    for (index, item) in items.iter().enumerate() {
        for error in validator.iter_errors(item) {
            let location = error.instance_path().to_string();
            let location = if location.is_empty() { "(root)".to_string() } else { location };
            report
                .problems
                .push(format!("step {} {location}: {error}", index + 1));
        }
    }

    if report.problems.is_empty() {
        let parsed: Vec<TroubleshootingStep> =
            serde_json::from_value(steps.clone()).context("steps do not deserialize")?;
        if let Err(e) = validate_plan(&parsed) {
            report.problems.push(e.to_string());
        }
        for (index, step) in parsed.iter().enumerate() {
            let vars = step.unresolved_templates();
            if !vars.is_empty() {
                report.templates.push((index + 1, vars));
            }
        }
    }

    if let Some(max) = max_steps.filter(|&max| items.len() > max) {
        report
            .problems
            .push(format!("plan has {} steps, more than the budget of {max}", items.len()));
    }
    if items.is_empty() {
        report.problems.push("plan has no steps".to_string());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(description: &str, action_type: &str, commands: &[&str]) -> Value {
        json!({
            "description": description,
            "action_type": action_type,
            "commands": commands,
            "output_expectation": "",
            "requires_approval": action_type == "config"
        })
    }

    #[test]
    fn valid_plan_with_template_note() {
        let plan = json!({"action_plan": [
            step("Check BGP", "diagnostic", &["show ip bgp summary"]),
            step("Re-enable neighbor", "config", &["router bgp {{asn}}", "no neighbor 192.0.2.7 shutdown"]),
        ]});
        let report = check_plan(&plan, Some(5)).unwrap();
        assert_eq!(report.steps, 2);
        assert!(report.problems.is_empty(), "{:?}", report.problems);
        assert_eq!(report.templates, vec![(2, vec!["asn".to_string()])]);
    }

    #[test]
    fn schema_violations_are_located() {
        let plan = json!([
            step("Call carrier", "escalation", &["show clock"]),
            {"description": "x", "action_type": "reboot", "commands": ["reload"],
             "output_expectation": "", "requires_approval": true},
        ]);
        let report = check_plan(&plan, None).unwrap();
        assert!(report.problems.iter().any(|p| p.starts_with("step 1")));
        assert!(report.problems.iter().any(|p| p.starts_with("step 2")));
    }

    #[test]
    fn budget_and_empty_plans() {
        let plan = json!([
            step("a", "diagnostic", &["show a"]),
            step("b", "diagnostic", &["show b"]),
        ]);
        let report = check_plan(&plan, Some(1)).unwrap();
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].contains("budget of 1"));

        let report = check_plan(&json!([]), None).unwrap();
        assert_eq!(report.problems, vec!["plan has no steps"]);
    }

    #[test]
    fn yaml_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(
            &path,
            "- description: Check interfaces\n  action_type: diagnostic\n  commands: [show ip interface brief]\n  output_expectation: all up\n  requires_approval: false\n",
        )
        .unwrap();
        validate(&path, None).unwrap();

        std::fs::write(&path, "steps: []\n").unwrap();
        assert!(validate(&path, None).is_err());
    }
}
