use anyhow::Result;
use serde_json::Value;

use crate::actions::Action;
use crate::engine::types::{ActionOutput, Parameters};

pub struct ValidateAction;

impl Action for ValidateAction {
    fn name(&self) -> &str {
        "validate"
    }

    fn description(&self) -> &str {
        "Check 'data' for 'required' fields and against an optional JSON Schema"
    }

    fn run(&self, params: &Parameters) -> Result<ActionOutput> {
        let data = params
            .get("data")
            .ok_or_else(|| anyhow::anyhow!("validate requires 'data'"))?;

        let mut errors: Vec<String> = Vec::new();

        if let Some(required) = params.get("required") {
            let fields = required
                .as_array()
                .ok_or_else(|| anyhow::anyhow!("validate: 'required' must be an array"))?;
            for field in fields.iter().filter_map(Value::as_str) {
                match data.get(field) {
                    None | Some(Value::Null) => errors.push(format!("missing field '{}'", field)),
                    Some(_) => {}
                }
            }
        }

        if let Some(schema) = params.get("schema") {
            let validator = jsonschema::validator_for(schema)
                .map_err(|e| anyhow::anyhow!("Invalid JSON schema: {}", e))?;
            errors.extend(
                validator
                    .iter_errors(data)
                    .map(|e| format!("{} at {}", e, e.instance_path())),
            );
        }

        if !errors.is_empty() {
            anyhow::bail!("Validation failed: {}", errors.join("; "));
        }

        let mut output = ActionOutput::new();
        output.insert("valid".to_string(), Value::Bool(true));
        output.insert("errors".to_string(), Value::Array(Vec::new()));
        Ok(output)
    }
}
