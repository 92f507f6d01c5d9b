use anyhow::Result;
use serde_json::Value;

use crate::actions::Action;
use crate::engine::types::{ActionOutput, Parameters};

pub struct AggregateAction;

impl Action for AggregateAction {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn description(&self) -> &str {
        "Reduce numeric 'values' with sum, avg, min, max or count"
    }

    fn run(&self, params: &Parameters) -> Result<ActionOutput> {
        let values = params
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("aggregate requires 'values' array"))?;

        let operation = params
            .get("operation")
            .and_then(|v| v.as_str())
            .unwrap_or("sum");

        let numbers = values
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| anyhow::anyhow!("aggregate: non-numeric value {}", v))
            })
            .collect::<Result<Vec<f64>>>()?;

        let result = match operation {
            "sum" => serde_json::json!(numbers.iter().sum::<f64>()),
            "count" => Value::from(numbers.len()),
            "avg" if numbers.is_empty() => Value::Null,
            "avg" => serde_json::json!(numbers.iter().sum::<f64>() / numbers.len() as f64),
            "min" => numbers
                .iter()
                .copied()
                .reduce(f64::min)
                .map_or(Value::Null, |n| serde_json::json!(n)),
            "max" => numbers
                .iter()
                .copied()
                .reduce(f64::max)
                .map_or(Value::Null, |n| serde_json::json!(n)),
            other => anyhow::bail!("aggregate: unknown operation '{}'", other),
        };

        let mut output = ActionOutput::new();
        output.insert("operation".to_string(), Value::String(operation.to_string()));
        output.insert("count".to_string(), Value::from(numbers.len()));
        output.insert("result".to_string(), result);
        Ok(output)
    }
}
