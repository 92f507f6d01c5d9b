use std::cmp::Ordering;

use anyhow::Result;
use serde_json::Value;

use crate::actions::Action;
use crate::engine::types::{ActionOutput, Parameters};

pub struct TransformAction;

impl Action for TransformAction {
    fn name(&self) -> &str {
        "transform"
    }

    fn description(&self) -> &str {
        "Apply a pure transformation (uppercase, lowercase, reverse, sort, length, keys, multiply) to 'data'"
    }

    fn run(&self, params: &Parameters) -> Result<ActionOutput> {
        let data = params
            .get("data")
            .ok_or_else(|| anyhow::anyhow!("transform requires 'data'"))?;

        let operation = params
            .get("operation")
            .and_then(|v| v.as_str())
            .unwrap_or("identity");

        let result = match operation {
            "identity" => data.clone(),
            "uppercase" => map_strings(data, |s| s.to_uppercase())?,
            "lowercase" => map_strings(data, |s| s.to_lowercase())?,
            "reverse" => reverse(data)?,
            "sort" => sort(data)?,
            "length" => length(data)?,
            "keys" => keys(data)?,
            "multiply" => {
                let factor = params
                    .get("factor")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| anyhow::anyhow!("multiply requires numeric 'factor'"))?;
                multiply(data, factor)?
            }
            other => anyhow::bail!("transform: unknown operation '{}'", other),
        };

        let mut output = ActionOutput::new();
        output.insert("operation".to_string(), Value::String(operation.to_string()));
        output.insert("result".to_string(), result);
        Ok(output)
    }
}

fn map_strings(data: &Value, f: impl Fn(&str) -> String) -> Result<Value> {
    match data {
        Value::String(s) => Ok(Value::String(f(s))),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(Value::String(f(s))),
                other => anyhow::bail!("expected string array element, got {}", other),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => anyhow::bail!("expected string or array of strings, got {}", other),
    }
}

fn reverse(data: &Value) -> Result<Value> {
    match data {
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        Value::Array(items) => Ok(Value::Array(items.iter().rev().cloned().collect())),
        other => anyhow::bail!("cannot reverse {}", other),
    }
}

fn sort(data: &Value) -> Result<Value> {
    let Value::Array(items) = data else {
        anyhow::bail!("sort expects an array");
    };

    let mut items = items.clone();
    if items.iter().all(Value::is_number) {
        items.sort_by(|a, b| {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        });
    } else if items.iter().all(Value::is_string) {
        items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
    } else {
        anyhow::bail!("sort expects an array of numbers or an array of strings");
    }
    Ok(Value::Array(items))
}

fn length(data: &Value) -> Result<Value> {
    let len = match data {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => anyhow::bail!("{} has no length", other),
    };
    Ok(Value::from(len))
}

fn keys(data: &Value) -> Result<Value> {
    let Value::Object(map) = data else {
        anyhow::bail!("keys expects an object");
    };
    Ok(Value::Array(map.keys().cloned().map(Value::String).collect()))
}

fn multiply(data: &Value, factor: f64) -> Result<Value> {
    let scale = |v: &Value| -> Result<Value> {
        let n = v
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("multiply expects numbers, got {}", v))?;
        Ok(serde_json::json!(n * factor))
    };
    match data {
        Value::Array(items) => items
            .iter()
            .map(scale)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        other => scale(other),
    }
}
