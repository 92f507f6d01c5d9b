use anyhow::Result;

use crate::actions::Action;
use crate::actions::interpolate::render;
use crate::engine::types::{ActionOutput, Parameters};

pub struct LogAction;

impl Action for LogAction {
    fn name(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Record a message in the execution output"
    }

    fn run(&self, params: &Parameters) -> Result<ActionOutput> {
        let message = params
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let level = params
            .get("level")
            .and_then(|v| v.as_str())
            .unwrap_or("info");

        if !matches!(level, "debug" | "info" | "warn" | "error") {
            anyhow::bail!("log: unsupported level '{}'", level);
        }

        let rendered = render(message, params);
        tracing::debug!(level = %level, "{}", rendered);

        let mut output = ActionOutput::new();
        output.insert("logged".to_string(), serde_json::Value::Bool(true));
        output.insert("level".to_string(), serde_json::json!(level));
        output.insert("message".to_string(), serde_json::Value::String(rendered));
        Ok(output)
    }
}
