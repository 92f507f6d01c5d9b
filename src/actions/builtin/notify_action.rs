use anyhow::Result;

use crate::actions::Action;
use crate::actions::interpolate::render;
use crate::engine::types::{ActionOutput, Parameters};

const CHANNELS: &[&str] = &["email", "slack", "webhook", "sms"];

/// Builds a notification envelope. Delivery belongs to the caller.
pub struct NotifyAction;

impl Action for NotifyAction {
    fn name(&self) -> &str {
        "notify"
    }

    fn description(&self) -> &str {
        "Prepare a notification for a recipient on a channel"
    }

    fn run(&self, params: &Parameters) -> Result<ActionOutput> {
        let recipient = params
            .get("recipient")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("notify requires 'recipient'"))?;

        let message = params
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("notify requires 'message'"))?;

        let channel = params
            .get("channel")
            .and_then(|v| v.as_str())
            .unwrap_or("email");

        if !CHANNELS.contains(&channel) {
            anyhow::bail!(
                "notify: unknown channel '{}'. Use: {}",
                channel,
                CHANNELS.join(", ")
            );
        }

        let mut output = ActionOutput::new();
        output.insert("notified".to_string(), serde_json::Value::Bool(true));
        output.insert("channel".to_string(), serde_json::json!(channel));
        output.insert("recipient".to_string(), serde_json::json!(recipient));
        output.insert(
            "message".to_string(),
            serde_json::Value::String(render(message, params)),
        );
        Ok(output)
    }
}
