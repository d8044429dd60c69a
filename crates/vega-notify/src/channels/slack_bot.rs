use crate::{NotificationChannel, OutboundMessage, MAX_SLACK_BLOCKS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use vega_common::types::ChannelId;

/// Slack Web API `chat.postMessage` authenticated with a bot token.
pub struct SlackBotChannel {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    channel: String,
}

impl SlackBotChannel {
    pub fn new(client: reqwest::Client, api_base: &str, bot_token: &str, channel: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            channel: channel.to_string(),
        }
    }

    /// Request body for `message`. Blocks past [`MAX_SLACK_BLOCKS`] are dropped.
    pub fn payload(&self, message: &OutboundMessage) -> Value {
        let text = if message.subject.is_empty() {
            message.text.clone()
        } else {
            format!("{}\n{}", message.subject, message.text)
        };
        let mut payload = serde_json::json!({
            "channel": self.channel,
            "text": text,
        });
        if !message.blocks.is_empty() {
            let blocks: Vec<Value> = message
                .blocks
                .iter()
                .take(MAX_SLACK_BLOCKS)
                .cloned()
                .collect();
            payload["blocks"] = Value::Array(blocks);
        }
        payload
    }
}

#[async_trait]
impl NotificationChannel for SlackBotChannel {
    fn channel_id(&self) -> ChannelId {
        ChannelId::SlackBot
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&self.payload(message))
            .send()
            .await
            .context("Slack chat.postMessage request failed")?;

        let status = resp.status();
        let reply: Value = resp
            .json()
            .await
            .with_context(|| format!("Slack returned a non-JSON reply (HTTP {status})"))?;

        if reply.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = reply
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            anyhow::bail!("Slack chat.postMessage failed (HTTP {status}): {error}");
        }
        Ok(())
    }
}
