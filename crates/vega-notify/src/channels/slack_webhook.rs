use crate::utils::{truncate_chars, MAX_BODY_LENGTH};
use crate::{NotificationChannel, OutboundMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use vega_common::types::ChannelId;

/// Slack incoming webhook: one POST of a `{text}` payload.
pub struct SlackWebhookChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackWebhookChannel {
    pub fn new(client: reqwest::Client, webhook_url: &str) -> Self {
        Self {
            client,
            webhook_url: webhook_url.to_string(),
        }
    }
}

/// Webhooks answer with plain `ok`; a JSON body with `"ok": false` is a
/// rejection even under a 2xx status.
fn rejected_by_body(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("ok").and_then(Value::as_bool))
        == Some(false)
}

#[async_trait]
impl NotificationChannel for SlackWebhookChannel {
    fn channel_id(&self) -> ChannelId {
        ChannelId::SlackWebhook
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<()> {
        let text = if message.subject.is_empty() {
            message.text.clone()
        } else {
            format!("*{}*\n{}", message.subject, message.text)
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .context("Slack webhook request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() || rejected_by_body(&body) {
            anyhow::bail!(
                "Slack webhook returned HTTP {status}: {}",
                truncate_chars(&body, MAX_BODY_LENGTH)
            );
        }
        Ok(())
    }
}
