use crate::utils::{truncate_chars, MAX_BODY_LENGTH};
use crate::{NotificationChannel, OutboundMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use vega_common::types::ChannelId;

/// Telegram caps a message at 4096 characters.
const TELEGRAM_MAX_TEXT: usize = 4096;

pub struct TelegramChannel {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(client: reqwest::Client, api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn channel_id(&self) -> ChannelId {
        ChannelId::Telegram
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<()> {
        let text = if message.subject.is_empty() {
            message.text.clone()
        } else {
            format!("{}\n\n{}", message.subject, message.text)
        };
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": truncate_chars(&text, TELEGRAM_MAX_TEXT),
            "disable_web_page_preview": true,
        });

        let resp = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .context("Telegram request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let reply: Option<Value> = serde_json::from_str(&body).ok();
        let ok = reply
            .as_ref()
            .and_then(|v| v.get("ok"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !status.is_success() || !ok {
            let description = reply
                .as_ref()
                .and_then(|v| v.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| truncate_chars(&body, MAX_BODY_LENGTH));
            anyhow::bail!("Telegram rejected message (HTTP {status}): {description}");
        }
        Ok(())
    }
}
