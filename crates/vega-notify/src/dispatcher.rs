use crate::channels::{
    EmailChannel, MailTransport, SlackBotChannel, SlackWebhookChannel, TelegramChannel,
};
use crate::error::Result;
use crate::{NotificationChannel, OutboundMessage};
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use vega_common::types::{ChannelId, NotificationConfig};

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Endpoints and per-attempt timeout shared by every tenant.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub telegram_api_base: String,
    pub slack_api_base: String,
    pub timeout_secs: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            telegram_api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            slack_api_base: DEFAULT_SLACK_API_BASE.to_string(),
            timeout_secs: 10,
        }
    }
}

/// Fans one message out to the requested channels a tenant has configured.
///
/// Channel availability is derived from the [`NotificationConfig`] passed to
/// every call; nothing is cached between sends.
pub struct NotificationDispatcher {
    client: reqwest::Client,
    settings: DispatcherSettings,
    mailer: Option<Arc<dyn MailTransport>>,
}

impl NotificationDispatcher {
    pub fn new(settings: DispatcherSettings, mailer: Option<Arc<dyn MailTransport>>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            settings,
            mailer,
        })
    }

    /// Channels for which `config` (and, for email, the process) holds every
    /// required credential.
    pub fn configured_channels(&self, config: &NotificationConfig) -> BTreeSet<ChannelId> {
        ChannelId::ALL
            .into_iter()
            .filter(|&channel| self.is_configured(config, channel))
            .collect()
    }

    fn is_configured(&self, config: &NotificationConfig, channel: ChannelId) -> bool {
        match channel {
            ChannelId::Email => self.mailer.is_some() && config.has_credentials_for(channel),
            _ => config.has_credentials_for(channel),
        }
    }

    fn handler(
        &self,
        config: &NotificationConfig,
        channel: ChannelId,
    ) -> Option<Box<dyn NotificationChannel>> {
        match channel {
            ChannelId::Telegram => {
                let (token, chat_id) = config.telegram()?;
                Some(Box::new(TelegramChannel::new(
                    self.client.clone(),
                    &self.settings.telegram_api_base,
                    token,
                    chat_id,
                )))
            }
            ChannelId::SlackWebhook => {
                let url = config.slack_webhook()?;
                Some(Box::new(SlackWebhookChannel::new(self.client.clone(), url)))
            }
            ChannelId::SlackBot => {
                let (token, channel_id) = config.slack_bot()?;
                Some(Box::new(SlackBotChannel::new(
                    self.client.clone(),
                    &self.settings.slack_api_base,
                    token,
                    channel_id,
                )))
            }
            ChannelId::Email => {
                let mailer = self.mailer.clone()?;
                let recipients = config.email_recipients();
                if recipients.is_empty() {
                    return None;
                }
                Some(Box::new(EmailChannel::new(mailer, recipients)))
            }
        }
    }

    /// Attempts every channel that is both in `channels` and configured.
    ///
    /// The returned map holds one entry per attempted channel; skipped
    /// channels are absent. This never fails: transport errors, timeouts and
    /// panics inside a handler become `false` for that channel only.
    pub async fn send(
        &self,
        config: &NotificationConfig,
        message: &OutboundMessage,
        channels: &BTreeSet<ChannelId>,
    ) -> BTreeMap<ChannelId, bool> {
        let handlers: Vec<Box<dyn NotificationChannel>> = channels
            .iter()
            .filter_map(|&channel| self.handler(config, channel))
            .collect();

        if handlers.is_empty() {
            tracing::debug!(
                requested = channels.len(),
                "No configured channel among requested channels, skipping"
            );
            return BTreeMap::new();
        }

        fan_out(
            &handlers,
            message,
            Duration::from_secs(self.settings.timeout_secs),
        )
        .await
    }
}

/// Runs every handler concurrently and collects one boolean per handler.
pub async fn fan_out(
    handlers: &[Box<dyn NotificationChannel>],
    message: &OutboundMessage,
    timeout: Duration,
) -> BTreeMap<ChannelId, bool> {
    let attempts = handlers.iter().map(|handler| async move {
        let channel = handler.channel_id();
        let outcome = AssertUnwindSafe(tokio::time::timeout(timeout, handler.attempt(message)))
            .catch_unwind()
            .await;

        let delivered = match outcome {
            Ok(Ok(Ok(()))) => {
                tracing::info!(channel = %channel, "Notification delivered");
                true
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(channel = %channel, error = %format!("{e:#}"), "Notification failed");
                false
            }
            Ok(Err(_)) => {
                tracing::warn!(
                    channel = %channel,
                    timeout_secs = timeout.as_secs(),
                    "Notification timed out"
                );
                false
            }
            Err(_) => {
                tracing::error!(channel = %channel, "Notification handler panicked");
                false
            }
        };
        (channel, delivered)
    });

    join_all(attempts).await.into_iter().collect()
}
