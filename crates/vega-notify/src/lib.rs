//! Multi-channel message delivery.
//!
//! [`dispatcher::NotificationDispatcher`] fans a single [`OutboundMessage`]
//! out to every requested channel the tenant has configured and reports a
//! per-channel boolean. Built-in channels: Telegram bot API, Slack incoming
//! webhook, Slack bot token (`chat.postMessage`) and SMTP email.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod render;
pub mod utils;


use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use vega_common::types::ChannelId;

pub use dispatcher::{DispatcherSettings, NotificationDispatcher};

/// Slack rejects messages with more blocks than this.
pub const MAX_SLACK_BLOCKS: usize = 50;

/// Channel-agnostic message. Each channel picks the representation it
/// supports: chat channels use `text` (and `blocks` where available),
/// email prefers `html`.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
    pub blocks: Vec<Value>,
}

impl OutboundMessage {
    pub fn new(subject: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_html(mut self, html: String) -> Self {
        self.html = Some(html);
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<Value>) -> Self {
        self.blocks = blocks;
        self
    }
}

/// One delivery mechanism. `attempt` performs a single send; the dispatcher
/// turns any error into `false` for this channel only.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// # Errors
    ///
    /// Returns an error when the transport fails or the remote service does
    /// not acknowledge the message.
    async fn attempt(&self, message: &OutboundMessage) -> Result<()>;
}
