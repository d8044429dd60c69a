//! Helpers shared by the channel handlers.

use vega_common::types::NotificationConfig;

/// Longest response body quoted in an error message.
pub const MAX_BODY_LENGTH: usize = 500;

/// Cuts `s` to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn mask(value: &Option<String>) -> Option<String> {
    value.as_deref().map(|v| {
        let visible: String = v.chars().take(4).collect();
        if v.chars().count() <= 8 {
            "***".to_string()
        } else {
            format!("{visible}***")
        }
    })
}

/// Copy of `config` safe to return to clients or write to logs: tokens and
/// webhook URLs keep only a short prefix.
pub fn redact_config(config: &NotificationConfig) -> NotificationConfig {
    NotificationConfig {
        telegram_bot_token: mask(&config.telegram_bot_token),
        telegram_chat_id: config.telegram_chat_id.clone(),
        slack_webhook_url: mask(&config.slack_webhook_url),
        slack_bot_token: mask(&config.slack_bot_token),
        slack_channel_id: config.slack_channel_id.clone(),
        email_to: config.email_to.clone(),
    }
}

fn keep_secret(incoming: Option<String>, stored: &Option<String>) -> Option<String> {
    match incoming {
        None => stored.clone(),
        Some(v) if v.trim().is_empty() => None,
        Some(v) if stored.is_some() && mask(stored).as_deref() == Some(v.as_str()) => stored.clone(),
        Some(v) => Some(v),
    }
}

/// Undoes [`redact_config`] for a config a client read and sent back.
///
/// A secret that is absent, or still equal to the masked form of the stored
/// value, keeps the stored value. An empty string clears it. Non-secret
/// fields are taken from `incoming` as sent.
pub fn restore_secrets(incoming: NotificationConfig, stored: &NotificationConfig) -> NotificationConfig {
    NotificationConfig {
        telegram_bot_token: keep_secret(incoming.telegram_bot_token, &stored.telegram_bot_token),
        telegram_chat_id: incoming.telegram_chat_id,
        slack_webhook_url: keep_secret(incoming.slack_webhook_url, &stored.slack_webhook_url),
        slack_bot_token: keep_secret(incoming.slack_bot_token, &stored.slack_bot_token),
        slack_channel_id: incoming.slack_channel_id,
        email_to: incoming.email_to,
    }
}
