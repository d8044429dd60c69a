pub mod email;
pub mod slack_bot;
pub mod slack_webhook;
pub mod telegram;

pub use email::{EmailChannel, MailTransport, SmtpMailer, SmtpSettings};
pub use slack_bot::SlackBotChannel;
pub use slack_webhook::SlackWebhookChannel;
pub use telegram::TelegramChannel;
