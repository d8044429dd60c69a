use crate::error::NotifyError;
use crate::{NotificationChannel, OutboundMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;
use vega_common::types::ChannelId;

/// Anything able to deliver one HTML mail to a list of recipients.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_html(&self, to: &[String], subject: &str, html: &str) -> Result<()>;
}

/// Process-level SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// `false` talks plain SMTP, for local relays only.
    pub tls: bool,
    pub timeout_secs: u64,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        if settings.host.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("smtp host is empty".to_string()));
        }
        let from: Mailbox = settings.from.parse()?;

        let mut builder = if settings.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        builder = builder
            .port(settings.port)
            .timeout(Some(Duration::from_secs(settings.timeout_secs)));

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send_html(&self, to: &[String], subject: &str, html: &str) -> Result<()> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in to {
            let mailbox: Mailbox = recipient
                .parse()
                .with_context(|| format!("invalid recipient address: {recipient}"))?;
            builder = builder.to(mailbox);
        }
        let email = builder
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .context("failed to build email")?;

        self.transport
            .send(email)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Email handler for one tenant's recipient list.
pub struct EmailChannel {
    mailer: Arc<dyn MailTransport>,
    recipients: Vec<String>,
}

impl EmailChannel {
    pub fn new(mailer: Arc<dyn MailTransport>, recipients: Vec<String>) -> Self {
        Self { mailer, recipients }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn channel_id(&self) -> ChannelId {
        ChannelId::Email
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<()> {
        if self.recipients.is_empty() {
            anyhow::bail!("no email recipients");
        }
        let html = match &message.html {
            Some(html) => html.clone(),
            None => crate::render::markdown_to_html(&message.text),
        };
        self.mailer
            .send_html(&self.recipients, &message.subject, &html)
            .await
    }
}
