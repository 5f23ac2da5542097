//! Per-file transfer report by email

use anyhow::Context;
use ascend_common::{AscendError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::central_log::TIMESTAMP_FORMAT;
use crate::config::MailConfig;

/// A rendered report ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn submit(&self, mail: &OutgoingMail) -> anyhow::Result<()>;
}

/// SMTP submission with STARTTLS, authenticated as the sender
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .with_context(|| format!("Invalid SMTP host: {}", config.smtp_host))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.from.clone(),
                config.smtp_secret.clone(),
            ))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn submit(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(mail.from.parse::<Mailbox>().context("Invalid from address")?)
            .to(mail.to.parse::<Mailbox>().context("Invalid to address")?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())
            .context("Failed to build message")?;

        self.transport
            .send(message)
            .await
            .context("SMTP submission failed")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn MailTransport>,
    from: String,
    to: String,
    subject: String,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn MailTransport>, config: &MailConfig) -> Self {
        Self {
            transport,
            from: config.from.clone(),
            to: config.to.clone(),
            subject: config.subject.clone(),
        }
    }

    /// True when the report was handed to the transport
    pub async fn notify(&self, reference_number: u32, title: &str) -> bool {
        self.send(reference_number, title).await.is_ok()
    }

    #[instrument(skip(self))]
    pub async fn send(&self, reference_number: u32, title: &str) -> Result<()> {
        let mail = OutgoingMail {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: self.subject.clone(),
            html_body: render_body(reference_number, title, Local::now()),
        };

        self.transport
            .submit(&mail)
            .await
            .map_err(|e| AscendError::Notification(format!("{:#}", e)))?;
        debug!("Notification sent for reference {}", reference_number);
        Ok(())
    }
}

pub fn render_body(reference_number: u32, title: &str, at: DateTime<Local>) -> String {
    format!(
        "<html><body>\
         <h4>Hi</h4>\
         <h4>Please find below the details related to file processing and transfer.</h4>\
         <p><b>Reference Counter: </b>{}</p>\
         <p><b>Title: </b>{}</p>\
         <p><b>Date and Time: </b>{}</p>\
         <p><i>--------------------------System Generated Email--------------------------</i></p>\
         </body></html>",
        reference_number,
        title,
        at.format(TIMESTAMP_FORMAT)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutgoingMail>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn submit(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("relay refused");
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    fn mail_config() -> MailConfig {
        MailConfig {
            from: "ops@example.com".to_string(),
            to: "team@example.com".to_string(),
            subject: "Transfer report".to_string(),
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_body_embeds_reference_title_and_time() {
        let at = Local.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        let body = render_body(7, "Inventory", at);

        assert!(body.starts_with("<html><body><h4>Hi</h4>"));
        assert!(body.contains("<p><b>Reference Counter: </b>7</p>"));
        assert!(body.contains("<p><b>Title: </b>Inventory</p>"));
        assert!(body.contains("<p><b>Date and Time: </b>2026-10-19 09:30:00</p>"));
    }

    #[tokio::test]
    async fn test_notify_uses_configured_envelope() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = NotificationDispatcher::new(transport.clone(), &mail_config());

        assert!(dispatcher.notify(3, "Title not found").await);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "ops@example.com");
        assert_eq!(sent[0].to, "team@example.com");
        assert_eq!(sent[0].subject, "Transfer report");
        assert!(sent[0].html_body.contains("Title not found"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_false_not_error() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let dispatcher = NotificationDispatcher::new(transport, &mail_config());

        assert!(!dispatcher.notify(1, "x").await);
        assert!(matches!(
            dispatcher.send(1, "x").await,
            Err(AscendError::Notification(_))
        ));
    }

    #[tokio::test]
    async fn test_smtp_mailer_accepts_hostname() {
        assert!(SmtpMailer::new(&mail_config()).is_ok());
    }
}
