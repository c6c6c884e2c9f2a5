//! Email delivery of the advisor report.
//!
//! The message is `multipart/mixed`: a `multipart/related` HTML body that
//! shows the chart inline through a `cid:` reference, followed by the same
//! chart as a regular attachment.

use std::path::Path;
use std::time::Duration;

use board_common::config::EmailConfig;
use board_common::{Error, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};

/// Content-ID the HTML body uses for the inline chart.
pub const CHART_CID: &str = "chart_img";

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A chart to embed and attach.
#[derive(Debug, Clone)]
pub struct ChartImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

impl ChartImage {
    /// Read a chart from disk; the content type follows the extension.
    pub fn load(path: &Path, filename: impl Into<String>) -> Result<Self> {
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some("svg") => "image/svg+xml",
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            _ => "application/octet-stream",
        };
        Ok(Self {
            bytes: std::fs::read(path)?,
            content_type: content_type.to_string(),
            filename: filename.into(),
        })
    }
}

fn email_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Email(format!("{context}: {e}"))
}

/// SMTP client for the advice email.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Sender, at least one receiver and an auth code are all present.
    pub fn is_configured(&self) -> bool {
        !self.config.sender.is_empty()
            && !self.config.receiver_list().is_empty()
            && self.config.auth_code.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Assemble the message without sending it.
    pub fn build_message(&self, subject: &str, html: String, chart: Option<&ChartImage>) -> Result<Message> {
        let from: Mailbox = self
            .config
            .sender
            .parse()
            .map_err(|e| email_err("invalid sender address", e))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for receiver in self.config.receiver_list() {
            let to: Mailbox = receiver
                .parse()
                .map_err(|e| email_err(&format!("invalid receiver address {receiver}"), e))?;
            builder = builder.to(to);
        }

        let body = SinglePart::html(html);
        let message = match chart {
            Some(chart) => {
                let content_type = ContentType::parse(&chart.content_type)
                    .map_err(|e| email_err("invalid chart content type", e))?;
                let related = MultiPart::related().singlepart(body).singlepart(
                    Attachment::new_inline(CHART_CID.to_string())
                        .body(chart.bytes.clone(), content_type.clone()),
                );
                let mixed = MultiPart::mixed().multipart(related).singlepart(
                    Attachment::new(chart.filename.clone()).body(chart.bytes.clone(), content_type),
                );
                builder.multipart(mixed)
            }
            None => builder.singlepart(body),
        };
        message.map_err(|e| email_err("failed to build email", e))
    }

    /// Deliver over implicit TLS. The blocking SMTP exchange runs off the runtime.
    pub async fn send(&self, message: Message) -> Result<()> {
        let auth_code = self
            .config
            .auth_code
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Email("auth_code is not configured".into()))?;
        let credentials = Credentials::new(self.config.sender.clone(), auth_code);
        let host = self.config.smtp_host.clone();
        let port = self.config.smtp_port;

        let transport = SmtpTransport::relay(&host)
            .map_err(|e| email_err("invalid SMTP relay", e))?
            .port(port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let outcome = tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| email_err("email task panicked", e))?;

        match outcome {
            Ok(_) => {
                info!(
                    host = %self.config.smtp_host,
                    receivers = %self.config.receivers,
                    "Email sent"
                );
                Ok(())
            }
            Err(e) => {
                if e.is_permanent() {
                    warn!(error = %e, "SMTP rejected the message; check the auth code and receiver addresses");
                }
                Err(email_err("SMTP delivery failed", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            sender: "sender@example.com".into(),
            receivers: "a@example.com, b@example.com".into(),
            auth_code: Some("code".into()),
            ..EmailConfig::default()
        }
    }

    fn chart() -> ChartImage {
        ChartImage {
            bytes: b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>".to_vec(),
            content_type: "image/svg+xml".into(),
            filename: "chart.svg".into(),
        }
    }

    #[test]
    fn test_is_configured() {
        assert!(EmailNotifier::new(config()).is_configured());
        let mut c = config();
        c.auth_code = Some(String::new());
        assert!(!EmailNotifier::new(c).is_configured());
        assert!(!EmailNotifier::new(EmailConfig::default()).is_configured());
    }

    #[test]
    fn test_message_with_inline_chart() {
        let notifier = EmailNotifier::new(config());
        let message = notifier
            .build_message("红利ETF策略建议_20240603", "<img src=\"cid:chart_img\">".into(), Some(&chart()))
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/related"));
        assert!(raw.contains("Content-ID: <chart_img>"));
        assert!(raw.contains("b@example.com"));
    }

    #[test]
    fn test_invalid_receiver() {
        let mut c = config();
        c.receivers = "not-an-address".into();
        let err = EmailNotifier::new(c)
            .build_message("s", "<p>x</p>".into(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Email(_)));
    }

    #[test]
    fn test_chart_content_type_from_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.svg");
        std::fs::write(&path, "<svg/>").unwrap();
        let chart = ChartImage::load(&path, "c.svg").unwrap();
        assert_eq!(chart.content_type, "image/svg+xml");
    }
}
