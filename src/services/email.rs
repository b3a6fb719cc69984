// src/services/email.rs
//! Outbound mail.
//!
//! The rest of the app only sees the [`Mailer`] trait. `main` picks an
//! implementation once at startup: SES when a sender address is configured,
//! otherwise [`LogMailer`], which writes the message to the log so local
//! development works without credentials.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::config::Region;
use aws_sdk_sesv2::Client as SesClient;
use thiserror::Error;
use tracing::{error, info};

use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SES operation failed: {0}")]
    SESError(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Sends mail through Amazon SES v2.
pub struct SesMailer {
    client: SesClient,
    from_address: String,
}

impl SesMailer {
    /// Credentials come from the default AWS provider chain.
    pub async fn new(region: Option<String>, from_email: &str) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let aws_config = loader.load().await;

        Self {
            client: SesClient::new(&aws_config),
            from_address: format!("Notes App <{}>", from_email),
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};

        let destination = Destination::builder()
            .to_addresses(message.to.clone())
            .build();

        let content = |data: &str| {
            Content::builder()
                .data(data)
                .charset("UTF-8")
                .build()
                .map_err(|e| MailError::InvalidMessage(e.to_string()))
        };

        let mut body = SesBody::builder().text(content(&message.text)?);
        if let Some(html) = &message.html {
            body = body.html(content(html)?);
        }

        let ses_message = Message::builder()
            .subject(content(&message.subject)?)
            .body(body.build())
            .build();

        let result = self
            .client
            .send_email()
            .from_email_address(&self.from_address)
            .destination(destination)
            .content(EmailContent::builder().simple(ses_message).build())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(&message.to), "Failed to send email via SES");
                MailError::SESError(format!("Send failed: {}", e))
            })?;

        info!(
            to = %safe_email_log(&message.to),
            message_id = ?result.message_id(),
            "Email sent successfully via SES"
        );
        Ok(())
    }
}

/// Fallback transport: logs the message instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.text,
            "[MAIL:FALLBACK] no mail transport configured"
        );
        Ok(())
    }
}

/// One-time code email, plain text plus HTML.
pub fn otp_email(to: &str, code: &str, ttl_minutes: i64) -> MailMessage {
    let text = format!(
        "Your OTP code is {}. It expires in {} minutes.",
        code, ttl_minutes
    );
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .code {{ font-size: 28px; letter-spacing: 6px; font-weight: bold; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <p>Your OTP code is <b class="code">{}</b>. It expires in {} minutes.</p>
        <div class="footer">
            <p>If you did not request this code you can ignore this email.</p>
        </div>
    </div>
</body>
</html>"#,
        code, ttl_minutes
    );

    MailMessage {
        to: to.to_string(),
        subject: "Your OTP Code".to_string(),
        text,
        html: Some(html),
    }
}

/// Test double that records every message.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CapturingMailer {
    sent: std::sync::Mutex<Vec<MailMessage>>,
}

#[cfg(test)]
impl CapturingMailer {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().expect("mailer poisoned").clone()
    }

    /// Pulls the six-digit code out of the most recent message to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .and_then(|m| {
                m.text
                    .split_whitespace()
                    .map(|w| w.trim_end_matches('.'))
                    .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
                    .map(str::to_string)
            })
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        self.sent.lock().expect("mailer poisoned").push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_email_contents() {
        let mail = otp_email("a@x.com", "123456", 10);
        assert_eq!(mail.to, "a@x.com");
        assert_eq!(mail.subject, "Your OTP Code");
        assert_eq!(mail.text, "Your OTP code is 123456. It expires in 10 minutes.");
        assert!(mail.html.as_deref().unwrap().contains("<b class=\"code\">123456</b>"));
    }

    #[tokio::test]
    async fn test_capturing_mailer_extracts_code() {
        let mailer = CapturingMailer::default();
        mailer.send(otp_email("a@x.com", "654321", 10)).await.unwrap();
        mailer.send(otp_email("b@x.com", "111111", 10)).await.unwrap();
        assert_eq!(mailer.last_code_for("a@x.com").as_deref(), Some("654321"));
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        assert!(LogMailer.send(otp_email("a@x.com", "123456", 10)).await.is_ok());
    }
}
