//! Email service for OTP codes and the daily complaint summary.
//!
//! Supports two providers:
//! - `console`: Logs emails (development)
//! - `brevo`: Sends through the Brevo transactional email API

use crate::config::EmailConfig;
use domain::models::complaint::ComplaintStats;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an email message. A disabled service drops the message.
    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(
                to = ?message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => {
                self.send_console(&message);
                Ok(())
            }
            "brevo" => self.send_brevo(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Sends a password reset code.
    pub async fn send_otp_email(
        &self,
        to_email: &str,
        code: &str,
        valid_minutes: i64,
    ) -> Result<(), EmailError> {
        let body_text = format!(
            "Your password reset code is {code}.\n\n\
             It expires in {valid_minutes} minutes. If you did not request a reset, \
             you can ignore this email.\n\n{sender}",
            sender = self.config.sender_name,
        );
        let body_html = format!(
            "<p>Your password reset code is</p>\
             <p style=\"font-size:24px;font-weight:bold;letter-spacing:4px\">{code}</p>\
             <p>It expires in {valid_minutes} minutes. If you did not request a reset, \
             you can ignore this email.</p>"
        );

        self.send(EmailMessage {
            to: vec![to_email.to_string()],
            subject: format!("{} password reset code", self.config.sender_name),
            body_text,
            body_html: Some(body_html),
        })
        .await
    }

    /// Sends the daily complaint summary to the configured recipients.
    /// Returns false when there is nobody to send to.
    pub async fn send_daily_report(
        &self,
        day: chrono::NaiveDate,
        stats: &ComplaintStats,
    ) -> Result<bool, EmailError> {
        if self.config.report_recipients.is_empty() {
            return Ok(false);
        }

        self.send(EmailMessage {
            to: self.config.report_recipients.clone(),
            subject: format!("Complaint summary for {}", day),
            body_text: report_text(day, stats),
            body_html: None,
        })
        .await?;
        Ok(true)
    }

    fn send_console(&self, message: &EmailMessage) {
        info!(
            to = ?message.to,
            subject = %message.subject,
            body = %message.body_text,
            "Email (console provider)"
        );
    }

    async fn send_brevo(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let recipients: Vec<_> = message.to.iter().map(|to| json!({ "email": to })).collect();
        let mut body = json!({
            "sender": {
                "name": self.config.sender_name,
                "email": self.config.sender_email,
            },
            "to": recipients,
            "subject": message.subject,
            "textContent": message.body_text,
        });
        if let Some(html) = &message.body_html {
            body["htmlContent"] = json!(html);
        }

        let response = self
            .client
            .post(BREVO_SEND_URL)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("Brevo request failed: {}", e)))?;

        if response.status().is_success() {
            info!(
                to = ?message.to,
                subject = %message.subject,
                "Email sent via Brevo"
            );
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "Brevo API error");
            Err(EmailError::ProviderError(format!(
                "Brevo returned {}: {}",
                status, error_body
            )))
        }
    }
}

fn report_text(day: chrono::NaiveDate, stats: &ComplaintStats) -> String {
    format!(
        "Complaint summary for {day}\n\n\
         Total:        {}\n\
         New:          {}\n\
         In progress:  {}\n\
         Resolved:     {}\n\
         Closed:       {}\n\
         Resolved today: {}\n",
        stats.total,
        stats.new,
        stats.in_progress,
        stats.resolved,
        stats.closed,
        stats.resolved_today,
    )
}
