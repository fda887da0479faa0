//! Absent-party email notifications
//!
//! Sends transactional emails via the Resend API when a reply lands while
//! the other party is not watching the conversation. Always invoked from
//! detached side-effect tasks; failures are logged by the caller and never
//! reach the sender of the triggering message.

use async_trait::async_trait;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::Config;

/// Context handed to every notification operation
#[derive(Debug, Clone)]
pub struct Notice {
    pub ticket_number: String,
    pub subject: String,
    /// Recipient email address
    pub recipient: String,
    pub sender_name: String,
    /// Content of the triggering message
    pub content: String,
    /// Deep link into the dashboard
    pub link: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email delivery failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("email API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Dispatcher for the three absent-party notifications
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// An agent replied to a conversation for the first time
    async fn first_response(&self, notice: &Notice) -> Result<(), NotifyError>;

    /// An agent replied while no customer connection was watching
    async fn agent_replied_customer_absent(&self, notice: &Notice) -> Result<(), NotifyError>;

    /// A customer replied while the assigned agent was not watching
    async fn customer_replied_agent_absent(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Email notification configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Resend API key
    pub resend_api_key: String,
    /// From address for emails
    pub email_from: String,
    /// App name for branding
    pub app_name: String,
}

impl EmailConfig {
    /// Check if email sending is enabled
    pub fn is_enabled(&self) -> bool {
        !self.resend_api_key.is_empty()
    }
}

/// Resend-backed notification dispatcher
#[derive(Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
    client: reqwest::Client,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(EmailConfig {
            resend_api_key: config.resend_api_key.clone(),
            email_from: config.email_from.clone(),
            app_name: config.app_name.clone(),
        })
    }

    /// Send an email via the Resend API, retrying transient failures with
    /// exponential backoff
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        if !self.config.is_enabled() {
            tracing::warn!("Email not configured, skipping: {}", subject);
            return Ok(());
        }

        let strategy = ExponentialBackoff::from_millis(250).map(jitter).take(3);
        Retry::spawn(strategy, || self.post(to, subject, html)).await?;

        tracing::info!(to = %to, subject = %subject, "Notification email sent");
        Ok(())
    }

    async fn post(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "from": self.config.email_from,
            "to": [to],
            "subject": subject,
            "html": html
        });

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .header(
                "Authorization",
                format!("Bearer {}", self.config.resend_api_key),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status, body = %body, "Failed to send notification email");
            return Err(NotifyError::Api { status, body });
        }

        Ok(())
    }

    fn reply_html(&self, notice: &Notice, headline: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #6366f1;">{headline}</h2>
    <p><strong>{sender_name}</strong> wrote on ticket #{ticket_number} ({subject}):</p>
    <div style="background-color: #f9fafb; border-left: 4px solid #6366f1; padding: 16px; margin: 20px 0;">
        <p style="margin: 0;">{content}</p>
    </div>
    <p>
        <a href="{link}" style="display: inline-block; padding: 12px 24px; background-color: #6366f1; color: white; text-decoration: none; border-radius: 6px; font-weight: bold;">
            View Conversation
        </a>
    </p>
    <hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;">
    <p style="color: #999; font-size: 12px;">{app_name}</p>
</body>
</html>"#,
            headline = headline,
            sender_name = notice.sender_name,
            ticket_number = notice.ticket_number,
            subject = notice.subject,
            content = notice.content,
            link = notice.link,
            app_name = self.config.app_name,
        )
    }
}

#[async_trait]
impl NotificationDispatcher for EmailNotifier {
    async fn first_response(&self, notice: &Notice) -> Result<(), NotifyError> {
        let subject = format!(
            "An agent has responded to your ticket #{}",
            notice.ticket_number
        );
        let html = self.reply_html(notice, "You have a response");
        self.send_email(&notice.recipient, &subject, &html).await
    }

    async fn agent_replied_customer_absent(&self, notice: &Notice) -> Result<(), NotifyError> {
        let subject = format!("New reply on your ticket #{}", notice.ticket_number);
        let html = self.reply_html(notice, "New reply while you were away");
        self.send_email(&notice.recipient, &subject, &html).await
    }

    async fn customer_replied_agent_absent(&self, notice: &Notice) -> Result<(), NotifyError> {
        let subject = format!(
            "Customer replied on ticket #{}",
            notice.ticket_number
        );
        let html = self.reply_html(notice, "A customer is waiting");
        self.send_email(&notice.recipient, &subject, &html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_notifier_skips_without_error() {
        let notifier = EmailNotifier::new(EmailConfig {
            resend_api_key: String::new(),
            email_from: "Deskhub <noreply@localhost>".to_string(),
            app_name: "Deskhub".to_string(),
        });

        let notice = Notice {
            ticket_number: "TKT-1001".to_string(),
            subject: "Login issue".to_string(),
            recipient: "dana@example.com".to_string(),
            sender_name: "Sam Agent".to_string(),
            content: "Have you tried resetting your password?".to_string(),
            link: "http://localhost:3000/tickets/abc".to_string(),
        };

        assert!(notifier.first_response(&notice).await.is_ok());
    }

    #[test]
    fn test_reply_html_includes_context() {
        let notifier = EmailNotifier::new(EmailConfig {
            resend_api_key: String::new(),
            email_from: "Deskhub <noreply@localhost>".to_string(),
            app_name: "Deskhub".to_string(),
        });

        let notice = Notice {
            ticket_number: "TKT-1001".to_string(),
            subject: "Login issue".to_string(),
            recipient: "dana@example.com".to_string(),
            sender_name: "Sam Agent".to_string(),
            content: "Have you tried resetting your password?".to_string(),
            link: "http://localhost:3000/tickets/abc".to_string(),
        };

        let html = notifier.reply_html(&notice, "New reply");
        assert!(html.contains("TKT-1001"));
        assert!(html.contains("Sam Agent"));
        assert!(html.contains("http://localhost:3000/tickets/abc"));
    }
}
