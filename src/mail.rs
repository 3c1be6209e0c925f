//! Transactional email (invoices).
//!
//! [`HttpMailer`] posts to a SendGrid-compatible `/v3/mail/send` endpoint.
//! Without an API key the [`OutboxMailer`] writes each message to
//! `{data_dir}/outbox/` so operators can forward it by hand.

use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider returned {0}")]
    Rejected(u16),

    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("could not write outbox file: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        tracing::info!(from = %from, "HTTP mailer initialized");
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }

    /// Build from config, None when no API key is configured
    pub fn from_config(config: &MailConfig) -> Option<Self> {
        let key = config.api_key.clone()?;
        let url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "https://api.sendgrid.com/v3/mail/send".to_string());
        Some(Self::new(url, key, config.from.clone()))
    }

    fn payload(&self, email: &Email) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.from },
            "subject": email.subject,
            "content": [{ "type": "text/html", "value": email.html }],
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }
        tracing::debug!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_name(email: &Email) -> String {
        let slug: String = email
            .subject
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("{}-{}.html", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"), slug)
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(email));
        let contents = format!(
            "<!-- To: {} -->\n<!-- Subject: {} -->\n{}",
            email.to, email.subject, email.html
        );
        tokio::fs::write(&path, contents).await?;
        tracing::info!(to = %email.to, path = %path.display(), "Email written to outbox");
        Ok(())
    }
}
