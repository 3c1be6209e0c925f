//! Outbound WhatsApp delivery.
//!
//! Campaign code talks to a [`MessageSender`]; production uses the Twilio
//! Messages API, development falls back to [`DryRunSender`] which only logs.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::config::TwilioConfig;
use crate::phone;

/// One WhatsApp message to a single recipient
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Recipient in E.164 form
    pub to: String,
    pub body: String,
    /// Absolute image URL attached to the message
    pub media_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver one message, returning the provider's message id
    async fn send(&self, message: &OutboundMessage) -> Result<String, SendError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

// ==================== Twilio ====================

pub struct TwilioSender {
    client: reqwest::Client,
    config: TwilioConfig,
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    message: Option<String>,
    code: Option<i64>,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Self {
        tracing::info!(from = %config.whatsapp_from, "Twilio WhatsApp sender initialized");
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    fn form_params(&self, message: &OutboundMessage) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("From", phone::whatsapp_address(&self.config.whatsapp_from)),
            ("To", phone::whatsapp_address(&message.to)),
            ("Body", message.body.clone()),
        ];
        if let Some(media) = &message.media_url {
            params.push(("MediaUrl", media.clone()));
        }
        params
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    async fn send(&self, message: &OutboundMessage) -> Result<String, SendError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&self.form_params(message))
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<TwilioErrorResponse> = response.json().await.ok();
            let message = match body {
                Some(TwilioErrorResponse {
                    message: Some(m),
                    code: Some(code),
                }) => format!("{} (code {})", m, code),
                Some(TwilioErrorResponse { message: Some(m), .. }) => m,
                _ => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(SendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TwilioMessageResponse = response
            .json()
            .await
            .map_err(|e| SendError::Transport(format!("invalid response body: {}", e)))?;
        Ok(parsed.sid)
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}

// ==================== Dry run ====================

/// Logs messages instead of sending them. Used when Twilio is not configured.
#[derive(Default)]
pub struct DryRunSender {
    counter: AtomicU64,
}

#[async_trait]
impl MessageSender for DryRunSender {
    async fn send(&self, message: &OutboundMessage) -> Result<String, SendError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            to = %message.to,
            media = message.media_url.as_deref().unwrap_or("-"),
            "[dry-run] WhatsApp message: {}",
            message.body.lines().next().unwrap_or("")
        );
        Ok(format!("DRYRUN{:08}", n))
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            whatsapp_from: "+14155238886".into(),
            api_base: "https://api.twilio.com/".into(),
        }
    }

    #[test]
    fn test_messages_url() {
        let sender = TwilioSender::new(config());
        assert_eq!(
            sender.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_form_params_use_whatsapp_addresses() {
        let sender = TwilioSender::new(config());
        let params = sender.form_params(&OutboundMessage {
            to: "+919876543210".into(),
            body: "Hello".into(),
            media_url: Some("https://shop.example/uploads/1/a.png".into()),
        });
        assert_eq!(params[0], ("From", "whatsapp:+14155238886".to_string()));
        assert_eq!(params[1], ("To", "whatsapp:+919876543210".to_string()));
        assert_eq!(params[3].0, "MediaUrl");
    }

    #[test]
    fn test_form_params_without_media() {
        let sender = TwilioSender::new(config());
        let params = sender.form_params(&OutboundMessage {
            to: "+919876543210".into(),
            body: "Hello".into(),
            media_url: None,
        });
        assert_eq!(params.len(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_ids_are_unique() {
        let sender = DryRunSender::default();
        let msg = OutboundMessage {
            to: "+919876543210".into(),
            body: "Hi".into(),
            media_url: None,
        };
        let a = sender.send(&msg).await.unwrap();
        let b = sender.send(&msg).await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("DRYRUN"));
    }
}
