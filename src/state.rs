//! Application state shared by all handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::mail::{HttpMailer, Mailer, OutboxMailer};
use crate::messaging::{DryRunSender, MessageSender, TwilioSender};
use crate::paths;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<AppConfig>,
    /// WhatsApp delivery (Twilio or dry-run)
    pub sender: Arc<dyn MessageSender>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        db: DbPool,
        config: AppConfig,
        sender: Arc<dyn MessageSender>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            sender,
            mailer,
        }
    }

    /// Pick real providers when credentials are configured, otherwise the
    /// local fallbacks.
    pub fn from_config(db: DbPool, config: AppConfig) -> Self {
        let sender: Arc<dyn MessageSender> = match &config.twilio {
            Some(twilio) => Arc::new(TwilioSender::new(twilio.clone())),
            None => {
                tracing::warn!("Twilio is not configured; WhatsApp messages will only be logged");
                Arc::new(DryRunSender::default())
            }
        };
        let mailer: Arc<dyn Mailer> = match HttpMailer::from_config(&config.mail) {
            Some(mailer) => Arc::new(mailer),
            None => {
                let dir = paths::outbox_dir(&config.data_dir);
                tracing::warn!("Mail API key not set; emails go to {}", dir.display());
                Arc::new(OutboxMailer::new(dir))
            }
        };
        Self::new(db, config, sender, mailer)
    }
}
