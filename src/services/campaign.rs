//! WhatsApp campaign sending.
//!
//! A send is split in two phases so the database lock is never held while
//! waiting on the provider:
//! 1. under the lock: resolve the promotion, enforce the monthly limit,
//!    pick opted-in recipients and record the campaign
//! 2. without the lock, on a spawned task: send sequentially, re-locking
//!    briefly to log each outcome, then settle the campaign counts

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, billing, campaigns, contacts, promotions, DbPool, LogOnError};
use crate::domain::{CampaignStatus, MessageStatus, Plan, Promotion};
use crate::error::{ApiError, ApiResult};
use crate::messaging::OutboundMessage;
use crate::state::AppState;
use crate::validation::Validator;

/// Longest custom message accepted (Twilio caps bodies at 1600 chars)
pub const MAX_MESSAGE_LEN: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    pub promotion_id: Option<i64>,
    pub message: Option<String>,
    /// Explicit recipients; all contacts when omitted
    pub contact_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub struct SendSummary {
    pub campaign_id: i64,
    pub status: CampaignStatus,
    pub sent: i64,
    pub failed: i64,
    pub skipped_no_opt_in: i64,
    /// Campaigns left this month after this one
    pub remaining: i64,
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub plan: Plan,
    pub used_this_month: i64,
    pub limit: i64,
    pub remaining: i64,
    pub period_start: String,
}

/// Campaign usage for the calendar month containing `now`
pub fn usage(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> rusqlite::Result<Usage> {
    let plan = billing::effective_plan(conn, user_id)?;
    let period_start = db::to_db_time(db::month_start(now));
    let used = campaigns::count_campaigns_since(conn, user_id, &period_start)?;
    Ok(Usage {
        limit: plan.monthly_campaign_limit,
        remaining: (plan.monthly_campaign_limit - used).max(0),
        used_this_month: used,
        plan,
        period_start,
    })
}

/// Message text: promotion details first, then the custom message
pub fn compose_body(promotion: Option<&Promotion>, message: Option<&str>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(p) = promotion {
        parts.push(format!("*{}*", p.title));
        if !p.description.trim().is_empty() {
            parts.push(p.description.trim().to_string());
        }
        if let Some(discount) = p.discount.as_deref().filter(|d| !d.trim().is_empty()) {
            parts.push(format!("Offer: {}", discount.trim()));
        }
        if let Some(validity) = p.validity() {
            parts.push(validity);
        }
    }
    if let Some(message) = message.map(str::trim).filter(|m| !m.is_empty()) {
        parts.push(message.to_string());
    }
    parts.join("\n\n")
}

/// Absolute media URL for a promotion image. Local upload paths are joined
/// onto the public base URL; external URLs pass through.
pub fn media_url(public_base_url: &str, image_url: Option<&str>) -> Option<String> {
    let image = image_url?.trim();
    if image.is_empty() {
        return None;
    }
    if image.starts_with('/') {
        Some(format!("{}{}", public_base_url.trim_end_matches('/'), image))
    } else {
        Some(image.to_string())
    }
}

struct Recipient {
    contact_id: i64,
    mobile_number: String,
}

struct PreparedCampaign {
    campaign_id: i64,
    body: String,
    media_url: Option<String>,
    recipients: Vec<Recipient>,
    skipped: i64,
    remaining: i64,
}

fn prepare(
    conn: &Connection,
    user_id: i64,
    req: &SendRequest,
    public_base_url: &str,
) -> ApiResult<PreparedCampaign> {
    let message = req.message.as_deref().map(str::trim).filter(|m| !m.is_empty());
    if message.is_none() && req.promotion_id.is_none() {
        return Err(ApiError::bad_request("a message or a promotion is required"));
    }
    if let Some(message) = message {
        let mut v = Validator::new();
        v.length(message, "message", 1, MAX_MESSAGE_LEN);
        v.finish()?;
    }

    let promotion = match req.promotion_id {
        Some(id) => Some(
            promotions::get_promotion(conn, user_id, id)?.ok_or(ApiError::NotFound("promotion"))?,
        ),
        None => None,
    };

    let usage = usage(conn, user_id, Utc::now())?;
    if usage.used_this_month >= usage.limit {
        tracing::info!(
            user_id,
            plan = %usage.plan.id,
            used = usage.used_this_month,
            "Campaign blocked by monthly limit"
        );
        return Err(ApiError::CampaignLimit {
            plan: usage.plan.name,
            limit: usage.limit,
        });
    }

    let candidates = contacts::get_candidates(conn, user_id, req.contact_ids.as_deref())?;
    let total = candidates.len() as i64;
    let recipients: Vec<Recipient> = candidates
        .into_iter()
        .filter(|c| c.opted_in)
        .map(|c| Recipient {
            contact_id: c.id,
            mobile_number: c.mobile_number,
        })
        .collect();
    let skipped = total - recipients.len() as i64;
    if recipients.is_empty() {
        return Err(ApiError::bad_request(if total == 0 {
            "no contacts to send to"
        } else {
            "none of the selected contacts have opted in"
        }));
    }

    let body = compose_body(promotion.as_ref(), message);
    let media_url = media_url(
        public_base_url,
        promotion.as_ref().and_then(|p| p.image_url.as_deref()),
    );
    let campaign_id = campaigns::create_campaign(
        conn,
        &campaigns::NewCampaign {
            user_id,
            promotion_id: promotion.as_ref().map(|p| p.id),
            body: &body,
            media_url: media_url.as_deref(),
            recipient_count: recipients.len() as i64,
            skipped_count: skipped,
        },
    )?;

    Ok(PreparedCampaign {
        campaign_id,
        body,
        media_url,
        recipients,
        skipped,
        remaining: (usage.remaining - 1).max(0),
    })
}

/// Outcome of the delivery phase
struct Delivery {
    sent: i64,
    failed: i64,
    status: CampaignStatus,
}

/// Write the final counts. The campaign must not stay `sending` once every
/// recipient has been attempted, so this also goes through a poisoned lock.
fn settle(pool: &DbPool, campaign_id: i64, sent: i64, failed: i64) -> CampaignStatus {
    let conn = db::lock_recovering(pool);
    match campaigns::finish_campaign(&conn, campaign_id, sent, failed) {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(campaign_id, "Failed to settle campaign: {}", e);
            CampaignStatus::settled(sent)
        }
    }
}

/// Send to every recipient, log each outcome and settle the campaign
async fn deliver(state: AppState, prepared: PreparedCampaign) -> Delivery {
    let mut sent = 0;
    let mut failed = 0;
    for recipient in &prepared.recipients {
        let outbound = OutboundMessage {
            to: recipient.mobile_number.clone(),
            body: prepared.body.clone(),
            media_url: prepared.media_url.clone(),
        };
        let (status, sid, error) = match state.sender.send(&outbound).await {
            Ok(sid) => {
                sent += 1;
                (MessageStatus::Sent, Some(sid), None)
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(
                    campaign_id = prepared.campaign_id,
                    to = %recipient.mobile_number,
                    "WhatsApp send failed: {}",
                    e
                );
                (MessageStatus::Failed, None, Some(e.to_string()))
            }
        };

        let conn = db::lock_recovering(&state.db);
        campaigns::log_message(
            &conn,
            prepared.campaign_id,
            Some(recipient.contact_id),
            &recipient.mobile_number,
            status,
            sid.as_deref(),
            error.as_deref(),
        )
        .log_warn("Failed to record message log");
    }

    let status = settle(&state.db, prepared.campaign_id, sent, failed);
    Delivery { sent, failed, status }
}

/// Run a campaign end to end.
///
/// Delivery runs on its own task: once the campaign row exists it is sent
/// and settled even if the caller stops waiting.
pub async fn send_campaign(state: &AppState, user_id: i64, req: SendRequest) -> ApiResult<SendSummary> {
    let prepared = {
        let conn = db::try_lock(&state.db)?;
        prepare(&conn, user_id, &req, &state.config.server.public_base_url)?
    };
    let campaign_id = prepared.campaign_id;
    let skipped = prepared.skipped;
    let remaining = prepared.remaining;
    tracing::info!(
        user_id,
        campaign_id,
        recipients = prepared.recipients.len(),
        skipped,
        sender = state.sender.name(),
        "Campaign started"
    );

    let delivery = tokio::spawn(deliver(state.clone(), prepared))
        .await
        .map_err(|e| ApiError::Internal(format!("campaign {} delivery task failed: {}", campaign_id, e)))?;
    tracing::info!(
        user_id,
        campaign_id,
        sent = delivery.sent,
        failed = delivery.failed,
        status = delivery.status.as_str(),
        "Campaign finished"
    );

    Ok(SendSummary {
        campaign_id,
        status: delivery.status,
        sent: delivery.sent,
        failed: delivery.failed,
        skipped_no_opt_in: skipped,
        remaining,
    })
}
