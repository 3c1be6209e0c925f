use axum::{
  extract::{Path, State},
  Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthContext;
use crate::db::{self, campaigns};
use crate::domain::{Campaign, MessageLog};
use crate::error::{ApiError, ApiResult};
use crate::services::campaign::{self, SendRequest, SendSummary, Usage};
use crate::state::AppState;

#[derive(Serialize)]
pub struct CampaignDetail {
  #[serde(flatten)]
  pub campaign: Campaign,
  pub messages: Vec<MessageLog>,
}

/// POST /api/whatsapp/send
pub async fn send(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<SendRequest>,
) -> ApiResult<Json<SendSummary>> {
  let summary = campaign::send_campaign(&state, auth.user_id(), req).await?;
  Ok(Json(summary))
}

/// GET /api/whatsapp/campaigns
pub async fn list_campaigns(
  State(state): State<AppState>,
  auth: AuthContext,
) -> ApiResult<Json<Vec<Campaign>>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(campaigns::list_campaigns(
    &conn,
    auth.user_id(),
    campaigns::CAMPAIGN_LIST_LIMIT,
  )?))
}

/// GET /api/whatsapp/campaigns/{id}
pub async fn get_campaign(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<CampaignDetail>> {
  let conn = db::try_lock(&state.db)?;
  let campaign = campaigns::get_campaign(&conn, auth.user_id(), id)?.ok_or(ApiError::NotFound("campaign"))?;
  let messages = campaigns::list_message_logs(&conn, campaign.id)?;
  Ok(Json(CampaignDetail { campaign, messages }))
}

/// GET /api/whatsapp/usage
pub async fn usage(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Usage>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(campaign::usage(&conn, auth.user_id(), Utc::now())?))
}
