//! Plans, the merchant's subscription and manual payments.

use axum::{
  extract::{Query, State},
  http::StatusCode,
  Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::db::{self, billing};
use crate::domain::{Payment, PaymentMethod, Plan, Subscription};
use crate::error::ApiResult;
use crate::services::billing::{self as billing_service, InvoiceResult, UpiDetails};
use crate::services::campaign::{self, Usage};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PlanQuery {
  pub plan_id: String,
}

#[derive(Deserialize)]
pub struct UpiRequest {
  pub plan_id: String,
  pub transaction_id: String,
}

#[derive(Deserialize)]
pub struct InvoiceRequest {
  pub plan_id: String,
}

#[derive(Serialize)]
pub struct CurrentSubscription {
  pub plan: Plan,
  pub subscription: Option<Subscription>,
  pub usage: Usage,
  pub contacts: i64,
  pub payment_method: PaymentMethod,
}

#[derive(Serialize)]
pub struct CancelResult {
  pub cancelled: bool,
  pub plan: Plan,
}

/// GET /api/subscriptions/plans (public)
pub async fn plans(State(state): State<AppState>) -> ApiResult<Json<Vec<Plan>>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(billing::list_plans(&conn)?))
}

/// GET /api/subscriptions/current
pub async fn current(
  State(state): State<AppState>,
  auth: AuthContext,
) -> ApiResult<Json<CurrentSubscription>> {
  let user_id = auth.user_id();
  let conn = db::try_lock(&state.db)?;
  let usage = campaign::usage(&conn, user_id, Utc::now())?;
  Ok(Json(CurrentSubscription {
    plan: usage.plan.clone(),
    subscription: billing::get_active_subscription(&conn, user_id)?,
    contacts: db::contacts::count_contacts(&conn, user_id)?,
    usage,
    payment_method: PaymentMethod::for_region(auth.user.region),
  }))
}

/// GET /api/subscriptions/upi-details?plan_id=
pub async fn upi_details(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(query): Query<PlanQuery>,
) -> ApiResult<Json<UpiDetails>> {
  let conn = db::try_lock(&state.db)?;
  let details = billing_service::upi_details(&conn, &state.config.billing, &auth.user, &query.plan_id)?;
  Ok(Json(details))
}

/// POST /api/subscriptions/upi
pub async fn submit_upi(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<UpiRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
  let conn = db::try_lock(&state.db)?;
  let payment = billing_service::submit_upi(&conn, &auth.user, &req.plan_id, &req.transaction_id)?;
  Ok((StatusCode::CREATED, Json(payment)))
}

/// POST /api/subscriptions/invoice
pub async fn request_invoice(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<InvoiceRequest>,
) -> ApiResult<(StatusCode, Json<InvoiceResult>)> {
  let result = billing_service::create_invoice(&state, &auth.user, &req.plan_id).await?;
  Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/subscriptions/payments
pub async fn payments(
  State(state): State<AppState>,
  auth: AuthContext,
) -> ApiResult<Json<Vec<Payment>>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(billing::list_user_payments(&conn, auth.user_id())?))
}

/// POST /api/subscriptions/cancel
pub async fn cancel(
  State(state): State<AppState>,
  auth: AuthContext,
) -> ApiResult<Json<CancelResult>> {
  let user_id = auth.user_id();
  let conn = db::try_lock(&state.db)?;
  let cancelled = billing::cancel_subscription(&conn, user_id)? > 0;
  if cancelled {
    tracing::info!(user_id, "Subscription cancelled");
  }
  Ok(Json(CancelResult {
    cancelled,
    plan: billing::effective_plan(&conn, user_id)?,
  }))
}
