//! Superadmin payment review queue.

use axum::{
  extract::{Path, Query, State},
  Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::SuperAdmin;
use crate::db::{self, billing::{self, PaymentReviewRow}};
use crate::domain::{Payment, PaymentStatus, Subscription};
use crate::error::{ApiError, ApiResult};
use crate::services::billing as billing_service;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PaymentQuery {
  pub status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RejectRequest {
  pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct ApprovalResult {
  pub payment: Payment,
  pub subscription: Subscription,
}

/// GET /api/admin/payments?status=
pub async fn list_payments(
  State(state): State<AppState>,
  SuperAdmin(_admin): SuperAdmin,
  Query(query): Query<PaymentQuery>,
) -> ApiResult<Json<Vec<PaymentReviewRow>>> {
  let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
    Some(s) => Some(
      PaymentStatus::from_str(s)
        .ok_or_else(|| ApiError::bad_request("status must be pending, approved or rejected"))?,
    ),
    None => None,
  };
  let conn = db::try_lock(&state.db)?;
  Ok(Json(billing::list_payments_for_review(&conn, status)?))
}

/// POST /api/admin/payments/{id}/approve
pub async fn approve_payment(
  State(state): State<AppState>,
  SuperAdmin(admin): SuperAdmin,
  Path(id): Path<i64>,
) -> ApiResult<Json<ApprovalResult>> {
  let conn = db::try_lock(&state.db)?;
  let (payment, subscription) = billing_service::approve_payment(
    &conn,
    id,
    admin.user_id(),
    state.config.billing.subscription_days,
  )?;
  Ok(Json(ApprovalResult { payment, subscription }))
}

/// POST /api/admin/payments/{id}/reject
pub async fn reject_payment(
  State(state): State<AppState>,
  SuperAdmin(admin): SuperAdmin,
  Path(id): Path<i64>,
  body: Option<Json<RejectRequest>>,
) -> ApiResult<Json<Payment>> {
  let req = body.map(|Json(b)| b).unwrap_or_default();
  let conn = db::try_lock(&state.db)?;
  let payment = billing_service::reject_payment(&conn, id, admin.user_id(), req.reason.as_deref())?;
  Ok(Json(payment))
}
