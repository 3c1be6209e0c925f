//! Cross-tenant reporting for superadmins.

use axum::{
  extract::{Query, State},
  Json,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::auth::SuperAdmin;
use crate::db::{
  self,
  reports::{self, CampaignReportRow, MerchantUsage, MonthlyUsage, Overview},
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation;

pub const DEFAULT_USAGE_MONTHS: u32 = 6;
pub const MAX_USAGE_MONTHS: u32 = 24;

/// Default campaign report window when no range is given
const DEFAULT_REPORT_DAYS: i64 = 30;

#[derive(Deserialize)]
pub struct RangeQuery {
  pub from: Option<String>,
  pub to: Option<String>,
}

#[derive(Deserialize)]
pub struct UsageQuery {
  pub months: Option<u32>,
}

fn current_month_start() -> String {
  db::to_db_time(db::month_start(Utc::now()))
}

/// `YYYY-MM` labels for the last `count` months ending with the month of `now`, oldest first
pub fn month_labels(now: DateTime<Utc>, count: u32) -> Vec<String> {
  let mut year = now.year();
  let mut month = now.month();
  let mut labels = Vec::with_capacity(count as usize);
  for _ in 0..count {
    labels.push(format!("{:04}-{:02}", year, month));
    if month == 1 {
      month = 12;
      year -= 1;
    } else {
      month -= 1;
    }
  }
  labels.reverse();
  labels
}

/// Inclusive date range to `[from, to_exclusive)` timestamps
pub fn date_range(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> ApiResult<(String, String)> {
  let parse = |value: Option<&str>, field: &str| -> ApiResult<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
      Some(v) => validation::parse_date(v)
        .map(Some)
        .ok_or_else(|| ApiError::bad_request(format!("{} must be YYYY-MM-DD", field))),
      None => Ok(None),
    }
  };
  let to = parse(to, "to")?.unwrap_or(today);
  let from = parse(from, "from")?.unwrap_or(to - Duration::days(DEFAULT_REPORT_DAYS));
  if from > to {
    return Err(ApiError::bad_request("from must not be after to"));
  }
  let start = format!("{}T00:00:00Z", from.format("%Y-%m-%d"));
  let end = format!("{}T00:00:00Z", (to + Duration::days(1)).format("%Y-%m-%d"));
  Ok((start, end))
}

/// GET /api/reports/overview
pub async fn overview(State(state): State<AppState>, _admin: SuperAdmin) -> ApiResult<Json<Overview>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(reports::overview(&conn, &current_month_start())?))
}

/// GET /api/reports/merchants
pub async fn merchants(
  State(state): State<AppState>,
  _admin: SuperAdmin,
) -> ApiResult<Json<Vec<MerchantUsage>>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(reports::merchant_usage(&conn, &current_month_start())?))
}

/// GET /api/reports/campaigns?from=&to=
pub async fn campaigns(
  State(state): State<AppState>,
  _admin: SuperAdmin,
  Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<CampaignReportRow>>> {
  let (from, to_exclusive) = date_range(
    query.from.as_deref(),
    query.to.as_deref(),
    Utc::now().date_naive(),
  )?;
  let conn = db::try_lock(&state.db)?;
  Ok(Json(reports::campaigns_between(&conn, &from, &to_exclusive)?))
}

/// GET /api/reports/usage?months=
pub async fn usage(
  State(state): State<AppState>,
  _admin: SuperAdmin,
  Query(query): Query<UsageQuery>,
) -> ApiResult<Json<Vec<MonthlyUsage>>> {
  let months = query.months.unwrap_or(DEFAULT_USAGE_MONTHS).clamp(1, MAX_USAGE_MONTHS);
  let labels = month_labels(Utc::now(), months);
  let conn = db::try_lock(&state.db)?;
  Ok(Json(reports::monthly_usage(&conn, &labels)?))
}
