//! Promotion CRUD for the signed-in merchant.

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  Json,
};
use serde::Deserialize;

use crate::auth::AuthContext;
use crate::db::{self, promotions::{self, PromotionFields}};
use crate::domain::Promotion;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation::{self, FieldError, Validator};

#[derive(Deserialize)]
pub struct ListQuery {
  pub active: Option<bool>,
}

/// Request body for create and partial update. Absent fields keep their
/// value on update; an empty string clears an optional field.
#[derive(Debug, Default, Deserialize)]
pub struct PromotionInput {
  pub title: Option<String>,
  pub description: Option<String>,
  pub discount: Option<String>,
  pub image_url: Option<String>,
  pub start_date: Option<String>,
  pub end_date: Option<String>,
  pub is_active: Option<bool>,
}

fn optional(value: Option<String>, current: Option<String>) -> Option<String> {
  match value {
    Some(v) if v.trim().is_empty() => None,
    Some(v) => Some(v.trim().to_string()),
    None => current,
  }
}

impl PromotionInput {
  /// Overlay this input onto existing fields
  fn apply(self, base: PromotionFields) -> PromotionFields {
    PromotionFields {
      title: self.title.map(|t| t.trim().to_string()).unwrap_or(base.title),
      description: self.description.map(|d| d.trim().to_string()).unwrap_or(base.description),
      discount: optional(self.discount, base.discount),
      image_url: optional(self.image_url, base.image_url),
      start_date: optional(self.start_date, base.start_date),
      end_date: optional(self.end_date, base.end_date),
      is_active: self.is_active.unwrap_or(base.is_active),
    }
  }
}

pub fn validate(fields: &PromotionFields) -> Result<(), Vec<FieldError>> {
  let mut v = Validator::new();
  v.length(&fields.title, "title", 1, 120)
    .length(&fields.description, "description", 0, 2000);
  if let Some(discount) = &fields.discount {
    v.length(discount, "discount", 1, 60);
  }
  if let Some(url) = &fields.image_url {
    v.check(
      validation::is_valid_image_url(url),
      "image_url",
      "image_url must be an uploaded image or an http(s) URL",
    );
  }
  let start = fields.start_date.as_deref().map(|d| (d, validation::parse_date(d)));
  let end = fields.end_date.as_deref().map(|d| (d, validation::parse_date(d)));
  if let Some((_, parsed)) = start {
    v.check(parsed.is_some(), "start_date", "start_date must be YYYY-MM-DD");
  }
  if let Some((_, parsed)) = end {
    v.check(parsed.is_some(), "end_date", "end_date must be YYYY-MM-DD");
  }
  if let (Some((_, Some(s))), Some((_, Some(e)))) = (start, end) {
    v.check(e >= s, "end_date", "end_date must not be before start_date");
  }
  v.finish()
}

/// GET /api/promotions
pub async fn list(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Promotion>>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(promotions::list_promotions(&conn, auth.user_id(), query.active)?))
}

/// POST /api/promotions
pub async fn create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(input): Json<PromotionInput>,
) -> ApiResult<(StatusCode, Json<Promotion>)> {
  let fields = input.apply(PromotionFields {
    is_active: true,
    ..Default::default()
  });
  validate(&fields)?;

  let conn = db::try_lock(&state.db)?;
  let id = promotions::create_promotion(&conn, auth.user_id(), &fields)?;
  let promotion = promotions::get_promotion(&conn, auth.user_id(), id)?.ok_or(ApiError::NotFound("promotion"))?;
  tracing::info!(user_id = auth.user_id(), promotion_id = id, "Promotion created");
  Ok((StatusCode::CREATED, Json(promotion)))
}

/// GET /api/promotions/{id}
pub async fn get(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Promotion>> {
  let conn = db::try_lock(&state.db)?;
  promotions::get_promotion(&conn, auth.user_id(), id)?
    .map(Json)
    .ok_or(ApiError::NotFound("promotion"))
}

/// PUT /api/promotions/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(input): Json<PromotionInput>,
) -> ApiResult<Json<Promotion>> {
  let conn = db::try_lock(&state.db)?;
  let existing = promotions::get_promotion(&conn, auth.user_id(), id)?.ok_or(ApiError::NotFound("promotion"))?;
  let fields = input.apply(PromotionFields::from(&existing));
  validate(&fields)?;

  if !promotions::update_promotion(&conn, auth.user_id(), id, &fields)? {
    return Err(ApiError::NotFound("promotion"));
  }
  let promotion = promotions::get_promotion(&conn, auth.user_id(), id)?.ok_or(ApiError::NotFound("promotion"))?;
  Ok(Json(promotion))
}

/// DELETE /api/promotions/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
  let conn = db::try_lock(&state.db)?;
  if !promotions::delete_promotion(&conn, auth.user_id(), id)? {
    return Err(ApiError::NotFound("promotion"));
  }
  tracing::info!(user_id = auth.user_id(), promotion_id = id, "Promotion deleted");
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fields(title: &str) -> PromotionFields {
    PromotionFields {
      title: title.to_string(),
      is_active: true,
      ..Default::default()
    }
  }

  #[test]
  fn test_apply_partial_update() {
    let base = PromotionFields {
      discount: Some("10% off".into()),
      image_url: Some("/uploads/1/a.png".into()),
      ..fields("Old")
    };
    let input = PromotionInput {
      title: Some("  New  ".into()),
      discount: Some("".into()),
      ..Default::default()
    };
    let merged = input.apply(base);
    assert_eq!(merged.title, "New");
    assert_eq!(merged.discount, None);
    assert_eq!(merged.image_url.as_deref(), Some("/uploads/1/a.png"));
    assert!(merged.is_active);
  }

  #[test]
  fn test_validate_requires_title() {
    let errors = validate(&fields("")).unwrap_err();
    assert_eq!(errors[0].field, "title");
  }

  #[test]
  fn test_validate_date_order() {
    let mut f = fields("Sale");
    f.start_date = Some("2026-11-05".into());
    f.end_date = Some("2026-11-01".into());
    let errors = validate(&f).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "end_date");

    f.end_date = Some("2026-11-05".into());
    assert!(validate(&f).is_ok());
  }

  #[test]
  fn test_validate_bad_date_and_image() {
    let mut f = fields("Sale");
    f.start_date = Some("05/11/2026".into());
    f.image_url = Some("file:///etc/passwd".into());
    let errors = validate(&f).unwrap_err();
    let names: Vec<_> = errors.iter().map(|e| e.field).collect();
    assert_eq!(names, vec!["image_url", "start_date"]);
  }
}
