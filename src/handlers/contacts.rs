//! Mobile-number lists with opt-in consent.

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  Json,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::auth::AuthContext;
use crate::db::{self, billing, contacts};
use crate::domain::Contact;
use crate::error::{ApiError, ApiResult};
use crate::phone;
use crate::state::AppState;
use crate::validation::Validator;

/// Numbers accepted in one bulk request
pub const MAX_BULK_NUMBERS: usize = 1000;

#[derive(Deserialize)]
pub struct ListQuery {
  pub opted_in: Option<bool>,
}

#[derive(Deserialize)]
pub struct NewContactRequest {
  pub mobile_number: String,
  pub name: Option<String>,
  #[serde(default)]
  pub opted_in: bool,
  pub opt_in_source: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkRequest {
  pub numbers: Vec<String>,
  #[serde(default)]
  pub opted_in: bool,
  pub opt_in_source: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkResult {
  pub added: usize,
  pub duplicates: usize,
  /// Inputs that could not be normalised, as submitted
  pub invalid: Vec<String>,
  pub skipped_over_limit: usize,
}

#[derive(Deserialize)]
pub struct UpdateRequest {
  pub name: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct OptInRequest {
  pub source: Option<String>,
}

fn clean(value: Option<&str>) -> Option<&str> {
  value.map(str::trim).filter(|s| !s.is_empty())
}

fn check_text(v: &mut Validator, value: Option<&str>, field: &'static str, max: usize) {
  if let Some(value) = value {
    v.length(value, field, 1, max);
  }
}

/// Plan contact cap for the user
fn contact_limit(conn: &Connection, user_id: i64) -> rusqlite::Result<i64> {
  Ok(billing::effective_plan(conn, user_id)?.max_contacts)
}

fn load(conn: &Connection, user_id: i64, id: i64) -> ApiResult<Contact> {
  contacts::get_contact(conn, user_id, id)?.ok_or(ApiError::NotFound("contact"))
}

/// GET /api/contacts
pub async fn list(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Contact>>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(contacts::list_contacts(&conn, auth.user_id(), query.opted_in)?))
}

/// POST /api/contacts
pub async fn create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<NewContactRequest>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
  let name = clean(req.name.as_deref());
  let source = clean(req.opt_in_source.as_deref());
  let mut v = Validator::new();
  check_text(&mut v, name, "name", 100);
  check_text(&mut v, source, "opt_in_source", 100);
  let number = match phone::normalize(&req.mobile_number, &state.config.default_country_code) {
    Ok(number) => Some(number),
    Err(e) => {
      v.check(false, "mobile_number", e.to_string());
      None
    }
  };
  v.finish()?;
  // Some whenever validation passed
  let number = number.unwrap_or_default();

  let user_id = auth.user_id();
  let conn = db::try_lock(&state.db)?;
  let limit = contact_limit(&conn, user_id)?;
  if contacts::count_contacts(&conn, user_id)? >= limit {
    return Err(ApiError::forbidden(format!(
      "contact limit of {} reached for your plan",
      limit
    )));
  }
  if contacts::contact_exists(&conn, user_id, &number)? {
    return Err(ApiError::Conflict(format!("{} is already in your contacts", number)));
  }
  let id = contacts::insert_contact(&conn, user_id, &number, name, req.opted_in, source)?;
  let contact = load(&conn, user_id, id)?;
  tracing::info!(user_id, contact_id = id, opted_in = req.opted_in, "Contact added");
  Ok((StatusCode::CREATED, Json(contact)))
}

struct ImportOptions<'a> {
  opted_in: bool,
  source: Option<&'a str>,
  default_cc: &'a str,
}

/// Add numbers up to the plan's contact cap. All or nothing: a failed
/// insert rolls back the whole import.
fn import_numbers(
  conn: &Connection,
  user_id: i64,
  numbers: &[String],
  opts: &ImportOptions,
) -> rusqlite::Result<BulkResult> {
  let limit = contact_limit(conn, user_id)?;
  let tx = conn.unchecked_transaction()?;
  let mut count = contacts::count_contacts(&tx, user_id)?;

  let mut result = BulkResult::default();
  let mut seen = HashSet::new();
  for raw in numbers {
    let number = match phone::normalize(raw, opts.default_cc) {
      Ok(number) => number,
      Err(_) => {
        result.invalid.push(raw.clone());
        continue;
      }
    };
    if !seen.insert(number.clone()) || contacts::contact_exists(&tx, user_id, &number)? {
      result.duplicates += 1;
      continue;
    }
    if count >= limit {
      result.skipped_over_limit += 1;
      continue;
    }
    contacts::insert_contact(&tx, user_id, &number, None, opts.opted_in, opts.source)?;
    count += 1;
    result.added += 1;
  }
  tx.commit()?;
  Ok(result)
}

/// POST /api/contacts/bulk
pub async fn bulk_create(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<BulkRequest>,
) -> ApiResult<Json<BulkResult>> {
  let source = clean(req.opt_in_source.as_deref());
  let mut v = Validator::new();
  v.check(!req.numbers.is_empty(), "numbers", "numbers must not be empty")
    .check(
      req.numbers.len() <= MAX_BULK_NUMBERS,
      "numbers",
      format!("at most {} numbers per request", MAX_BULK_NUMBERS),
    );
  check_text(&mut v, source, "opt_in_source", 100);
  v.finish()?;

  let user_id = auth.user_id();
  let result = {
    let conn = db::try_lock(&state.db)?;
    import_numbers(
      &conn,
      user_id,
      &req.numbers,
      &ImportOptions {
        opted_in: req.opted_in,
        source,
        default_cc: &state.config.default_country_code,
      },
    )?
  };

  tracing::info!(
    user_id,
    added = result.added,
    duplicates = result.duplicates,
    invalid = result.invalid.len(),
    over_limit = result.skipped_over_limit,
    "Bulk contact import"
  );
  Ok(Json(result))
}

/// PUT /api/contacts/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(req): Json<UpdateRequest>,
) -> ApiResult<Json<Contact>> {
  let name = clean(req.name.as_deref());
  let mut v = Validator::new();
  check_text(&mut v, name, "name", 100);
  v.finish()?;

  let conn = db::try_lock(&state.db)?;
  if !contacts::update_contact_name(&conn, auth.user_id(), id, name)? {
    return Err(ApiError::NotFound("contact"));
  }
  Ok(Json(load(&conn, auth.user_id(), id)?))
}

/// POST /api/contacts/{id}/opt-in
pub async fn opt_in(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  body: Option<Json<OptInRequest>>,
) -> ApiResult<Json<Contact>> {
  let req = body.map(|Json(b)| b).unwrap_or_default();
  let source = clean(req.source.as_deref());
  let mut v = Validator::new();
  check_text(&mut v, source, "source", 100);
  v.finish()?;

  let conn = db::try_lock(&state.db)?;
  if !contacts::set_opt_in(&conn, auth.user_id(), id, source)? {
    return Err(ApiError::NotFound("contact"));
  }
  tracing::info!(user_id = auth.user_id(), contact_id = id, "Contact opted in");
  Ok(Json(load(&conn, auth.user_id(), id)?))
}

/// POST /api/contacts/{id}/opt-out
pub async fn opt_out(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Contact>> {
  let conn = db::try_lock(&state.db)?;
  if !contacts::set_opt_out(&conn, auth.user_id(), id)? {
    return Err(ApiError::NotFound("contact"));
  }
  tracing::info!(user_id = auth.user_id(), contact_id = id, "Contact opted out");
  Ok(Json(load(&conn, auth.user_id(), id)?))
}

/// DELETE /api/contacts/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
  let conn = db::try_lock(&state.db)?;
  if !contacts::delete_contact(&conn, auth.user_id(), id)? {
    return Err(ApiError::NotFound("contact"));
  }
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TestEnv;

  fn opts() -> ImportOptions<'static> {
    ImportOptions {
      opted_in: true,
      source: Some("counter form"),
      default_cc: "91",
    }
  }

  fn numbers(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
  }

  #[test]
  fn test_import_counts_outcomes() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    contacts::insert_contact(&env.conn, user, "+919876543210", None, false, None).unwrap();

    let result = import_numbers(
      &env.conn,
      user,
      &numbers(&["9876543210", "9876543211", "+91 98765 43211", "abc"]),
      &opts(),
    )
    .unwrap();
    assert_eq!(result.added, 1);
    assert_eq!(result.duplicates, 2);
    assert_eq!(result.invalid, vec!["abc".to_string()]);
    assert_eq!(contacts::count_contacts(&env.conn, user).unwrap(), 2);
  }

  #[test]
  fn test_import_rolls_back_on_failed_insert() {
    let env = TestEnv::new().unwrap();
    let user = env.add_merchant("a@example.com");
    env
      .conn
      .execute_batch(
        r#"CREATE TRIGGER reject_number BEFORE INSERT ON contacts
           WHEN NEW.mobile_number = '+919876543212'
           BEGIN SELECT RAISE(ABORT, 'rejected'); END;"#,
      )
      .unwrap();

    let err = import_numbers(
      &env.conn,
      user,
      &numbers(&["9876543210", "9876543211", "9876543212", "9876543213"]),
      &opts(),
    );
    assert!(err.is_err());
    assert_eq!(contacts::count_contacts(&env.conn, user).unwrap(), 0);
    assert!(env.conn.is_autocommit());
  }
}
