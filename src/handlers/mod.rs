pub mod admin;
pub mod contacts;
pub mod promotions;
pub mod reports;
pub mod subscriptions;
pub mod uploads;
pub mod whatsapp;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::db;
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
  let database = match db::try_lock(&state.db) {
    Ok(conn) => db::schema::get_schema_version(&conn)
      .map(|v| json!({ "ok": true, "schema_version": v }))
      .unwrap_or_else(|e| json!({ "ok": false, "error": e.to_string() })),
    Err(e) => json!({ "ok": false, "error": e.to_string() }),
  };
  Json(json!({
    "status": "ok",
    "version": env!("CARGO_PKG_VERSION"),
    "database": database,
    "sender": state.sender.name(),
  }))
}
