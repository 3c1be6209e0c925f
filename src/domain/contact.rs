use serde::Serialize;

/// A mobile number on a merchant's list, with its opt-in record.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
  pub id: i64,
  pub user_id: i64,
  /// E.164, e.g. +919876543210
  pub mobile_number: String,
  pub name: Option<String>,
  pub opted_in: bool,
  pub opt_in_source: Option<String>,
  pub opted_in_at: Option<String>,
  pub opted_out_at: Option<String>,
  pub created_at: String,
}
