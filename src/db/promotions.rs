//! Promotion rows. Every query is scoped by the owning user.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::now_str;
use crate::domain::Promotion;

/// Validated promotion fields, used for both insert and full update.
#[derive(Debug, Clone, Default)]
pub struct PromotionFields {
  pub title: String,
  pub description: String,
  pub discount: Option<String>,
  pub image_url: Option<String>,
  pub start_date: Option<String>,
  pub end_date: Option<String>,
  pub is_active: bool,
}

impl From<&Promotion> for PromotionFields {
  fn from(p: &Promotion) -> Self {
    Self {
      title: p.title.clone(),
      description: p.description.clone(),
      discount: p.discount.clone(),
      image_url: p.image_url.clone(),
      start_date: p.start_date.clone(),
      end_date: p.end_date.clone(),
      is_active: p.is_active,
    }
  }
}

const PROMOTION_COLUMNS: &str = "id, user_id, title, description, discount, image_url, \
  start_date, end_date, is_active, created_at, updated_at";

fn map_promotion(row: &Row) -> Result<Promotion> {
  Ok(Promotion {
    id: row.get(0)?,
    user_id: row.get(1)?,
    title: row.get(2)?,
    description: row.get(3)?,
    discount: row.get(4)?,
    image_url: row.get(5)?,
    start_date: row.get(6)?,
    end_date: row.get(7)?,
    is_active: row.get(8)?,
    created_at: row.get(9)?,
    updated_at: row.get(10)?,
  })
}

pub fn create_promotion(conn: &Connection, user_id: i64, fields: &PromotionFields) -> Result<i64> {
  let now = now_str();
  conn.execute(
    r#"INSERT INTO promotions
       (user_id, title, description, discount, image_url, start_date, end_date, is_active, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)"#,
    params![
      user_id,
      fields.title,
      fields.description,
      fields.discount,
      fields.image_url,
      fields.start_date,
      fields.end_date,
      fields.is_active,
      now,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_promotion(conn: &Connection, user_id: i64, id: i64) -> Result<Option<Promotion>> {
  conn
    .query_row(
      &format!("SELECT {} FROM promotions WHERE id = ?1 AND user_id = ?2", PROMOTION_COLUMNS),
      params![id, user_id],
      map_promotion,
    )
    .optional()
}

/// List a merchant's promotions, newest first, optionally filtered by active flag
pub fn list_promotions(conn: &Connection, user_id: i64, active: Option<bool>) -> Result<Vec<Promotion>> {
  let mut stmt = conn.prepare(&format!(
    r#"SELECT {} FROM promotions
       WHERE user_id = ?1 AND (?2 IS NULL OR is_active = ?2)
       ORDER BY created_at DESC, id DESC"#,
    PROMOTION_COLUMNS
  ))?;
  let promotions = stmt
    .query_map(params![user_id, active], map_promotion)?
    .collect::<Result<Vec<_>>>()?;
  Ok(promotions)
}

/// Overwrite all editable fields. Returns false if no such promotion for the user.
pub fn update_promotion(conn: &Connection, user_id: i64, id: i64, fields: &PromotionFields) -> Result<bool> {
  let changed = conn.execute(
    r#"UPDATE promotions SET
         title = ?3, description = ?4, discount = ?5, image_url = ?6,
         start_date = ?7, end_date = ?8, is_active = ?9, updated_at = ?10
       WHERE id = ?1 AND user_id = ?2"#,
    params![
      id,
      user_id,
      fields.title,
      fields.description,
      fields.discount,
      fields.image_url,
      fields.start_date,
      fields.end_date,
      fields.is_active,
      now_str(),
    ],
  )?;
  Ok(changed > 0)
}

/// Returns false if no such promotion for the user
pub fn delete_promotion(conn: &Connection, user_id: i64, id: i64) -> Result<bool> {
  let changed = conn.execute(
    "DELETE FROM promotions WHERE id = ?1 AND user_id = ?2",
    params![id, user_id],
  )?;
  Ok(changed > 0)
}
