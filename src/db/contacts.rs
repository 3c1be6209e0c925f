//! Mobile-number lists with opt-in consent.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::now_str;
use crate::domain::Contact;

const CONTACT_COLUMNS: &str = "id, user_id, mobile_number, name, opted_in, opt_in_source, \
  opted_in_at, opted_out_at, created_at";

fn map_contact(row: &Row) -> Result<Contact> {
  Ok(Contact {
    id: row.get(0)?,
    user_id: row.get(1)?,
    mobile_number: row.get(2)?,
    name: row.get(3)?,
    opted_in: row.get(4)?,
    opt_in_source: row.get(5)?,
    opted_in_at: row.get(6)?,
    opted_out_at: row.get(7)?,
    created_at: row.get(8)?,
  })
}

/// Insert a normalised number. Fails with a constraint error on duplicates.
pub fn insert_contact(
  conn: &Connection,
  user_id: i64,
  mobile_number: &str,
  name: Option<&str>,
  opted_in: bool,
  opt_in_source: Option<&str>,
) -> Result<i64> {
  let now = now_str();
  let opted_in_at = opted_in.then(|| now.clone());
  conn.execute(
    r#"INSERT INTO contacts (user_id, mobile_number, name, opted_in, opt_in_source, opted_in_at, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    params![user_id, mobile_number, name, opted_in, opt_in_source, opted_in_at, now],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn contact_exists(conn: &Connection, user_id: i64, mobile_number: &str) -> Result<bool> {
  let count: i64 = conn.query_row(
    "SELECT COUNT(*) FROM contacts WHERE user_id = ?1 AND mobile_number = ?2",
    params![user_id, mobile_number],
    |row| row.get(0),
  )?;
  Ok(count > 0)
}

pub fn get_contact(conn: &Connection, user_id: i64, id: i64) -> Result<Option<Contact>> {
  conn
    .query_row(
      &format!("SELECT {} FROM contacts WHERE id = ?1 AND user_id = ?2", CONTACT_COLUMNS),
      params![id, user_id],
      map_contact,
    )
    .optional()
}

/// List a merchant's contacts, newest first, optionally filtered by opt-in state
pub fn list_contacts(conn: &Connection, user_id: i64, opted_in: Option<bool>) -> Result<Vec<Contact>> {
  let mut stmt = conn.prepare(&format!(
    r#"SELECT {} FROM contacts
       WHERE user_id = ?1 AND (?2 IS NULL OR opted_in = ?2)
       ORDER BY created_at DESC, id DESC"#,
    CONTACT_COLUMNS
  ))?;
  let contacts = stmt
    .query_map(params![user_id, opted_in], map_contact)?
    .collect::<Result<Vec<_>>>()?;
  Ok(contacts)
}

pub fn count_contacts(conn: &Connection, user_id: i64) -> Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM contacts WHERE user_id = ?1",
    params![user_id],
    |row| row.get(0),
  )
}

/// Returns false if no such contact for the user
pub fn update_contact_name(conn: &Connection, user_id: i64, id: i64, name: Option<&str>) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE contacts SET name = ?3 WHERE id = ?1 AND user_id = ?2",
    params![id, user_id, name],
  )?;
  Ok(changed > 0)
}

/// Record consent. Returns false if no such contact for the user.
pub fn set_opt_in(conn: &Connection, user_id: i64, id: i64, source: Option<&str>) -> Result<bool> {
  let changed = conn.execute(
    r#"UPDATE contacts SET
         opted_in = 1,
         opt_in_source = COALESCE(?3, opt_in_source),
         opted_in_at = ?4,
         opted_out_at = NULL
       WHERE id = ?1 AND user_id = ?2"#,
    params![id, user_id, source, now_str()],
  )?;
  Ok(changed > 0)
}

/// Withdraw consent. Returns false if no such contact for the user.
pub fn set_opt_out(conn: &Connection, user_id: i64, id: i64) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE contacts SET opted_in = 0, opted_out_at = ?3 WHERE id = ?1 AND user_id = ?2",
    params![id, user_id, now_str()],
  )?;
  Ok(changed > 0)
}

/// Returns false if no such contact for the user
pub fn delete_contact(conn: &Connection, user_id: i64, id: i64) -> Result<bool> {
  let changed = conn.execute(
    "DELETE FROM contacts WHERE id = ?1 AND user_id = ?2",
    params![id, user_id],
  )?;
  Ok(changed > 0)
}

/// Candidate recipients: the given ids owned by the user, or every contact when `ids` is None.
/// Opt-in is not filtered here so callers can report skipped numbers.
pub fn get_candidates(conn: &Connection, user_id: i64, ids: Option<&[i64]>) -> Result<Vec<Contact>> {
  match ids {
    None => list_contacts(conn, user_id, None),
    Some(ids) => {
      let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM contacts WHERE id = ?1 AND user_id = ?2",
        CONTACT_COLUMNS
      ))?;
      let mut contacts = Vec::with_capacity(ids.len());
      let mut seen = std::collections::HashSet::new();
      for id in ids {
        if !seen.insert(*id) {
          continue;
        }
        if let Some(contact) = stmt.query_row(params![id, user_id], map_contact).optional()? {
          contacts.push(contact);
        }
      }
      Ok(contacts)
    }
  }
}
