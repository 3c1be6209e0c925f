pub mod billing;
pub mod campaigns;
pub mod contacts;
pub mod promotions;
pub mod reports;
pub mod schema;
pub mod sessions;
pub mod users;

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Utc};
use rusqlite::{Connection, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use schema::run_migrations;

pub type DbPool = Arc<Mutex<Connection>>;

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
    /// Log the error at warn level and return None
    fn log_warn(self, context: &str) -> Option<T>;
    /// Log the error at warn level and return the default
    fn log_warn_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }

    fn log_warn_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                T::default()
            }
        }
    }
}

/// Error returned when database lock cannot be acquired
#[derive(Debug)]
pub struct DbLockError;

impl std::fmt::Display for DbLockError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Database unavailable")
  }
}

impl std::error::Error for DbLockError {}

/// Try to acquire the database lock, returning an error if poisoned
pub fn try_lock(pool: &DbPool) -> std::result::Result<MutexGuard<'_, Connection>, DbLockError> {
  pool.lock().map_err(|_: PoisonError<_>| {
    tracing::error!("Database mutex poisoned - a thread panicked while holding the lock");
    DbLockError
  })
}

/// Acquire the lock even when poisoned. Only for bookkeeping writes that
/// record work already done outside the database.
pub fn lock_recovering(pool: &DbPool) -> MutexGuard<'_, Connection> {
  pool.lock().unwrap_or_else(|poisoned| {
    tracing::warn!("Recovering poisoned database mutex for bookkeeping write");
    poisoned.into_inner()
  })
}

/// Open the database file, apply pragmas and migrations
pub fn init_db(path: &Path) -> Result<DbPool> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).ok();
  }

  // Create backup before migrations if database exists
  if path.exists() {
    let backup_path = path.with_extension("db.backup");
    if let Err(e) = std::fs::copy(path, &backup_path) {
      tracing::warn!("Could not create database backup: {}", e);
    }
  }

  let conn = Connection::open(path)?;
  configure(&conn)?;
  run_migrations(&conn)?;
  Ok(Arc::new(Mutex::new(conn)))
}

/// Connection pragmas shared by the server and tests
pub fn configure(conn: &Connection) -> Result<()> {
  conn.execute_batch("PRAGMA foreign_keys = ON;")
}

// ==================== Timestamps ====================
// Stored as second-precision RFC 3339 UTC so string order equals time order.

pub fn to_db_time(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_str() -> String {
  to_db_time(Utc::now())
}

/// First instant of the UTC calendar month containing `dt`
pub fn month_start(dt: DateTime<Utc>) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(dt.year(), dt.month(), 1, 0, 0, 0)
    .single()
    .unwrap_or(dt)
}

/// Parse a stored timestamp, None if malformed
pub fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_to_db_time_format() {
    let dt = Utc.with_ymd_and_hms(2026, 3, 9, 7, 5, 1).unwrap();
    assert_eq!(to_db_time(dt), "2026-03-09T07:05:01Z");
  }

  #[test]
  fn test_month_start() {
    let dt = Utc.with_ymd_and_hms(2026, 10, 17, 13, 45, 0).unwrap();
    assert_eq!(to_db_time(month_start(dt)), "2026-10-01T00:00:00Z");
  }

  #[test]
  fn test_parse_db_time_roundtrip() {
    let dt = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
    assert_eq!(parse_db_time(&to_db_time(dt)), Some(dt));
    assert_eq!(parse_db_time("not a date"), None);
  }

  #[test]
  fn test_init_db_creates_schema() {
    let temp = tempfile::TempDir::new().unwrap();
    let pool = init_db(&temp.path().join("nested/portal.db")).unwrap();
    let conn = try_lock(&pool).unwrap();
    assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);
  }

  #[test]
  fn test_lock_recovering_after_poison() {
    let temp = tempfile::TempDir::new().unwrap();
    let pool = init_db(&temp.path().join("portal.db")).unwrap();
    let poisoner = pool.clone();
    let _ = std::thread::spawn(move || {
      let _guard = poisoner.lock().unwrap();
      panic!("poison the pool");
    })
    .join();

    assert!(try_lock(&pool).is_err());
    let conn = lock_recovering(&pool);
    assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);
  }

  #[test]
  fn test_log_warn_default() {
    let failed: std::result::Result<i64, String> = Err("boom".to_string());
    assert_eq!(failed.log_warn_default("test"), 0);
    let ok: std::result::Result<i64, String> = Ok(5);
    assert_eq!(ok.log_warn("test"), Some(5));
  }
}
