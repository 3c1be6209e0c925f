//! Portal database schema.
//!
//! ## Migration System
//!
//! Each migration:
//! 1. Checks if the current schema version is less than the target version
//! 2. Runs the migration SQL
//! 3. Records the new version in `db_version` table
//!
//! Migrations only run once - the version check ensures idempotency.

use rusqlite::{params, Connection, Result};

use super::now_str;

/// Current schema version.
/// Increment this when adding a new migration
pub const SCHEMA_VERSION: i32 = 4;

/// Initialize the schema with version-gated migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
  // Bootstrap: ensure db_version table exists (needed to check version)
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS db_version (
      version INTEGER PRIMARY KEY,
      applied_at TEXT NOT NULL,
      description TEXT
    );
    "#,
  )?;

  let current_version = get_schema_version(conn)?;
  tracing::debug!("portal.db schema version: {}", current_version);

  if current_version < 1 {
    migrate_v0_to_v1(conn)?;
  }
  if current_version < 2 {
    migrate_v1_to_v2(conn)?;
  }
  if current_version < 3 {
    migrate_v2_to_v3(conn)?;
  }
  if current_version < 4 {
    migrate_v3_to_v4(conn)?;
  }

  Ok(())
}

/// v0→v1: accounts and sessions
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v0→v1: Create users and sessions");

  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      email TEXT NOT NULL UNIQUE COLLATE NOCASE,
      password_hash TEXT NOT NULL,
      business_name TEXT NOT NULL DEFAULT '',
      phone TEXT,
      country TEXT NOT NULL DEFAULT 'IN',
      role TEXT NOT NULL DEFAULT 'merchant',
      created_at TEXT NOT NULL,
      last_login_at TEXT
    );

    CREATE TABLE IF NOT EXISTS sessions (
      token_hash TEXT PRIMARY KEY,
      user_id INTEGER NOT NULL,
      created_at TEXT NOT NULL,
      expires_at TEXT NOT NULL,
      last_access_at TEXT NOT NULL,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
    CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
    "#,
  )?;

  record_version(conn, 1, "Create users and sessions")?;
  Ok(())
}

/// v1→v2: promotions and mobile-number lists
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v1→v2: Create promotions and contacts");

  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS promotions (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      title TEXT NOT NULL,
      description TEXT NOT NULL DEFAULT '',
      discount TEXT,
      image_url TEXT,
      start_date TEXT,
      end_date TEXT,
      is_active INTEGER NOT NULL DEFAULT 1,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS contacts (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      mobile_number TEXT NOT NULL,
      name TEXT,
      opted_in INTEGER NOT NULL DEFAULT 0,
      opt_in_source TEXT,
      opted_in_at TEXT,
      opted_out_at TEXT,
      created_at TEXT NOT NULL,
      UNIQUE (user_id, mobile_number),
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_promotions_user ON promotions(user_id);
    CREATE INDEX IF NOT EXISTS idx_contacts_user_opted ON contacts(user_id, opted_in);
    "#,
  )?;

  record_version(conn, 2, "Create promotions and contacts")?;
  Ok(())
}

/// v2→v3: WhatsApp campaigns and per-recipient delivery log
fn migrate_v2_to_v3(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v2→v3: Create campaigns and message logs");

  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS campaigns (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      promotion_id INTEGER,
      body TEXT NOT NULL,
      media_url TEXT,
      recipient_count INTEGER NOT NULL DEFAULT 0,
      sent_count INTEGER NOT NULL DEFAULT 0,
      failed_count INTEGER NOT NULL DEFAULT 0,
      skipped_count INTEGER NOT NULL DEFAULT 0,
      status TEXT NOT NULL DEFAULT 'sending',
      created_at TEXT NOT NULL,
      completed_at TEXT,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
      FOREIGN KEY (promotion_id) REFERENCES promotions(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS message_logs (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      campaign_id INTEGER NOT NULL,
      contact_id INTEGER,
      mobile_number TEXT NOT NULL,
      status TEXT NOT NULL,
      provider_sid TEXT,
      error TEXT,
      created_at TEXT NOT NULL,
      FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE,
      FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE SET NULL
    );

    CREATE INDEX IF NOT EXISTS idx_campaigns_user_created ON campaigns(user_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_campaigns_created ON campaigns(created_at);
    CREATE INDEX IF NOT EXISTS idx_message_logs_campaign ON message_logs(campaign_id);
    "#,
  )?;

  record_version(conn, 3, "Create campaigns and message logs")?;
  Ok(())
}

/// v3→v4: plans, subscriptions and manual payments
fn migrate_v3_to_v4(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v3→v4: Create plans, subscriptions and payments");

  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS plans (
      id TEXT PRIMARY KEY,
      name TEXT NOT NULL,
      monthly_campaign_limit INTEGER NOT NULL,
      max_contacts INTEGER NOT NULL,
      price_inr INTEGER NOT NULL,
      price_usd INTEGER NOT NULL,
      sort_order INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS payments (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      plan_id TEXT NOT NULL,
      method TEXT NOT NULL,
      amount INTEGER NOT NULL,
      currency TEXT NOT NULL,
      transaction_ref TEXT UNIQUE,
      invoice_number TEXT UNIQUE,
      status TEXT NOT NULL DEFAULT 'pending',
      note TEXT,
      created_at TEXT NOT NULL,
      reviewed_at TEXT,
      reviewed_by INTEGER,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
      FOREIGN KEY (plan_id) REFERENCES plans(id)
    );

    CREATE TABLE IF NOT EXISTS subscriptions (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      plan_id TEXT NOT NULL,
      status TEXT NOT NULL DEFAULT 'active',
      payment_id INTEGER,
      started_at TEXT NOT NULL,
      expires_at TEXT NOT NULL,
      cancelled_at TEXT,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
      FOREIGN KEY (plan_id) REFERENCES plans(id),
      FOREIGN KEY (payment_id) REFERENCES payments(id)
    );

    CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);
    CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id);
    CREATE INDEX IF NOT EXISTS idx_subscriptions_user_status ON subscriptions(user_id, status);

    -- Prices in minor units (paise / cents)
    INSERT OR IGNORE INTO plans VALUES ('free', 'Free', 2, 100, 0, 0, 0);
    INSERT OR IGNORE INTO plans VALUES ('starter', 'Starter', 10, 1000, 99900, 1500, 1);
    INSERT OR IGNORE INTO plans VALUES ('growth', 'Growth', 50, 5000, 299900, 4500, 2);
    INSERT OR IGNORE INTO plans VALUES ('enterprise', 'Enterprise', 500, 50000, 999900, 14900, 3);
    "#,
  )?;

  record_version(conn, 4, "Create plans, subscriptions and payments")?;
  Ok(())
}

// ============================================================
// MIGRATION HELPERS
// ============================================================

/// Record a schema version after successful migration
fn record_version(conn: &Connection, version: i32, description: &str) -> Result<()> {
  conn.execute(
    "INSERT INTO db_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
    params![version, now_str(), description],
  )?;
  tracing::info!("Recorded schema version {} - {}", version, description);
  Ok(())
}

/// Get current schema version (0 if no versions recorded)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
  conn.query_row("SELECT COALESCE(MAX(version), 0) FROM db_version", [], |row| row.get(0))
}
