//! Test utilities for database setup.
//!
//! Provides helpers that reuse the authoritative schema initialization,
//! eliminating schema duplication in test code.

use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

use crate::db::users::{self, NewUser};
use crate::domain::Role;

/// Test environment with a migrated portal.db in a temporary directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for database file persistence)
    pub temp: TempDir,
    /// Connection with the full schema (all migrations)
    pub conn: Connection,
}

impl TestEnv {
    /// Create a test environment using `db::init_db`'s pragmas and
    /// `db::schema::run_migrations()`.
    pub fn new() -> rusqlite::Result<Self> {
        let temp =
            TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let conn = Connection::open(temp.path().join("portal.db"))?;
        crate::db::configure(&conn)?;
        crate::db::run_migrations(&conn)?;

        Ok(Self { temp, conn })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Insert an account with a placeholder password hash.
    pub fn add_user(&self, email: &str, country: &str, role: Role) -> i64 {
        users::create_user(
            &self.conn,
            &NewUser {
                name: "Test User",
                email,
                password_hash: "not-a-real-hash",
                business_name: "Test Shop",
                phone: None,
                country,
                role,
            },
        )
        .expect("insert test user")
    }

    /// Insert an Indian merchant.
    pub fn add_merchant(&self, email: &str) -> i64 {
        self.add_user(email, "IN", Role::Merchant)
    }
}
