//! Project path functions - single source of truth for all file paths.
//!
//! ## Environment Variables
//!
//! - `DATA_DIR`: Override the base data directory (default: "data")
//!
//! This allows running multiple isolated server instances side by side:
//! ```bash
//! DATA_DIR=data/staging PORT=3001 cargo run
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Lazily initialized data directory from DATA_DIR env var
static DATA_DIR_VALUE: OnceLock<String> = OnceLock::new();

/// Get the base data directory (from DATA_DIR env var or default "data")
pub fn data_dir() -> &'static str {
    DATA_DIR_VALUE.get_or_init(|| env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

// ==================== Data-dir relative paths ====================
// These take the configured data dir so tests can point them at a temp dir.

/// Root directory for uploaded images
pub fn uploads_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("uploads")
}

/// Upload directory for a single merchant
pub fn user_uploads_dir(data_dir: &Path, user_id: i64) -> PathBuf {
    uploads_dir(data_dir).join(user_id.to_string())
}

/// Directory where the outbox mailer drops rendered emails
pub fn outbox_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("outbox")
}

/// Public URL path of an uploaded file
pub fn upload_url(user_id: i64, file_name: &str) -> String {
    format!("/uploads/{}/{}", user_id, urlencoding::encode(file_name))
}
