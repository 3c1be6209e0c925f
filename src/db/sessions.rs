//! Login sessions. Only the SHA-256 digest of a token is stored.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use sha2::{Digest, Sha256};

use super::{now_str, to_db_time};

/// Hex SHA-256 of a session token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a new session for `token`
pub fn create_session(
    conn: &Connection,
    user_id: i64,
    token: &str,
    duration_hours: i64,
) -> Result<()> {
    let now = Utc::now();
    let expires = now + Duration::hours(duration_hours);
    conn.execute(
        r#"INSERT INTO sessions (token_hash, user_id, created_at, expires_at, last_access_at)
           VALUES (?1, ?2, ?3, ?4, ?3)"#,
        params![hash_token(token), user_id, to_db_time(now), to_db_time(expires)],
    )?;
    Ok(())
}

/// Resolve a token to its user id if the session is still valid.
/// Touches `last_access_at` on success.
pub fn get_session_user(conn: &Connection, token: &str) -> Result<Option<i64>> {
    let token_hash = hash_token(token);
    let now = now_str();
    let user_id: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
            params![token_hash, now],
            |row| row.get(0),
        )
        .optional()?;

    if user_id.is_some() {
        conn.execute(
            "UPDATE sessions SET last_access_at = ?1 WHERE token_hash = ?2",
            params![now, token_hash],
        )?;
    }
    Ok(user_id)
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![hash_token(token)],
    )?;
    Ok(())
}

/// Delete every session of a user except `keep_token` (if given)
pub fn delete_other_sessions(conn: &Connection, user_id: i64, keep_token: Option<&str>) -> Result<usize> {
    let keep = keep_token.map(hash_token).unwrap_or_default();
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND token_hash != ?2",
        params![user_id, keep],
    )
}

pub fn cleanup_expired_sessions(conn: &Connection) -> Result<usize> {
    conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now_str()])
}
