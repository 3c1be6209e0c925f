//! Account rows (merchants and superadmins).

use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::now_str;
use crate::domain::{Region, Role, User};

/// Fields needed to create an account. `password_hash` is already hashed.
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub business_name: &'a str,
    pub phone: Option<&'a str>,
    pub country: &'a str,
    pub role: Role,
}

const USER_COLUMNS: &str =
    "id, name, email, business_name, phone, country, role, created_at, last_login_at";

fn map_user(row: &Row) -> Result<User> {
    let country: String = row.get(5)?;
    let role: String = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        business_name: row.get(3)?,
        phone: row.get(4)?,
        region: Region::from_country(&country),
        country,
        role: Role::from_str(&role).unwrap_or(Role::Merchant),
        created_at: row.get(7)?,
        last_login_at: row.get(8)?,
    })
}

/// Create a new user, returns the user ID
pub fn create_user(conn: &Connection, user: &NewUser) -> Result<i64> {
    conn.execute(
        r#"INSERT INTO users (name, email, password_hash, business_name, phone, country, role, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        params![
            user.name,
            user.email,
            user.password_hash,
            user.business_name,
            user.phone,
            user.country.to_ascii_uppercase(),
            user.role.as_str(),
            now_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        map_user,
    )
    .optional()
}

/// Get credentials by email, returns (user_id, password_hash)
pub fn get_login_by_email(conn: &Connection, email: &str) -> Result<Option<(i64, String)>> {
    conn.query_row(
        "SELECT id, password_hash FROM users WHERE email = ?1",
        params![email],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

pub fn get_password_hash(conn: &Connection, user_id: i64) -> Result<Option<String>> {
    conn.query_row(
        "SELECT password_hash FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
}

/// Check if an email is already registered (case-insensitive)
pub fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Update editable profile fields; `None` leaves a field unchanged
pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    name: Option<&str>,
    business_name: Option<&str>,
    phone: Option<&str>,
) -> Result<()> {
    conn.execute(
        r#"UPDATE users SET
             name = COALESCE(?2, name),
             business_name = COALESCE(?3, business_name),
             phone = COALESCE(?4, phone)
           WHERE id = ?1"#,
        params![user_id, name, business_name, phone],
    )?;
    Ok(())
}

pub fn set_password_hash(conn: &Connection, user_id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, user_id],
    )?;
    Ok(())
}

pub fn update_last_login(conn: &Connection, user_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![now_str(), user_id],
    )?;
    Ok(())
}

pub fn count_by_role(conn: &Connection, role: Role) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![role.as_str()],
        |row| row.get(0),
    )
}
