//! Authentication handlers: register, login, logout, profile and password.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::{distr::Alphanumeric, Rng};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::middleware::{AuthContext, SESSION_COOKIE_NAME};
use super::password;
use crate::config::AdminSeed;
use crate::db::{self, sessions, users, LogOnError};
use crate::domain::{Role, User};
use crate::error::{ApiError, ApiResult};
use crate::phone;
use crate::state::AppState;
use crate::validation::{self, Validator, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};

const TOKEN_LEN: usize = 48;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub business_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub country: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Random alphanumeric session token
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn session_cookie(token: String, hours: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(hours))
        .build()
}

fn check_password(v: &mut Validator, field: &'static str, password: &str) {
    v.check(
        (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.chars().count()),
        field,
        format!(
            "password must be between {} and {} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        ),
    );
}

/// Normalise an optional phone field, recording a validation error if bad
fn optional_phone(v: &mut Validator, raw: Option<&str>, default_cc: &str) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match phone::normalize(raw, default_cc) {
        Ok(number) => Some(number),
        Err(e) => {
            v.check(false, "phone", e.to_string());
            None
        }
    }
}

/// Issue a session for `user_id` and load the user for the response
fn start_session(conn: &Connection, user_id: i64, hours: i64) -> ApiResult<(String, User)> {
    let token = generate_token();
    sessions::create_session(conn, user_id, &token, hours)?;
    let user = users::get_user_by_id(conn, user_id)?.ok_or(ApiError::NotFound("user"))?;
    Ok((token, user))
}

/// Check a password against the stored login. Argon2 is slow, so callers
/// run this without holding the database lock.
fn verify_login(login: Option<(i64, String)>, password: &str) -> ApiResult<i64> {
    let Some((user_id, stored_hash)) = login else {
        tracing::info!("Login failed for unknown email");
        return Err(ApiError::InvalidCredentials);
    };
    if !password::verify_password(password, &stored_hash) {
        tracing::info!(user_id, "Login failed: wrong password");
        return Err(ApiError::InvalidCredentials);
    }
    Ok(user_id)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let email = validation::normalize_email(&req.email);
    let name = req.name.trim();
    let business_name = req.business_name.trim();
    let country = req.country.trim().to_ascii_uppercase();

    let mut v = Validator::new();
    v.length(name, "name", 1, 100)
        .check(validation::is_valid_email(&email), "email", "email is invalid")
        .length(business_name, "business_name", 1, 120)
        .check(
            validation::is_valid_country(&country),
            "country",
            "country must be a two-letter ISO code",
        );
    check_password(&mut v, "password", &req.password);
    let phone = optional_phone(&mut v, req.phone.as_deref(), &state.config.default_country_code);
    v.finish()?;

    let password_hash = password::hash_password(&req.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;

    let conn = db::try_lock(&state.db)?;
    if users::email_exists(&conn, &email)? {
        return Err(ApiError::Conflict("email is already registered".into()));
    }
    let user_id = users::create_user(
        &conn,
        &users::NewUser {
            name,
            email: &email,
            password_hash: &password_hash,
            business_name,
            phone: phone.as_deref(),
            country: &country,
            role: Role::Merchant,
        },
    )?;
    let (token, user) = start_session(&conn, user_id, state.config.session_hours)?;
    drop(conn);

    tracing::info!(user_id, country = %user.country, "Merchant registered");
    let jar = jar.add(session_cookie(token.clone(), state.config.session_hours));
    Ok((StatusCode::CREATED, jar, Json(AuthResponse { token, user })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    let email = validation::normalize_email(&req.email);

    let login = {
        let conn = db::try_lock(&state.db)?;
        users::get_login_by_email(&conn, &email)?
    };
    let user_id = verify_login(login, &req.password)?;

    let conn = db::try_lock(&state.db)?;
    users::update_last_login(&conn, user_id).log_warn("Failed to update last login");
    sessions::cleanup_expired_sessions(&conn).log_warn("Failed to clean up expired sessions");
    let (token, user) = start_session(&conn, user_id, state.config.session_hours)?;
    drop(conn);

    tracing::info!(user_id, "User logged in");
    let jar = jar.add(session_cookie(token.clone(), state.config.session_hours));
    Ok((jar, Json(AuthResponse { token, user })))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
    jar: CookieJar,
) -> ApiResult<(StatusCode, CookieJar)> {
    let conn = db::try_lock(&state.db)?;
    sessions::delete_session(&conn, &auth.token)?;
    drop(conn);

    tracing::info!(user_id = auth.user.id, "User logged out");
    let jar = jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/"));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /api/auth/me
pub async fn me(auth: AuthContext) -> Json<User> {
    Json(auth.user)
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ProfileRequest>,
) -> ApiResult<Json<User>> {
    let name = req.name.as_deref().map(str::trim);
    let business_name = req.business_name.as_deref().map(str::trim);

    let mut v = Validator::new();
    if let Some(name) = name {
        v.length(name, "name", 1, 100);
    }
    if let Some(business_name) = business_name {
        v.length(business_name, "business_name", 1, 120);
    }
    let phone = optional_phone(&mut v, req.phone.as_deref(), &state.config.default_country_code);
    v.finish()?;

    let conn = db::try_lock(&state.db)?;
    users::update_profile(&conn, auth.user.id, name, business_name, phone.as_deref())?;
    let user = users::get_user_by_id(&conn, auth.user.id)?.ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user))
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<PasswordRequest>,
) -> ApiResult<StatusCode> {
    let mut v = Validator::new();
    check_password(&mut v, "new_password", &req.new_password);
    v.finish()?;

    let stored_hash = {
        let conn = db::try_lock(&state.db)?;
        users::get_password_hash(&conn, auth.user.id)?.ok_or(ApiError::NotFound("user"))?
    };
    if !password::verify_password(&req.current_password, &stored_hash) {
        return Err(ApiError::bad_request("current password is incorrect"));
    }
    let new_hash = password::hash_password(&req.new_password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;

    let conn = db::try_lock(&state.db)?;
    users::set_password_hash(&conn, auth.user.id, &new_hash)?;
    let revoked = sessions::delete_other_sessions(&conn, auth.user.id, Some(&auth.token))?;
    tracing::info!(user_id = auth.user.id, revoked, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Create the configured superadmin if its email is not registered yet.
/// Returns true when an account was created.
pub fn seed_superadmin(conn: &Connection, seed: &AdminSeed) -> ApiResult<bool> {
    let email = validation::normalize_email(&seed.email);
    if !validation::is_valid_email(&email) {
        return Err(ApiError::bad_request("admin email is invalid"));
    }
    if users::email_exists(conn, &email)? {
        return Ok(false);
    }
    let password_hash = password::hash_password(&seed.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;
    users::create_user(
        conn,
        &users::NewUser {
            name: "Administrator",
            email: &email,
            password_hash: &password_hash,
            business_name: "Promo Portal",
            phone: None,
            country: "IN",
            role: Role::Superadmin,
        },
    )?;
    tracing::info!(email = %email, "Seeded superadmin account");
    Ok(true)
}
