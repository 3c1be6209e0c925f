//! Authentication extractors.
//!
//! A session token is accepted from `Authorization: Bearer <token>` (API
//! clients) or from the `pp_session` cookie (the browser SPA).

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::db::{self, sessions, users};
use crate::domain::User;
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "pp_session";

/// Authenticated request context.
/// Add this as a handler parameter to require a logged-in user.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    /// Raw session token, needed to log out or keep the session on password change
    pub token: String,
}

impl AuthContext {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }
}

/// Token from the Authorization header, falling back to the session cookie
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(ApiError::Unauthorized)?;

        let conn = db::try_lock(&state.db)?;
        let user_id = sessions::get_session_user(&conn, &token)?.ok_or(ApiError::Unauthorized)?;
        let user = users::get_user_by_id(&conn, user_id)?.ok_or(ApiError::Unauthorized)?;

        Ok(AuthContext { user, token })
    }
}

/// Superadmin-only extractor. Merchants get 403.
#[derive(Debug, Clone)]
pub struct SuperAdmin(pub AuthContext);

impl FromRequestParts<AppState> for SuperAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        if !auth.user.is_superadmin() {
            tracing::warn!(user_id = auth.user.id, "Non-admin attempted admin route");
            return Err(ApiError::forbidden("superadmin access required"));
        }
        Ok(SuperAdmin(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<(&str, &str)>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        let p = parts(Some(("authorization", "Bearer abc123")));
        assert_eq!(extract_token(&p).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cookie_token() {
        let p = parts(Some(("cookie", "theme=dark; pp_session=tok42")));
        assert_eq!(extract_token(&p).as_deref(), Some("tok42"));
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(extract_token(&parts(None)), None);
        assert_eq!(extract_token(&parts(Some(("authorization", "Basic xyz")))), None);
        assert_eq!(extract_token(&parts(Some(("authorization", "Bearer  ")))), None);
    }
}
