//! HTTP router. Built in the library so the binary and integration tests
//! serve the same application.

use axum::{
  extract::DefaultBodyLimit,
  http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
  },
  routing::{get, post, put},
  Router,
};
use std::time::Duration;
use tower_http::{
  cors::CorsLayer,
  services::{ServeDir, ServeFile},
  trace::TraceLayer,
};

use crate::auth::handlers as auth;
use crate::error::ApiError;
use crate::handlers::{self, admin, contacts, promotions, reports, subscriptions, uploads, whatsapp};
use crate::paths;
use crate::state::AppState;

/// Multipart framing allowance on top of the image size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

fn api_routes(state: &AppState) -> Router<AppState> {
  let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

  Router::new()
    .route("/health", get(handlers::health))
    // Auth
    .route("/auth/register", post(auth::register))
    .route("/auth/login", post(auth::login))
    .route("/auth/logout", post(auth::logout))
    .route("/auth/me", get(auth::me))
    .route("/auth/profile", put(auth::update_profile))
    .route("/auth/password", put(auth::change_password))
    // Promotions
    .route("/promotions", get(promotions::list).post(promotions::create))
    .route(
      "/promotions/{id}",
      get(promotions::get).put(promotions::update).delete(promotions::delete),
    )
    // Contacts
    .route("/contacts", get(contacts::list).post(contacts::create))
    .route("/contacts/bulk", post(contacts::bulk_create))
    .route("/contacts/{id}", put(contacts::update).delete(contacts::delete))
    .route("/contacts/{id}/opt-in", post(contacts::opt_in))
    .route("/contacts/{id}/opt-out", post(contacts::opt_out))
    // WhatsApp campaigns
    .route("/whatsapp/send", post(whatsapp::send))
    .route("/whatsapp/campaigns", get(whatsapp::list_campaigns))
    .route("/whatsapp/campaigns/{id}", get(whatsapp::get_campaign))
    .route("/whatsapp/usage", get(whatsapp::usage))
    // Subscriptions
    .route("/subscriptions/plans", get(subscriptions::plans))
    .route("/subscriptions/current", get(subscriptions::current))
    .route("/subscriptions/upi-details", get(subscriptions::upi_details))
    .route("/subscriptions/upi", post(subscriptions::submit_upi))
    .route("/subscriptions/invoice", post(subscriptions::request_invoice))
    .route("/subscriptions/payments", get(subscriptions::payments))
    .route("/subscriptions/cancel", post(subscriptions::cancel))
    // Superadmin
    .route("/admin/payments", get(admin::list_payments))
    .route("/admin/payments/{id}/approve", post(admin::approve_payment))
    .route("/admin/payments/{id}/reject", post(admin::reject_payment))
    .route("/reports/overview", get(reports::overview))
    .route("/reports/merchants", get(reports::merchants))
    .route("/reports/campaigns", get(reports::campaigns))
    .route("/reports/usage", get(reports::usage))
    // Uploads
    .route(
      "/uploads/image",
      post(uploads::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
    )
    .fallback(|| async { ApiError::NotFound("route") })
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
  let origin = match origin.parse::<HeaderValue>() {
    Ok(origin) => origin,
    Err(e) => {
      tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
      return None;
    }
  };
  Some(
    CorsLayer::new()
      .allow_origin(origin)
      .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
      .allow_headers([CONTENT_TYPE, AUTHORIZATION])
      .allow_credentials(true)
      .max_age(Duration::from_secs(60 * 60)),
  )
}

/// Build the full application
pub fn app(state: AppState) -> Router {
  let config = state.config.clone();

  let mut router = Router::new()
    .nest("/api", api_routes(&state))
    .nest_service("/uploads", ServeDir::new(paths::uploads_dir(&config.data_dir)));

  if let Some(dir) = config.server.client_dir.as_ref().filter(|d| d.is_dir()) {
    tracing::info!("Serving client bundle from {}", dir.display());
    router = router.fallback_service(
      ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html"))),
    );
  }
  if let Some(cors) = config.server.cors_origin.as_deref().and_then(cors_layer) {
    router = router.layer(cors);
  }

  router.layer(TraceLayer::new_for_http()).with_state(state)
}
