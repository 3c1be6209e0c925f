use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promo_portal::{auth, config::AppConfig, db, routes, state::AppState};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "promo_portal=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = AppConfig::load();
  let pool = db::init_db(&config.database_path).expect("Failed to initialize database");

  {
    let conn = db::try_lock(&pool).expect("Database lock failed during startup");
    if let Some(seed) = &config.admin {
      if let Err(e) = auth::seed_superadmin(&conn, seed) {
        tracing::error!("Failed to seed superadmin: {}", e);
      }
    }
    match db::sessions::cleanup_expired_sessions(&conn) {
      Ok(0) => {}
      Ok(n) => tracing::info!("Removed {} expired sessions", n),
      Err(e) => tracing::warn!("Failed to clean up expired sessions: {}", e),
    }
  }

  let bind_addr = config.server.bind_addr();
  let public_url = config.server.public_base_url.clone();
  let state = AppState::from_config(pool, config);
  let app = routes::app(state);

  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on {} (public URL {})", bind_addr, public_url);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server failed to start");
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!("Failed to listen for shutdown signal: {}", e);
    std::future::pending::<()>().await;
  }
  tracing::info!("Shutting down");
}
