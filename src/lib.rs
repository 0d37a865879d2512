//! Revamply Backend - library for app logic and testing

pub mod config;
pub mod db;
pub mod logging;
pub mod pages;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;
pub mod webhook;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::state::AppState;
use crate::store::{KvStore, MemoryStore, PgStore};

/// Parses a comma-separated origin list, dropping anything that is not a valid header value.
fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect()
}

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local dev server origins.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|s| parse_origins(&s))
        .filter(|origins| !origins.is_empty())
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .map(|s| parse_origins(&s))
                .filter(|origins| !origins.is_empty())
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    Router::new()
        // Admin session
        .route("/api/admin/login", post(routes::auth::login))
        .route("/api/admin/logout", post(routes::auth::logout))
        .route("/api/admin/verify-session", get(routes::auth::verify_session))
        // Admin content and site settings
        .route(
            "/api/admin/content",
            get(routes::content::get_content)
                .post(routes::content::post_content)
                .delete(routes::content::delete_content),
        )
        .route(
            "/api/admin/initialize-content",
            post(routes::content::initialize_content),
        )
        .route(
            "/api/admin/config",
            get(routes::site::get_config).post(routes::site::save_config),
        )
        .route(
            "/api/admin/theme",
            get(routes::site::get_theme).post(routes::site::set_theme),
        )
        // Public site reads
        .route("/api/public/content", get(routes::public::get_content))
        .route("/api/public/theme", get(routes::public::get_theme))
        .route(
            "/api/public/admin-overrides.css",
            get(routes::public::get_css_overrides),
        )
        // Lead forms
        .route("/api/submit-form", post(routes::forms::submit_form))
        .route("/api/submit-next-steps", post(routes::forms::submit_next_steps))
        .route("/api/validate-email", post(routes::forms::validate_email))
        // Blueprint pipeline
        .route(
            "/api/receive-blueprint",
            post(routes::blueprint::receive_blueprint),
        )
        .route("/api/get-blueprint", get(routes::blueprint::get_blueprint))
        .route(
            "/api/get-blueprint-page",
            get(routes::blueprint::get_blueprint_page).post(routes::blueprint::post_blueprint_page),
        )
        .route(
            "/api/check-email",
            get(routes::blueprint::check_email_query).post(routes::blueprint::check_email_body),
        )
        .route(
            "/api/handle-duplicate",
            post(routes::blueprint::handle_duplicate),
        )
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/ready", get(routes::health::health_ready))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // Global 2 MB request body cap
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
}

/// Picks PostgreSQL when `DATABASE_URL` is set, else the in-process store.
async fn build_store(config: &AppConfig) -> Result<Arc<dyn KvStore>, sqlx::Error> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!(
            "DATABASE_URL not set. Using in-memory storage; data is lost on restart."
        );
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = db::init_pool(&db::DbConfig::from_env(url)).await?;
    db::run_migrations(&pool).await?;

    let store = PgStore::new(pool);
    match store.purge_expired().await {
        Ok(purged) if purged > 0 => tracing::info!(purged, "expired entries removed"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "failed to purge expired entries"),
    }
    Ok(Arc::new(store))
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Guards must outlive the server or buffered log lines are lost.
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    let _log_guards = logging::init(&environment);

    routes::health::init_start_time();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration, refusing to start");
            std::process::exit(1);
        }
    };

    let store = match build_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize storage");
            std::process::exit(1);
        }
    };

    let app = create_app(AppState::new(config, store));

    // Bind address is configurable via HOST / PORT env vars.
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3001);
    let addr: SocketAddr = match format!("{}:{}", host, port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(host = %host, port, error = %e, "invalid HOST/PORT configuration");
            std::process::exit(1);
        }
    };
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!(error = %e, "server error");
    }
}
