//! Router configuration for the Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    delete_file, details, download_file, home, list_files, login, upload_file, AppState,
};
use super::middleware::{create_cors_layer, jwt_auth, login_rate_limit, JwtState, RateLimitState};
use crate::config::Config;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    rate_limit: Arc<RateLimitState>,
    config: &Config,
) -> Router {
    let login_routes = Router::new()
        .route("/login", post(login))
        .route_layer(middleware::from_fn(move |req, next| {
            let state = rate_limit.clone();
            login_rate_limit(state, req, next)
        }));

    let max_upload_bytes = (config.upload.max_upload_size_mb as usize).saturating_mul(1024 * 1024);
    let upload_routes = Router::new()
        .route("/upload", post(upload_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    let file_routes = Router::new()
        .route("/download/:id", get(download_file))
        .route("/delete/:id", delete(delete_file))
        .route("/list", get(list_files))
        .route("/details", get(details));

    Router::new()
        .route("/", get(home))
        .merge(login_routes)
        .merge(upload_routes)
        .merge(file_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&config.server.cors_origins))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
