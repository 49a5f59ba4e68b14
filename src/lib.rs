pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod leaderboard;
pub mod ledger;
pub mod models;
pub mod routes;
pub mod slug;
pub mod visitor;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Config;
use crate::ledger::ViewCounter;
use crate::routes::ApiResponse;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub views: ViewCounter,
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiResponse::<()>::error("Route not found")))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Build the full Axum application router.
///
/// Caller is responsible for running database migrations on `pool` beforehand.
pub fn build_app(pool: SqlitePool, config: &Config) -> Router {
    let state = AppState {
        views: ViewCounter::new(pool.clone()),
        db: pool,
    };

    Router::new()
        .route("/health", get(health))
        .merge(routes::public::router())
        .fallback(not_found)
        .layer(cors_layer(&config.allowed_origins))
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
