//! HTTP route definitions

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::is_valid_path;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - `*` or a comma-separated origin list in CLIENT_ORIGIN
    let cors = if state.config.client_origin.trim() == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let allowed_origins: Vec<header::HeaderValue> = state
            .config
            .client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/entries", get(entries_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    server_time: chrono::DateTime<chrono::Utc>,
    entries: usize,
    players: usize,
    sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        server_time: chrono::Utc::now(),
        entries: state.relay.len(),
        players: state.relay.count_under(crate::sync::protocol::PLAYERS_PATH),
        sessions: state.relay.session_count(),
    })
}

// ============================================================================
// Store inspection
// ============================================================================

#[derive(Deserialize)]
struct EntriesQuery {
    prefix: String,
}

#[derive(Serialize)]
struct EntriesResponse {
    prefix: String,
    entries: Vec<Entry>,
}

#[derive(Serialize)]
struct Entry {
    key: String,
    value: Value,
}

/// Current entries under a prefix, in key order
async fn entries_handler(
    State(state): State<AppState>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<EntriesResponse>, AppError> {
    if !is_valid_path(&query.prefix) {
        return Err(AppError::BadRequest(format!(
            "invalid prefix: {:?}",
            query.prefix
        )));
    }

    let entries = state
        .relay
        .entries_under(&query.prefix)
        .into_iter()
        .map(|(key, value)| Entry { key, value })
        .collect();

    Ok(Json(EntriesResponse {
        prefix: query.prefix,
        entries,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
