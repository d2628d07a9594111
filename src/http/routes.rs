//! HTTP route definitions

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::Config;
use crate::game::{GameMode, MatchOptions, MatchSnapshot, RegistryError};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::MatchOptionsRequest;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/matches", post(create_match_handler))
        .route("/matches/:id/snapshot", get(snapshot_handler))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins, any origin when none are configured
fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .client_origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed_origins)
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        active_players: state.match_registry.total_players(),
    })
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Serialize)]
struct CreateMatchResponse {
    match_id: Uuid,
    game_mode: GameMode,
}

/// An empty body creates a match with default options
async fn create_match_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateMatchResponse>), AppError> {
    let request: MatchOptionsRequest = if body.iter().all(u8::is_ascii_whitespace) {
        MatchOptionsRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid match options: {}", e)))?
    };
    let options = MatchOptions::from(request);

    let handle = state
        .match_registry
        .create(options, state.config.tick_rate)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateMatchResponse {
            match_id: handle.id,
            game_mode: handle.options.mode,
        }),
    ))
}

async fn snapshot_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Arc<MatchSnapshot>>, AppError> {
    let handle = state
        .match_registry
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Match {} not found", id)))?;

    Ok(Json(handle.latest_snapshot()))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::TooManyMatches => AppError::Unavailable(e.to_string()),
            RegistryError::MatchClosed => AppError::NotFound(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unavailable(msg) => {
                warn!(error = %msg, "Request refused");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(max_matches: usize) -> AppState {
        let config = Config::from_lookup(|key| match key {
            "MAX_MATCHES" => Some(max_matches.to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(config)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let app = build_router(test_state(4));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_matches"], 0);
    }

    #[tokio::test]
    async fn created_match_serves_snapshot() {
        let state = test_state(4);
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/matches")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"game_mode":"team_deathmatch","kill_limit":10}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["game_mode"], "team_deathmatch");
        let id = created["match_id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::get(format!("/matches/{}/snapshot", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = body_json(response).await;
        assert_eq!(snapshot["room_id"], id.as_str());
        assert_eq!(snapshot["game_mode"], "team_deathmatch");
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let app = build_router(test_state(4));
        let response = app
            .oneshot(
                Request::get(format!("/matches/{}/snapshot", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn malformed_match_options_are_rejected() {
        let state = test_state(4);
        let app = build_router(state.clone());
        let response = app
            .oneshot(
                Request::post("/matches")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"game_mode":"capture_the_flag"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Invalid match options"));
        assert_eq!(state.match_registry.active_matches(), 0);
    }

    #[tokio::test]
    async fn match_cap_returns_unavailable() {
        let app = build_router(test_state(0));
        let response = app
            .oneshot(Request::post("/matches").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
