//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::app::AppState;
use crate::game::admin::{valid_event_name, AdminAction};
use crate::game::GameInput;
use crate::http::middleware::{require_admin_signature, SIGNATURE_HEADER};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let signature = HeaderName::from_static(SIGNATURE_HEADER);
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, signature]);

    // CLIENT_ORIGIN is comma separated, or `*` for any origin
    let cors = if state.config.client_origin.trim() == "*" {
        cors.allow_origin(Any)
    } else {
        let allowed_origins: Vec<header::HeaderValue> = state
            .config
            .client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();
        cors.allow_origin(allowed_origins)
    };

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Operator routes, signed with ADMIN_SECRET
    let admin_routes = Router::new()
        .route("/admin/event", post(client_event_handler))
        .route("/admin/shutdown", post(shutdown_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_signature,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    players: usize,
    resources: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        players: state.game.player_count(),
        resources: state.game.resource_count(),
    })
}

// ============================================================================
// Admin endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClientEventRequest {
    name: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ShutdownRequest {
    #[serde(default = "default_shutdown_reason")]
    reason: String,
}

fn default_shutdown_reason() -> String {
    "server restarting".to_string()
}

#[derive(Debug, Serialize)]
struct AdminResponse {
    status: &'static str,
    recipients: usize,
}

async fn client_event_handler(
    State(state): State<AppState>,
    Json(req): Json<ClientEventRequest>,
) -> Result<Json<AdminResponse>, AppError> {
    if !valid_event_name(&req.name) {
        return Err(AppError::BadRequest(
            "event name must be 1-32 of [A-Za-z0-9_]".to_string(),
        ));
    }

    info!(event = %req.name, "Admin client event");
    dispatch(
        &state,
        AdminAction::ClientEvent {
            name: req.name,
            params: req.params,
        },
    )
    .await
}

async fn shutdown_handler(
    State(state): State<AppState>,
    Json(req): Json<ShutdownRequest>,
) -> Result<Json<AdminResponse>, AppError> {
    info!(reason = %req.reason, "Admin disconnect of all players");
    dispatch(&state, AdminAction::Shutdown { reason: req.reason }).await
}

async fn dispatch(state: &AppState, action: AdminAction) -> Result<Json<AdminResponse>, AppError> {
    let recipients = state.game.player_count();
    if !state.game.send(GameInput::Admin(action)).await {
        return Err(AppError::Unavailable);
    }

    Ok(Json(AdminResponse {
        status: "ok",
        recipients,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Simulation is not running")]
    Unavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
