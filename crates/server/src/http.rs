//! HTTP Endpoints
//!
//! REST API over the session controller. Session state rules surface as
//! HTTP statuses: start while active and messages without a session are
//! conflicts, an overlapping message is too-many-requests.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::state::AppState;
use crate::ServerError;
use avatar_agent_core::{ChatEntry, SessionState};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/session/start", post(start_session))
        .route("/api/session/stop", post(stop_session))
        .route("/api/session/message", post(submit_message))
        .route("/api/session/listen", post(toggle_listening))
        .route("/api/session/transcript", get(get_transcript))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from(&self);
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: Option<Uuid>,
    state: SessionState,
    timestamp: DateTime<Utc>,
}

impl SessionResponse {
    fn current(state: &AppState) -> Self {
        Self {
            session_id: state.controller.session_id(),
            state: state.controller.state(),
            timestamp: Utc::now(),
        }
    }
}

async fn start_session(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    state.controller.start().await?;
    Ok(Json(SessionResponse::current(&state)))
}

async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.stop().await;
    Json(SessionResponse::current(&state))
}

#[derive(Deserialize)]
struct MessageRequest {
    text: String,
}

async fn submit_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<impl IntoResponse, ServerError> {
    if request.text.trim().is_empty() {
        return Err(ServerError::InvalidRequest("empty message".to_string()));
    }
    state.controller.submit(&request.text).await?;
    Ok(Json(TranscriptResponse::current(&state)))
}

#[derive(Serialize)]
struct ListenResponse {
    listening: bool,
    timestamp: DateTime<Utc>,
}

async fn toggle_listening(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let listening = state.controller.toggle_listening()?;
    Ok(Json(ListenResponse {
        listening,
        timestamp: Utc::now(),
    }))
}

#[derive(Serialize)]
struct TranscriptResponse {
    state: SessionState,
    entries: Vec<ChatEntry>,
    timestamp: DateTime<Utc>,
}

impl TranscriptResponse {
    fn current(state: &AppState) -> Self {
        Self {
            state: state.controller.state(),
            entries: state.controller.history(),
            timestamp: Utc::now(),
        }
    }
}

async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    Json(TranscriptResponse::current(&state))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
