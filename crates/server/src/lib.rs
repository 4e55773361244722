//! Avatar Agent Server
//!
//! HTTP control surface for one avatar conversation session: start,
//! stop, message submission, microphone toggling and transcript
//! retrieval.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;

use avatar_agent_session::SessionError;
use axum::http::StatusCode;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::Session(SessionError::NotActive) => StatusCode::CONFLICT,
            ServerError::Session(SessionError::InvalidState(_)) => StatusCode::CONFLICT,
            ServerError::Session(SessionError::StoppedWhileStarting) => StatusCode::CONFLICT,
            ServerError::Session(SessionError::RequestInFlight) => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Session(SessionError::Recognition(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Session(_) => StatusCode::BAD_GATEWAY,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
