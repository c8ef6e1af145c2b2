//! Error types for the warden core
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Core Error Enum ==
/// Unified error type for the scheduler, cache, router and relay. Custom id
/// decode failures stay inside the router as `ActionDecodeError`; they are
/// user input, not system faults.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage read or conditional update failed
    #[error("storage error: {0}")]
    Storage(String),

    /// A cache fetcher rejected; carried to every coalesced caller
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Relay transport failure (send, connect, or frame encoding)
    #[error("relay error: {0}")]
    Relay(String),

    /// A domain manager rejected an interaction
    #[error("interaction error: {0}")]
    Interaction(String),

    /// Guild is not served by this relay instance
    #[error("guild not allowed: {0}")]
    GuildNotAllowed(String),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::GuildNotAllowed(_) => StatusCode::FORBIDDEN,
            CoreError::Storage(_) | CoreError::Fetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the warden core.
pub type Result<T> = std::result::Result<T, CoreError>;
