//! HTTP-facing error type
//!
//! Every failure on the QuickBooks routes becomes `400 {"error": "..."}`,
//! with the message prefixed by the action that failed.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

/// The route-level action a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Query,
    Create,
    Refresh,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Query => "Failed to execute query",
            Action::Create => "Failed to create entity",
            Action::Refresh => "Failed to refresh token",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The gateway returned an error.
    #[error("{action}: {source}")]
    Gateway {
        action: Action,
        source: qbo_gateway::Error,
    },

    /// The request body could not be understood.
    #[error("{action}: {message}")]
    InvalidRequest { action: Action, message: String },
}

impl Error {
    pub fn gateway(action: Action, source: qbo_gateway::Error) -> Self {
        Self::Gateway { action, source }
    }

    pub fn invalid_request(action: Action, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            action,
            message: message.into(),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Gateway { source, .. } => source.label(),
            Error::InvalidRequest { .. } => "invalid_request",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.to_string();
        warn!(kind = self.kind(), error = %message, "request failed");
        (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

/// Result alias for route handlers
pub type Result<T> = std::result::Result<T, Error>;
