//! Downstream accounting API abstraction
//!
//! Defines the `AccountingApi` trait that decouples retry orchestration from
//! the transport. `RestApi` talks to the QuickBooks Online v3 REST API; tests
//! substitute scripted fakes behind the same trait.

pub mod entity;
pub mod rest;

pub use entity::{Entity, EntityKind, UnsupportedEntity};
pub use rest::RestApi;

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Errors from a downstream call.
///
/// `Status` carries the structured HTTP status and is what auth-failure
/// classification looks at first. The other two variants only have a message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("downstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("downstream request failed: {0}")]
    Transport(String),

    #[error("invalid downstream response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Structured HTTP status, when the downstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

/// Result alias for downstream operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// One QuickBooks company's accounting API.
///
/// Every call takes the bearer token explicitly; implementations never cache
/// or refresh credentials themselves.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn AccountingApi>`).
pub trait AccountingApi: Send + Sync {
    /// Identifier for logging (e.g. "rest")
    fn id(&self) -> &str;

    /// Run a QBO query statement and return the matched entities.
    fn query<'a>(
        &'a self,
        token: &'a str,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Value>>> + Send + 'a>>;

    /// Create one entity and return it as the downstream stored it.
    fn create<'a>(
        &'a self,
        token: &'a str,
        entity: &'a Entity,
    ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_only_structured_for_status_variant() {
        let err = ApiError::Status {
            status: 401,
            body: "AuthenticationFailed".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(ApiError::Transport("connect refused".into()).status(), None);
        assert_eq!(ApiError::Decode("eof".into()).status(), None);
    }

    #[test]
    fn display_includes_status_and_body() {
        let err = ApiError::Status {
            status: 400,
            body: "ValidationFault".into(),
        };
        assert_eq!(err.to_string(), "downstream returned 400: ValidationFault");
    }
}
