//! Error types for gateway operations

use qbo_api::ApiError;

/// Errors from gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No valid token could be obtained. Nothing was sent downstream.
    #[error("token refresh failed: {0}")]
    Refresh(#[from] qbo_auth::Error),

    /// Still unauthorized after one forced refresh and retry.
    #[error("unauthorized after token refresh: {0}")]
    Auth(ApiError),

    #[error("Unsupported entity type: {0}")]
    UnsupportedEntity(String),

    /// Any other downstream failure, passed through unmodified.
    #[error("{0}")]
    Downstream(ApiError),
}

impl Error {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Error::Refresh(_) => "refresh_error",
            Error::Auth(_) => "auth_error",
            Error::UnsupportedEntity(_) => "unsupported_entity",
            Error::Downstream(_) => "downstream_error",
        }
    }
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downstream_error_is_transparent() {
        let err = Error::Downstream(ApiError::Status {
            status: 400,
            body: "ValidationFault".into(),
        });
        assert_eq!(err.to_string(), "downstream returned 400: ValidationFault");
        assert_eq!(err.label(), "downstream_error");
    }

    #[test]
    fn refresh_error_converts_from_auth_crate() {
        let err: Error = qbo_auth::Error::Http("connection refused".into()).into();
        assert!(matches!(err, Error::Refresh(_)));
        assert!(err.to_string().starts_with("token refresh failed:"), "got: {err}");
    }
}
