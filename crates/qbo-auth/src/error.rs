//! Token refresh errors
//!
//! Every variant means the same thing to callers: no new access token was
//! obtained and the stored credential was left untouched.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token refresh request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// 400/401 from the token endpoint: the refresh token is expired or revoked,
    /// or the client credentials are wrong. Retrying will not help.
    #[error("refresh token rejected ({status}): {body}")]
    InvalidGrant { status: u16, body: String },

    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// HTTP status returned by the token endpoint, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } | Error::InvalidGrant { status, .. } => Some(*status),
            Error::Http(_) | Error::InvalidResponse(_) => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_endpoint_answers() {
        let err = Error::InvalidGrant {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.into(),
        };
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("invalid_grant"));

        assert_eq!(Error::Http("connection refused".into()).status(), None);
    }
}
