//! Authentication-failure detection for downstream errors
//!
//! Only an authentication failure earns a forced refresh and retry. A
//! structured HTTP status always decides. A transport error, which never got
//! a status, falls back to looking for "401" in its message. A decode error
//! means the downstream answered 2xx, so it is never an authentication
//! failure.

use qbo_api::ApiError;

/// What the gateway should do with a failed downstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Token rejected: force a refresh and retry once
    Authentication,
    /// Anything else: return to the caller untouched
    Other,
}

pub fn classify_status(status: u16) -> Classification {
    match status {
        401 => Classification::Authentication,
        _ => Classification::Other,
    }
}

pub fn classify(err: &ApiError) -> Classification {
    match (err.status(), err) {
        (Some(status), _) => classify_status(status),
        (None, ApiError::Transport(message)) if message.contains("401") => {
            Classification::Authentication
        }
        (None, _) => Classification::Other,
    }
}
