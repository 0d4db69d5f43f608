//! Refresh-token grant against the Intuit token endpoint
//!
//! One request shape: `POST` a form with `grant_type=refresh_token`, client
//! credentials in a Basic `Authorization` header. The endpoint may or may not
//! rotate the refresh token, and may omit `expires_in`; both cases are
//! reflected as `Option`s on `RefreshOutcome`.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use crate::constants::DEFAULT_EXPIRES_IN_SECS;
use crate::error::{Error, Result};
use crate::identity::ClientIdentity;

/// Parsed body of a successful refresh.
///
/// Unknown fields (`token_type`, `x_refresh_token_expires_in`, ...) are ignored.
#[derive(Deserialize)]
pub struct RefreshOutcome {
    pub access_token: String,
    /// Present only when the provider rotated the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl RefreshOutcome {
    /// Token lifetime, falling back to one hour when the endpoint did not say.
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
    }
}

impl fmt::Debug for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshOutcome")
            .field("access_token", &"[REDACTED]")
            .field("refresh_rotated", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// `Basic base64(client_id:client_secret)` for the token endpoint.
pub fn basic_authorization(identity: &ClientIdentity) -> String {
    let pair = format!(
        "{}:{}",
        identity.client_id(),
        identity.client_secret().expose()
    );
    format!("Basic {}", STANDARD.encode(pair))
}

/// Exchange the current refresh token for a new access token.
///
/// Any 2xx with a parsable body and a non-empty `access_token` is success.
/// The caller owns the credential and decides what to replace.
pub async fn refresh_token(
    client: &reqwest::Client,
    identity: &ClientIdentity,
    refresh: &str,
) -> Result<RefreshOutcome> {
    let response = client
        .post(identity.token_endpoint())
        .header(AUTHORIZATION, basic_authorization(identity))
        .header(ACCEPT, "application/json")
        .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh)])
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // invalid_grant / invalid_client come back as 400 or 401
        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(Error::InvalidGrant {
                status: status.as_u16(),
                body,
            });
        }

        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }

    let outcome = response
        .json::<RefreshOutcome>()
        .await
        .map_err(|e| Error::InvalidResponse(e.to_string()))?;

    if outcome.access_token.is_empty() {
        return Err(Error::InvalidResponse("access_token is empty".into()));
    }

    Ok(outcome)
}
