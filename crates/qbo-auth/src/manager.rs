//! Token manager: the single owner of the live credential
//!
//! One `tokio::sync::Mutex` covers the whole "is it fresh? refresh if not,
//! read the token" sequence. Concurrent callers that find the token stale
//! queue on the lock; the first one refreshes and the rest wake up to a fresh
//! credential, so a burst of requests costs at most one token-endpoint call.
//! The lock is held across the refresh round trip, which is why it must be the
//! async mutex and not `std::sync::Mutex`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use common::Secret;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_REFRESH_MARGIN_SECS, FORCE_EXPIRE_SKEW_SECS};
use crate::error::{Error, Result};
use crate::identity::ClientIdentity;
use crate::token::{self, RefreshOutcome};

/// The live token pair.
///
/// `expires_at` is `None` until the first refresh; after that it is the
/// instant past which the access token must not be trusted.
#[derive(Debug)]
struct Credential {
    access_token: Secret<String>,
    refresh_token: Secret<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    fn is_fresh(&self, now: DateTime<Utc>, margin: TimeDelta) -> bool {
        match self.expires_at {
            Some(expires_at) => now + margin < expires_at,
            None => false,
        }
    }

    /// Overwrite from a refresh result. Returns whether the refresh token rotated.
    fn apply(&mut self, outcome: RefreshOutcome, expires_at: DateTime<Utc>) -> bool {
        self.access_token.replace(outcome.access_token);
        let rotated = match outcome.refresh_token {
            Some(refresh) if !refresh.is_empty() => {
                self.refresh_token.replace(refresh);
                true
            }
            _ => false,
        };
        self.expires_at = Some(expires_at);
        rotated
    }
}

/// Point-in-time view of the credential's expiry, for status reporting.
#[derive(Debug, Clone, Copy)]
pub struct TokenStatus {
    pub expires_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

impl TokenStatus {
    /// Unknown expiry is reported as not expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| self.checked_at > expires_at)
    }

    /// Whole minutes left, truncated toward zero. Negative once expired.
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expires_at
            .map(|expires_at| (expires_at - self.checked_at).num_minutes())
    }
}

/// Owns the credential for one realm and hands out valid access tokens.
pub struct TokenManager {
    identity: ClientIdentity,
    http_client: reqwest::Client,
    credential: Mutex<Credential>,
    refresh_margin: TimeDelta,
    refreshes: AtomicU64,
}

impl TokenManager {
    /// Start from the configured token pair with an unknown expiry, so the
    /// first `get_valid_token` refreshes.
    pub fn new(
        identity: ClientIdentity,
        http_client: reqwest::Client,
        access_token: Secret<String>,
        refresh_token: Secret<String>,
    ) -> Self {
        Self::with_refresh_margin(
            identity,
            http_client,
            access_token,
            refresh_token,
            TimeDelta::seconds(DEFAULT_REFRESH_MARGIN_SECS),
        )
    }

    pub fn with_refresh_margin(
        identity: ClientIdentity,
        http_client: reqwest::Client,
        access_token: Secret<String>,
        refresh_token: Secret<String>,
        refresh_margin: TimeDelta,
    ) -> Self {
        info!(
            realm_id = identity.realm_id(),
            refresh_margin_secs = refresh_margin.num_seconds(),
            "token manager initialized"
        );
        Self {
            identity,
            http_client,
            credential: Mutex::new(Credential {
                access_token,
                refresh_token,
                expires_at: None,
            }),
            refresh_margin,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Return an access token good for at least the refresh margin.
    ///
    /// Refreshes first when the expiry is unknown or inside the margin. A
    /// failed refresh is returned as an error; the old token is never handed
    /// out in its place.
    pub async fn get_valid_token(&self) -> Result<String> {
        let mut credential = self.credential.lock().await;

        if credential.is_fresh(Utc::now(), self.refresh_margin) {
            return Ok(credential.access_token.expose().clone());
        }

        debug!(
            realm_id = self.identity.realm_id(),
            expires_at = ?credential.expires_at,
            "access token unknown or inside refresh window, refreshing"
        );
        self.refresh_locked(&mut credential).await?;
        Ok(credential.access_token.expose().clone())
    }

    /// Mark the current access token expired so the next caller refreshes.
    pub async fn force_expire(&self) {
        let mut credential = self.credential.lock().await;
        credential.expires_at = Some(Utc::now() - TimeDelta::seconds(FORCE_EXPIRE_SKEW_SECS));
        debug!(realm_id = self.identity.realm_id(), "access token marked expired");
    }

    /// Read-only snapshot. Never refreshes.
    pub async fn status(&self) -> TokenStatus {
        let credential = self.credential.lock().await;
        TokenStatus {
            expires_at: credential.expires_at,
            checked_at: Utc::now(),
        }
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.credential.lock().await.expires_at
    }

    pub fn realm_id(&self) -> &str {
        self.identity.realm_id()
    }

    /// Token-endpoint calls issued so far, successful or not.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Caller must hold the credential lock for the whole call.
    async fn refresh_locked(&self, credential: &mut Credential) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let result = token::refresh_token(
            &self.http_client,
            &self.identity,
            credential.refresh_token.expose(),
        )
        .await
        .and_then(|outcome| {
            let expires_at = TimeDelta::from_std(outcome.lifetime())
                .ok()
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .ok_or_else(|| {
                    Error::InvalidResponse(format!(
                        "expires_in out of range: {:?}",
                        outcome.expires_in
                    ))
                })?;
            Ok((outcome, expires_at))
        });

        match result {
            Ok((outcome, expires_at)) => {
                let rotated = credential.apply(outcome, expires_at);
                metrics::counter!("qbo_token_refresh_total", "outcome" => "success").increment(1);
                info!(
                    realm_id = self.identity.realm_id(),
                    expires_at = %expires_at.to_rfc3339(),
                    refresh_token_rotated = rotated,
                    "access token refreshed"
                );
                Ok(())
            }
            Err(e) => {
                metrics::counter!("qbo_token_refresh_total", "outcome" => "failure").increment(1);
                warn!(
                    realm_id = self.identity.realm_id(),
                    status = ?e.status(),
                    error = %e,
                    "access token refresh failed"
                );
                Err(e)
            }
        }
    }
}
