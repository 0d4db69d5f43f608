//! Proactive background token refresh
//!
//! Periodically asks the token manager for a valid token. Inside the refresh
//! window that triggers a refresh; otherwise it is a lock and a timestamp
//! compare. This keeps most refresh latency off the request path.

use std::sync::Arc;
use std::time::Duration;

use qbo_auth::TokenManager;
use tracing::{debug, warn};

/// Spawn a background task that keeps the access token fresh.
///
/// Runs every `interval`. Failures are logged and retried on the next tick;
/// requests still surface their own refresh errors.
///
/// Returns a `JoinHandle` for the spawned task.
pub fn spawn_refresh_task(
    tokens: Arc<TokenManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick; the first request refreshes anyway
        ticker.tick().await;

        loop {
            ticker.tick().await;
            refresh_cycle(&tokens).await;
        }
    })
}

async fn refresh_cycle(tokens: &TokenManager) {
    let before = tokens.refresh_count();
    match tokens.get_valid_token().await {
        Ok(_) if tokens.refresh_count() > before => {
            debug!(realm_id = tokens.realm_id(), "background token refresh succeeded");
        }
        Ok(_) => {}
        Err(e) => {
            warn!(
                realm_id = tokens.realm_id(),
                error = %e,
                "background refresh failed, will retry next cycle"
            );
        }
    }
}
