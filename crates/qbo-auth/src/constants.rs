//! Intuit OAuth constants and token lifetime policy

/// Intuit's OAuth2 token endpoint, used for refresh-token grants.
pub const INTUIT_TOKEN_ENDPOINT: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// A token expiring within this many seconds is refreshed before it is handed out.
/// Covers clock skew plus the latency of the downstream call that will carry it.
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// `force_expire` backdates the expiry by this much so no clock jitter can
/// make the token look fresh again.
pub const FORCE_EXPIRE_SKEW_SECS: i64 = 60;
