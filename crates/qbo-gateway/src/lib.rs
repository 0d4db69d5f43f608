//! Authenticated access to the QuickBooks Online API
//!
//! Wraps an `AccountingApi` with the token lifecycle from `qbo-auth`. Every
//! call gets a valid token first; a downstream authentication failure forces
//! a refresh and the call is retried exactly once.
//!
//! Request lifecycle:
//! 1. Caller hands `ApiGateway::execute` a `DownstreamOperation`
//! 2. Gateway asks `TokenManager` for a valid token (refreshing if needed)
//! 3. Downstream answers 401 → `force_expire`, fresh token, one retry
//! 4. Any other failure, or a second 401, goes back to the caller as is
//! 5. Optionally a background task keeps the token warm between requests

pub mod classify;
pub mod error;
pub mod gateway;
pub mod operation;
pub mod refresh;

pub use classify::{Classification, classify};
pub use error::{Error, Result};
pub use gateway::ApiGateway;
pub use operation::{DownstreamOperation, TOKEN_CHECK_QUERY};
pub use refresh::spawn_refresh_task;
