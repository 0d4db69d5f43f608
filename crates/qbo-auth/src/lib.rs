//! OAuth2 credential lifecycle for QuickBooks Online
//!
//! Holds the single access/refresh token pair the gateway uses and keeps it
//! valid. There is no authorization-code flow here: the process starts from an
//! already-issued refresh token and only ever renews it.
//!
//! Credential flow:
//! 1. `main` builds a `ClientIdentity` and a `TokenManager` from config
//! 2. Every downstream call asks `TokenManager::get_valid_token()` first
//! 3. Inside the 5-minute window the manager calls `token::refresh_token()`
//! 4. A 401 from downstream makes the gateway call `TokenManager::force_expire()`

pub mod constants;
pub mod error;
pub mod identity;
pub mod manager;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use identity::ClientIdentity;
pub use manager::{TokenManager, TokenStatus};
pub use token::{RefreshOutcome, basic_authorization, refresh_token};
