//! OAuth client identity

use common::Secret;

/// Who we are to the authorization server and which company we act on.
///
/// Built once at startup from config and never mutated.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    client_id: String,
    client_secret: Secret<String>,
    token_endpoint: String,
    realm_id: String,
}

impl ClientIdentity {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        token_endpoint: impl Into<String>,
        realm_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            token_endpoint: token_endpoint.into(),
            realm_id: realm_id.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &Secret<String> {
        &self.client_secret
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// QuickBooks company id the tokens are scoped to.
    pub fn realm_id(&self) -> &str {
        &self.realm_id
    }
}
