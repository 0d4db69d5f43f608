//! The downstream calls the gateway knows how to run

use qbo_api::{AccountingApi, Entity};
use serde_json::Value;

/// Cheapest query that still needs a valid token.
pub const TOKEN_CHECK_QUERY: &str = "SELECT COUNT(*) FROM CompanyInfo";

/// One downstream call, replayable with a different token.
#[derive(Debug, Clone, PartialEq)]
pub enum DownstreamOperation {
    Query(String),
    Create(Entity),
}

impl DownstreamOperation {
    pub fn token_check() -> Self {
        Self::Query(TOKEN_CHECK_QUERY.to_string())
    }

    /// Label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::Create(_) => "create",
        }
    }

    /// Issue the call once. Queries return their rows as a JSON array.
    pub async fn run(&self, api: &dyn AccountingApi, token: &str) -> qbo_api::Result<Value> {
        match self {
            Self::Query(query) => api.query(token, query).await.map(Value::Array),
            Self::Create(entity) => api.create(token, entity).await,
        }
    }
}
