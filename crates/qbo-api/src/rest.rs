//! QuickBooks Online v3 REST client
//!
//! Thin request/response plumbing: bearer token in, JSON out. No retries and
//! no token handling here; both belong to the gateway.

use reqwest::header::ACCEPT;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::{AccountingApi, ApiError, Entity, Result};

/// REST implementation of `AccountingApi` for one realm.
pub struct RestApi {
    client: reqwest::Client,
    base_url: String,
    realm_id: String,
    minor_version: Option<u32>,
}

impl RestApi {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        realm_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            realm_id: realm_id.into(),
            minor_version: None,
        }
    }

    /// Pin every request to a QBO `minorversion`.
    pub fn with_minor_version(mut self, minor_version: Option<u32>) -> Self {
        self.minor_version = minor_version;
        self
    }

    fn company_url(&self, resource: &str) -> String {
        format!("{}/v3/company/{}/{}", self.base_url, self.realm_id, resource)
    }

    fn minor_version_param(&self) -> Vec<(&'static str, String)> {
        self.minor_version
            .map(|v| vec![("minorversion", v.to_string())])
            .unwrap_or_default()
    }

    async fn run_query(&self, token: &str, query: &str) -> Result<Vec<Value>> {
        let request = self
            .client
            .get(self.company_url("query"))
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .query(&[("query", query)])
            .query(&self.minor_version_param());

        let body = send_json(request).await?;
        let entities = query_entities(&body)?;
        debug!(
            realm_id = %self.realm_id,
            matched = entities.len(),
            "query completed"
        );
        Ok(entities)
    }

    async fn run_create(&self, token: &str, entity: &Entity) -> Result<Value> {
        let kind = entity.kind();
        let request = self
            .client
            .post(self.company_url(kind.as_str()))
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .query(&self.minor_version_param())
            .json(entity);

        let mut body = send_json(request).await?;
        debug!(realm_id = %self.realm_id, entity = %kind, "entity created");
        let created = body.get_mut(kind.response_key()).map(Value::take);
        Ok(created.unwrap_or(body))
    }
}

impl AccountingApi for RestApi {
    fn id(&self) -> &str {
        "rest"
    }

    fn query<'a>(
        &'a self,
        token: &'a str,
        query: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Value>>> + Send + 'a>> {
        Box::pin(self.run_query(token, query))
    }

    fn create<'a>(
        &'a self,
        token: &'a str,
        entity: &'a Entity,
    ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
        Box::pin(self.run_create(token, entity))
    }
}

/// Send, map non-2xx to `ApiError::Status`, parse the body as JSON.
async fn send_json(request: reqwest::RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ApiError::Decode(e.without_url().to_string()))
}

/// Every array directly under `QueryResponse`, concatenated.
///
/// `SELECT COUNT(*)` responses carry only `totalCount` and yield nothing.
fn query_entities(body: &Value) -> Result<Vec<Value>> {
    let response = body
        .get("QueryResponse")
        .and_then(Value::as_object)
        .ok_or_else(|| ApiError::Decode("missing QueryResponse object".into()))?;

    Ok(response
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .cloned()
        .collect())
}
