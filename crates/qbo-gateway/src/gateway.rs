//! Token-aware execution of downstream operations
//!
//! At most two attempts per operation. The second attempt only happens after
//! a downstream authentication failure, and only after the token manager has
//! been forced to refresh. The refresh for the retry is ordered after the
//! failing call and before the retried one.

use std::sync::Arc;

use qbo_api::{AccountingApi, ApiError, Entity, EntityKind};
use qbo_auth::TokenManager;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::classify::{Classification, classify};
use crate::error::{Error, Result};
use crate::operation::DownstreamOperation;

/// Runs downstream operations with a valid token, recovering once from a
/// rejected token.
pub struct ApiGateway {
    api: Arc<dyn AccountingApi>,
    tokens: Arc<TokenManager>,
}

impl ApiGateway {
    pub fn new(api: Arc<dyn AccountingApi>, tokens: Arc<TokenManager>) -> Self {
        Self { api, tokens }
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Run `operation`, retrying exactly once after a downstream 401.
    pub async fn execute(&self, operation: &DownstreamOperation) -> Result<Value> {
        let result = self.execute_with_retry(operation).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.label(),
        };
        metrics::counter!(
            "qbo_gateway_operations_total",
            "operation" => operation.name(),
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    async fn execute_with_retry(&self, operation: &DownstreamOperation) -> Result<Value> {
        let token = self.tokens.get_valid_token().await?;
        let err = match operation.run(self.api.as_ref(), &token).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if classify(&err) != Classification::Authentication {
            debug!(
                api = self.api.id(),
                operation = operation.name(),
                error = %err,
                "downstream call failed, not retrying"
            );
            return Err(Error::Downstream(err));
        }

        warn!(
            api = self.api.id(),
            operation = operation.name(),
            realm_id = self.tokens.realm_id(),
            error = %err,
            "downstream rejected access token, forcing refresh and retrying once"
        );
        metrics::counter!("qbo_gateway_auth_retries_total").increment(1);
        self.tokens.force_expire().await;

        let token = self.tokens.get_valid_token().await?;
        operation
            .run(self.api.as_ref(), &token)
            .await
            .map_err(into_final_error)
    }

    /// Run a QBO query statement. Returns a JSON array of matched entities.
    pub async fn query(&self, query: &str) -> Result<Value> {
        self.execute(&DownstreamOperation::Query(query.to_string()))
            .await
    }

    /// Create an entity of the named type from a loose JSON payload.
    ///
    /// The type is resolved before any token or network work, so an unknown
    /// type costs nothing.
    pub async fn create(&self, entity_type: &str, payload: &Map<String, Value>) -> Result<Value> {
        let kind: EntityKind = entity_type
            .parse()
            .map_err(|e: qbo_api::UnsupportedEntity| Error::UnsupportedEntity(e.0))?;
        let entity = Entity::from_payload(kind, payload);
        self.execute(&DownstreamOperation::Create(entity)).await
    }

    /// Push a token round trip through the normal path using the token-check query.
    pub async fn force_refresh(&self) -> Result<Value> {
        self.execute(&DownstreamOperation::token_check()).await
    }
}

fn into_final_error(err: ApiError) -> Error {
    match classify(&err) {
        Classification::Authentication => Error::Auth(err),
        Classification::Other => Error::Downstream(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Secret;
    use qbo_auth::ClientIdentity;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake downstream that replays scripted replies in order and records the
    /// token each call carried.
    struct ScriptedApi {
        replies: Mutex<VecDeque<qbo_api::Result<Value>>>,
        tokens_seen: Mutex<Vec<String>>,
        entities_seen: Mutex<Vec<Entity>>,
    }

    impl ScriptedApi {
        fn new(replies: Vec<qbo_api::Result<Value>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                tokens_seen: Mutex::new(Vec::new()),
                entities_seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.tokens_seen.lock().unwrap().len()
        }

        fn next(&self, token: &str) -> qbo_api::Result<Value> {
            self.tokens_seen.lock().unwrap().push(token.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unscripted downstream call with token {token}"))
        }
    }

    impl AccountingApi for ScriptedApi {
        fn id(&self) -> &str {
            "scripted"
        }

        fn query<'a>(
            &'a self,
            token: &'a str,
            _query: &'a str,
        ) -> Pin<Box<dyn Future<Output = qbo_api::Result<Vec<Value>>> + Send + 'a>> {
            let reply = self.next(token).map(|v| match v {
                Value::Array(rows) => rows,
                other => vec![other],
            });
            Box::pin(async move { reply })
        }

        fn create<'a>(
            &'a self,
            token: &'a str,
            entity: &'a Entity,
        ) -> Pin<Box<dyn Future<Output = qbo_api::Result<Value>> + Send + 'a>> {
            self.entities_seen.lock().unwrap().push(entity.clone());
            let reply = self.next(token);
            Box::pin(async move { reply })
        }
    }

    fn unauthorized() -> qbo_api::Result<Value> {
        Err(ApiError::Status {
            status: 401,
            body: r#"{"fault":{"error":[{"message":"AuthenticationFailed","code":"3200"}]}}"#
                .into(),
        })
    }

    /// Token endpoint that issues T1, T2, ... on successive refreshes, or
    /// always fails with `fail_status` when given.
    async fn start_token_endpoint(fail_status: Option<u16>) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/token",
            axum::routing::post(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    match fail_status {
                        Some(status) => (
                            axum::http::StatusCode::from_u16(status).unwrap(),
                            axum::Json(json!({"error": "invalid_grant"})),
                        ),
                        None => (
                            axum::http::StatusCode::OK,
                            axum::Json(json!({"access_token": format!("T{n}"), "expires_in": 3600})),
                        ),
                    }
                }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/token"), hits)
    }

    fn token_manager(token_endpoint: &str) -> Arc<TokenManager> {
        Arc::new(TokenManager::new(
            ClientIdentity::new(
                "client-abc",
                Secret::new("secret-xyz".into()),
                token_endpoint,
                "9130350000000000",
            ),
            reqwest::Client::new(),
            Secret::new("T0".into()),
            Secret::new("R1".into()),
        ))
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let (url, hits) = start_token_endpoint(None).await;
        let api = ScriptedApi::new(vec![Ok(json!([{"Id": "1"}]))]);
        let gateway = ApiGateway::new(api.clone(), token_manager(&url));

        let rows = gateway.query("SELECT * FROM Customer").await.unwrap();

        assert_eq!(rows, json!([{"Id": "1"}]));
        assert_eq!(api.calls(), 1);
        // Unknown initial expiry: exactly the one startup refresh
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_failure_then_success_retries_once_with_new_token() {
        let (url, hits) = start_token_endpoint(None).await;
        let api = ScriptedApi::new(vec![unauthorized(), Ok(json!([{"Id": "7"}]))]);
        let tokens = token_manager(&url);
        let gateway = ApiGateway::new(api.clone(), tokens.clone());

        let rows = gateway.query("SELECT * FROM Item").await.unwrap();

        assert_eq!(rows, json!([{"Id": "7"}]));
        assert_eq!(api.calls(), 2);
        assert_eq!(*api.tokens_seen.lock().unwrap(), vec!["T1", "T2"]);
        // One initial refresh plus exactly one forced refresh
        assert_eq!(tokens.refresh_count(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn auth_failure_twice_returns_second_failure_without_third_attempt() {
        let (url, _hits) = start_token_endpoint(None).await;
        let second = ApiError::Status {
            status: 401,
            body: "still rejected".into(),
        };
        let api = ScriptedApi::new(vec![unauthorized(), Err(second)]);
        let tokens = token_manager(&url);
        let gateway = ApiGateway::new(api.clone(), tokens.clone());

        let err = gateway.query("SELECT * FROM Item").await.unwrap_err();

        match err {
            Error::Auth(ApiError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "still rejected");
            }
            other => panic!("expected Auth, got {other:?}"),
        }
        assert_eq!(api.calls(), 2);
        assert_eq!(tokens.refresh_count(), 2);
    }

    #[tokio::test]
    async fn unreachable_rest_api_is_downstream_without_forced_refresh() {
        let (url, _hits) = start_token_endpoint(None).await;
        let tokens = token_manager(&url);
        let api = Arc::new(qbo_api::RestApi::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            "9130354010000000",
        ));
        let gateway = ApiGateway::new(api, tokens.clone());

        let err = gateway
            .query("SELECT * FROM Invoice WHERE DocNumber = '1401'")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Downstream(ApiError::Transport(_))), "got: {err:?}");
        assert_eq!(tokens.refresh_count(), 1);
    }

    #[tokio::test]
    async fn non_auth_failure_is_not_retried() {
        let (url, _hits) = start_token_endpoint(None).await;
        let api = ScriptedApi::new(vec![Err(ApiError::Status {
            status: 500,
            body: "Internal Server Error".into(),
        })]);
        let tokens = token_manager(&url);
        let gateway = ApiGateway::new(api.clone(), tokens.clone());

        let err = gateway.query("SELECT * FROM Item").await.unwrap_err();

        assert!(
            matches!(err, Error::Downstream(ApiError::Status { status: 500, .. })),
            "got: {err:?}"
        );
        assert_eq!(api.calls(), 1);
        assert_eq!(tokens.refresh_count(), 1);
    }

    #[tokio::test]
    async fn auth_then_other_failure_is_downstream() {
        let (url, _hits) = start_token_endpoint(None).await;
        let api = ScriptedApi::new(vec![
            unauthorized(),
            Err(ApiError::Transport("connection reset".into())),
        ]);
        let gateway = ApiGateway::new(api.clone(), token_manager(&url));

        let err = gateway.query("SELECT * FROM Item").await.unwrap_err();
        assert!(matches!(err, Error::Downstream(ApiError::Transport(_))), "got: {err:?}");
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn unsupported_entity_fails_before_any_network_call() {
        // Unreachable token endpoint: a refresh attempt would surface as Refresh
        let tokens = token_manager("http://127.0.0.1:1/token");
        let api = ScriptedApi::new(vec![]);
        let gateway = ApiGateway::new(api.clone(), tokens.clone());

        let err = gateway.create("vendor", &Map::new()).await.unwrap_err();

        assert!(matches!(err, Error::UnsupportedEntity(ref t) if t == "vendor"), "got: {err:?}");
        assert_eq!(err.to_string(), "Unsupported entity type: vendor");
        assert_eq!(api.calls(), 0);
        assert_eq!(tokens.refresh_count(), 0);
    }

    #[tokio::test]
    async fn create_maps_payload_for_resolved_kind() {
        let (url, _hits) = start_token_endpoint(None).await;
        let api = ScriptedApi::new(vec![Ok(json!({"Id": "58"}))]);
        let gateway = ApiGateway::new(api.clone(), token_manager(&url));
        let mut payload = Map::new();
        payload.insert("customerId".into(), json!("12"));

        let created = gateway.create("INVOICE", &payload).await.unwrap();

        assert_eq!(created, json!({"Id": "58"}));
        let entities = api.entities_seen.lock().unwrap();
        assert_eq!(entities[0].kind(), EntityKind::Invoice);
        assert_eq!(
            serde_json::to_value(&entities[0]).unwrap(),
            json!({"CustomerRef": {"value": "12"}})
        );
    }

    #[tokio::test]
    async fn refresh_failure_sends_nothing_downstream() {
        let (url, _hits) = start_token_endpoint(Some(400)).await;
        let api = ScriptedApi::new(vec![]);
        let gateway = ApiGateway::new(api.clone(), token_manager(&url));

        let err = gateway.query("SELECT * FROM Item").await.unwrap_err();

        assert!(
            matches!(err, Error::Refresh(qbo_auth::Error::InvalidGrant { status: 400, .. })),
            "got: {err:?}"
        );
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn force_refresh_runs_token_check_query() {
        let (url, _hits) = start_token_endpoint(None).await;
        let api = ScriptedApi::new(vec![Ok(json!([]))]);
        let tokens = token_manager(&url);
        let gateway = ApiGateway::new(api.clone(), tokens.clone());

        let rows = gateway.force_refresh().await.unwrap();

        assert_eq!(rows, json!([]));
        assert_eq!(api.calls(), 1);
        assert!(tokens.expires_at().await.is_some());
    }
}
