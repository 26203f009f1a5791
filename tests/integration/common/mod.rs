//! Common test utilities and fixtures for integration tests
//!
//! Every HTTP test runs the full application router against the in-memory store, with the
//! mock gateway and mock LLM service shared with the test so behavior can be scripted and
//! requests inspected.

use std::env;
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use leadline_common::config::Config;
use leadline_gateway::mock::MockGateway;
use leadline_llm::mock::MockLlmService;
use leadline_messaging::MemoryStore;
use serde_json::Value;
use tower::ServiceExt;

static INIT: Once = Once::new();

/// Gateway send timeout used by the test app
pub const SEND_TIMEOUT: Duration = Duration::from_millis(200);

/// Unix timestamp used as the creation time of seeded messages
pub const T0: i64 = 1_700_000_000;

/// Polling for background work (AI enrichment): attempts and the pause between them
const WAIT_ATTEMPTS: usize = 100;
const WAIT_INTERVAL: Duration = Duration::from_millis(20);

/// Database URL for the Postgres-backed tests, if one is configured
pub fn test_database_url() -> Option<String> {
    INIT.call_once(|| {
        dotenvy::from_filename(".env.test").ok();
        dotenvy::dotenv().ok();
    });
    env::var("TEST_DATABASE_URL").ok().filter(|u| !u.is_empty())
}

/// Test application with handles on its collaborators
#[allow(dead_code)]
pub struct TestApp {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub gateway: MockGateway,
    pub llm: MockLlmService,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::in_memory())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = MockGateway::new();
        let llm = MockLlmService::new();

        let router = leadline_app::create_app(
            &config,
            store.clone(),
            Arc::new(gateway.clone()),
            Arc::new(llm.clone()),
            SEND_TIMEOUT,
        );

        Self {
            config,
            store,
            gateway,
            llm,
            router,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Send a request and return the status with the JSON body (`Null` when empty)
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self
            .router()
            .oneshot(json_request(method, uri, body))
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    /// Poll `GET uri` until `done` accepts the body
    pub async fn wait_for(&self, uri: &str, done: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..WAIT_ATTEMPTS {
            let (_, body) = self.get(uri).await;
            if done(&body) {
                return body;
            }
            tokio::time::sleep(WAIT_INTERVAL).await;
        }
        panic!("Timed out waiting on {}", uri);
    }

    /// Poll until `done` holds, e.g. a mock has seen the expected calls
    pub async fn wait_until(&self, what: &str, done: impl Fn() -> bool) {
        for _ in 0..WAIT_ATTEMPTS {
            if done() {
                return;
            }
            tokio::time::sleep(WAIT_INTERVAL).await;
        }
        panic!("Timed out waiting for {}", what);
    }

    /// Post an inbound webhook with a text body
    pub async fn inbound(&self, phone: &str, content: &str, correlation_id: &str, ts: i64) -> (StatusCode, Value) {
        self.post(
            "/v1/webhooks/inbound",
            serde_json::json!({
                "phone": phone,
                "content": content,
                "correlation_id": correlation_id,
                "timestamp": ts,
            }),
        )
        .await
    }

    /// Record an outbound message that was sent elsewhere
    pub async fn outbound(&self, phone: &str, content: &str, correlation_id: &str, ts: i64) -> (StatusCode, Value) {
        self.post(
            "/v1/messages",
            serde_json::json!({
                "phone": phone,
                "content": content,
                "correlation_id": correlation_id,
                "timestamp": ts,
            }),
        )
        .await
    }

    /// Post a delivery-status callback
    pub async fn status(&self, correlation_id: &str, status: &str, ts: i64) -> (StatusCode, Value) {
        self.post(
            "/v1/webhooks/status",
            serde_json::json!({
                "correlation_id": correlation_id,
                "status": status,
                "timestamp": ts,
            }),
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a request with an optional JSON body
pub fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&b).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
