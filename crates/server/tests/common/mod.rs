//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock collaborators injected, so handlers can be exercised without
//! a ServiceNow instance or a database file.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use snowdash_core::{
    config::{DatabaseConfig, ServerConfig},
    testing::{MockDurableCache, MockSourceOfTruth},
    BroadcastChangeBus, ChangeBus, ChangeBusConfig, Config, DataOrchestrator, DurableCache,
    FreshnessConfig, FreshnessPolicy, OrchestratorConfig, ServiceNowConfig, SourceOfTruth,
};
use snowdash_server::state::AppState;

/// Re-export fixtures for test convenience
pub use snowdash_core::testing::fixtures;

/// Test fixture for API testing with mock collaborators.
///
/// Provides an in-process router with fully controllable mocks for:
/// - Durable cache (MockDurableCache)
/// - Source of truth (MockSourceOfTruth)
///
/// The change bus is a real in-process BroadcastChangeBus so tests can subscribe.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock durable cache - seed entries, inject failures
    pub cache: Arc<MockDurableCache>,
    /// Mock source of truth - configure records, inject failures
    pub source: Arc<MockSourceOfTruth>,
    /// Change bus shared with the orchestrator
    pub bus: Arc<BroadcastChangeBus>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub async fn new() -> Self {
        Self::with_cache_config(OrchestratorConfig::default()).await
    }

    /// Create a test fixture with custom orchestrator settings.
    pub async fn with_cache_config(cache_config: OrchestratorConfig) -> Self {
        let cache = Arc::new(MockDurableCache::new());
        let source = Arc::new(MockSourceOfTruth::new());
        let bus = Arc::new(BroadcastChangeBus::new(64));

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig::default(),
            servicenow: ServiceNowConfig {
                instance_url: "https://example.service-now.com".to_string(),
                username: "svc-dashboard".to_string(),
                password: "hunter2".to_string(),
                timeout_secs: 30,
                include_slas: true,
            },
            cache: cache_config.clone(),
            freshness: FreshnessConfig::default(),
            change_bus: ChangeBusConfig::default(),
        };

        let orchestrator = Arc::new(DataOrchestrator::new(
            Arc::clone(&cache) as Arc<dyn DurableCache>,
            Arc::clone(&source) as Arc<dyn SourceOfTruth>,
            Some(Arc::clone(&bus) as Arc<dyn ChangeBus>),
            FreshnessPolicy::new(config.freshness.clone()),
            cache_config,
        ));

        let state = Arc::new(AppState::new(config, orchestrator, Some(Arc::clone(&bus))));
        let router = snowdash_server::api::create_router(state);

        Self {
            router,
            cache,
            source,
            bus,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
