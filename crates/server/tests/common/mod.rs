//! Common test utilities for API testing with a mock telephony line.
//!
//! This module provides a test fixture that creates an in-process router
//! backed by a real campaign engine, a `MockTelephonyLine` and SQLite stores
//! in a temporary directory.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use dialer_core::config::DatabaseConfig;
use dialer_core::testing::MockTelephonyLine;
use dialer_core::{
    ActivityStore, CallSessionController, CampaignConfig, CampaignController, CampaignState,
    Config, DispositionRecorder, SqliteActivityStore, SqliteTargetStore, TargetStore,
};
use dialer_server::api::{create_router, WsBroadcaster};
use dialer_server::state::AppState;

/// Re-export fixtures for test convenience
pub use dialer_core::testing::fixtures;

pub const GRACE: Duration = Duration::from_millis(3000);
pub const SETTLE: Duration = Duration::from_millis(1500);

/// Test fixture for API testing.
///
/// The mock line has no default script, so dialed calls stay in the dialing
/// state until a test scripts them or a disposition ends them.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test(start_paused = true)]
/// async fn test_start() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/campaign/start", json!({
///         "targets": fixtures::targets(3)
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock telephony line - inspect invites, script calls
    pub line: Arc<MockTelephonyLine>,
    /// Handle to the campaign engine behind the router
    pub controller: CampaignController,
    pub activity_store: Arc<dyn ActivityStore>,
    pub target_store: Arc<dyn TargetStore>,
    /// Temporary directory holding the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            campaign: CampaignConfig {
                grace_interval_ms: GRACE.as_millis() as u64,
                settle_delay_ms: SETTLE.as_millis() as u64,
                skip_do_not_call: true,
            },
            ..Default::default()
        };

        // Create stores
        let activity_store: Arc<dyn ActivityStore> = Arc::new(
            SqliteActivityStore::new(&db_path).expect("Failed to create activity store"),
        );
        let target_store: Arc<dyn TargetStore> = Arc::new(
            SqliteTargetStore::new(&db_path).expect("Failed to create target store"),
        );

        // Create campaign engine on the mock line
        let line = Arc::new(MockTelephonyLine::new());
        let session = CallSessionController::new(line.clone());
        let recorder = DispositionRecorder::new(Arc::clone(&activity_store));
        let controller = CampaignController::spawn(
            config.campaign.clone(),
            session,
            recorder,
            Some(Arc::clone(&target_store)),
        );

        let state = Arc::new(AppState::new(
            config,
            controller.clone(),
            Arc::clone(&activity_store),
            Arc::clone(&target_store),
            WsBroadcaster::default(),
        ));

        let router = create_router(state);

        Self {
            router,
            line,
            controller,
            activity_store,
            target_store,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
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

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

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

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Wait until the published campaign state satisfies `predicate`.
    pub async fn wait_for_state(&self, predicate: impl Fn(&CampaignState) -> bool) -> CampaignState {
        let mut rx = self.controller.watch();
        let state = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| predicate(s)))
            .await
            .expect("Timed out waiting for campaign state")
            .expect("Campaign engine stopped")
            .clone();
        state
    }

    /// Wait until the line has received `count` invites.
    pub async fn wait_for_invites(&self, count: usize) {
        for _ in 0..600 {
            if self.line.invite_count().await >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Timed out waiting for {} invites", count);
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
