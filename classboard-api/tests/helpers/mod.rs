//! Shared fixtures for classboard-api integration tests
//!
//! The app runs against an in-memory SQLite store and a stub vision model
//! that answers with canned text.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use classboard_api::store::{ObjectStore, SqliteStore, Store};
use classboard_api::vision::{InlineImage, VisionError, VisionModel, VisionResult};
use classboard_api::{build_router, AppState, ServiceSettings};
use classboard_common::config::UploadLimits;
use classboard_common::time::zone_offset;
use classboard_common::OwnerId;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

pub const OWNER: &str = "797281cf-9397-4fca-b983-300825cde186";
pub const OTHER_OWNER: &str = "3f0c5b8e-1d2a-4c6b-9e7f-0a1b2c3d4e5f";

/// Smallest byte prefix that sniffs as PNG
pub const PNG: [u8; 16] = [
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

pub fn owner() -> OwnerId {
    OWNER.parse().unwrap()
}

pub fn other_owner() -> OwnerId {
    OTHER_OWNER.parse().unwrap()
}

/// Vision model returning a fixed reply (or a fixed failure)
pub struct StubVision {
    reply: Result<String, String>,
    calls: AtomicUsize,
    last_image: Mutex<Option<InlineImage>>,
}

impl StubVision {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_image(&self) -> Option<InlineImage> {
        self.last_image.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for StubVision {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, _prompt: &str, image: &InlineImage) -> VisionResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image.clone());
        self.reply
            .clone()
            .map_err(|message| VisionError::Api(503, message))
    }
}

pub async fn memory_store() -> Arc<SqliteStore> {
    // One connection: each connection to sqlite::memory: is its own database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");
    Arc::new(SqliteStore::from_pool(pool).await.expect("Should create tables"))
}

/// Router plus handles on what sits behind it
pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub vision: Arc<StubVision>,
}

impl TestApp {
    pub async fn new(vision: Arc<StubVision>) -> Self {
        Self::with_limits(vision, UploadLimits::default()).await
    }

    pub async fn with_limits(vision: Arc<StubVision>, uploads: UploadLimits) -> Self {
        let store = memory_store().await;
        let state = AppState::new(
            store.clone() as Arc<dyn Store>,
            store.clone() as Arc<dyn ObjectStore>,
            vision.clone() as Arc<dyn VisionModel>,
            ServiceSettings {
                default_owner: owner(),
                zone: zone_offset(180).unwrap(),
                uploads,
            },
        );

        Self {
            router: build_router(state),
            store,
            vision,
        }
    }

    /// Send a request, return status and JSON body (Null when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, extract_json(response.into_body()).await)
    }
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bytes_request(uri: &str, content_type: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(bytes))
        .unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Model reply with one Monday 09:00-10:00 class
pub fn monday_reply() -> String {
    serde_json::json!([{
        "course_code": "101",
        "course_name_arabic": "تفاضل وتكامل",
        "course_name_english": "Calculus",
        "day_number": 2,
        "start_time": "09:00",
        "end_time": "10:00",
        "building": "02",
        "floor": "2",
        "wing": "A",
        "room": "320",
        "instructor_name": "د. سارة"
    }])
    .to_string()
}
