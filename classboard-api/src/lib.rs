//! classboard-api library interface
//!
//! Exposes the router and state so integration tests can drive the service
//! without binding a socket.

pub mod api;
pub mod error;
pub mod services;
pub mod store;
pub mod vision;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, FixedOffset, Utc};
use classboard_common::config::UploadLimits;
use classboard_common::OwnerId;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::ScheduleExtractor;
use crate::store::{ObjectStore, Store};
use crate::vision::VisionModel;

/// Bodies up to this much over the largest upload ceiling still reach
/// upload validation; larger ones are cut off with 413
const BODY_LIMIT_HEADROOM: u64 = 1024 * 1024;

/// Values fixed at startup
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Owner for requests without an `X-Owner-Id` header
    pub default_owner: OwnerId,
    /// Campus timezone
    pub zone: FixedOffset,
    pub uploads: UploadLimits,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub objects: Arc<dyn ObjectStore>,
    pub extractor: Arc<ScheduleExtractor>,
    pub settings: Arc<ServiceSettings>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        objects: Arc<dyn ObjectStore>,
        vision: Arc<dyn VisionModel>,
        settings: ServiceSettings,
    ) -> Self {
        let extractor = ScheduleExtractor::new(store.clone(), objects.clone(), vision);
        Self {
            store,
            objects,
            extractor: Arc::new(extractor),
            settings: Arc::new(settings),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let uploads = state.settings.uploads;
    let body_limit = uploads
        .schedule_max_bytes
        .max(uploads.notes_max_bytes)
        .saturating_add(BODY_LIMIT_HEADROOM);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .merge(api::health_routes())
        .merge(api::schedule_routes())
        .merge(api::class_routes())
        .merge(api::dashboard_routes())
        .merge(api::notes_routes())
        .merge(api::reminder_routes())
        .merge(api::reset_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
