//! HTTP API handlers

pub mod classes;
pub mod dashboard;
pub mod health;
pub mod notes;
pub mod reminders;
pub mod reset;
pub mod schedule;

pub use classes::class_routes;
pub use dashboard::dashboard_routes;
pub use health::health_routes;
pub use notes::notes_routes;
pub use reminders::reminder_routes;
pub use reset::reset_routes;
pub use schedule::schedule_routes;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use classboard_common::OwnerId;

use crate::error::ApiError;
use crate::AppState;

/// Header naming the owner a request acts for
pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner of the request: `X-Owner-Id` when present, else the configured default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub OwnerId);

#[async_trait]
impl FromRequestParts<AppState> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(OWNER_HEADER) else {
            return Ok(Owner(state.settings.default_owner));
        };

        let raw = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("X-Owner-Id header is not valid text".to_string()))?;
        Ok(Owner(raw.parse()?))
    }
}

/// Fallback for wrong methods on POST-only endpoints
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
