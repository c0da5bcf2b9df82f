//! # API Handlers
//!
//! HTTP endpoint handlers for the integrations API.

use axum::response::Json;

use crate::models::ServiceInfo;

pub mod integrations;
pub mod webhooks;

/// Root handler that returns basic service information
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
