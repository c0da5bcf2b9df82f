//! # Data Models
//!
//! Records persisted through the [`IntegrationStore`](crate::repositories::IntegrationStore).

use serde::{Deserialize, Serialize};

pub mod credential;
pub mod integration_log;
pub mod webhook;

pub use credential::IntegrationCredential;
pub use integration_log::{IntegrationLog, LogStatus};
pub use webhook::{InboundWebhook, NewWebhook, WebhookDelivery, WebhookOutcome, WebhookRecord};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "tradeflow-integrations".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
