//! # Repository Layer
//!
//! The storage collaborator the webhook service and HTTP handlers depend on.
//! Connectors never touch storage; callers persist tokens and logs here.

use async_trait::async_trait;
use uuid::Uuid;

use crate::connectors::IntegrationType;
use crate::models::{IntegrationCredential, IntegrationLog, WebhookDelivery, WebhookRecord};

pub mod memory;

pub use memory::MemoryStore;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn save_webhook(&self, record: WebhookRecord) -> Result<(), StoreError>;

    async fn get_webhook(&self, id: Uuid) -> Result<Option<WebhookRecord>, StoreError>;

    /// Returns `false` when no such webhook existed.
    async fn delete_webhook(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn save_credential(&self, credential: IntegrationCredential) -> Result<(), StoreError>;

    async fn get_credential(
        &self,
        user_id: &str,
        integration_type: IntegrationType,
    ) -> Result<Option<IntegrationCredential>, StoreError>;

    async fn save_delivery(&self, delivery: WebhookDelivery) -> Result<(), StoreError>;

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, StoreError>;

    async fn create_integration_log(&self, entry: IntegrationLog) -> Result<(), StoreError>;

    async fn list_integration_logs(
        &self,
        user_id: &str,
        integration_type: Option<IntegrationType>,
    ) -> Result<Vec<IntegrationLog>, StoreError>;
}
