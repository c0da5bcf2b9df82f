//! In-process [`IntegrationStore`] backed by `tokio::sync::RwLock` maps.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::connectors::IntegrationType;
use crate::models::{IntegrationCredential, IntegrationLog, WebhookDelivery, WebhookRecord};
use crate::repositories::{IntegrationStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    webhooks: RwLock<HashMap<Uuid, WebhookRecord>>,
    credentials: RwLock<HashMap<(String, IntegrationType), IntegrationCredential>>,
    deliveries: RwLock<HashMap<Uuid, WebhookDelivery>>,
    logs: RwLock<Vec<IntegrationLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn save_webhook(&self, record: WebhookRecord) -> Result<(), StoreError> {
        self.webhooks.write().await.insert(record.id, record);
        Ok(())
    }

    async fn get_webhook(&self, id: Uuid) -> Result<Option<WebhookRecord>, StoreError> {
        Ok(self.webhooks.read().await.get(&id).cloned())
    }

    async fn delete_webhook(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.webhooks.write().await.remove(&id).is_some())
    }

    async fn save_credential(&self, credential: IntegrationCredential) -> Result<(), StoreError> {
        let key = (credential.user_id.clone(), credential.integration_type);
        self.credentials.write().await.insert(key, credential);
        Ok(())
    }

    async fn get_credential(
        &self,
        user_id: &str,
        integration_type: IntegrationType,
    ) -> Result<Option<IntegrationCredential>, StoreError> {
        let key = (user_id.to_string(), integration_type);
        Ok(self.credentials.read().await.get(&key).cloned())
    }

    async fn save_delivery(&self, delivery: WebhookDelivery) -> Result<(), StoreError> {
        self.deliveries.write().await.insert(delivery.id, delivery);
        Ok(())
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, StoreError> {
        Ok(self.deliveries.read().await.get(&id).cloned())
    }

    async fn create_integration_log(&self, entry: IntegrationLog) -> Result<(), StoreError> {
        self.logs.write().await.push(entry);
        Ok(())
    }

    async fn list_integration_logs(
        &self,
        user_id: &str,
        integration_type: Option<IntegrationType>,
    ) -> Result<Vec<IntegrationLog>, StoreError> {
        let logs = self.logs.read().await;
        Ok(logs
            .iter()
            .filter(|log| log.user_id == user_id)
            .filter(|log| integration_type.is_none_or(|t| log.integration_type == t))
            .cloned()
            .collect())
    }
}
