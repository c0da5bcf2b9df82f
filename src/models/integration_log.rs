//! Integration activity log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connectors::IntegrationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationLog {
    pub id: Uuid,
    pub user_id: String,
    pub integration_type: IntegrationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<Uuid>,
    /// e.g. `webhook_received`, `sync_contacts`
    pub action: String,
    pub status: LogStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IntegrationLog {
    pub fn new(
        user_id: impl Into<String>,
        integration_type: IntegrationType,
        action: impl Into<String>,
        status: LogStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            integration_type,
            webhook_id: None,
            action: action.into(),
            status,
            message,
            created_at: Utc::now(),
        }
    }

    pub fn for_webhook(mut self, webhook_id: Uuid) -> Self {
        self.webhook_id = Some(webhook_id);
        self
    }
}
