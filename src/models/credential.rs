//! Stored OAuth credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connectors::{IntegrationToken, IntegrationType};

/// Token owned by a (user, integration type) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationCredential {
    pub user_id: String,
    pub integration_type: IntegrationType,
    pub token: IntegrationToken,
    pub updated_at: DateTime<Utc>,
}

impl IntegrationCredential {
    pub fn new(
        user_id: impl Into<String>,
        integration_type: IntegrationType,
        token: IntegrationToken,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            integration_type,
            token,
            updated_at: Utc::now(),
        }
    }
}
