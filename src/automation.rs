//! Automation-trigger step run after a webhook has been dispatched.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::connectors::IntegrationType;

/// What the automation engine sees for one processed delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationEvent {
    pub user_id: String,
    pub integration_type: IntegrationType,
    pub event: String,
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("automation rule '{rule}' failed: {message}")]
    RuleFailed { rule: String, message: String },
}

#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Evaluate rules for `event`; returns how many rules fired.
    async fn trigger(&self, event: &AutomationEvent) -> Result<usize, AutomationError>;
}

/// Default engine: records the trigger and fires nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAutomation;

#[async_trait]
impl AutomationEngine for LoggingAutomation {
    async fn trigger(&self, event: &AutomationEvent) -> Result<usize, AutomationError> {
        info!(
            user_id = %event.user_id,
            integration = %event.integration_type,
            event = %event.event,
            "Automation trigger evaluated (no rules configured)"
        );
        Ok(0)
    }
}
