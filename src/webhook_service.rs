//! Webhook service
//!
//! Orchestrates one inbound delivery end to end:
//! `received -> signature-checked -> dispatched -> automation-triggered -> acknowledged`.
//! Any failure ends the flow for that delivery and is reported as a
//! [`WebhookOutcome`]; there is no retry queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::automation::{AutomationEngine, AutomationError, AutomationEvent};
use crate::connectors::signature::hmac_sha256_hex;
use crate::connectors::{
    Connector, ConnectorError, IntegrationFactory, IntegrationType, WebhookData,
    ensure_fresh_token,
};
use crate::models::{
    InboundWebhook, IntegrationCredential, IntegrationLog, LogStatus, NewWebhook,
    WebhookDelivery, WebhookOutcome, WebhookRecord,
};
use crate::repositories::{IntegrationStore, StoreError};

pub const INVALID_SIGNATURE_MESSAGE: &str = "Invalid webhook signature";

/// Header carrying our own signature on test deliveries.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook '{0}' not found")]
    NotFound(Uuid),

    #[error("Webhook delivery '{0}' not found")]
    DeliveryNotFound(Uuid),

    #[error("Webhook '{0}' is inactive")]
    Inactive(Uuid),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Webhook is registered for {expected}, payload is for {actual}")]
    IntegrationMismatch {
        expected: IntegrationType,
        actual: IntegrationType,
    },

    #[error("Webhook '{0}' has no callback URL")]
    MissingCallbackUrl(Uuid),

    #[error("Test delivery failed with status {status}: {body}")]
    TestDeliveryFailed { status: u16, body: String },

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Automation(#[from] AutomationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Delivery statistics. Not tracked yet: always the zero sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStats {
    pub total_deliveries: u64,
    pub successful_deliveries: u64,
    pub failed_deliveries: u64,
    pub last_delivery_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct WebhookService {
    factory: IntegrationFactory,
    store: Arc<dyn IntegrationStore>,
    automation: Arc<dyn AutomationEngine>,
}

impl WebhookService {
    pub fn new(
        factory: IntegrationFactory,
        store: Arc<dyn IntegrationStore>,
        automation: Arc<dyn AutomationEngine>,
    ) -> Self {
        Self {
            factory,
            store,
            automation,
        }
    }

    /// Validate, dispatch and run automations for one delivery.
    ///
    /// Never returns an error: failures become `{success: false, message}` and
    /// are recorded as an integration log entry.
    pub async fn process_webhook(
        &self,
        payload: &InboundWebhook,
        record: &WebhookRecord,
    ) -> WebhookOutcome {
        let outcome = match self.dispatch(payload, record).await {
            Ok(()) => WebhookOutcome::ok(),
            Err(err) => {
                warn!(
                    webhook_id = %record.id,
                    integration = %payload.integration_type,
                    event = %payload.event,
                    error = %err,
                    "Webhook processing failed"
                );
                WebhookOutcome::failed(err.to_string())
            }
        };

        let label = if outcome.success { "success" } else { "failure" };
        counter!(
            "webhook_deliveries_total",
            "integration" => payload.integration_type.as_str(),
            "outcome" => label
        )
        .increment(1);

        let entry = IntegrationLog::new(
            record.user_id.clone(),
            payload.integration_type,
            "webhook_received",
            if outcome.success {
                LogStatus::Success
            } else {
                LogStatus::Failure
            },
            outcome.message.clone(),
        )
        .for_webhook(record.id);
        if let Err(err) = self.store.create_integration_log(entry).await {
            warn!(webhook_id = %record.id, error = %err, "Failed to record integration log");
        }

        outcome
    }

    async fn dispatch(
        &self,
        payload: &InboundWebhook,
        record: &WebhookRecord,
    ) -> Result<(), WebhookError> {
        if payload.integration_type != record.integration_type {
            return Err(WebhookError::IntegrationMismatch {
                expected: record.integration_type,
                actual: payload.integration_type,
            });
        }

        let mut connector = self.factory.create(payload.integration_type);

        // received -> signature-checked
        let secret = connector
            .signing_secret()
            .or(record.secret.as_deref())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(secret) = secret.as_deref() {
            let signature = payload.signature.as_deref();
            if signature.is_some() || connector.signature_in_payload() {
                let signed =
                    connector.signed_payload(&payload.raw_body, record.receive_url.as_deref());
                let valid = connector.validate_webhook(
                    &signed,
                    signature.unwrap_or_default(),
                    secret,
                );
                if !valid {
                    counter!(
                        "webhook_signature_failures_total",
                        "integration" => payload.integration_type.as_str()
                    )
                    .increment(1);
                    return Err(WebhookError::InvalidSignature);
                }
                debug!(webhook_id = %record.id, "Webhook signature verified");
            }
        }

        // signature-checked -> dispatched
        self.load_credential(connector.as_mut(), record).await?;
        connector
            .process_webhook(WebhookData {
                event: payload.event.clone(),
                data: payload.data.clone(),
                timestamp: Utc::now(),
            })
            .await?;

        // dispatched -> automation-triggered
        let fired = self
            .automation
            .trigger(&AutomationEvent {
                user_id: record.user_id.clone(),
                integration_type: payload.integration_type,
                event: payload.event.clone(),
                data: payload.data.clone(),
            })
            .await?;

        info!(
            webhook_id = %record.id,
            integration = %payload.integration_type,
            event = %payload.event,
            automations_fired = fired,
            "Webhook acknowledged"
        );
        Ok(())
    }

    /// Attach the user's stored token, refreshing it first when near expiry.
    async fn load_credential(
        &self,
        connector: &mut dyn Connector,
        record: &WebhookRecord,
    ) -> Result<(), WebhookError> {
        let Some(credential) = self
            .store
            .get_credential(&record.user_id, record.integration_type)
            .await?
        else {
            debug!(
                user_id = %record.user_id,
                integration = %record.integration_type,
                "No stored credential; dispatching without a token"
            );
            return Ok(());
        };

        connector.set_token(credential.token);
        let leeway = self.factory.config().token_refresh_leeway();
        if let Some(refreshed) = ensure_fresh_token(connector, leeway).await? {
            self.store
                .save_credential(IntegrationCredential::new(
                    record.user_id.clone(),
                    record.integration_type,
                    refreshed,
                ))
                .await?;
        }
        Ok(())
    }

    /// A registered webhook that is still accepting deliveries.
    pub async fn active_webhook(&self, webhook_id: Uuid) -> Result<WebhookRecord, WebhookError> {
        let record = self
            .store
            .get_webhook(webhook_id)
            .await?
            .ok_or(WebhookError::NotFound(webhook_id))?;
        if !record.is_active {
            return Err(WebhookError::Inactive(webhook_id));
        }
        Ok(record)
    }

    /// Entry point for the HTTP layer: resolve the record, keep the delivery
    /// for retries, then process it.
    pub async fn receive(
        &self,
        webhook_id: Uuid,
        raw_body: Vec<u8>,
        signature: Option<String>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let record = self.active_webhook(webhook_id).await?;

        let delivery = WebhookDelivery {
            id: Uuid::new_v4(),
            webhook_id,
            payload: InboundWebhook::from_body(record.integration_type, raw_body, signature),
            received_at: Utc::now(),
        };
        self.store.save_delivery(delivery.clone()).await?;
        debug!(
            webhook_id = %webhook_id,
            delivery_id = %delivery.id,
            event = %delivery.payload.event,
            "Webhook delivery received"
        );

        Ok(self.process_webhook(&delivery.payload, &record).await)
    }

    /// Register a webhook with a freshly generated signing secret.
    pub async fn register_webhook(
        &self,
        user_id: &str,
        integration_type: IntegrationType,
        webhook: NewWebhook,
    ) -> Result<WebhookRecord, WebhookError> {
        let record = WebhookRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            integration_type,
            callback_url: webhook.callback_url,
            receive_url: webhook.receive_url,
            secret: Some(generate_secret()),
            events: webhook.events,
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.save_webhook(record.clone()).await?;

        info!(
            webhook_id = %record.id,
            user_id,
            integration = %integration_type,
            "Webhook registered"
        );
        Ok(record)
    }

    /// The record, when it exists and belongs to `user_id`. Other users'
    /// webhooks are reported as missing.
    async fn owned_webhook(
        &self,
        user_id: &str,
        webhook_id: Uuid,
    ) -> Result<WebhookRecord, WebhookError> {
        self.store
            .get_webhook(webhook_id)
            .await?
            .filter(|record| record.is_owned_by(user_id))
            .ok_or(WebhookError::NotFound(webhook_id))
    }

    pub async fn unregister_webhook(
        &self,
        user_id: &str,
        webhook_id: Uuid,
    ) -> Result<(), WebhookError> {
        self.owned_webhook(user_id, webhook_id).await?;
        if !self.store.delete_webhook(webhook_id).await? {
            return Err(WebhookError::NotFound(webhook_id));
        }
        info!(webhook_id = %webhook_id, user_id, "Webhook unregistered");
        Ok(())
    }

    /// One signed POST to the record's callback URL; non-2xx is an error.
    pub async fn test_webhook(&self, user_id: &str, webhook_id: Uuid) -> Result<(), WebhookError> {
        let record = self.owned_webhook(user_id, webhook_id).await?;
        let callback_url = record
            .callback_url
            .as_deref()
            .ok_or(WebhookError::MissingCallbackUrl(webhook_id))?;

        let body = json!({
            "event": "webhook.test",
            "webhookId": record.id,
            "integrationType": record.integration_type,
            "timestamp": Utc::now(),
        })
        .to_string();

        let mut request = self
            .factory
            .http_client()
            .post(callback_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = record.secret.as_deref() {
            request = request.header(SIGNATURE_HEADER, hmac_sha256_hex(secret, body.as_bytes()));
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WebhookError::TestDeliveryFailed {
                status: status.as_u16(),
                body,
            });
        }

        info!(webhook_id = %webhook_id, status = status.as_u16(), "Test delivery succeeded");
        Ok(())
    }

    /// Re-run processing for a stored delivery of one of `user_id`'s
    /// active webhooks.
    pub async fn retry_webhook(
        &self,
        user_id: &str,
        delivery_id: Uuid,
    ) -> Result<WebhookOutcome, WebhookError> {
        let delivery = self
            .store
            .get_delivery(delivery_id)
            .await?
            .ok_or(WebhookError::DeliveryNotFound(delivery_id))?;
        let record = self
            .owned_webhook(user_id, delivery.webhook_id)
            .await
            .map_err(|err| match err {
                WebhookError::NotFound(_) => WebhookError::DeliveryNotFound(delivery_id),
                other => other,
            })?;
        if !record.is_active {
            return Err(WebhookError::Inactive(record.id));
        }

        info!(delivery_id = %delivery_id, webhook_id = %record.id, "Retrying webhook delivery");
        Ok(self.process_webhook(&delivery.payload, &record).await)
    }

    pub async fn get_webhook_stats(
        &self,
        user_id: &str,
        webhook_id: Uuid,
    ) -> Result<WebhookStats, WebhookError> {
        self.owned_webhook(user_id, webhook_id).await?;
        Ok(WebhookStats::default())
    }
}

/// `whsec_` followed by 32 random bytes, hex encoded.
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    format!("whsec_{}", hex::encode(bytes))
}
