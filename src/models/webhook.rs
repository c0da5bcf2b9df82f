//! Webhook registration and delivery records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::connectors::IntegrationType;

/// A registered webhook endpoint for one user's integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRecord {
    pub id: Uuid,
    pub user_id: String,
    pub integration_type: IntegrationType,
    /// Where test deliveries are sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// Public URL the provider posts deliveries to. Trello includes it in
    /// the signed content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_url: Option<String>,
    /// Shared signing secret; `None` disables signature checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub events: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied part of a webhook registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewWebhook {
    pub callback_url: Option<String>,
    pub receive_url: Option<String>,
    pub events: Vec<String>,
}

impl WebhookRecord {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// One inbound delivery as received from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundWebhook {
    pub integration_type: IntegrationType,
    pub event: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Exact bytes the provider signed.
    #[serde(skip)]
    pub raw_body: Vec<u8>,
}

impl InboundWebhook {
    /// Parse a raw delivery body. Non-JSON bodies are kept as a JSON string.
    pub fn from_body(
        integration_type: IntegrationType,
        raw_body: Vec<u8>,
        signature: Option<String>,
    ) -> Self {
        let data = serde_json::from_slice(&raw_body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&raw_body).into_owned()));
        Self {
            integration_type,
            event: infer_event(&data),
            data,
            signature: signature.filter(|s| !s.trim().is_empty()),
            raw_body,
        }
    }
}

/// Best-effort event name across provider payload shapes.
pub fn infer_event(data: &Value) -> String {
    let candidates = [
        data.get("event"),
        data.pointer("/0/subscriptionType"),
        data.get("subscriptionType"),
        data.pointer("/action/type"),
        data.get("operation"),
        data.pointer("/value/0/changeType"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// A stored delivery, kept so it can be re-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub payload: InboundWebhook,
    pub received_at: DateTime<Utc>,
}

/// Result of processing one delivery. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_event_across_providers() {
        assert_eq!(infer_event(&json!({"event": "deal.created"})), "deal.created");
        assert_eq!(
            infer_event(&json!([{"subscriptionType": "contact.creation"}])),
            "contact.creation"
        );
        assert_eq!(infer_event(&json!({"action": {"type": "createCard"}})), "createCard");
        assert_eq!(
            infer_event(&json!({"module": "Contacts", "operation": "insert"})),
            "insert"
        );
        assert_eq!(
            infer_event(&json!({"value": [{"changeType": "updated"}]})),
            "updated"
        );
        assert_eq!(infer_event(&json!({})), "unknown");
    }

    #[test]
    fn test_from_body_keeps_raw_bytes_and_drops_blank_signature() {
        let body = br#"{"module":"Pipelines","operation":"update"}"#.to_vec();
        let inbound = InboundWebhook::from_body(IntegrationType::Bigin, body.clone(), Some(" ".into()));
        assert_eq!(inbound.raw_body, body);
        assert_eq!(inbound.event, "update");
        assert!(inbound.signature.is_none());
    }
}
