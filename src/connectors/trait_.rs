//! Connector trait definition
//!
//! Defines the lifecycle every integration connector follows: authorize,
//! exchange code, store token, sync, receive webhook, validate signature and
//! dispatch to a typed handler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::connectors::core::{ConnectorCore, RequestBody};
use crate::connectors::factory::IntegrationType;

/// Connector-level errors.
///
/// Connector internals return these; sync and webhook orchestration convert
/// them into result values at the outermost boundary.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("No token set for API request")]
    NoToken,

    #[error("Token exchange failed: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("Token refresh failed: {body}")]
    TokenRefresh { status: u16, body: String },

    #[error("No refresh token available for {integration}")]
    MissingRefreshToken { integration: IntegrationType },

    #[error("API request failed: {body}")]
    Api { status: u16, body: String },

    #[error("API rate limit exceeded: {body}")]
    RateLimited {
        retry_after: Option<u64>,
        body: String,
    },

    #[error("Pagination stopped after {pages} pages with more results pending")]
    PageLimitExceeded { pages: usize },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

impl ConnectorError {
    /// Upstream status code, when the failure came from a provider response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConnectorError::TokenExchange { status, .. }
            | ConnectorError::TokenRefresh { status, .. }
            | ConnectorError::Api { status, .. } => Some(*status),
            ConnectorError::RateLimited { .. } => Some(429),
            ConnectorError::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether retrying the same call could succeed (429, 5xx, timeouts).
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectorError::Network(err) => err.is_timeout() || err.is_connect(),
            _ => self
                .status()
                .is_some_and(|status| status == 429 || (500..600).contains(&status)),
        }
    }
}

/// Static OAuth2 configuration for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

/// Access token owned by a (user, integration type) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl IntegrationToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        }
    }

    /// True when the token expires within `leeway` of `now`. Tokens without an
    /// expiry never need refreshing.
    pub fn expires_within(&self, now: DateTime<Utc>, leeway: chrono::Duration) -> bool {
        self.expires_at.is_some_and(|at| at - leeway <= now)
    }
}

/// Raw token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Convert into a storable token. Providers that omit the refresh token on
    /// refresh keep the previous one.
    pub fn into_token(self, previous_refresh_token: Option<String>) -> IntegrationToken {
        IntegrationToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expires_at: self
                .expires_in
                .and_then(chrono::Duration::try_seconds)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime)),
            scope: self.scope,
        }
    }
}

/// Outcome of a sync operation: either a success with a count, or a failure
/// with at least one error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    success: bool,
    items_synced: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl SyncResult {
    pub fn synced(items_synced: usize) -> Self {
        Self {
            success: true,
            items_synced,
            errors: None,
        }
    }

    /// Sentinel for connectors whose domain has no such entity.
    pub fn not_applicable() -> Self {
        Self::synced(0)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            items_synced: 0,
            errors: Some(vec![message.into()]),
        }
    }

    pub fn from_outcome<E: std::fmt::Display>(outcome: Result<usize, E>) -> Self {
        match outcome {
            Ok(count) => Self::synced(count),
            Err(err) => Self::failed(err.to_string()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn items_synced(&self) -> usize {
        self.items_synced
    }

    pub fn errors(&self) -> &[String] {
        self.errors.as_deref().unwrap_or_default()
    }
}

/// Inbound webhook delivery handed to a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookData {
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl WebhookData {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Entity groups a sync can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntity {
    Contacts,
    Companies,
    Deals,
}

impl SyncEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncEntity::Contacts => "contacts",
            SyncEntity::Companies => "companies",
            SyncEntity::Deals => "deals",
        }
    }
}

impl std::fmt::Display for SyncEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncEntity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contacts" => Ok(SyncEntity::Contacts),
            "companies" => Ok(SyncEntity::Companies),
            "deals" => Ok(SyncEntity::Deals),
            other => Err(format!("Unknown sync entity: {other}")),
        }
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn integration_type(&self) -> IntegrationType;

    /// Shared OAuth/request state embedded in every connector.
    fn core(&self) -> &ConnectorCore;

    fn core_mut(&mut self) -> &mut ConnectorCore;

    /// Build the provider consent URL. `state` is passed through verbatim.
    fn authorization_url(&self, state: &str) -> Result<Url, ConnectorError> {
        self.core().authorization_url(state)
    }

    /// Exchange an authorization code. The token is not stored.
    async fn exchange_code_for_token(&self, code: &str) -> Result<TokenResponse, ConnectorError> {
        self.core().exchange_code_for_token(code).await
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, ConnectorError> {
        self.core().refresh_access_token(refresh_token).await
    }

    /// Replace the token used by subsequent requests.
    fn set_token(&mut self, token: IntegrationToken) {
        self.core_mut().set_token(token);
    }

    fn token(&self) -> Option<&IntegrationToken> {
        self.core().token()
    }

    /// Authenticated JSON request against an absolute URL.
    async fn make_request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ConnectorError> {
        let body = body.map(RequestBody::Json).unwrap_or(RequestBody::Empty);
        self.core().request(method, url, body).await
    }

    fn validate_webhook(&self, payload: &[u8], signature: &str, secret: &str) -> bool;

    /// Bytes the provider signed. Most sign the raw body alone.
    fn signed_payload(&self, raw_body: &[u8], _receive_url: Option<&str>) -> Vec<u8> {
        raw_body.to_vec()
    }

    /// App-wide secret the provider signs every delivery with. `None` means
    /// deliveries are checked against the webhook's own secret.
    fn signing_secret(&self) -> Option<&str> {
        None
    }

    /// Providers that prove authenticity inside the body (Graph `clientState`)
    /// are validated even when no signature header arrives.
    fn signature_in_payload(&self) -> bool {
        false
    }

    async fn process_webhook(&self, data: WebhookData) -> Result<(), ConnectorError>;

    async fn sync_contacts(&self) -> SyncResult;

    async fn sync_companies(&self) -> SyncResult;

    async fn sync_deals(&self) -> SyncResult;

    async fn sync(&self, entity: SyncEntity) -> SyncResult {
        match entity {
            SyncEntity::Contacts => self.sync_contacts().await,
            SyncEntity::Companies => self.sync_companies().await,
            SyncEntity::Deals => self.sync_deals().await,
        }
    }

    async fn test_connection(&self) -> bool;

    async fn get_user_info(&self) -> Result<serde_json::Value, ConnectorError>;
}

/// Full resync of each entity group a webhook touched, in order, once each.
///
/// Sync failures are logged; they never fail the webhook delivery.
pub async fn resync_entities<C: Connector + ?Sized>(connector: &C, entities: &[SyncEntity]) {
    let mut seen = Vec::with_capacity(entities.len());
    for entity in entities {
        if seen.contains(entity) {
            continue;
        }
        seen.push(*entity);

        let result = connector.sync(*entity).await;
        if result.success() {
            tracing::info!(
                integration = %connector.integration_type(),
                entity = %entity,
                items_synced = result.items_synced(),
                "Webhook-triggered resync completed"
            );
        } else {
            tracing::warn!(
                integration = %connector.integration_type(),
                entity = %entity,
                errors = ?result.errors(),
                "Webhook-triggered resync failed"
            );
        }
    }
}

/// Refresh the connector's token when it is close to expiry.
///
/// Returns the new token so the caller can persist it; `None` when no refresh
/// was needed.
pub async fn ensure_fresh_token(
    connector: &mut dyn Connector,
    leeway: chrono::Duration,
) -> Result<Option<IntegrationToken>, ConnectorError> {
    let Some(current) = connector.token().cloned() else {
        return Err(ConnectorError::NoToken);
    };

    if !current.expires_within(Utc::now(), leeway) {
        return Ok(None);
    }

    let refresh_token =
        current
            .refresh_token
            .clone()
            .ok_or_else(|| ConnectorError::MissingRefreshToken {
                integration: connector.integration_type(),
            })?;

    tracing::info!(
        integration = %connector.integration_type(),
        "Access token near expiry, refreshing"
    );

    let refreshed = connector
        .refresh_access_token(&refresh_token)
        .await?
        .into_token(Some(refresh_token));
    connector.set_token(refreshed.clone());
    Ok(Some(refreshed))
}
