//! Webhook registration and inbound delivery endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::auth::UserId;
use crate::connectors::IntegrationType;
use crate::error::ApiError;
use crate::models::{NewWebhook, WebhookOutcome, WebhookRecord};
use crate::server::AppState;
use crate::webhook_service::{INVALID_SIGNATURE_MESSAGE, SIGNATURE_HEADER, WebhookStats};

/// Signature headers in lookup order: our own first, then provider-specific.
const SIGNATURE_HEADERS: [&str; 4] = [
    SIGNATURE_HEADER,
    "X-HubSpot-Signature",
    "X-Trello-Webhook",
    "X-Zoho-Signature",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWebhookRequest {
    pub integration_type: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Public URL the provider was given for deliveries.
    #[serde(default)]
    pub receive_url: Option<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveQuery {
    /// Microsoft Graph subscription handshake.
    #[serde(rename = "validationToken")]
    pub validation_token: Option<String>,
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::bad_request("Invalid identifier").with_details(json!({ "id": "Must be a valid UUID" }))
    })
}

/// First non-empty signature header, if any.
fn extract_signature(headers: &HeaderMap) -> Option<String> {
    SIGNATURE_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

pub async fn register_webhook(
    State(state): State<AppState>,
    user: UserId,
    payload: Result<Json<RegisterWebhookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WebhookRecord>), ApiError> {
    let Json(request) = payload?;
    let integration_type: IntegrationType = request.integration_type.parse()?;

    validate_url(request.callback_url.as_deref(), "callbackUrl", "Invalid callback URL")?;
    validate_url(request.receive_url.as_deref(), "receiveUrl", "Invalid receive URL")?;

    let record = state
        .webhooks
        .register_webhook(
            user.as_str(),
            integration_type,
            NewWebhook {
                callback_url: request.callback_url,
                receive_url: request.receive_url,
                events: request.events,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

fn validate_url(value: Option<&str>, field: &str, message: &str) -> Result<(), ApiError> {
    match value {
        Some(raw) if Url::parse(raw).is_err() => Err(ApiError::bad_request(message)
            .with_details(json!({ field: "Must be an absolute URL" }))),
        _ => Ok(()),
    }
}

pub async fn unregister_webhook(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.webhooks.unregister_webhook(user.as_str(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn test_webhook(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> Result<Json<WebhookOutcome>, ApiError> {
    let id = parse_id(&id)?;
    state.webhooks.test_webhook(user.as_str(), id).await?;
    Ok(Json(WebhookOutcome::ok()))
}

pub async fn webhook_stats(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<String>,
) -> Result<Json<WebhookStats>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.webhooks.get_webhook_stats(user.as_str(), id).await?))
}

/// Inbound provider delivery. The raw body is kept intact for signature checks.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReceiveQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;

    if let Some(token) = query.validation_token {
        state.webhooks.active_webhook(id).await?;
        return Ok((StatusCode::OK, [(CONTENT_TYPE, "text/plain")], token).into_response());
    }

    let outcome = state
        .webhooks
        .receive(id, body.to_vec(), extract_signature(&headers))
        .await?;
    Ok((outcome_status(&outcome), Json(outcome)).into_response())
}

pub async fn retry_delivery(
    State(state): State<AppState>,
    user: UserId,
    Path(delivery_id): Path<String>,
) -> Result<Response, ApiError> {
    let delivery_id = parse_id(&delivery_id)?;
    let outcome = state.webhooks.retry_webhook(user.as_str(), delivery_id).await?;
    Ok((outcome_status(&outcome), Json(outcome)).into_response())
}

fn outcome_status(outcome: &WebhookOutcome) -> StatusCode {
    if outcome.success {
        StatusCode::OK
    } else if outcome.message.as_deref() == Some(INVALID_SIGNATURE_MESSAGE) {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}
