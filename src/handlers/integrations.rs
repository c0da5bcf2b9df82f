//! Integration catalogue, OAuth connect flow and on-demand syncs.

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::UserId;
use crate::connectors::{
    Connector, IntegrationCapabilities, IntegrationInfo, IntegrationType, SyncEntity, SyncResult,
    ensure_fresh_token,
};
use crate::error::ApiError;
use crate::models::{IntegrationCredential, IntegrationLog, LogStatus};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    pub integration_type: IntegrationType,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn parse_integration_type(raw: &str) -> Result<IntegrationType, ApiError> {
    raw.parse::<IntegrationType>().map_err(ApiError::from)
}

/// Build a connector carrying the user's stored token, refreshed and
/// persisted first when it is close to expiry.
pub(crate) async fn connector_for_user(
    state: &AppState,
    user: &UserId,
    integration_type: IntegrationType,
) -> Result<Box<dyn Connector>, ApiError> {
    let credential = state
        .store
        .get_credential(user.as_str(), integration_type)
        .await?
        .ok_or_else(|| {
            ApiError::unauthorized(format!("No {integration_type} connection for this user"))
        })?;

    let mut connector = state.factory.create(integration_type);
    connector.set_token(credential.token);

    let leeway = state.config.token_refresh_leeway();
    if let Some(refreshed) = ensure_fresh_token(connector.as_mut(), leeway).await? {
        state
            .store
            .save_credential(IntegrationCredential::new(
                user.as_str(),
                integration_type,
                refreshed,
            ))
            .await?;
    }

    Ok(connector)
}

async fn record_log(state: &AppState, entry: IntegrationLog) {
    if let Err(err) = state.store.create_integration_log(entry).await {
        warn!(error = %err, "Failed to record integration log");
    }
}

pub async fn list_integrations(State(state): State<AppState>) -> Json<Vec<IntegrationInfo>> {
    Json(state.factory.available_integrations())
}

pub async fn get_capabilities(
    State(state): State<AppState>,
    Path(integration_type): Path<String>,
) -> Result<Json<IntegrationCapabilities>, ApiError> {
    let integration_type = parse_integration_type(&integration_type)?;
    Ok(Json(state.factory.capabilities(integration_type)))
}

/// Start the OAuth flow. A random `state` is generated when the caller does
/// not supply one.
pub async fn authorize(
    State(state): State<AppState>,
    Path(integration_type): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let integration_type = parse_integration_type(&integration_type)?;
    let oauth_state = query
        .state
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| {
            let mut bytes = [0u8; 16];
            rand::thread_rng().fill(&mut bytes);
            hex::encode(bytes)
        });

    let connector = state.factory.create(integration_type);
    let url = connector.authorization_url(&oauth_state)?;

    Ok(Json(AuthorizeResponse {
        authorization_url: url.to_string(),
        state: oauth_state,
    }))
}

/// Complete the OAuth flow: exchange the code and store the token for the user.
pub async fn callback(
    State(state): State<AppState>,
    user: UserId,
    Path(integration_type): Path<String>,
    payload: Result<Json<CallbackRequest>, JsonRejection>,
) -> Result<Json<ConnectionResponse>, ApiError> {
    let integration_type = parse_integration_type(&integration_type)?;
    let Json(request) = payload?;
    let code = request.code.trim();
    if code.is_empty() {
        return Err(ApiError::bad_request("Authorization code must not be empty"));
    }

    let connector = state.factory.create(integration_type);
    let token = match connector.exchange_code_for_token(code).await {
        Ok(response) => response.into_token(None),
        Err(err) => {
            record_log(
                &state,
                IntegrationLog::new(
                    user.as_str(),
                    integration_type,
                    "oauth_connect",
                    LogStatus::Failure,
                    Some(err.to_string()),
                ),
            )
            .await;
            return Err(err.into());
        }
    };

    let response = ConnectionResponse {
        integration_type,
        connected: true,
        expires_at: token.expires_at,
        scope: token.scope.clone(),
    };
    state
        .store
        .save_credential(IntegrationCredential::new(
            user.as_str(),
            integration_type,
            token,
        ))
        .await?;
    record_log(
        &state,
        IntegrationLog::new(
            user.as_str(),
            integration_type,
            "oauth_connect",
            LogStatus::Success,
            None,
        ),
    )
    .await;

    info!(user_id = %user.as_str(), integration = %integration_type, "Integration connected");
    Ok(Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResponse {
    pub integration_type: IntegrationType,
    pub connected: bool,
}

pub async fn test_connection(
    State(state): State<AppState>,
    user: UserId,
    Path(integration_type): Path<String>,
) -> Result<Json<ConnectionTestResponse>, ApiError> {
    let integration_type = parse_integration_type(&integration_type)?;
    let connector = connector_for_user(&state, &user, integration_type).await?;
    Ok(Json(ConnectionTestResponse {
        integration_type,
        connected: connector.test_connection().await,
    }))
}

/// Run one entity sync. A failed sync answers 502 with the result body.
pub async fn sync(
    State(state): State<AppState>,
    user: UserId,
    Path((integration_type, entity)): Path<(String, String)>,
) -> Result<(StatusCode, Json<SyncResult>), ApiError> {
    let integration_type = parse_integration_type(&integration_type)?;
    let entity: SyncEntity = entity.parse().map_err(ApiError::bad_request)?;

    let connector = connector_for_user(&state, &user, integration_type).await?;
    let result = connector.sync(entity).await;

    let outcome = if result.success() { "success" } else { "failure" };
    counter!(
        "integration_syncs_total",
        "integration" => integration_type.as_str(),
        "entity" => entity.as_str(),
        "outcome" => outcome
    )
    .increment(1);

    let (status, message) = if result.success() {
        (
            LogStatus::Success,
            Some(format!("{} {entity} synced", result.items_synced())),
        )
    } else {
        (LogStatus::Failure, Some(result.errors().join("; ")))
    };
    record_log(
        &state,
        IntegrationLog::new(
            user.as_str(),
            integration_type,
            format!("sync_{entity}"),
            status,
            message,
        ),
    )
    .await;

    info!(
        user_id = %user.as_str(),
        integration = %integration_type,
        %entity,
        success = result.success(),
        items_synced = result.items_synced(),
        "Sync finished"
    );

    let status = if result.success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(result)))
}

pub async fn list_logs(
    State(state): State<AppState>,
    user: UserId,
    Path(integration_type): Path<String>,
) -> Result<Json<Vec<IntegrationLog>>, ApiError> {
    let integration_type = parse_integration_type(&integration_type)?;
    let logs = state
        .store
        .list_integration_logs(user.as_str(), Some(integration_type))
        .await?;
    Ok(Json(logs))
}
