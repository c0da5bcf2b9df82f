//! # Error Handling
//!
//! Unified HTTP error handling for the integrations API: every failure is
//! rendered as an `application/problem+json` body with a stable code.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::connectors::{ConnectorError, FactoryError};
use crate::repositories::StoreError;
use crate::webhook_service::WebhookError;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Suggested retry delay in seconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Correlation ID for matching client reports to logs
    pub correlation_id: Box<str>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<C: Into<String>, M: Into<String>>(status: StatusCode, code: C, message: M) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            retry_after: None,
            correlation_id: format!("corr-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
                .into_boxed_str(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Set retry after delay
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if let Some(retry_after) = self.retry_after {
            if let Ok(header_value) = HeaderValue::from_str(&retry_after.to_string()) {
                headers.insert("retry-after", header_value);
            }
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

/// Upstream provider error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    /// HTTP status code from upstream
    pub status: u16,
    /// Response body snippet from upstream (truncated)
    pub body_snippet: Option<String>,
}

/// Provider failures surface as 502 PROVIDER_ERROR; upstream 429s keep their
/// rate-limit meaning.
pub fn provider_error(status: u16, body: &str) -> ApiError {
    let snippet = if body.chars().count() > 200 {
        let truncated: String = body.chars().take(200).collect();
        format!("{truncated}...")
    } else {
        body.to_string()
    };
    let details = ProviderError {
        status,
        body_snippet: (!snippet.is_empty()).then_some(snippet),
    };

    if status == 429 {
        return ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Provider rate limit exceeded",
        )
        .with_details(json!(details));
    }

    ApiError::new(
        StatusCode::BAD_GATEWAY,
        "PROVIDER_ERROR",
        format!("Provider returned error status {status}"),
    )
    .with_details(json!(details))
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::bad_request(message)
    }
}

impl From<FactoryError> for ApiError {
    fn from(error: FactoryError) -> Self {
        Self::not_found(error.to_string())
    }
}

impl From<ConnectorError> for ApiError {
    fn from(error: ConnectorError) -> Self {
        match &error {
            ConnectorError::NoToken | ConnectorError::MissingRefreshToken { .. } => {
                Self::unauthorized(error.to_string())
            }
            ConnectorError::TokenExchange { status, body }
            | ConnectorError::TokenRefresh { status, body }
            | ConnectorError::Api { status, body } => provider_error(*status, body),
            ConnectorError::RateLimited { retry_after, body } => {
                let error = provider_error(429, body);
                match retry_after {
                    Some(seconds) => error.with_retry_after(*seconds),
                    None => error,
                }
            }
            ConnectorError::PageLimitExceeded { .. } => Self::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                error.to_string(),
            ),
            ConnectorError::Network(err) if err.is_timeout() => Self::new(
                StatusCode::GATEWAY_TIMEOUT,
                "PROVIDER_TIMEOUT",
                "Provider did not respond in time",
            ),
            ConnectorError::Network(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                error.to_string(),
            ),
            ConnectorError::Serialization(_) | ConnectorError::Url(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                error.to_string(),
            ),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { .. } => Self::not_found(error.to_string()),
            StoreError::Backend(_) => {
                tracing::error!(error = %error, "Storage error");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Storage unavailable",
                )
            }
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(error: WebhookError) -> Self {
        match error {
            WebhookError::NotFound(_) | WebhookError::DeliveryNotFound(_) => {
                Self::not_found(error.to_string())
            }
            WebhookError::Inactive(_) => Self::new(StatusCode::GONE, "GONE", error.to_string()),
            WebhookError::InvalidSignature => Self::unauthorized(error.to_string()),
            WebhookError::IntegrationMismatch { .. } | WebhookError::MissingCallbackUrl(_) => {
                Self::bad_request(error.to_string())
            }
            WebhookError::TestDeliveryFailed { status, ref body } => Self::new(
                StatusCode::BAD_GATEWAY,
                "CALLBACK_ERROR",
                error.to_string(),
            )
            .with_details(json!({ "status": status, "body": body })),
            WebhookError::Network(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                "CALLBACK_ERROR",
                error.to_string(),
            ),
            WebhookError::Connector(inner) => inner.into(),
            WebhookError::Store(inner) => inner.into(),
            WebhookError::Automation(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                error.to_string(),
            ),
        }
    }
}
