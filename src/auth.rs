//! # Caller Identity
//!
//! Integrations are scoped per user. Authentication happens upstream of this
//! service; the gateway forwards the resolved user in the `X-User-Id` header.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Identifier of the user an operation acts on behalf of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for UserId
where
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| {
                ApiError::unauthorized("Missing required header")
                    .with_details(json!({ USER_ID_HEADER: "Required header is missing" }))
            })?
            .to_str()
            .map_err(|_| {
                ApiError::bad_request("Invalid user header")
                    .with_details(json!({ USER_ID_HEADER: "Header must be valid UTF-8" }))
            })?
            .trim();

        if value.is_empty() {
            return Err(ApiError::bad_request("Invalid user header")
                .with_details(json!({ USER_ID_HEADER: "Header must not be empty" })));
        }

        Ok(UserId(value.to_string()))
    }
}
