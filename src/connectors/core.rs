//! Shared OAuth2 and authenticated-request machinery.
//!
//! Every connector embeds a [`ConnectorCore`]: it owns the injected HTTP
//! client, the provider's [`OAuthConfig`], the API base URL and the token set
//! for the current operation.

use reqwest::{Method, header};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::connectors::trait_::{ConnectorError, IntegrationToken, OAuthConfig, TokenResponse};

/// How the access token is attached to API requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// Trello-style `?key=<api key>&token=<token>` query parameters.
    KeyAndToken { api_key: String },
}

/// Request payload variants.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Raw {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct ConnectorCore {
    http: reqwest::Client,
    oauth: OAuthConfig,
    api_base: String,
    auth_style: AuthStyle,
    token: Option<IntegrationToken>,
}

impl ConnectorCore {
    pub fn new(http: reqwest::Client, oauth: OAuthConfig, api_base: impl Into<String>) -> Self {
        Self {
            http,
            oauth,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            auth_style: AuthStyle::Bearer,
            token: None,
        }
    }

    pub fn with_auth_style(mut self, auth_style: AuthStyle) -> Self {
        self.auth_style = auth_style;
        self
    }

    pub fn oauth(&self) -> &OAuthConfig {
        &self.oauth
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Absolute URL for an API path (`/crm/v3/...`).
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    pub fn set_token(&mut self, token: IntegrationToken) {
        self.token = Some(token);
    }

    pub fn token(&self) -> Option<&IntegrationToken> {
        self.token.as_ref()
    }

    pub fn authorization_url(&self, state: &str) -> Result<Url, ConnectorError> {
        let mut url = Url::parse(&self.oauth.authorization_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.oauth.client_id)
            .append_pair("redirect_uri", &self.oauth.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.oauth.scopes.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    pub async fn exchange_code_for_token(
        &self,
        code: &str,
    ) -> Result<TokenResponse, ConnectorError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
            ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ("code", code),
        ];

        match self.post_token_form(&params).await? {
            Ok(token) => Ok(token),
            Err((status, body)) => Err(ConnectorError::TokenExchange { status, body }),
        }
    }

    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, ConnectorError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        match self.post_token_form(&params).await? {
            Ok(token) => Ok(token),
            Err((status, body)) => Err(ConnectorError::TokenRefresh { status, body }),
        }
    }

    /// POST a grant to the token endpoint. The inner `Err` carries the
    /// provider's status and raw body.
    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
    ) -> Result<Result<TokenResponse, (u16, String)>, ConnectorError> {
        let response = self
            .http
            .post(&self.oauth.token_url)
            .header(header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(Ok(response.json().await?))
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(
                token_url = %self.oauth.token_url,
                status = status.as_u16(),
                "Token endpoint rejected grant"
            );
            Ok(Err((status.as_u16(), body)))
        }
    }

    /// Authenticated request; non-2xx responses become [`ConnectorError::Api`].
    /// Empty response bodies deserialize from JSON `null`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
    ) -> Result<T, ConnectorError> {
        let token = self.token.as_ref().ok_or(ConnectorError::NoToken)?;

        let mut builder = match &self.auth_style {
            AuthStyle::Bearer => self
                .http
                .request(method.clone(), url)
                .bearer_auth(&token.access_token),
            AuthStyle::KeyAndToken { api_key } => self
                .http
                .request(method.clone(), url)
                .query(&[("key", api_key.as_str()), ("token", token.access_token.as_str())]),
        };

        builder = match body {
            RequestBody::Empty => builder.header(header::CONTENT_TYPE, "application/json"),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Raw {
                content_type,
                bytes,
            } => builder.header(header::CONTENT_TYPE, content_type).body(bytes),
        };

        let response = builder.send().await?;
        let status = response.status();
        debug!(%method, url, status = status.as_u16(), "Provider API response");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!(url, ?retry_after, "Provider rate limited request");
            return Err(ConnectorError::RateLimited { retry_after, body });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_str("null")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ConnectorError> {
        self.request(Method::GET, url, RequestBody::Empty).await
    }

    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T, ConnectorError> {
        self.request(method, url, RequestBody::Json(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn core() -> ConnectorCore {
        ConnectorCore::new(
            reqwest::Client::new(),
            OAuthConfig {
                client_id: "client 1".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "https://app.tradeflow.io/oauth/callback?x=1".to_string(),
                authorization_url: "https://auth.example.com/authorize".to_string(),
                token_url: "https://auth.example.com/token".to_string(),
                scopes: vec!["read".to_string(), "write:all".to_string()],
            },
            "https://api.example.com/v1/",
        )
    }

    #[test]
    fn test_authorization_url_round_trips_query() {
        let url = core().authorization_url("csrf nonce/+=").unwrap();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("auth.example.com"));
        assert_eq!(query["client_id"], "client 1");
        assert_eq!(query["redirect_uri"], "https://app.tradeflow.io/oauth/callback?x=1");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["scope"], "read write:all");
        assert_eq!(query["state"], "csrf nonce/+=");
    }

    #[test]
    fn test_api_url_joins_without_double_slash() {
        let core = core();
        assert_eq!(core.api_url("/Contacts"), "https://api.example.com/v1/Contacts");
        assert_eq!(core.api_url("Contacts"), "https://api.example.com/v1/Contacts");
    }

    #[tokio::test]
    async fn test_request_without_token_fails() {
        let result: Result<serde_json::Value, _> =
            core().get("https://api.example.com/v1/me").await;
        assert!(matches!(result, Err(ConnectorError::NoToken)));
    }
}
