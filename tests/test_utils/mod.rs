//! Shared fixtures for connector and webhook integration tests.
//!
//! Every provider is pointed at a single `wiremock` server so tests can mount
//! provider-shaped responses without touching the network.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use tradeflow::config::{AppConfig, ProviderCredentials, TrelloCredentials};
use tradeflow::connectors::{IntegrationFactory, IntegrationToken};
use wiremock::MockServer;

/// Credentials whose API and token endpoints live on the mock server.
pub fn mock_credentials(server: &MockServer) -> ProviderCredentials {
    ProviderCredentials {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "https://app.example.com/oauth/callback".to_string(),
        authorization_url: Some(format!("{}/oauth/authorize", server.uri())),
        token_url: Some(format!("{}/oauth/token", server.uri())),
        api_base: Some(server.uri()),
    }
}

pub fn mock_trello_credentials(server: &MockServer) -> TrelloCredentials {
    TrelloCredentials {
        oauth: mock_credentials(server),
        api_key: "trello-key".to_string(),
        api_secret: "trello-secret".to_string(),
    }
}

pub fn mock_config(server: &MockServer) -> AppConfig {
    AppConfig {
        hubspot: mock_credentials(server),
        bigin: mock_credentials(server),
        microsoft: mock_credentials(server),
        trello: mock_trello_credentials(server),
        ..AppConfig::default()
    }
}

pub fn mock_factory(server: &MockServer) -> IntegrationFactory {
    IntegrationFactory::with_http_client(Arc::new(mock_config(server)), reqwest::Client::new())
}

/// A token that will not need refreshing during the test.
pub fn live_token(access_token: &str) -> IntegrationToken {
    IntegrationToken {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-token".to_string()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scope: None,
    }
}

/// A token already past its expiry.
pub fn expired_token(access_token: &str) -> IntegrationToken {
    IntegrationToken {
        expires_at: Some(Utc::now() - Duration::minutes(5)),
        ..live_token(access_token)
    }
}
