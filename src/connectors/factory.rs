//! Integration factory
//!
//! Resolves an integration type identifier to a fresh connector instance.
//! Connectors are never shared between operations; each call gets its own
//! token slot.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppConfig;
use crate::connectors::bigin::BiginConnector;
use crate::connectors::hubspot::HubSpotConnector;
use crate::connectors::metadata::{
    IntegrationCapabilities, IntegrationInfo, integration_capabilities, integration_info,
};
use crate::connectors::microsoft::{
    OneDriveConnector, OneNoteConnector, OutlookConnector, TeamsConnector,
};
use crate::connectors::trello::TrelloConnector;
use crate::connectors::trait_::Connector;

/// Error type for factory operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown integration type: {0}")]
    UnknownIntegrationType(String),
}

/// Closed set of supported integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationType {
    Hubspot,
    Trello,
    Bigin,
    Onedrive,
    Onenote,
    Outlook,
    Teams,
}

impl IntegrationType {
    pub const ALL: [IntegrationType; 7] = [
        IntegrationType::Hubspot,
        IntegrationType::Trello,
        IntegrationType::Bigin,
        IntegrationType::Onedrive,
        IntegrationType::Onenote,
        IntegrationType::Outlook,
        IntegrationType::Teams,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntegrationType::Hubspot => "hubspot",
            IntegrationType::Trello => "trello",
            IntegrationType::Bigin => "bigin",
            IntegrationType::Onedrive => "onedrive",
            IntegrationType::Onenote => "onenote",
            IntegrationType::Outlook => "outlook",
            IntegrationType::Teams => "teams",
        }
    }
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationType {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntegrationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FactoryError::UnknownIntegrationType(s.to_string()))
    }
}

/// Builds connectors from configuration with a shared HTTP client.
#[derive(Clone)]
pub struct IntegrationFactory {
    config: Arc<AppConfig>,
    http: reqwest::Client,
}

impl IntegrationFactory {
    /// Build a factory whose HTTP client enforces the configured timeout.
    pub fn new(config: Arc<AppConfig>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("tradeflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    /// Use a caller-supplied client (tests, custom proxies).
    pub fn with_http_client(config: Arc<AppConfig>, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Create a connector from its string identifier.
    pub fn create_connector(&self, integration_type: &str) -> Result<Box<dyn Connector>, FactoryError> {
        let integration_type: IntegrationType = integration_type.parse()?;
        Ok(self.create(integration_type))
    }

    pub fn create(&self, integration_type: IntegrationType) -> Box<dyn Connector> {
        debug!(integration = %integration_type, "Creating connector");
        let http = self.http.clone();
        let config = &self.config;
        match integration_type {
            IntegrationType::Hubspot => Box::new(HubSpotConnector::new(http, &config.hubspot)),
            IntegrationType::Trello => Box::new(TrelloConnector::new(http, &config.trello)),
            IntegrationType::Bigin => Box::new(BiginConnector::new(http, &config.bigin)),
            IntegrationType::Onedrive => Box::new(OneDriveConnector::new(http, &config.microsoft)),
            IntegrationType::Onenote => Box::new(OneNoteConnector::new(http, &config.microsoft)),
            IntegrationType::Outlook => Box::new(OutlookConnector::new(http, &config.microsoft)),
            IntegrationType::Teams => Box::new(TeamsConnector::new(http, &config.microsoft)),
        }
    }

    pub fn available_integrations(&self) -> Vec<IntegrationInfo> {
        IntegrationType::ALL.into_iter().map(integration_info).collect()
    }

    pub fn capabilities(&self, integration_type: IntegrationType) -> IntegrationCapabilities {
        integration_capabilities(integration_type)
    }
}
