//! Connectors module
//!
//! This module provides the integration connector framework:
//! - The `Connector` trait and the shared `ConnectorCore` OAuth/request machinery
//! - The `IntegrationFactory` resolving integration types to connectors
//! - Individual provider connector implementations

pub mod bigin;
pub mod core;
pub mod crm;
pub mod factory;
pub mod hubspot;
pub mod metadata;
pub mod microsoft;
pub mod signature;
pub mod trait_;
pub mod trello;

pub use self::core::{AuthStyle, ConnectorCore, RequestBody};
pub use crm::{CrmCompany, CrmContact, CrmDeal};
pub use factory::{FactoryError, IntegrationFactory, IntegrationType};
pub use metadata::{AuthType, IntegrationCapabilities, IntegrationInfo};
pub use trait_::{
    Connector, ConnectorError, IntegrationToken, OAuthConfig, SyncEntity, SyncResult,
    TokenResponse, WebhookData, ensure_fresh_token,
};

pub use bigin::BiginConnector;
pub use hubspot::HubSpotConnector;
pub use microsoft::{GraphClient, OneDriveConnector, OneNoteConnector, OutlookConnector, TeamsConnector};
pub use trello::TrelloConnector;
