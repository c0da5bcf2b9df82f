//! Microsoft Graph connectors
//!
//! OneDrive, OneNote, Outlook and Teams share one [`GraphClient`]: the Graph
//! v1.0 base URL, the Microsoft identity platform OAuth endpoints and the
//! `offline_access User.Read` base scopes. Each leaf adds its own scopes.

pub mod onedrive;
pub mod onenote;
pub mod outlook;
pub mod teams;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ProviderCredentials;
use crate::connectors::core::ConnectorCore;
use crate::connectors::trait_::{ConnectorError, OAuthConfig};

pub use onedrive::OneDriveConnector;
pub use onenote::OneNoteConnector;
pub use outlook::OutlookConnector;
pub use teams::TeamsConnector;

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const MICROSOFT_AUTHORIZATION_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
pub const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
pub const GRAPH_BASE_SCOPES: &[&str] = &["offline_access", "User.Read"];

/// Safety limit on `@odata.nextLink` traversal.
const MAX_PAGES: usize = 500;

/// A Graph collection page.
#[derive(Debug, Deserialize)]
pub struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// Shared Graph plumbing embedded in every Microsoft connector.
#[derive(Debug, Clone)]
pub struct GraphClient {
    core: ConnectorCore,
}

impl GraphClient {
    pub fn new(
        http: reqwest::Client,
        credentials: &ProviderCredentials,
        leaf_scopes: &[&str],
    ) -> Self {
        let scopes = GRAPH_BASE_SCOPES
            .iter()
            .chain(leaf_scopes)
            .map(|s| s.to_string())
            .collect();
        let oauth = OAuthConfig {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
            authorization_url: credentials
                .authorization_url
                .clone()
                .unwrap_or_else(|| MICROSOFT_AUTHORIZATION_URL.to_string()),
            token_url: credentials
                .token_url
                .clone()
                .unwrap_or_else(|| MICROSOFT_TOKEN_URL.to_string()),
            scopes,
        };
        let api_base = credentials.api_base.as_deref().unwrap_or(GRAPH_API_BASE);
        Self {
            core: ConnectorCore::new(http, oauth, api_base),
        }
    }

    pub fn core(&self) -> &ConnectorCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ConnectorCore {
        &mut self.core
    }

    pub fn url(&self, path: &str) -> String {
        self.core.api_url(path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConnectorError> {
        self.core.get(&self.url(path)).await
    }

    /// Every item of a collection, following `@odata.nextLink` (an absolute URL).
    pub async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ConnectorError> {
        self.get_all_from(self.url(path)).await
    }

    /// Like [`GraphClient::get_all`], starting from an absolute URL.
    pub async fn get_all_from<T: DeserializeOwned>(
        &self,
        first_url: String,
    ) -> Result<Vec<T>, ConnectorError> {
        let mut items = Vec::new();
        let mut url = first_url;

        for page in 1..=MAX_PAGES {
            let body: GraphPage<T> = self.core.get(&url).await?;
            debug!(url, page, fetched = body.value.len(), "Fetched Graph page");
            items.extend(body.value);

            match body.next_link {
                Some(next) => url = next,
                None => return Ok(items),
            }
        }

        Err(ConnectorError::PageLimitExceeded { pages: MAX_PAGES })
    }

    pub async fn me(&self) -> Result<Value, ConnectorError> {
        self.get("/me").await
    }
}

/// Graph change notifications carry the subscription's `clientState`; every
/// notification in the batch must match the stored secret. An empty secret
/// accepts any well-formed batch.
pub fn validate_client_state(payload: &[u8], secret: &str) -> bool {
    let Ok(body) = serde_json::from_slice::<Value>(payload) else {
        return false;
    };
    let Some(notifications) = body.get("value").and_then(Value::as_array) else {
        return false;
    };
    if secret.is_empty() {
        return true;
    }
    !notifications.is_empty()
        && notifications.iter().all(|n| {
            n.get("clientState")
                .and_then(Value::as_str)
                .is_some_and(|state| {
                    subtle::ConstantTimeEq::ct_eq(state.as_bytes(), secret.as_bytes()).into()
                })
        })
}

/// `(changeType, resource)` of each notification in a Graph batch.
pub fn notification_summaries(data: &Value) -> Vec<(String, String)> {
    data.get("value")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|n| {
                    let field = |key: &str| {
                        n.get(key)
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string()
                    };
                    (field("changeType"), field("resource"))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Log-only webhook handling shared by leaves without CRM entities.
pub(crate) fn log_notifications(service: &str, data: &Value) {
    for (change_type, resource) in notification_summaries(data) {
        info!(service, change_type, resource, "Received Graph change notification");
    }
}
