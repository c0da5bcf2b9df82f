//! OneDrive connector. No CRM entities; syncs are not-applicable sentinels.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::ProviderCredentials;
use crate::connectors::core::{ConnectorCore, RequestBody};
use crate::connectors::factory::IntegrationType;
use crate::connectors::microsoft::{GraphClient, log_notifications, validate_client_state};
use crate::connectors::trait_::{Connector, ConnectorError, SyncResult, WebhookData};

pub const ONEDRIVE_SCOPES: &[&str] = &["Files.ReadWrite.All"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub folder: Option<Value>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

pub struct OneDriveConnector {
    graph: GraphClient,
}

impl OneDriveConnector {
    pub fn new(http: reqwest::Client, credentials: &ProviderCredentials) -> Self {
        Self {
            graph: GraphClient::new(http, credentials, ONEDRIVE_SCOPES),
        }
    }

    /// Children of the drive root, or of `folder_path` relative to it.
    pub async fn list_files(&self, folder_path: Option<&str>) -> Result<Vec<DriveItem>, ConnectorError> {
        match folder_path.filter(|p| !p.trim_matches('/').is_empty()) {
            Some(folder) => {
                let url = drive_item_url(&self.graph.url("/me/drive"), folder, "children")?;
                self.graph.get_all_from(url.into()).await
            }
            None => self.graph.get_all("/me/drive/root/children").await,
        }
    }

    /// Simple upload (files up to 4 MB) to `file_path` relative to the root.
    pub async fn upload_file(
        &self,
        file_path: &str,
        content: Vec<u8>,
    ) -> Result<DriveItem, ConnectorError> {
        let url = drive_item_url(&self.graph.url("/me/drive"), file_path, "content")?;
        self.graph
            .core()
            .request(
                Method::PUT,
                url.as_str(),
                RequestBody::Raw {
                    content_type: "application/octet-stream",
                    bytes: content,
                },
            )
            .await
    }
}

/// `{drive}/root:/{segments..}:/{action}` with every path segment
/// percent-encoded, so names containing `#`, `?` or spaces address the
/// right item.
fn drive_item_url(drive_url: &str, item_path: &str, action: &str) -> Result<Url, ConnectorError> {
    let mut url = Url::parse(drive_url)?;
    let segments: Vec<&str> = item_path.split('/').filter(|s| !s.is_empty()).collect();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
        path.pop_if_empty().push("root:");
        if let Some((last, parents)) = segments.split_last() {
            path.extend(parents);
            path.push(&format!("{last}:"));
        }
        path.push(action);
    }
    Ok(url)
}

#[async_trait]
impl Connector for OneDriveConnector {
    fn integration_type(&self) -> IntegrationType {
        IntegrationType::Onedrive
    }

    fn core(&self) -> &ConnectorCore {
        self.graph.core()
    }

    fn core_mut(&mut self) -> &mut ConnectorCore {
        self.graph.core_mut()
    }

    fn validate_webhook(&self, payload: &[u8], _signature: &str, secret: &str) -> bool {
        validate_client_state(payload, secret)
    }

    fn signature_in_payload(&self) -> bool {
        true
    }

    async fn process_webhook(&self, data: WebhookData) -> Result<(), ConnectorError> {
        log_notifications("onedrive", &data.data);
        Ok(())
    }

    async fn sync_contacts(&self) -> SyncResult {
        SyncResult::not_applicable()
    }

    async fn sync_companies(&self) -> SyncResult {
        SyncResult::not_applicable()
    }

    async fn sync_deals(&self) -> SyncResult {
        SyncResult::not_applicable()
    }

    async fn test_connection(&self) -> bool {
        self.graph.get::<Value>("/me/drive").await.is_ok()
    }

    async fn get_user_info(&self) -> Result<Value, ConnectorError> {
        self.graph.me().await
    }
}
