//! OneNote connector.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderCredentials;
use crate::connectors::core::{ConnectorCore, RequestBody};
use crate::connectors::factory::IntegrationType;
use crate::connectors::microsoft::{GraphClient, log_notifications, validate_client_state};
use crate::connectors::trait_::{Connector, ConnectorError, SyncResult, WebhookData};

pub const ONENOTE_SCOPES: &[&str] = &["Notes.ReadWrite.All"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePage {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content_url: Option<String>,
}

pub struct OneNoteConnector {
    graph: GraphClient,
}

impl OneNoteConnector {
    pub fn new(http: reqwest::Client, credentials: &ProviderCredentials) -> Self {
        Self {
            graph: GraphClient::new(http, credentials, ONENOTE_SCOPES),
        }
    }

    pub async fn list_notebooks(&self) -> Result<Vec<Notebook>, ConnectorError> {
        self.graph.get_all("/me/onenote/notebooks").await
    }

    /// Create a page in `section_id` from an XHTML body.
    pub async fn create_page(
        &self,
        section_id: &str,
        title: &str,
        body_html: &str,
    ) -> Result<NotePage, ConnectorError> {
        let html = format!(
            "<!DOCTYPE html><html><head><title>{}</title></head><body>{}</body></html>",
            escape_html(title),
            body_html
        );
        let url = self
            .graph
            .url(&format!("/me/onenote/sections/{section_id}/pages"));
        self.graph
            .core()
            .request(
                Method::POST,
                &url,
                RequestBody::Raw {
                    content_type: "text/html",
                    bytes: html.into_bytes(),
                },
            )
            .await
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl Connector for OneNoteConnector {
    fn integration_type(&self) -> IntegrationType {
        IntegrationType::Onenote
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
        log_notifications("onenote", &data.data);
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
        self.graph
            .get::<Value>("/me/onenote/notebooks?$top=1")
            .await
            .is_ok()
    }

    async fn get_user_info(&self) -> Result<Value, ConnectorError> {
        self.graph.me().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("Q3 <draft> & \"notes\""), "Q3 &lt;draft&gt; &amp; &quot;notes&quot;");
    }
}
