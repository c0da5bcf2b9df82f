//! Microsoft Teams connector.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::ProviderCredentials;
use crate::connectors::core::ConnectorCore;
use crate::connectors::factory::IntegrationType;
use crate::connectors::microsoft::{GraphClient, log_notifications, validate_client_state};
use crate::connectors::trait_::{Connector, ConnectorError, SyncResult, WebhookData};

pub const TEAMS_SCOPES: &[&str] = &[
    "Team.ReadBasic.All",
    "Channel.ReadBasic.All",
    "ChannelMessage.Send",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub membership_type: Option<String>,
}

pub struct TeamsConnector {
    graph: GraphClient,
}

impl TeamsConnector {
    pub fn new(http: reqwest::Client, credentials: &ProviderCredentials) -> Self {
        Self {
            graph: GraphClient::new(http, credentials, TEAMS_SCOPES),
        }
    }

    pub async fn list_joined_teams(&self) -> Result<Vec<Team>, ConnectorError> {
        self.graph.get_all("/me/joinedTeams").await
    }

    pub async fn list_channels(&self, team_id: &str) -> Result<Vec<Channel>, ConnectorError> {
        self.graph
            .get_all(&format!("/teams/{team_id}/channels"))
            .await
    }

    /// Post an HTML message to a channel.
    pub async fn send_message(
        &self,
        team_id: &str,
        channel_id: &str,
        content_html: &str,
    ) -> Result<Value, ConnectorError> {
        let url = self
            .graph
            .url(&format!("/teams/{team_id}/channels/{channel_id}/messages"));
        self.graph
            .core()
            .send_json(
                Method::POST,
                &url,
                json!({ "body": { "contentType": "html", "content": content_html } }),
            )
            .await
    }
}

#[async_trait]
impl Connector for TeamsConnector {
    fn integration_type(&self) -> IntegrationType {
        IntegrationType::Teams
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
        log_notifications("teams", &data.data);
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
        self.graph.get::<Value>("/me/joinedTeams").await.is_ok()
    }

    async fn get_user_info(&self) -> Result<Value, ConnectorError> {
        self.graph.me().await
    }
}
