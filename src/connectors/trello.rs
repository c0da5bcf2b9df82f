//! Trello REST v1 connector
//!
//! Trello authenticates API calls with `key`/`token` query parameters instead
//! of a bearer header, and returns full collections without pagination. Board
//! members map to contacts, organizations to companies and cards to deals.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::TrelloCredentials;
use crate::connectors::core::{AuthStyle, ConnectorCore};
use crate::connectors::crm::{CrmCompany, CrmContact, CrmDeal};
use crate::connectors::factory::IntegrationType;
use crate::connectors::signature::verify_hmac_sha1_base64;
use crate::connectors::trait_::{
    Connector, ConnectorError, OAuthConfig, SyncEntity, SyncResult, WebhookData, resync_entities,
};

pub const TRELLO_AUTHORIZATION_URL: &str = "https://trello.com/1/authorize";
pub const TRELLO_TOKEN_URL: &str = "https://trello.com/1/OAuthGetAccessToken";
pub const TRELLO_API_BASE: &str = "https://api.trello.com/1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloBoard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub id_organization: Option<String>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub id_board: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub id_list: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrelloMember {
    id: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrelloOrganization {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    website: Option<String>,
}

/// Fields accepted by `POST /cards`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub id_list: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
}

pub struct TrelloConnector {
    core: ConnectorCore,
    api_key: String,
    api_secret: String,
}

impl TrelloConnector {
    pub fn new(http: reqwest::Client, credentials: &TrelloCredentials) -> Self {
        let oauth = OAuthConfig {
            client_id: credentials.oauth.client_id.clone(),
            client_secret: credentials.oauth.client_secret.clone(),
            redirect_uri: credentials.oauth.redirect_uri.clone(),
            authorization_url: credentials
                .oauth
                .authorization_url
                .clone()
                .unwrap_or_else(|| TRELLO_AUTHORIZATION_URL.to_string()),
            token_url: credentials
                .oauth
                .token_url
                .clone()
                .unwrap_or_else(|| TRELLO_TOKEN_URL.to_string()),
            scopes: vec!["read".to_string(), "write".to_string()],
        };
        let api_base = credentials
            .oauth
            .api_base
            .as_deref()
            .unwrap_or(TRELLO_API_BASE);
        let core = ConnectorCore::new(http, oauth, api_base).with_auth_style(AuthStyle::KeyAndToken {
            api_key: credentials.api_key.clone(),
        });
        Self {
            core,
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
        }
    }

    pub async fn get_boards(&self) -> Result<Vec<TrelloBoard>, ConnectorError> {
        let boards: Vec<TrelloBoard> = self
            .core
            .get(&self.core.api_url("/members/me/boards?filter=open"))
            .await?;
        debug!(boards = boards.len(), "Fetched Trello boards");
        Ok(boards)
    }

    pub async fn get_lists(&self, board_id: &str) -> Result<Vec<TrelloList>, ConnectorError> {
        self.core
            .get(&self.core.api_url(&format!("/boards/{board_id}/lists")))
            .await
    }

    pub async fn create_card(&self, card: &NewCard) -> Result<TrelloCard, ConnectorError> {
        self.core
            .send_json(
                Method::POST,
                &self.core.api_url("/cards"),
                serde_json::to_value(card)?,
            )
            .await
    }

    pub async fn update_card(
        &self,
        card_id: &str,
        fields: Value,
    ) -> Result<TrelloCard, ConnectorError> {
        self.core
            .send_json(
                Method::PUT,
                &self.core.api_url(&format!("/cards/{card_id}")),
                fields,
            )
            .await
    }

    /// Distinct members across every open board.
    pub async fn fetch_contacts(&self) -> Result<Vec<CrmContact>, ConnectorError> {
        let mut contacts: Vec<CrmContact> = Vec::new();
        for board in self.get_boards().await? {
            let members: Vec<TrelloMember> = self
                .core
                .get(&self.core.api_url(&format!("/boards/{}/members", board.id)))
                .await?;
            for member in members {
                if contacts.iter().any(|c| c.external_id == member.id) {
                    continue;
                }
                let (first_name, last_name) = split_full_name(member.full_name.as_deref());
                contacts.push(CrmContact {
                    external_id: member.id,
                    first_name: first_name.or(member.username),
                    last_name,
                    email: member.email,
                    phone: None,
                    company: None,
                });
            }
        }
        Ok(contacts)
    }

    pub async fn fetch_companies(&self) -> Result<Vec<CrmCompany>, ConnectorError> {
        let organizations: Vec<TrelloOrganization> = self
            .core
            .get(&self.core.api_url("/members/me/organizations"))
            .await?;
        Ok(organizations
            .into_iter()
            .map(|org| CrmCompany {
                name: org.display_name.or(org.name).unwrap_or_default(),
                domain: org.website,
                industry: None,
                external_id: org.id,
            })
            .collect())
    }

    /// Every card on every open board, staged by its list name.
    pub async fn fetch_deals(&self) -> Result<Vec<CrmDeal>, ConnectorError> {
        let mut deals = Vec::new();
        for board in self.get_boards().await? {
            let lists = self.get_lists(&board.id).await?;
            let cards: Vec<TrelloCard> = self
                .core
                .get(&self.core.api_url(&format!("/boards/{}/cards", board.id)))
                .await?;
            deals.extend(cards.into_iter().map(|card| {
                let stage = card
                    .id_list
                    .as_ref()
                    .and_then(|id| lists.iter().find(|l| &l.id == id))
                    .map(|l| l.name.clone());
                CrmDeal {
                    external_id: card.id,
                    name: card.name,
                    amount: None,
                    stage,
                    close_date: card.due,
                }
            }));
        }
        Ok(deals)
    }
}

fn split_full_name(full_name: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(full_name) = full_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return (None, None);
    };
    match full_name.split_once(' ') {
        Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
        None => (Some(full_name.to_string()), None),
    }
}

fn entity_for_action(action_type: &str) -> Option<SyncEntity> {
    match action_type {
        "createCard" | "updateCard" | "deleteCard" => Some(SyncEntity::Deals),
        "updateBoard" | "createBoard" | "addMemberToBoard" => Some(SyncEntity::Contacts),
        other if other.ends_with("Organization") => Some(SyncEntity::Companies),
        _ => None,
    }
}

#[async_trait]
impl Connector for TrelloConnector {
    fn integration_type(&self) -> IntegrationType {
        IntegrationType::Trello
    }

    fn core(&self) -> &ConnectorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConnectorCore {
        &mut self.core
    }

    /// Trello's authorize endpoint also needs the application key.
    fn authorization_url(&self, state: &str) -> Result<Url, ConnectorError> {
        let mut url = self.core.authorization_url(state)?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("expiration", "never")
            .append_pair("name", "TradeFlow");
        Ok(url)
    }

    /// Trello signs the raw body followed by the `callbackURL` it was
    /// registered with, which is our receive URL.
    fn signed_payload(&self, raw_body: &[u8], receive_url: Option<&str>) -> Vec<u8> {
        let mut signed = raw_body.to_vec();
        if let Some(receive_url) = receive_url {
            signed.extend_from_slice(receive_url.as_bytes());
        }
        signed
    }

    /// Deliveries are signed with the application's API secret.
    fn signing_secret(&self) -> Option<&str> {
        Some(self.api_secret.as_str()).filter(|s| !s.is_empty())
    }

    fn validate_webhook(&self, payload: &[u8], signature: &str, secret: &str) -> bool {
        verify_hmac_sha1_base64(payload, signature, secret)
    }

    async fn process_webhook(&self, data: WebhookData) -> Result<(), ConnectorError> {
        let action_type = data
            .data
            .pointer("/action/type")
            .and_then(Value::as_str)
            .unwrap_or(data.event.as_str());
        let entities: Vec<SyncEntity> = entity_for_action(action_type).into_iter().collect();

        info!(action_type, entities = ?entities, "Processing Trello webhook");
        resync_entities(self, &entities).await;
        Ok(())
    }

    async fn sync_contacts(&self) -> SyncResult {
        SyncResult::from_outcome(self.fetch_contacts().await.map(|items| items.len()))
    }

    async fn sync_companies(&self) -> SyncResult {
        SyncResult::from_outcome(self.fetch_companies().await.map(|items| items.len()))
    }

    async fn sync_deals(&self) -> SyncResult {
        SyncResult::from_outcome(self.fetch_deals().await.map(|items| items.len()))
    }

    async fn test_connection(&self) -> bool {
        self.get_user_info().await.is_ok()
    }

    async fn get_user_info(&self) -> Result<Value, ConnectorError> {
        self.core.get(&self.core.api_url("/members/me")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_routing() {
        assert_eq!(entity_for_action("createCard"), Some(SyncEntity::Deals));
        assert_eq!(entity_for_action("deleteCard"), Some(SyncEntity::Deals));
        assert_eq!(entity_for_action("addMemberToBoard"), Some(SyncEntity::Contacts));
        assert_eq!(entity_for_action("updateOrganization"), Some(SyncEntity::Companies));
        assert_eq!(entity_for_action("commentCard"), None);
    }

    #[test]
    fn test_split_full_name() {
        assert_eq!(
            split_full_name(Some("Grace Brewster Hopper")),
            (Some("Grace".into()), Some("Brewster Hopper".into()))
        );
        assert_eq!(split_full_name(Some("Cher")), (Some("Cher".into()), None));
        assert_eq!(split_full_name(Some("  ")), (None, None));
    }

    #[test]
    fn test_authorization_url_includes_key() {
        let credentials = TrelloCredentials {
            api_key: "trello-key".into(),
            ..Default::default()
        };
        let connector = TrelloConnector::new(reqwest::Client::new(), &credentials);
        let url = connector.authorization_url("nonce").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("key".into(), "trello-key".into())));
        assert!(pairs.contains(&("state".into(), "nonce".into())));
        assert!(pairs.contains(&("scope".into(), "read write".into())));
    }
}
