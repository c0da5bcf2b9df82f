//! Zoho Bigin v1 connector
//!
//! Bigin pages with `page`/`per_page` and signals the end of a module either
//! with an empty `data` array, `info.more_records = false` or a bare
//! `204 No Content`.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::ProviderCredentials;
use crate::connectors::core::ConnectorCore;
use crate::connectors::crm::{CrmCompany, CrmContact, CrmDeal, id_field, number_field, str_field};
use crate::connectors::factory::IntegrationType;
use crate::connectors::signature::verify_hmac_sha256_hex;
use crate::connectors::trait_::{
    Connector, ConnectorError, OAuthConfig, SyncEntity, SyncResult, WebhookData, resync_entities,
};

pub const BIGIN_AUTHORIZATION_URL: &str = "https://accounts.zoho.com/oauth/v2/auth";
pub const BIGIN_TOKEN_URL: &str = "https://accounts.zoho.com/oauth/v2/token";
pub const BIGIN_API_BASE: &str = "https://www.zohoapis.com/bigin/v1";

pub const BIGIN_SCOPES: &[&str] = &[
    "ZohoBigin.modules.ALL",
    "ZohoBigin.settings.ALL",
    "ZohoBigin.users.READ",
];

const PER_PAGE: usize = 200;
const MAX_PAGES: usize = 500;

#[derive(Debug, Deserialize)]
struct BiginPage {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    info: Option<BiginPageInfo>,
}

#[derive(Debug, Deserialize)]
struct BiginPageInfo {
    #[serde(default)]
    more_records: Option<bool>,
}

pub struct BiginConnector {
    core: ConnectorCore,
}

impl BiginConnector {
    pub fn new(http: reqwest::Client, credentials: &ProviderCredentials) -> Self {
        let oauth = OAuthConfig {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
            authorization_url: credentials
                .authorization_url
                .clone()
                .unwrap_or_else(|| BIGIN_AUTHORIZATION_URL.to_string()),
            token_url: credentials
                .token_url
                .clone()
                .unwrap_or_else(|| BIGIN_TOKEN_URL.to_string()),
            scopes: BIGIN_SCOPES.iter().map(|s| s.to_string()).collect(),
        };
        let api_base = credentials.api_base.as_deref().unwrap_or(BIGIN_API_BASE);
        Self {
            core: ConnectorCore::new(http, oauth, api_base),
        }
    }

    /// Every record of `module`, page by page.
    async fn list_module(&self, module: &str) -> Result<Vec<Value>, ConnectorError> {
        let mut records = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = self
                .core
                .api_url(&format!("/{module}?page={page}&per_page={PER_PAGE}"));
            // 204 No Content parses as `None`.
            let body: Option<BiginPage> = self.core.get(&url).await?;
            let Some(body) = body else {
                return Ok(records);
            };

            let fetched = body.data.len();
            debug!(module, page, fetched, "Fetched Bigin page");
            if fetched == 0 {
                return Ok(records);
            }
            records.extend(body.data);

            if body.info.and_then(|i| i.more_records) == Some(false) {
                return Ok(records);
            }
        }

        Err(ConnectorError::PageLimitExceeded { pages: MAX_PAGES })
    }

    pub async fn fetch_contacts(&self) -> Result<Vec<CrmContact>, ConnectorError> {
        let records = self.list_module("Contacts").await?;
        Ok(records
            .iter()
            .map(|r| CrmContact {
                external_id: id_field(r, "id").unwrap_or_default(),
                first_name: str_field(r, "First_Name"),
                last_name: str_field(r, "Last_Name"),
                email: str_field(r, "Email"),
                phone: str_field(r, "Phone").or_else(|| str_field(r, "Mobile")),
                company: r
                    .pointer("/Account_Name/name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
            .collect())
    }

    pub async fn fetch_companies(&self) -> Result<Vec<CrmCompany>, ConnectorError> {
        let records = self.list_module("Companies").await?;
        Ok(records
            .iter()
            .map(|r| CrmCompany {
                external_id: id_field(r, "id").unwrap_or_default(),
                name: str_field(r, "Account_Name").unwrap_or_default(),
                domain: str_field(r, "Website"),
                industry: str_field(r, "Industry"),
            })
            .collect())
    }

    /// Bigin calls its deals "Pipelines".
    pub async fn fetch_deals(&self) -> Result<Vec<CrmDeal>, ConnectorError> {
        let records = self.list_module("Pipelines").await?;
        Ok(records
            .iter()
            .map(|r| CrmDeal {
                external_id: id_field(r, "id").unwrap_or_default(),
                name: str_field(r, "Deal_Name").unwrap_or_default(),
                amount: number_field(r, "Amount"),
                stage: str_field(r, "Stage"),
                close_date: str_field(r, "Closing_Date"),
            })
            .collect())
    }

    pub async fn create_contact(&self, contact: &CrmContact) -> Result<Value, ConnectorError> {
        let mut record = json!({
            "Last_Name": contact.last_name.clone().unwrap_or_default(),
        });
        if let Some(map) = record.as_object_mut() {
            if let Some(first) = &contact.first_name {
                map.insert("First_Name".into(), json!(first));
            }
            if let Some(email) = &contact.email {
                map.insert("Email".into(), json!(email));
            }
            if let Some(phone) = &contact.phone {
                map.insert("Phone".into(), json!(phone));
            }
        }
        self.write_record(Method::POST, "/Contacts", record).await
    }

    pub async fn update_contact(
        &self,
        contact_id: &str,
        fields: Value,
    ) -> Result<Value, ConnectorError> {
        self.write_record(Method::PUT, &format!("/Contacts/{contact_id}"), fields)
            .await
    }

    pub async fn create_deal(&self, deal: &CrmDeal) -> Result<Value, ConnectorError> {
        let mut record = json!({ "Deal_Name": deal.name });
        if let Some(map) = record.as_object_mut() {
            if let Some(amount) = deal.amount {
                map.insert("Amount".into(), json!(amount));
            }
            if let Some(stage) = &deal.stage {
                map.insert("Stage".into(), json!(stage));
            }
            if let Some(close_date) = &deal.close_date {
                map.insert("Closing_Date".into(), json!(close_date));
            }
        }
        self.write_record(Method::POST, "/Pipelines", record).await
    }

    /// Bigin wraps single-record writes in a `data` array.
    async fn write_record(
        &self,
        method: Method,
        path: &str,
        record: Value,
    ) -> Result<Value, ConnectorError> {
        self.core
            .send_json(method, &self.core.api_url(path), json!({ "data": [record] }))
            .await
    }
}

fn entity_for_module(module: &str) -> Option<SyncEntity> {
    match module {
        "Contacts" => Some(SyncEntity::Contacts),
        "Companies" | "Accounts" => Some(SyncEntity::Companies),
        "Pipelines" | "Deals" => Some(SyncEntity::Deals),
        _ => None,
    }
}

#[async_trait]
impl Connector for BiginConnector {
    fn integration_type(&self) -> IntegrationType {
        IntegrationType::Bigin
    }

    fn core(&self) -> &ConnectorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConnectorCore {
        &mut self.core
    }

    fn validate_webhook(&self, payload: &[u8], signature: &str, secret: &str) -> bool {
        verify_hmac_sha256_hex(payload, signature, secret)
    }

    async fn process_webhook(&self, data: WebhookData) -> Result<(), ConnectorError> {
        let module = data
            .data
            .get("module")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let entities: Vec<SyncEntity> = entity_for_module(module).into_iter().collect();

        info!(module, event = %data.event, "Processing Bigin webhook");
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
        self.core
            .get(&self.core.api_url("/users?type=CurrentUser"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_routing() {
        assert_eq!(entity_for_module("Contacts"), Some(SyncEntity::Contacts));
        assert_eq!(entity_for_module("Companies"), Some(SyncEntity::Companies));
        assert_eq!(entity_for_module("Pipelines"), Some(SyncEntity::Deals));
        assert_eq!(entity_for_module("Tasks"), None);
    }

    #[test]
    fn test_page_without_info_parses() {
        let page: BiginPage = serde_json::from_value(json!({"data": [{"id": "1"}]})).unwrap();
        assert_eq!(page.data.len(), 1);
        assert!(page.info.is_none());
    }
}
