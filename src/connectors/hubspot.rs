//! HubSpot CRM v3 connector
//!
//! Syncs contacts, companies and deals by following the `paging.next.after`
//! cursor, validates HMAC-SHA256 webhook signatures and routes
//! `subscriptionType` events to a resync of the matching object type.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::config::ProviderCredentials;
use crate::connectors::core::ConnectorCore;
use crate::connectors::crm::{CrmCompany, CrmContact, CrmDeal};
use crate::connectors::factory::IntegrationType;
use crate::connectors::signature::verify_hmac_sha256_hex;
use crate::connectors::trait_::{
    Connector, ConnectorError, OAuthConfig, SyncEntity, SyncResult, WebhookData, resync_entities,
};

pub const HUBSPOT_AUTHORIZATION_URL: &str = "https://app.hubspot.com/oauth/authorize";
pub const HUBSPOT_TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";
pub const HUBSPOT_API_BASE: &str = "https://api.hubapi.com";

pub const HUBSPOT_SCOPES: &[&str] = &[
    "crm.objects.contacts.read",
    "crm.objects.contacts.write",
    "crm.objects.companies.read",
    "crm.objects.companies.write",
    "crm.objects.deals.read",
    "crm.objects.deals.write",
];

const PAGE_LIMIT: usize = 100;
/// Safety limit to avoid runaway cursor loops.
const MAX_PAGES: usize = 500;

const CONTACT_PROPERTIES: &str = "firstname,lastname,email,phone,company";
const COMPANY_PROPERTIES: &str = "name,domain,industry";
const DEAL_PROPERTIES: &str = "dealname,amount,dealstage,closedate";

/// One CRM object as returned by the v3 list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct HubSpotObject {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Option<String>>,
}

impl HubSpotObject {
    fn prop(&self, name: &str) -> Option<String> {
        self.properties
            .get(name)
            .cloned()
            .flatten()
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct HubSpotPage {
    #[serde(default)]
    results: Vec<HubSpotObject>,
    #[serde(default)]
    paging: Option<HubSpotPaging>,
}

#[derive(Debug, Deserialize)]
struct HubSpotPaging {
    next: Option<HubSpotNext>,
}

#[derive(Debug, Deserialize)]
struct HubSpotNext {
    after: String,
}

pub struct HubSpotConnector {
    core: ConnectorCore,
}

impl HubSpotConnector {
    pub fn new(http: reqwest::Client, credentials: &ProviderCredentials) -> Self {
        let oauth = OAuthConfig {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
            authorization_url: credentials
                .authorization_url
                .clone()
                .unwrap_or_else(|| HUBSPOT_AUTHORIZATION_URL.to_string()),
            token_url: credentials
                .token_url
                .clone()
                .unwrap_or_else(|| HUBSPOT_TOKEN_URL.to_string()),
            scopes: HUBSPOT_SCOPES.iter().map(|s| s.to_string()).collect(),
        };
        let api_base = credentials.api_base.as_deref().unwrap_or(HUBSPOT_API_BASE);
        Self {
            core: ConnectorCore::new(http, oauth, api_base),
        }
    }

    /// Walk every page of `/crm/v3/objects/{object}`.
    async fn list_all(
        &self,
        object: &str,
        properties: &str,
    ) -> Result<Vec<HubSpotObject>, ConnectorError> {
        let base = self.core.api_url(&format!("/crm/v3/objects/{object}"));
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut url = url::Url::parse(&base)?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("limit", &PAGE_LIMIT.to_string())
                    .append_pair("properties", properties);
                if let Some(cursor) = &after {
                    query.append_pair("after", cursor);
                }
            }

            let body: HubSpotPage = self.core.get(url.as_str()).await?;
            debug!(
                object,
                page,
                fetched = body.results.len(),
                "Fetched HubSpot page"
            );
            items.extend(body.results);

            match body.paging.and_then(|p| p.next) {
                Some(next) => after = Some(next.after),
                None => return Ok(items),
            }
        }

        Err(ConnectorError::PageLimitExceeded { pages: MAX_PAGES })
    }

    pub async fn fetch_contacts(&self) -> Result<Vec<CrmContact>, ConnectorError> {
        let objects = self.list_all("contacts", CONTACT_PROPERTIES).await?;
        Ok(objects
            .into_iter()
            .map(|o| CrmContact {
                first_name: o.prop("firstname"),
                last_name: o.prop("lastname"),
                email: o.prop("email"),
                phone: o.prop("phone"),
                company: o.prop("company"),
                external_id: o.id,
            })
            .collect())
    }

    pub async fn fetch_companies(&self) -> Result<Vec<CrmCompany>, ConnectorError> {
        let objects = self.list_all("companies", COMPANY_PROPERTIES).await?;
        Ok(objects
            .into_iter()
            .map(|o| CrmCompany {
                name: o.prop("name").unwrap_or_default(),
                domain: o.prop("domain"),
                industry: o.prop("industry"),
                external_id: o.id,
            })
            .collect())
    }

    pub async fn fetch_deals(&self) -> Result<Vec<CrmDeal>, ConnectorError> {
        let objects = self.list_all("deals", DEAL_PROPERTIES).await?;
        Ok(objects
            .into_iter()
            .map(|o| CrmDeal {
                name: o.prop("dealname").unwrap_or_default(),
                amount: o.prop("amount").and_then(|a| a.parse().ok()),
                stage: o.prop("dealstage"),
                close_date: o.prop("closedate"),
                external_id: o.id,
            })
            .collect())
    }

    pub async fn create_contact(&self, contact: &CrmContact) -> Result<Value, ConnectorError> {
        let properties = json!({
            "firstname": contact.first_name,
            "lastname": contact.last_name,
            "email": contact.email,
            "phone": contact.phone,
            "company": contact.company,
        });
        self.write_object(Method::POST, "contacts", None, strip_nulls(properties))
            .await
    }

    pub async fn update_contact(
        &self,
        contact_id: &str,
        properties: Value,
    ) -> Result<Value, ConnectorError> {
        self.write_object(Method::PATCH, "contacts", Some(contact_id), properties)
            .await
    }

    pub async fn create_company(&self, company: &CrmCompany) -> Result<Value, ConnectorError> {
        let properties = json!({
            "name": company.name,
            "domain": company.domain,
            "industry": company.industry,
        });
        self.write_object(Method::POST, "companies", None, strip_nulls(properties))
            .await
    }

    pub async fn create_deal(&self, deal: &CrmDeal) -> Result<Value, ConnectorError> {
        let properties = json!({
            "dealname": deal.name,
            "amount": deal.amount.map(|a| a.to_string()),
            "dealstage": deal.stage,
            "closedate": deal.close_date,
        });
        self.write_object(Method::POST, "deals", None, strip_nulls(properties))
            .await
    }

    pub async fn update_deal(
        &self,
        deal_id: &str,
        properties: Value,
    ) -> Result<Value, ConnectorError> {
        self.write_object(Method::PATCH, "deals", Some(deal_id), properties)
            .await
    }

    async fn write_object(
        &self,
        method: Method,
        object: &str,
        id: Option<&str>,
        properties: Value,
    ) -> Result<Value, ConnectorError> {
        let path = match id {
            Some(id) => format!("/crm/v3/objects/{object}/{id}"),
            None => format!("/crm/v3/objects/{object}"),
        };
        self.core
            .send_json(method, &self.core.api_url(&path), json!({ "properties": properties }))
            .await
    }
}

fn strip_nulls(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.retain(|_, v| !v.is_null());
    }
    value
}

/// `contact.creation` -> contacts, `deal.propertyChange` -> deals, ...
fn entity_for_subscription(subscription_type: &str) -> Option<SyncEntity> {
    let (object, _) = subscription_type.split_once('.')?;
    match object {
        "contact" => Some(SyncEntity::Contacts),
        "company" => Some(SyncEntity::Companies),
        "deal" => Some(SyncEntity::Deals),
        _ => None,
    }
}

/// HubSpot batches events into a JSON array; single objects are accepted too.
fn subscription_entities(data: &WebhookData) -> Vec<SyncEntity> {
    let events: Vec<&Value> = match &data.data {
        Value::Array(events) => events.iter().collect(),
        other => vec![other],
    };

    let mut entities: Vec<SyncEntity> = events
        .into_iter()
        .filter_map(|e| e.get("subscriptionType").and_then(Value::as_str))
        .filter_map(entity_for_subscription)
        .collect();

    if entities.is_empty() {
        entities.extend(entity_for_subscription(&data.event));
    }
    entities
}

#[async_trait]
impl Connector for HubSpotConnector {
    fn integration_type(&self) -> IntegrationType {
        IntegrationType::Hubspot
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
        let entities = subscription_entities(&data);
        info!(
            event = %data.event,
            entities = ?entities,
            "Processing HubSpot webhook"
        );
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
        let url = self.core.api_url("/crm/v3/objects/contacts?limit=1");
        self.core.get::<Value>(&url).await.is_ok()
    }

    async fn get_user_info(&self) -> Result<Value, ConnectorError> {
        let token = self.core.token().ok_or(ConnectorError::NoToken)?;
        let url = self
            .core
            .api_url(&format!("/oauth/v1/access-tokens/{}", token.access_token));
        self.core.get(&url).await
    }
}
