//! Outlook connector: mail plus the personal address book.
//!
//! Contacts sync from `/me/contacts`; companies and deals have no Outlook
//! counterpart and return the not-applicable sentinel.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::config::ProviderCredentials;
use crate::connectors::core::ConnectorCore;
use crate::connectors::crm::CrmContact;
use crate::connectors::factory::IntegrationType;
use crate::connectors::microsoft::{GraphClient, notification_summaries, validate_client_state};
use crate::connectors::trait_::{
    Connector, ConnectorError, SyncEntity, SyncResult, WebhookData, resync_entities,
};

pub const OUTLOOK_SCOPES: &[&str] = &["Mail.ReadWrite", "Mail.Send", "Contacts.ReadWrite"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub received_date_time: Option<String>,
    #[serde(default)]
    pub is_read: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphContact {
    id: String,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    surname: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    business_phones: Vec<String>,
    #[serde(default)]
    mobile_phone: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
}

impl From<GraphContact> for CrmContact {
    fn from(contact: GraphContact) -> Self {
        CrmContact {
            external_id: contact.id,
            first_name: contact.given_name,
            last_name: contact.surname,
            email: contact.email_addresses.into_iter().next().map(|e| e.address),
            phone: contact
                .business_phones
                .into_iter()
                .next()
                .or(contact.mobile_phone),
            company: contact.company_name,
        }
    }
}

pub struct OutlookConnector {
    graph: GraphClient,
}

impl OutlookConnector {
    pub fn new(http: reqwest::Client, credentials: &ProviderCredentials) -> Self {
        Self {
            graph: GraphClient::new(http, credentials, OUTLOOK_SCOPES),
        }
    }

    /// Most recent `top` messages of the mailbox.
    pub async fn list_messages(&self, top: u32) -> Result<Vec<MailMessage>, ConnectorError> {
        let page: crate::connectors::microsoft::GraphPage<MailMessage> = self
            .graph
            .get(&format!(
                "/me/messages?$top={}&$orderby=receivedDateTime desc",
                top.clamp(1, 1000)
            ))
            .await?;
        Ok(page.value)
    }

    /// Graph answers `202 Accepted` with an empty body.
    pub async fn send_email(
        &self,
        to: &[&str],
        subject: &str,
        body_html: &str,
    ) -> Result<(), ConnectorError> {
        let recipients: Vec<Value> = to
            .iter()
            .map(|address| json!({ "emailAddress": { "address": address } }))
            .collect();
        let message = json!({
            "message": {
                "subject": subject,
                "body": { "contentType": "HTML", "content": body_html },
                "toRecipients": recipients,
            },
            "saveToSentItems": true,
        });
        let _: Value = self
            .graph
            .core()
            .send_json(Method::POST, &self.graph.url("/me/sendMail"), message)
            .await?;
        Ok(())
    }

    pub async fn create_contact(&self, contact: &CrmContact) -> Result<Value, ConnectorError> {
        let mut body = json!({
            "givenName": contact.first_name,
            "surname": contact.last_name,
            "companyName": contact.company,
        });
        if let Some(map) = body.as_object_mut() {
            if let Some(email) = &contact.email {
                map.insert(
                    "emailAddresses".into(),
                    json!([{ "address": email, "name": contact.display_name() }]),
                );
            }
            if let Some(phone) = &contact.phone {
                map.insert("businessPhones".into(), json!([phone]));
            }
            map.retain(|_, v| !v.is_null());
        }
        self.graph
            .core()
            .send_json(Method::POST, &self.graph.url("/me/contacts"), body)
            .await
    }

    pub async fn fetch_contacts(&self) -> Result<Vec<CrmContact>, ConnectorError> {
        let contacts: Vec<GraphContact> = self.graph.get_all("/me/contacts?$top=100").await?;
        Ok(contacts.into_iter().map(CrmContact::from).collect())
    }
}

#[async_trait]
impl Connector for OutlookConnector {
    fn integration_type(&self) -> IntegrationType {
        IntegrationType::Outlook
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

    /// Contact notifications trigger a contacts resync; mail notifications are
    /// logged.
    async fn process_webhook(&self, data: WebhookData) -> Result<(), ConnectorError> {
        let mut entities = Vec::new();
        for (change_type, resource) in notification_summaries(&data.data) {
            info!(change_type, resource, "Received Outlook change notification");
            if resource.to_ascii_lowercase().contains("contacts") {
                entities.push(SyncEntity::Contacts);
            }
        }
        resync_entities(self, &entities).await;
        Ok(())
    }

    async fn sync_contacts(&self) -> SyncResult {
        SyncResult::from_outcome(self.fetch_contacts().await.map(|items| items.len()))
    }

    async fn sync_companies(&self) -> SyncResult {
        SyncResult::not_applicable()
    }

    async fn sync_deals(&self) -> SyncResult {
        SyncResult::not_applicable()
    }

    async fn test_connection(&self) -> bool {
        self.graph
            .get::<Value>("/me/mailFolders/inbox")
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
    fn test_graph_contact_mapping_prefers_business_phone() {
        let contact: GraphContact = serde_json::from_value(json!({
            "id": "AAMk",
            "givenName": "Linus",
            "surname": "Torvalds",
            "emailAddresses": [{"name": "Linus", "address": "linus@example.org"}],
            "businessPhones": ["+1 555 0100"],
            "mobilePhone": "+1 555 0199",
            "companyName": "Linux Foundation"
        }))
        .unwrap();

        let mapped = CrmContact::from(contact);
        assert_eq!(mapped.external_id, "AAMk");
        assert_eq!(mapped.email.as_deref(), Some("linus@example.org"));
        assert_eq!(mapped.phone.as_deref(), Some("+1 555 0100"));
        assert_eq!(mapped.company.as_deref(), Some("Linux Foundation"));
    }
}
