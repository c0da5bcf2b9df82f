//! Integration metadata types
//!
//! Static descriptive tables shown to users when choosing an integration.

use serde::Serialize;

use crate::connectors::factory::IntegrationType;

/// Authentication scheme an integration uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// OAuth 2.0 authorization code flow with a bearer token
    OAuth2,
    /// Application key plus user token sent as query parameters
    KeyAndToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationInfo {
    #[serde(rename = "type")]
    pub integration_type: IntegrationType,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub auth_type: AuthType,
    pub supports_webhooks: bool,
}

/// What a connector can do beyond the uniform contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationCapabilities {
    #[serde(rename = "type")]
    pub integration_type: IntegrationType,
    pub sync_contacts: bool,
    pub sync_companies: bool,
    pub sync_deals: bool,
    pub webhooks: bool,
    pub features: Vec<&'static str>,
}

pub fn integration_info(integration_type: IntegrationType) -> IntegrationInfo {
    let (name, description, category, auth_type) = match integration_type {
        IntegrationType::Hubspot => (
            "HubSpot",
            "Sync contacts, companies and deals with HubSpot CRM",
            "crm",
            AuthType::OAuth2,
        ),
        IntegrationType::Trello => (
            "Trello",
            "Mirror boards, cards and members from Trello",
            "project_management",
            AuthType::KeyAndToken,
        ),
        IntegrationType::Bigin => (
            "Bigin by Zoho",
            "Sync contacts, companies and pipelines with Zoho Bigin",
            "crm",
            AuthType::OAuth2,
        ),
        IntegrationType::Onedrive => (
            "OneDrive",
            "Browse and upload files to Microsoft OneDrive",
            "storage",
            AuthType::OAuth2,
        ),
        IntegrationType::Onenote => (
            "OneNote",
            "Create pages in Microsoft OneNote notebooks",
            "productivity",
            AuthType::OAuth2,
        ),
        IntegrationType::Outlook => (
            "Outlook",
            "Send email and sync contacts with Microsoft Outlook",
            "communication",
            AuthType::OAuth2,
        ),
        IntegrationType::Teams => (
            "Microsoft Teams",
            "Post messages to Microsoft Teams channels",
            "communication",
            AuthType::OAuth2,
        ),
    };

    IntegrationInfo {
        integration_type,
        name,
        description,
        category,
        auth_type,
        supports_webhooks: true,
    }
}

pub fn integration_capabilities(integration_type: IntegrationType) -> IntegrationCapabilities {
    let (contacts, companies, deals, features): (bool, bool, bool, Vec<&'static str>) =
        match integration_type {
            IntegrationType::Hubspot => (
                true,
                true,
                true,
                vec!["create_contact", "update_contact", "create_company", "create_deal", "update_deal"],
            ),
            IntegrationType::Trello => (
                true,
                true,
                true,
                vec!["get_boards", "get_lists", "create_card", "update_card"],
            ),
            IntegrationType::Bigin => (
                true,
                true,
                true,
                vec!["create_contact", "update_contact", "create_deal"],
            ),
            IntegrationType::Onedrive => (false, false, false, vec!["list_files", "upload_file"]),
            IntegrationType::Onenote => (false, false, false, vec!["list_notebooks", "create_page"]),
            IntegrationType::Outlook => (
                true,
                false,
                false,
                vec!["list_messages", "send_email", "create_contact"],
            ),
            IntegrationType::Teams => (
                false,
                false,
                false,
                vec!["list_joined_teams", "list_channels", "send_message"],
            ),
        };

    IntegrationCapabilities {
        integration_type,
        sync_contacts: contacts,
        sync_companies: companies,
        sync_deals: deals,
        webhooks: true,
        features,
    }
}
