//! Microsoft Graph connectors: paging, non-CRM syncs and clientState checks.

mod test_utils;

use serde_json::json;
use tradeflow::connectors::{
    Connector, OneDriveConnector, OneNoteConnector, OutlookConnector, SyncEntity, TeamsConnector,
    WebhookData,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_utils::{live_token, mock_credentials};

fn with_token<C: Connector>(mut connector: C) -> C {
    connector.set_token(live_token("graph-token"));
    connector
}

#[tokio::test]
async fn outlook_contacts_follow_next_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/contacts"))
        .and(query_param("$top", "100"))
        .and(header("authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": "c1", "givenName": "Ada", "emailAddresses": [{ "address": "ada@example.com" }] },
                { "id": "c2", "givenName": "Alan" }
            ],
            "@odata.nextLink": format!("{}/me/contacts/page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/contacts/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "c3", "surname": "Hopper", "companyName": "Navy" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(OutlookConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let contacts = connector.fetch_contacts().await.unwrap();
    assert_eq!(contacts.len(), 3);
    assert_eq!(contacts[0].email.as_deref(), Some("ada@example.com"));
    assert_eq!(contacts[2].company.as_deref(), Some("Navy"));

    let result = connector.sync(SyncEntity::Contacts).await;
    assert!(result.success());
    assert_eq!(result.items_synced(), 3);
}

#[tokio::test]
async fn non_crm_syncs_succeed_without_calling_graph() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let credentials = mock_credentials(&server);
    let connectors: Vec<Box<dyn Connector>> = vec![
        Box::new(with_token(OneDriveConnector::new(reqwest::Client::new(), &credentials))),
        Box::new(with_token(OneNoteConnector::new(reqwest::Client::new(), &credentials))),
        Box::new(with_token(TeamsConnector::new(reqwest::Client::new(), &credentials))),
    ];

    for connector in &connectors {
        for entity in [SyncEntity::Contacts, SyncEntity::Companies, SyncEntity::Deals] {
            let result = connector.sync(entity).await;
            assert!(result.success(), "{} {entity}", connector.integration_type());
            assert_eq!(result.items_synced(), 0);
        }
    }

    let outlook = with_token(OutlookConnector::new(reqwest::Client::new(), &credentials));
    assert_eq!(outlook.sync_deals().await.items_synced(), 0);
    assert!(outlook.sync_companies().await.success());
}

#[tokio::test]
async fn outlook_send_email_accepts_empty_202() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/sendMail"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(OutlookConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    connector
        .send_email(&["client@example.com"], "Quote", "<p>Attached</p>")
        .await
        .unwrap();
}

#[tokio::test]
async fn onedrive_lists_folder_children() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Quotes/2026:/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": "f1", "name": "march.pdf", "size": 2048, "file": {} },
                { "id": "d1", "name": "drafts", "folder": { "childCount": 2 } }
            ]
        })))
        .mount(&server)
        .await;

    let connector = with_token(OneDriveConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let items = connector.list_files(Some("/Quotes/2026/")).await.unwrap();

    assert_eq!(items.len(), 2);
    assert!(!items[0].is_folder());
    assert!(items[1].is_folder());
}

#[tokio::test]
async fn onedrive_upload_sends_raw_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/me/drive/root:/invoices/inv-1.txt:/content"))
        .and(header("content-type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "new-item", "name": "inv-1.txt", "size": 5, "file": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(OneDriveConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let item = connector
        .upload_file("/invoices/inv-1.txt", b"hello".to_vec())
        .await
        .unwrap();
    assert_eq!(item.id, "new-item");
}

#[tokio::test]
async fn onedrive_upload_encodes_special_characters() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/me/drive/root:/reports/Q1%20%232.pdf:/content"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "q1", "name": "Q1 #2.pdf", "file": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(OneDriveConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let item = connector
        .upload_file("reports/Q1 #2.pdf", b"pdf".to_vec())
        .await
        .unwrap();
    assert_eq!(item.name, "Q1 #2.pdf");
}

#[tokio::test]
async fn graph_paging_fails_when_next_link_never_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "c1" }],
            "@odata.nextLink": format!("{}/me/contacts", server.uri())
        })))
        .expect(500)
        .mount(&server)
        .await;

    let connector = with_token(OutlookConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let result = connector.sync_contacts().await;

    assert!(!result.success());
    assert_eq!(result.items_synced(), 0);
    assert_eq!(
        result.errors(),
        ["Pagination stopped after 500 pages with more results pending".to_string()]
    );
}

#[tokio::test]
async fn onenote_lists_notebooks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/onenote/notebooks"))
        .and(header("authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": "n1", "displayName": "Site visits", "isDefault": true },
                { "id": "n2", "displayName": "Estimates" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(OneNoteConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let notebooks = connector.list_notebooks().await.unwrap();

    assert_eq!(notebooks.len(), 2);
    assert_eq!(notebooks[0].display_name, "Site visits");
    assert_eq!(notebooks[0].is_default, Some(true));
}

#[tokio::test]
async fn teams_lists_channels_of_a_team() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/teams/t1/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "c1", "displayName": "General", "membershipType": "standard" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(TeamsConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let channels = connector.list_channels("t1").await.unwrap();

    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].display_name, "General");
    assert_eq!(channels[0].membership_type.as_deref(), Some("standard"));
}

#[tokio::test]
async fn onenote_create_page_posts_escaped_html() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/onenote/sections/s1/pages"))
        .and(header("content-type", "text/html"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p1", "title": "Site <visit>"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(OneNoteConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let page = connector
        .create_page("s1", "Site <visit>", "<p>Measured deck</p>")
        .await
        .unwrap();
    assert_eq!(page.id, "p1");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(body.contains("<title>Site &lt;visit&gt;</title>"));
    assert!(body.contains("<p>Measured deck</p>"));
}

#[tokio::test]
async fn teams_send_message_posts_html_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/teams/t1/channels/c1/messages"))
        .and(body_json(json!({ "body": { "contentType": "html", "content": "<b>Job done</b>" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "m1" })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(TeamsConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let message = connector.send_message("t1", "c1", "<b>Job done</b>").await.unwrap();
    assert_eq!(message["id"], "m1");
}

#[tokio::test]
async fn outlook_contact_notification_resyncs_contacts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = with_token(OutlookConnector::new(
        reqwest::Client::new(),
        &mock_credentials(&server),
    ));
    let payload = json!({ "value": [
        { "clientState": "s", "changeType": "updated", "resource": "Users/abc/Contacts/1" },
        { "clientState": "s", "changeType": "created", "resource": "Users/abc/Messages/9" }
    ]});
    connector
        .process_webhook(WebhookData::new("updated", payload))
        .await
        .unwrap();
}

#[test]
fn graph_webhooks_validate_client_state() {
    let server_less = mock_credentials_offline();
    let connector = TeamsConnector::new(reqwest::Client::new(), &server_less);
    let body = json!({ "value": [{ "clientState": "whsec_1", "resource": "teams/1" }] }).to_string();

    assert!(connector.signature_in_payload());
    assert!(connector.validate_webhook(body.as_bytes(), "", "whsec_1"));
    assert!(!connector.validate_webhook(body.as_bytes(), "", "whsec_2"));
}

fn mock_credentials_offline() -> tradeflow::config::ProviderCredentials {
    tradeflow::config::ProviderCredentials {
        api_base: Some("http://127.0.0.1:9".into()),
        ..Default::default()
    }
}
