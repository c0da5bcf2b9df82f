//! Bigin connector: page-number pagination and its three end-of-data signals.

mod test_utils;

use serde_json::{Value, json};
use tradeflow::connectors::{BiginConnector, Connector, CrmDeal};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_utils::{live_token, mock_credentials};

fn contacts(range: std::ops::Range<usize>) -> Vec<Value> {
    range
        .map(|i| json!({ "id": i, "First_Name": format!("F{i}"), "Last_Name": "L" }))
        .collect()
}

fn connector(server: &MockServer) -> BiginConnector {
    let mut connector = BiginConnector::new(reqwest::Client::new(), &mock_credentials(server));
    connector.set_token(live_token("zoho-token"));
    connector
}

#[tokio::test]
async fn pages_until_more_records_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": contacts(0..200),
            "info": { "more_records": true }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": contacts(200..250),
            "info": { "more_records": false }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let result = connector(&server).sync_contacts().await;

    assert!(result.success());
    assert_eq!(result.items_synced(), 250);
}

#[tokio::test]
async fn no_content_ends_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Companies"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "1", "Account_Name": "Acme Roofing", "Website": "acme.example" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Companies"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let companies = connector(&server).fetch_companies().await.unwrap();

    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].name, "Acme Roofing");
    assert_eq!(companies[0].domain.as_deref(), Some("acme.example"));
}

#[tokio::test]
async fn empty_module_syncs_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Pipelines"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = connector(&server).sync_deals().await;

    assert!(result.success());
    assert_eq!(result.items_synced(), 0);
}

#[tokio::test]
async fn create_deal_wraps_record_in_data_array() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Pipelines"))
        .and(body_json(json!({
            "data": [{ "Deal_Name": "Deck build", "Amount": 4200.0, "Stage": "Qualification" }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": [{ "code": "SUCCESS", "details": { "id": "555" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = connector(&server)
        .create_deal(&CrmDeal {
            name: "Deck build".into(),
            amount: Some(4200.0),
            stage: Some("Qualification".into()),
            ..CrmDeal::default()
        })
        .await
        .unwrap();

    assert_eq!(response["data"][0]["details"]["id"], "555");
}

#[tokio::test]
async fn module_webhook_resyncs_matching_entity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Pipelines"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    connector(&server)
        .process_webhook(tradeflow::connectors::WebhookData::new(
            "update",
            json!({ "module": "Pipelines", "ids": ["555"] }),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn update_contact_puts_wrapped_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/Contacts/42"))
        .and(body_json(json!({ "data": [{ "Phone": "555-0142" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "code": "SUCCESS", "details": { "id": "42" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = connector(&server)
        .update_contact("42", json!({ "Phone": "555-0142" }))
        .await
        .unwrap();

    assert_eq!(response["data"][0]["code"], "SUCCESS");
}

#[tokio::test]
async fn sync_fails_when_more_records_never_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": contacts(0..1),
            "info": { "more_records": true }
        })))
        .expect(500)
        .mount(&server)
        .await;

    let result = connector(&server).sync_contacts().await;

    assert!(!result.success());
    assert_eq!(result.items_synced(), 0);
}
