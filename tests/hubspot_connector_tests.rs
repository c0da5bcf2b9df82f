//! HubSpot connector against a mocked CRM v3 API.

mod test_utils;

use serde_json::{Value, json};
use tradeflow::connectors::{
    Connector, ConnectorError, CrmCompany, CrmContact, HubSpotConnector, SyncEntity, WebhookData,
};
use tradeflow::error::ApiError;
use tradeflow::connectors::signature::hmac_sha256_hex;
use wiremock::matchers::{
    body_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_utils::{live_token, mock_credentials};

fn contacts_page(start: usize, count: usize, next: Option<&str>) -> Value {
    let results: Vec<Value> = (start..start + count)
        .map(|i| {
            json!({
                "id": i.to_string(),
                "properties": { "firstname": format!("First{i}"), "email": format!("c{i}@example.com") }
            })
        })
        .collect();
    match next {
        Some(after) => json!({ "results": results, "paging": { "next": { "after": after } } }),
        None => json!({ "results": results }),
    }
}

async fn connector(server: &MockServer) -> HubSpotConnector {
    let mut connector = HubSpotConnector::new(reqwest::Client::new(), &mock_credentials(server));
    connector.set_token(live_token("hs-token"));
    connector
}

#[tokio::test]
async fn sync_contacts_follows_paging_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("limit", "100"))
        .and(query_param_is_missing("after"))
        .and(header("authorization", "Bearer hs-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(contacts_page(0, 100, Some("100"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("after", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(contacts_page(100, 100, Some("200"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("after", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(contacts_page(200, 100, None)))
        .expect(1)
        .mount(&server)
        .await;

    let result = connector(&server).await.sync_contacts().await;

    assert!(result.success());
    assert_eq!(result.items_synced(), 300);
}

#[tokio::test]
async fn sync_fails_when_a_later_page_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(contacts_page(0, 100, Some("100"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("after", "100"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let result = connector(&server).await.sync(SyncEntity::Contacts).await;

    assert!(!result.success());
    assert_eq!(result.items_synced(), 0);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0], "API request failed: internal error");
}

#[tokio::test]
async fn sync_fails_when_cursor_never_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(contacts_page(0, 1, Some("x"))))
        .expect(500)
        .mount(&server)
        .await;

    let result = connector(&server).await.sync_contacts().await;

    assert!(!result.success());
    assert_eq!(result.items_synced(), 0);
    assert_eq!(
        result.errors(),
        ["Pagination stopped after 500 pages with more results pending".to_string()]
    );
}

#[tokio::test]
async fn rate_limited_response_keeps_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/deals"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "12")
                .set_body_string("too many requests"),
        )
        .mount(&server)
        .await;

    let err = connector(&server).await.fetch_deals().await.unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::RateLimited {
            retry_after: Some(12),
            ..
        }
    ));
    assert!(err.is_retryable());

    let api_error: ApiError = err.into();
    assert_eq!(api_error.status.as_u16(), 429);
    assert_eq!(api_error.retry_after, Some(12));
}

#[tokio::test]
async fn fetch_deals_maps_properties() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/deals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "77",
                "properties": {
                    "dealname": "Kitchen remodel",
                    "amount": "12500.50",
                    "dealstage": "qualifiedtobuy",
                    "closedate": "2026-11-01"
                }
            }]
        })))
        .mount(&server)
        .await;

    let deals = connector(&server).await.fetch_deals().await.unwrap();

    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].external_id, "77");
    assert_eq!(deals[0].name, "Kitchen remodel");
    assert_eq!(deals[0].amount, Some(12500.5));
    assert_eq!(deals[0].stage.as_deref(), Some("qualifiedtobuy"));
}

#[tokio::test]
async fn create_contact_posts_properties() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts"))
        .and(body_json(json!({
            "properties": {
                "firstname": "Ada",
                "lastname": "Lovelace",
                "email": "ada@example.com"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "901" })))
        .expect(1)
        .mount(&server)
        .await;

    let contact = CrmContact {
        first_name: Some("Ada".into()),
        last_name: Some("Lovelace".into()),
        email: Some("ada@example.com".into()),
        ..CrmContact::default()
    };
    let created = connector(&server).await.create_contact(&contact).await.unwrap();

    assert_eq!(created["id"], "901");
}

#[tokio::test]
async fn contact_webhook_triggers_contact_resync() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(contacts_page(0, 3, None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/deals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let payload = json!([{ "subscriptionType": "contact.propertyChange", "objectId": 1 }]);
    connector(&server)
        .await
        .process_webhook(WebhookData::new("contact.propertyChange", payload))
        .await
        .unwrap();
}

#[tokio::test]
async fn webhook_signature_is_hmac_sha256_of_body() {
    let server = MockServer::start().await;
    let connector = connector(&server).await;
    let body = br#"[{"subscriptionType":"deal.creation"}]"#;
    let signature = hmac_sha256_hex("app-secret", body);

    assert!(connector.validate_webhook(body, &signature, "app-secret"));
    assert!(connector.validate_webhook(body, &format!("sha256={signature}"), "app-secret"));
    assert!(!connector.validate_webhook(body, &signature, "other-secret"));
    assert!(!connector.validate_webhook(b"tampered", &signature, "app-secret"));
}

#[tokio::test]
async fn update_contact_patches_properties() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/crm/v3/objects/contacts/901"))
        .and(body_json(json!({ "properties": { "phone": "555-0100" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "901" })))
        .expect(1)
        .mount(&server)
        .await;

    let updated = connector(&server)
        .await
        .update_contact("901", json!({ "phone": "555-0100" }))
        .await
        .unwrap();

    assert_eq!(updated["id"], "901");
}

#[tokio::test]
async fn create_company_omits_unset_properties() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/companies"))
        .and(body_json(json!({
            "properties": { "name": "Acme Roofing", "domain": "acme.example" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "c-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let company = CrmCompany {
        name: "Acme Roofing".into(),
        domain: Some("acme.example".into()),
        ..CrmCompany::default()
    };
    let created = connector(&server).await.create_company(&company).await.unwrap();

    assert_eq!(created["id"], "c-1");
}

#[tokio::test]
async fn update_deal_patches_stage() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/crm/v3/objects/deals/77"))
        .and(body_json(json!({ "properties": { "dealstage": "closedwon" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "77" })))
        .expect(1)
        .mount(&server)
        .await;

    connector(&server)
        .await
        .update_deal("77", json!({ "dealstage": "closedwon" }))
        .await
        .unwrap();
}
