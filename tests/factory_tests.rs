//! Integration factory: type resolution and per-connector token isolation.

mod test_utils;

use reqwest::Method;
use serde_json::json;
use tradeflow::connectors::{ConnectorError, IntegrationType, SyncEntity};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_utils::{live_token, mock_factory};

#[tokio::test]
async fn every_type_rejects_requests_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let factory = mock_factory(&server);
    for integration_type in IntegrationType::ALL {
        let connector = factory.create_connector(integration_type.as_str()).unwrap();
        let err = connector
            .make_request(Method::GET, &format!("{}/anything", server.uri()), None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ConnectorError::NoToken),
            "{integration_type} sent a request without a token"
        );
        assert!(!connector.test_connection().await);
    }
}

#[tokio::test]
async fn connectors_do_not_share_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer user-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "a" })))
        .expect(1)
        .mount(&server)
        .await;

    let factory = mock_factory(&server);
    let mut first = factory.create(IntegrationType::Outlook);
    let second = factory.create(IntegrationType::Outlook);
    first.set_token(live_token("user-a"));

    assert_eq!(first.get_user_info().await.unwrap()["id"], "a");
    assert!(second.token().is_none());
    assert!(matches!(
        second.get_user_info().await.unwrap_err(),
        ConnectorError::NoToken
    ));
}

#[test]
fn unknown_type_is_a_factory_error() {
    let server_less = tradeflow::connectors::IntegrationFactory::with_http_client(
        Default::default(),
        reqwest::Client::new(),
    );
    let err = server_less.create_connector("salesforce").err().unwrap();
    assert_eq!(err.to_string(), "Unknown integration type: salesforce");
}

#[test]
fn capabilities_match_connector_behavior() {
    let factory = tradeflow::connectors::IntegrationFactory::with_http_client(
        Default::default(),
        reqwest::Client::new(),
    );
    for integration_type in [IntegrationType::Hubspot, IntegrationType::Bigin] {
        let caps = factory.capabilities(integration_type);
        assert!(caps.sync_contacts && caps.sync_companies && caps.sync_deals);
        assert!(caps.webhooks);
    }
    for integration_type in [
        IntegrationType::Onedrive,
        IntegrationType::Onenote,
        IntegrationType::Teams,
    ] {
        let caps = factory.capabilities(integration_type);
        assert!(!caps.sync_contacts && !caps.sync_companies && !caps.sync_deals);
    }
    assert_eq!(
        "contacts".parse::<SyncEntity>().unwrap(),
        SyncEntity::Contacts
    );
}
