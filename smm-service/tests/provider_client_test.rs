//! Provider API client against a stub provider.

mod common;

use common::{dec, TestEnv, API_KEY};
use serde_json::json;
use smm_service::models::OrderStatus;
use smm_service::services::{ProviderApi, ProviderError};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn services_are_coerced_permissively() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(path("/api/v2"))
        .and(query_param("key", API_KEY))
        .and(query_param("action", "services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "service": 1,
                "name": "Followers",
                "type": "Default",
                "category": "Instagram",
                "rate": "0.90",
                "min": "50",
                "max": "10000"
            },
            { "service": "2", "name": "Views", "category": "YouTube", "rate": 1.25 },
            { "service": "3", "name": "Broken", "rate": "n/a", "min": "x" },
            { "name": "No id" }
        ])))
        .expect(1)
        .mount(&env.server)
        .await;

    let services = env.client.list_services(&env.provider).await.unwrap();

    assert_eq!(services.len(), 3);
    assert_eq!(services[0].service, "1");
    assert_eq!(services[0].rate, dec("0.90"));
    assert_eq!(services[0].min, 50);
    assert_eq!(services[0].service_type.as_deref(), Some("Default"));

    assert_eq!(services[1].rate, dec("1.25"));
    assert_eq!((services[1].min, services[1].max), (100, 10_000));

    assert_eq!(services[2].rate, dec("0"));
    assert_eq!(services[2].min, 100);
}

#[tokio::test]
async fn services_error_object_is_business_failure() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(query_param("action", "services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "Invalid API key" })))
        .mount(&env.server)
        .await;

    let err = env.client.list_services(&env.provider).await.unwrap_err();
    assert_eq!(err, ProviderError::Business("Invalid API key".to_string()));
}

#[tokio::test]
async fn services_non_array_is_malformed() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(query_param("action", "services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&env.server)
        .await;

    let err = env.client.list_services(&env.provider).await.unwrap_err();
    assert!(matches!(err, ProviderError::Response(_)));
}

#[tokio::test]
async fn add_sends_order_parameters() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(query_param("key", API_KEY))
        .and(query_param("action", "add"))
        .and(query_param("service", "1021"))
        .and(query_param("link", "https://instagram.com/p/abc123"))
        .and(query_param("quantity", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": 23501 })))
        .expect(1)
        .mount(&env.server)
        .await;

    let id = env
        .client
        .submit_order(&env.provider, "1021", "https://instagram.com/p/abc123", 1000)
        .await
        .unwrap();
    assert_eq!(id, "23501");
}

#[tokio::test]
async fn add_with_html_body_is_malformed() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(query_param("action", "add"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .submit_order(&env.provider, "1", "https://x.com/a", 100)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Response(_)));
}

#[tokio::test]
async fn catalog_gateway_error_page_is_a_provider_failure() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(query_param("action", "services"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&env.server)
        .await;

    let err = env.client.list_services(&env.provider).await.unwrap_err();
    assert!(matches!(err, ProviderError::Business(ref m) if m.contains("502")));
    assert!(!err.to_string().contains(API_KEY));
}

#[tokio::test]
async fn status_parses_string_counts_and_aliases() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .and(query_param("action", "status"))
        .and(query_param("order", "98765"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "charge": "0.27819",
            "start_count": "3572",
            "status": "In progress",
            "remains": "157",
            "currency": "USD"
        })))
        .mount(&env.server)
        .await;

    let status = env.client.check_status(&env.provider, "98765").await.unwrap();
    assert_eq!(status.status, Some(OrderStatus::Processing));
    assert_eq!(status.start_count, Some(3572));
    assert_eq!(status.remains, Some(157));
}

#[tokio::test]
async fn timeout_is_transport_error_without_key() {
    let env = TestEnv::new().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "order": 1 }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&env.server)
        .await;

    let err = env
        .client
        .submit_order(&env.provider, "1", "https://x.com/a", 100)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Transport(_)));
    assert!(!err.to_string().contains(API_KEY));
}

#[tokio::test]
async fn connection_failure_is_transport_error_without_key() {
    let env = TestEnv::new().await;
    let mut provider = env.provider.clone();
    provider.base_url = "http://127.0.0.1:9/api/v2".to_string();

    let err = env.client.list_services(&provider).await.unwrap_err();

    assert!(matches!(err, ProviderError::Transport(_)));
    assert!(!err.to_string().contains(API_KEY));
}
