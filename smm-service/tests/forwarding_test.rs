//! Order forwarding against a stub provider.

mod common;

use common::{dec, TestEnv};
use serde_json::json;
use smm_service::models::{OrderStatus, ProviderUpdate};
use smm_service::services::{FulfillmentError, ForwardOutcome, Store};
use std::time::Duration;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, ResponseTemplate};

async fn stub_add(env: &TestEnv, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(query_param("action", "add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&env.server)
        .await;
}

#[tokio::test]
async fn unlinked_service_is_not_forwarded_and_provider_is_untouched() {
    let env = TestEnv::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": 1 })))
        .expect(0)
        .mount(&env.server)
        .await;

    let service = env.unlinked_service().await;
    let order = env.place_order(&service).await;

    let outcome = env.forwarder().forward(order.id).await.unwrap();

    assert_eq!(outcome, ForwardOutcome::NotLinked);
    assert!(!outcome.forwarded());
    assert_eq!(env.order(order.id).await.status, OrderStatus::Pending);
}

#[tokio::test]
async fn order_priced_and_forwarded_with_order_field() {
    let env = TestEnv::new().await;
    stub_add(&env, json!({ "order": "98765" })).await;

    let service = env.linked_service(env.provider.id, "1021", None).await;
    let order = env.place_order(&service).await;
    assert_eq!(order.amount, dec("12.50"));

    let outcome = env.forwarder().forward(order.id).await.unwrap();
    assert_eq!(
        outcome,
        ForwardOutcome::Forwarded {
            external_order_id: "98765".to_string()
        }
    );

    let stored = env.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::Processing);
    assert_eq!(stored.external_order_id.as_deref(), Some("98765"));
}

#[tokio::test]
async fn numeric_id_field_is_accepted() {
    let env = TestEnv::new().await;
    stub_add(&env, json!({ "id": 4411 })).await;

    let service = env.linked_service(env.provider.id, "7", None).await;
    let order = env.place_order(&service).await;

    env.forwarder().forward(order.id).await.unwrap();

    let stored = env.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::Processing);
    assert_eq!(stored.external_order_id.as_deref(), Some("4411"));
}

#[tokio::test]
async fn provider_error_cancels_order() {
    let env = TestEnv::new().await;
    stub_add(&env, json!({ "error": "Not enough funds on balance" })).await;

    let service = env.linked_service(env.provider.id, "1021", None).await;
    let order = env.place_order(&service).await;

    let outcome = env.forwarder().forward(order.id).await.unwrap();
    assert_eq!(
        outcome,
        ForwardOutcome::Rejected {
            message: "Not enough funds on balance".to_string()
        }
    );

    let stored = env.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::Cancelled);
    assert!(stored.external_order_id.is_none());
}

#[tokio::test]
async fn already_forwarded_order_is_refused_without_provider_call() {
    let env = TestEnv::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": 2 })))
        .expect(0)
        .mount(&env.server)
        .await;

    let service = env.linked_service(env.provider.id, "1021", None).await;
    let order = env.forwarded_order(&service, "1").await;

    let err = env.forwarder().forward(order.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::AlreadyForwarded(id) if id == order.id));
    assert_eq!(env.order(order.id).await.external_order_id.as_deref(), Some("1"));
}

#[tokio::test]
async fn second_forward_after_success_is_refused() {
    let env = TestEnv::new().await;
    Mock::given(method("POST"))
        .and(query_param("action", "add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": 10 })))
        .expect(1)
        .mount(&env.server)
        .await;

    let service = env.linked_service(env.provider.id, "1021", None).await;
    let order = env.place_order(&service).await;
    let forwarder = env.forwarder();

    forwarder.forward(order.id).await.unwrap();
    let err = forwarder.forward(order.id).await.unwrap_err();

    assert!(matches!(err, FulfillmentError::AlreadyForwarded(_)));
}

#[tokio::test]
async fn inactive_provider_leaves_order_pending() {
    let env = TestEnv::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": 1 })))
        .expect(0)
        .mount(&env.server)
        .await;

    let service = env.linked_service(env.provider.id, "1021", None).await;
    let order = env.place_order(&service).await;
    env.store
        .update_provider(
            env.provider.id,
            ProviderUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = env.forwarder().forward(order.id).await.unwrap_err();

    assert!(matches!(err, FulfillmentError::ProviderUnavailable(_)));
    assert_eq!(env.order(order.id).await.status, OrderStatus::Pending);
}

#[tokio::test]
async fn transport_failure_leaves_order_pending_for_retry() {
    let env = TestEnv::new().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "order": 1 }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&env.server)
        .await;

    let service = env.linked_service(env.provider.id, "1021", None).await;
    let order = env.place_order(&service).await;

    let err = env.forwarder().forward(order.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Provider(_)));

    let stored = env.order(order.id).await;
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.external_order_id.is_none());
    assert!(stored.is_forwardable());
}
