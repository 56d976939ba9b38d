//! HTTP API through the router.

mod common;

use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use axum::Router;
use common::{dec, TestEnv, API_KEY};
use serde_json::{json, Value};
use smm_service::middleware::{USER_ID_HEADER, USER_ROLE_HEADER};
use smm_service::startup::{router, AppState};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, ResponseTemplate};

fn app(env: &TestEnv) -> Router {
    router(AppState::new(env.store(), env.providers()))
}

fn request(method: &str, uri: &str, user: Option<Uuid>, admin: bool, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    if admin {
        builder = builder.header(USER_ROLE_HEADER, "admin");
    }
    match body {
        Some(body) => builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let env = TestEnv::new().await;
    let (status, body) = send(app(&env), request("GET", "/health", None, false, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn user_routes_require_identity() {
    let env = TestEnv::new().await;
    let (status, _) = send(app(&env), request("GET", "/balance", None, false, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let env = TestEnv::new().await;
    let (status, _) = send(
        app(&env),
        request("GET", "/admin/providers", Some(Uuid::new_v4()), false, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn provider_listing_masks_keys() {
    let env = TestEnv::new().await;
    let admin = Some(Uuid::new_v4());

    let (status, created) = send(
        app(&env),
        request(
            "POST",
            "/admin/providers",
            admin,
            true,
            Some(json!({
                "name": "Second",
                "base_url": "https://smm.example.com/api/v2",
                "api_key": "k-secret-98ab76cd"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["api_key_masked"], "****76cd");

    let response = app(&env)
        .oneshot(request("GET", "/admin/providers", admin, true, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(!text.contains(API_KEY));
    assert!(!text.contains("k-secret-98ab76cd"));
    let listed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn order_is_placed_and_forwarded() {
    let env = TestEnv::new().await;
    Mock::given(method("POST"))
        .and(query_param("action", "add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "order": "98765" })))
        .mount(&env.server)
        .await;

    let service = env.linked_service(env.provider.id, "1021", None).await;
    let user = Uuid::new_v4();
    env.store.set_balance(user, dec("20"));

    let (status, body) = send(
        app(&env),
        request(
            "POST",
            "/orders",
            Some(user),
            false,
            Some(json!({
                "service_id": service.id,
                "link": "https://instagram.com/p/abc123",
                "quantity": 1000
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["forward"]["forwarded"], true);
    assert_eq!(body["order"]["status"], "processing");
    assert_eq!(body["order"]["external_order_id"], "98765");
    assert_eq!(body["order"]["amount"], "12.50");
}

#[tokio::test]
async fn forward_failure_keeps_created_order() {
    let env = TestEnv::new().await;
    Mock::given(method("POST"))
        .and(query_param("action", "add"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&env.server)
        .await;

    let service = env.linked_service(env.provider.id, "1021", None).await;
    let user = Uuid::new_v4();
    env.store.set_balance(user, dec("20"));

    let (status, body) = send(
        app(&env),
        request(
            "POST",
            "/orders",
            Some(user),
            false,
            Some(json!({
                "service_id": service.id,
                "link": "https://instagram.com/p/abc123",
                "quantity": 1000
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["status"], "pending");
    assert!(body["forward_error"].is_string());
}

#[tokio::test]
async fn invalid_link_is_rejected() {
    let env = TestEnv::new().await;
    let service = env.unlinked_service().await;

    let (status, _) = send(
        app(&env),
        request(
            "POST",
            "/orders",
            Some(Uuid::new_v4()),
            false,
            Some(json!({ "service_id": service.id, "link": "not a url", "quantity": 1000 })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(env.store.order_count(), 0);
}

#[tokio::test]
async fn orders_are_private_to_their_owner() {
    let env = TestEnv::new().await;
    let service = env.unlinked_service().await;
    let order = env.place_order(&service).await;

    let (status, _) = send(
        app(&env),
        request("GET", &format!("/orders/{}", order.id), Some(Uuid::new_v4()), false, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        app(&env),
        request("GET", &format!("/orders/{}", order.id), Some(order.user_id), false, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], order.id.to_string());
}

#[tokio::test]
async fn forwarding_twice_is_a_conflict() {
    let env = TestEnv::new().await;
    let service = env.linked_service(env.provider.id, "1021", None).await;
    let order = env.forwarded_order(&service, "1").await;

    let (status, _) = send(
        app(&env),
        request(
            "POST",
            &format!("/admin/orders/{}/forward", order.id),
            Some(Uuid::new_v4()),
            true,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn payment_flow_credits_balance() {
    let env = TestEnv::new().await;
    let user = Uuid::new_v4();
    let admin = Some(Uuid::new_v4());

    let (status, payment) = send(
        app(&env),
        request(
            "POST",
            "/payments",
            Some(user),
            false,
            Some(json!({ "amount": "250.00", "utr": "UTR998877665544" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "pending");

    let approve = format!("/admin/payments/{}/approve", payment["id"].as_str().unwrap());
    let (status, _) = send(app(&env), request("POST", &approve, admin, true, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app(&env), request("POST", &approve, admin, true, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, balance) = send(app(&env), request("GET", "/balance", Some(user), false, None)).await;
    assert_eq!(balance["balance"], "250.00");
}

#[tokio::test]
async fn admin_sweeps_return_summaries() {
    let env = TestEnv::new().await;
    let admin = Some(Uuid::new_v4());

    let (status, body) = send(app(&env), request("POST", "/admin/reconcile", admin, true, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, body) = send(app(&env), request("POST", "/admin/rates/sync", admin, true, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providers"], 1);
}
