//! End-to-end purchase flow over the HTTP surface, running entirely on the
//! in-memory doubles.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sha2::Sha256;
use tower::ServiceExt;

use inkstand_core::{Amount, ProductId};
use inkstand_storefront::payments::SignatureVerifier;
use inkstand_storefront::payments::store::ProductRecord;
use inkstand_storefront::routes;
use inkstand_storefront::state::{AppState, StateParts};
use inkstand_storefront::testing::{
    FakeGateway, MemoryBlobStore, MemoryStore, RecordingNotifier, StaticCatalog,
};

const KEY_SECRET: &str = "k3y-s3cr3t-f0r-t3st-runs-0nly";
const WEBHOOK_SECRET: &str = "w3bh00k-s3cr3t-f0r-t3st-runs";

struct TestApp {
    router: Router,
    notifier: Arc<RecordingNotifier>,
    product: ProductId,
}

fn test_app() -> TestApp {
    let product = ProductId::generate();
    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(StaticCatalog::with(vec![ProductRecord {
        id: product,
        name: "Field Notes: Letterpress".to_owned(),
        price: Amount::new(50_000).unwrap(),
        file_path: "field-notes.pdf".to_owned(),
    }]));
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.put("field-notes.pdf", b"pdf bytes".to_vec());
    let notifier = Arc::new(RecordingNotifier::new());

    let state = AppState::assemble(
        StateParts {
            orders: store.clone(),
            purchasers: store.clone(),
            tokens: store.clone(),
            catalog,
            blobs,
            notifier: notifier.clone(),
            gateway: Arc::new(FakeGateway::new()),
            verifier: SignatureVerifier::new(KEY_SECRET.into(), WEBHOOK_SECRET.into()),
            payments_key_id: "key_test_abc".to_owned(),
            currency: "INR".to_owned(),
        },
        None,
    );

    TestApp {
        router: routes::routes().with_state(state),
        notifier,
        product,
    }
}

fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn captured_body(gateway_order_id: &str, payment_id: &str, amount: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": gateway_order_id,
                    "amount": amount,
                    "email": "buyer@example.com"
                }
            }
        }
    }))
    .unwrap()
}

fn failed_body(gateway_order_id: &str, payment_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": "payment.failed",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": gateway_order_id,
                    "amount": 50_000
                }
            }
        }
    }))
    .unwrap()
}

async fn send_json(router: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn send_webhook(router: &Router, body: &[u8], signature: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payments")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-gateway-signature", signature)
                .body(Body::from(body.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn checkout(app: &TestApp) -> Value {
    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/checkout",
        json!({ "product_id": app.product, "email": "buyer@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_full_purchase_flow() {
    let app = test_app();

    // Checkout opens a gateway order at the catalog price.
    let checkout = checkout(&app).await;
    let gateway_order_id = checkout["gateway_order_id"].as_str().unwrap().to_owned();
    assert_eq!(checkout["amount"], 50_000);
    assert_eq!(checkout["currency"], "INR");
    assert_eq!(checkout["key_id"], "key_test_abc");

    // Signed capture webhook settles the order.
    let body = captured_body(&gateway_order_id, "pay_1", 50_000);
    let (status, ack) = send_webhook(&app.router, &body, &sign(WEBHOOK_SECRET, &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "ok");
    assert_eq!(app.notifier.sent().len(), 1);

    // The success page sees a completed order with a live download token.
    let (status, summary) = send_json(
        &app.router,
        "GET",
        &format!("/api/orders/{gateway_order_id}"),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["status"], "completed");
    let token = summary["download"]["token"].as_str().unwrap().to_owned();

    // The token yields the file with a sanitized attachment filename.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/downloads/{token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Field_Notes__Letterpress.pdf\""
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "9");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"pdf bytes");

    // Identical redelivery is acknowledged without a second receipt.
    let body = captured_body(&gateway_order_id, "pay_1", 50_000);
    let (status, ack) = send_webhook(&app.router, &body, &sign(WEBHOOK_SECRET, &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "ok");
    assert_eq!(app.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature_without_mutation() {
    let app = test_app();
    let checkout = checkout(&app).await;
    let gateway_order_id = checkout["gateway_order_id"].as_str().unwrap().to_owned();

    let body = captured_body(&gateway_order_id, "pay_1", 50_000);
    let (status, _) = send_webhook(&app.router, &body, &sign("wrong-secret-entirely", &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing settled, so the summary still reads pending with no token.
    let (status, summary) = send_json(
        &app.router,
        "GET",
        &format!("/api/orders/{gateway_order_id}"),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["status"], "pending");
    assert!(summary["download"].is_null());
    assert!(app.notifier.sent().is_empty());

    // The correctly signed redelivery then succeeds.
    let (status, ack) = send_webhook(&app.router, &body, &sign(WEBHOOK_SECRET, &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "ok");
}

#[tokio::test]
async fn test_confirmation_endpoint_verifies_signature() {
    let app = test_app();
    let checkout = checkout(&app).await;
    let gateway_order_id = checkout["gateway_order_id"].as_str().unwrap().to_owned();

    // Tampered signature: 401, order untouched.
    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/payments/verify",
        json!({
            "gateway_order_id": gateway_order_id,
            "gateway_payment_id": "pay_1",
            "signature": "deadbeef"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.notifier.sent().is_empty());

    // Valid signature over "order|payment" settles the order.
    let payload = format!("{gateway_order_id}|pay_1");
    let (status, body) = send_json(
        &app.router,
        "POST",
        "/api/payments/verify",
        json!({
            "gateway_order_id": gateway_order_id,
            "gateway_payment_id": "pay_1",
            "signature": sign(KEY_SECRET, payload.as_bytes())
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["download"]["token"].is_string());
    assert_eq!(app.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_contradictory_outcome_is_acknowledged_not_applied() {
    let app = test_app();
    let checkout = checkout(&app).await;
    let gateway_order_id = checkout["gateway_order_id"].as_str().unwrap().to_owned();

    let body = captured_body(&gateway_order_id, "pay_1", 50_000);
    send_webhook(&app.router, &body, &sign(WEBHOOK_SECRET, &body)).await;

    // A failure event for the captured payment is acked, never applied.
    let body = failed_body(&gateway_order_id, "pay_1");
    let (status, ack) = send_webhook(&app.router, &body, &sign(WEBHOOK_SECRET, &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "conflict");

    let (_, summary) = send_json(
        &app.router,
        "GET",
        &format!("/api/orders/{gateway_order_id}"),
        Value::Null,
    )
    .await;
    assert_eq!(summary["status"], "completed");
}

#[tokio::test]
async fn test_webhook_for_unknown_order_is_retryable() {
    let app = test_app();

    let body = captured_body("order_nobody_opened", "pay_1", 50_000);
    let (status, _) = send_webhook(&app.router, &body, &sign(WEBHOOK_SECRET, &body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_or_malformed_tokens_land_on_expired_page() {
    let app = test_app();

    for path in [
        format!("/downloads/{}", uuid::Uuid::new_v4()),
        "/downloads/not-a-token".to_owned(),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/downloads/expired");
    }

    // The landing page itself renders.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/downloads/expired")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_checkout_rejects_bad_input() {
    let app = test_app();

    // Unknown product.
    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/checkout",
        json!({ "product_id": ProductId::generate(), "email": "buyer@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unparseable email.
    let (status, _) = send_json(
        &app.router,
        "POST",
        "/api/checkout",
        json!({ "product_id": app.product, "email": "not-an-email" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
