//! Backend client behavior against a mock POS backend.

mod common;

use common::{ok, payment_status_json, rejected, subscription_json, test_settings, TEST_TOKEN};
use merchant_portal::forms::VerifyOtpForm;
use merchant_portal::models::{SubscriptionStatus, TransactionStatus};
use merchant_portal::services::{BackendClient, SubscriptionBackend};
use portal_core::error::AppError;
use portal_core::retry::RetryConfig;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(test_settings(&server.uri()).backend).expect("Failed to build client")
}

#[tokio::test]
async fn payment_status_parses_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subscriptions/SUB-1/payment-status"))
        .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
        .respond_with(ok(payment_status_json("SUB-1", "pending_payment", Some("settlement"))))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client(&server)
        .await
        .payment_status(TEST_TOKEN, "SUB-1")
        .await
        .expect("payment status");

    assert_eq!(snapshot.subscription.status, SubscriptionStatus::PendingPayment);
    assert_eq!(snapshot.transaction_status(), Some(TransactionStatus::Settlement));
}

#[tokio::test]
async fn unsuccessful_envelope_is_rejected_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/subscriptions/upgrade"))
        .respond_with(rejected("Plan is no longer available"))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .upgrade_subscription(TEST_TOKEN, "LEGACY")
        .await
        .unwrap_err();

    match err {
        AppError::Rejected(message) => assert_eq!(message, "Plan is no longer available"),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn error_statuses_map_to_error_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/profile"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "success": false, "message": "Token expired" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/orders/ORD-404/status"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client(&server).await;
    assert!(matches!(
        client.profile(TEST_TOKEN).await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        client.order_status("ORD-404").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn reads_retry_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subscriptions/current"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subscriptions/current"))
        .respond_with(ok(subscription_json("SUB-1", "active")))
        .mount(&server)
        .await;

    let current = client(&server)
        .await
        .current_subscription(TEST_TOKEN)
        .await
        .expect("current subscription");

    assert!(current.expect("subscription").is_active());
}

#[tokio::test]
async fn read_retry_policy_is_configurable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/subscriptions/history"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .await
        .with_read_retry(RetryConfig::no_retry())
        .subscription_history(TEST_TOKEN)
        .await;

    assert!(matches!(result, Err(AppError::ServiceUnavailable)));
}

#[tokio::test]
async fn mutations_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/subscriptions/SUB-1/verify"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .await
        .verify_subscription(TEST_TOKEN, "SUB-1", "key-1")
        .await;

    assert!(matches!(result, Err(AppError::Upstream { status: 502, .. })));
}

#[tokio::test]
async fn verify_sends_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/subscriptions/SUB-1/verify"))
        .and(header("idempotency-key", "3f1c7e9a-key"))
        .respond_with(ok(json!({
            "subscription": subscription_json("SUB-1", "active"),
            "activated": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .await
        .verify_subscription(TEST_TOKEN, "SUB-1", "3f1c7e9a-key")
        .await
        .expect("verification");

    assert!(result.confirms_active());
}

#[tokio::test]
async fn otp_phone_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/profile/whatsapp/otp"))
        .and(body_json(json!({ "phone": "6281234567890" })))
        .and(header_exists("idempotency-key"))
        .respond_with(ok(json!({ "expires_in": 300, "resend_after": 60 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/profile/whatsapp/verify"))
        .and(body_json(json!({ "phone": "6281234567890", "code": "123456" })))
        .respond_with(ok(json!({
            "name": "Rina Wijaya",
            "email": "rina@example.com",
            "phone": "6281234567890",
            "whatsapp_verified": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await;
    let dispatch = client
        .send_whatsapp_otp(TEST_TOKEN, "081234567890", "otp-key")
        .await
        .expect("otp dispatch");
    assert_eq!(dispatch.resend_after, Some(60));

    let profile = client
        .verify_whatsapp_otp(
            TEST_TOKEN,
            &VerifyOtpForm {
                phone: "+6281234567890".into(),
                code: "123456".into(),
            },
        )
        .await
        .expect("verified profile");
    assert!(profile.whatsapp_verified);
}

#[tokio::test]
async fn public_reads_carry_no_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/receipts/rcpt-abc"))
        .respond_with(ok(common::receipt_json()))
        .mount(&server)
        .await;

    let receipt = client(&server)
        .await
        .receipt("rcpt-abc")
        .await
        .expect("receipt");

    assert_eq!(receipt.computed_total(), 101_000);
    let requests = server.received_requests().await.expect("recorded requests");
    assert!(requests.iter().all(|r| r
        .headers
        .iter()
        .all(|(name, _)| name.as_str() != "authorization")));
}
