//! Shared setup for merchant-portal integration tests.
//!
//! The POS backend and the checkout script host are both a wiremock server.

#![allow(dead_code)]

use merchant_portal::config::{
    BackendSettings, CheckoutSettings, PollingSettings, ServerSettings, SessionSettings, Settings,
};
use merchant_portal::startup::build_router;
use merchant_portal::AppState;
use portal_core::config::TelemetrySettings;
use secrecy::Secret;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-access-token";
pub const SUBSCRIPTION_CODE: &str = "SUB-20240501-001";

pub fn test_settings(backend_uri: &str) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        backend: BackendSettings {
            base_url: format!("{}/api/v1", backend_uri),
            request_timeout_secs: 5,
        },
        checkout: CheckoutSettings {
            script_url: format!("{}/snap/snap.js", backend_uri),
            client_key: Secret::new("SB-Mid-client-test".to_string()),
            wait_timeout_secs: 30,
        },
        polling: PollingSettings {
            interval_secs: 1,
            request_timeout_secs: 2,
            verify_attempts: 2,
            verify_interval_ms: 50,
        },
        session: SessionSettings {
            skip_check_ttl_secs: 60,
            idempotency_ttl_secs: 300,
            in_flight_ttl_secs: 60,
            idle_ttl_secs: 3600,
            page_idle_secs: 600,
        },
        telemetry: TelemetrySettings::default(),
    }
}

/// `{ success: true, data }`
pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

pub fn rejected(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": false, "message": message }))
}

pub fn subscription_json(code: &str, status: &str) -> Value {
    json!({
        "code": code,
        "status": status,
        "amount": 149000,
        "plan": {
            "code": "PRO_MONTHLY",
            "name": "Pro Monthly",
            "price": 149000,
            "duration_days": 30,
            "is_trial": false,
            "features": ["Unlimited orders", "Receipt printing"]
        },
        "starts_at": null,
        "ends_at": null
    })
}

pub fn payment_status_json(code: &str, status: &str, transaction: Option<&str>) -> Value {
    let payments = match transaction {
        Some(tx) => json!([{
            "transaction_status": tx,
            "payment_method": "qris",
            "created_at": "2024-05-01T10:00:00Z"
        }]),
        None => json!([]),
    };
    json!({
        "subscription": subscription_json(code, status),
        "payments": payments
    })
}

pub fn receipt_json() -> Value {
    json!({
        "business": { "name": "Warung Sederhana", "address": "Jl. Merdeka 10", "phone": null },
        "order": {
            "order_number": "ORD-20240501-0007",
            "status": "completed",
            "payment_status": "paid",
            "items": [
                { "name": "Nasi Goreng", "quantity": 2, "price": 35000, "subtotal": 70000, "notes": null },
                { "name": "Es Teh", "quantity": 3, "price": 10000, "subtotal": 30000, "notes": null }
            ],
            "subtotal": 100000,
            "tax": 11000,
            "discount": 10000,
            "total": 101000,
            "customer_name": "Budi",
            "table_number": "7",
            "created_at": "2024-05-01T12:30:00Z"
        },
        "cashier": "Sari",
        "payment_method": "cash",
        "paid_amount": 150000
    })
}

/// Mount a GET stub on the backend.
pub async fn stub_get(server: &MockServer, endpoint: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1{}", endpoint)))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Test application wrapper.
pub struct TestApp {
    pub address: String,
    pub backend: MockServer,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the portal on a random port against a fresh mock backend.
    pub async fn spawn() -> Self {
        let backend = MockServer::start().await;
        let state = AppState::new(test_settings(&backend.uri())).expect("Failed to build state");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();

        let app = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            address: format!("http://127.0.0.1:{}", port),
            backend,
            state,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.address, route)
    }

    pub async fn get(&self, route: &str) -> reqwest::Response {
        self.client
            .get(self.url(route))
            .bearer_auth(TEST_TOKEN)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, route: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(route))
            .bearer_auth(TEST_TOKEN)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, route: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(route))
            .bearer_auth(TEST_TOKEN)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, route: &str) -> reqwest::Response {
        self.client
            .delete(self.url(route))
            .bearer_auth(TEST_TOKEN)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Poll the page view until `done` holds or the deadline passes.
    pub async fn wait_for_view<F>(&self, code: &str, done: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            let view: Value = self
                .get(&format!("/api/payments/{}/watch", code))
                .await
                .json()
                .await
                .expect("Failed to parse page view");
            if done(&view) || tokio::time::Instant::now() > deadline {
                return view;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}
