//! Hosted checkout invocation.
//!
//! The widget itself runs in the browser. The browser relays its callbacks to
//! `/api/payments/:code/checkout/events`, and [`SnapCheckout::deliver`] hands
//! them to the invocation the same session is waiting on for that code.

use super::session::SessionKey;
use crate::config::CheckoutSettings;
use crate::models::PaymentToken;
use async_trait::async_trait;
use dashmap::DashMap;
use portal_core::error::AppError;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, OnceCell};

/// Result payload reported by the checkout widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutResult {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub transaction_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
}

/// Callback relayed from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CheckoutEvent {
    Success {
        #[serde(default)]
        result: CheckoutResult,
    },
    Pending {
        #[serde(default)]
        result: Option<CheckoutResult>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    Close,
    /// Cross-frame messaging noise from the widget's iframe.
    FrameError {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Success { result: CheckoutResult },
    Pending { result: Option<CheckoutResult> },
    Error { message: String },
    Closed,
}

impl CheckoutOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutOutcome::Success { .. } => "success",
            CheckoutOutcome::Pending { .. } => "pending",
            CheckoutOutcome::Error { .. } => "error",
            CheckoutOutcome::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Signed-in session that opened the checkout; only it may answer.
    pub owner: SessionKey,
    pub code: String,
    pub token: PaymentToken,
}

/// What the browser needs to open the widget.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutClientConfig {
    pub script_url: String,
    pub client_key: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[async_trait]
pub trait CheckoutInvoker: Send + Sync {
    /// Open the checkout for `session` and wait for its first outcome.
    async fn invoke(&self, session: CheckoutSession) -> Result<CheckoutOutcome, AppError>;

    /// Route a browser callback to the waiting invocation. Returns false when
    /// `owner` is not waiting on `code`.
    fn deliver(&self, owner: &SessionKey, code: &str, event: CheckoutEvent) -> bool;

    fn client_config(&self, token: &PaymentToken) -> CheckoutClientConfig;
}

struct Waiter {
    id: u64,
    tx: mpsc::UnboundedSender<CheckoutEvent>,
}

type WaiterKey = (SessionKey, String);

pub struct SnapCheckout {
    http: Client,
    settings: CheckoutSettings,
    script: OnceCell<()>,
    waiters: DashMap<WaiterKey, Waiter>,
    next_id: AtomicU64,
}

impl SnapCheckout {
    pub fn new(settings: CheckoutSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
            script: OnceCell::new(),
            waiters: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.script.initialized()
    }

    /// Fetch the checkout script once per process. A failed load is not
    /// remembered, so the next invocation tries again.
    pub async fn ensure_loaded(&self) -> Result<(), AppError> {
        if self.is_loaded() {
            return Ok(());
        }

        self.script
            .get_or_try_init(|| async {
                let response = self
                    .http
                    .get(&self.settings.script_url)
                    .send()
                    .await
                    .map_err(AppError::from)?;

                if !response.status().is_success() {
                    return Err(AppError::Upstream {
                        status: response.status().as_u16(),
                        message: "Checkout script unavailable".to_string(),
                    });
                }

                tracing::info!(script_url = %self.settings.script_url, "Checkout script loaded");
                Ok(())
            })
            .await
            .map(|_| ())
    }

    pub fn is_waiting(&self, owner: &SessionKey, code: &str) -> bool {
        self.waiters.contains_key(&(owner.clone(), code.to_string()))
    }

    async fn await_outcome(
        &self,
        code: &str,
        rx: &mut mpsc::UnboundedReceiver<CheckoutEvent>,
    ) -> CheckoutOutcome {
        loop {
            let event = match rx.recv().await {
                Some(event) => event,
                // superseded by a newer invocation
                None => return CheckoutOutcome::Closed,
            };

            match event {
                CheckoutEvent::Success { result } => return CheckoutOutcome::Success { result },
                CheckoutEvent::Pending { result } => return CheckoutOutcome::Pending { result },
                CheckoutEvent::Error { message } => {
                    return CheckoutOutcome::Error {
                        message: message.unwrap_or_else(|| "Payment failed".to_string()),
                    }
                }
                CheckoutEvent::Close => return CheckoutOutcome::Closed,
                CheckoutEvent::FrameError { message } => {
                    tracing::debug!(
                        code,
                        message = message.as_deref().unwrap_or(""),
                        "Ignoring checkout frame error"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl CheckoutInvoker for SnapCheckout {
    async fn invoke(&self, session: CheckoutSession) -> Result<CheckoutOutcome, AppError> {
        self.ensure_loaded().await?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let key = (session.owner.clone(), session.code.clone());
        if self.waiters.insert(key.clone(), Waiter { id, tx }).is_some() {
            tracing::info!(code = %session.code, "Superseding earlier checkout");
        }

        let outcome = match tokio::time::timeout(
            self.settings.wait_timeout(),
            self.await_outcome(&session.code, &mut rx),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::info!(code = %session.code, "Checkout wait timed out, leaving it to polling");
                CheckoutOutcome::Pending { result: None }
            }
        };

        self.waiters.remove_if(&key, |_, waiter| waiter.id == id);

        tracing::info!(code = %session.code, outcome = outcome.as_str(), "Checkout finished");
        Ok(outcome)
    }

    fn deliver(&self, owner: &SessionKey, code: &str, event: CheckoutEvent) -> bool {
        match self.waiters.get(&(owner.clone(), code.to_string())) {
            Some(waiter) => waiter.tx.send(event).is_ok(),
            None => {
                tracing::debug!(session = %owner, code, "Checkout event with no waiter");
                false
            }
        }
    }

    fn client_config(&self, token: &PaymentToken) -> CheckoutClientConfig {
        CheckoutClientConfig {
            script_url: self.settings.script_url.clone(),
            client_key: self.settings.client_key.expose_secret().clone(),
            token: token.token.clone(),
            redirect_url: token.redirect_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use std::sync::Arc;

    fn settings(wait_timeout_secs: u64) -> CheckoutSettings {
        CheckoutSettings {
            script_url: "http://127.0.0.1:9/snap.js".into(),
            client_key: Secret::new("SB-Mid-client-test".into()),
            wait_timeout_secs,
        }
    }

    fn owner() -> SessionKey {
        SessionKey::from_token("owner-token")
    }

    fn session(code: &str) -> CheckoutSession {
        CheckoutSession {
            owner: owner(),
            code: code.into(),
            token: PaymentToken {
                token: "tok-1".into(),
                redirect_url: None,
            },
        }
    }

    /// Skip the network fetch for tests that only exercise waiting.
    async fn preloaded(wait_timeout_secs: u64) -> Arc<SnapCheckout> {
        let checkout = SnapCheckout::new(settings(wait_timeout_secs));
        checkout.script.set(()).unwrap();
        Arc::new(checkout)
    }

    async fn wait_for_waiter(checkout: &SnapCheckout, code: &str) {
        while !checkout.is_waiting(&owner(), code) {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_event_wire_format() {
        let event: CheckoutEvent = serde_json::from_str(
            r#"{"event":"success","result":{"order_id":"SUB-1","transaction_status":"settlement"}}"#,
        )
        .unwrap();
        assert!(matches!(event, CheckoutEvent::Success { .. }));

        let event: CheckoutEvent = serde_json::from_str(r#"{"event":"close"}"#).unwrap();
        assert!(matches!(event, CheckoutEvent::Close));
    }

    #[tokio::test]
    async fn test_frame_error_is_ignored() {
        let checkout = preloaded(60).await;
        let task = {
            let checkout = checkout.clone();
            tokio::spawn(async move { checkout.invoke(session("SUB-1")).await })
        };
        wait_for_waiter(&checkout, "SUB-1").await;

        assert!(checkout.deliver(
            &owner(),
            "SUB-1",
            CheckoutEvent::FrameError {
                message: Some("postMessage origin".into())
            }
        ));
        assert!(checkout.deliver(&owner(), "SUB-1", CheckoutEvent::Close));

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, CheckoutOutcome::Closed);
        assert!(!checkout.is_waiting(&owner(), "SUB-1"));
    }

    #[tokio::test]
    async fn test_newer_invocation_supersedes() {
        let checkout = preloaded(60).await;
        let first = {
            let checkout = checkout.clone();
            tokio::spawn(async move { checkout.invoke(session("SUB-1")).await })
        };
        wait_for_waiter(&checkout, "SUB-1").await;

        let second = {
            let checkout = checkout.clone();
            tokio::spawn(async move { checkout.invoke(session("SUB-1")).await })
        };

        assert_eq!(first.await.unwrap().unwrap(), CheckoutOutcome::Closed);

        wait_for_waiter(&checkout, "SUB-1").await;
        checkout.deliver(
            &owner(),
            "SUB-1",
            CheckoutEvent::Error {
                message: Some("Card declined".into()),
            },
        );
        assert_eq!(
            second.await.unwrap().unwrap(),
            CheckoutOutcome::Error {
                message: "Card declined".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_resolves_pending() {
        let checkout = preloaded(1).await;
        let outcome = checkout.invoke(session("SUB-1")).await.unwrap();
        assert_eq!(outcome, CheckoutOutcome::Pending { result: None });
        assert!(!checkout.is_waiting(&owner(), "SUB-1"));
    }

    #[tokio::test]
    async fn test_deliver_without_waiter() {
        let checkout = preloaded(60).await;
        assert!(!checkout.deliver(&owner(), "SUB-404", CheckoutEvent::Close));
    }

    #[tokio::test]
    async fn test_other_session_cannot_answer() {
        let checkout = preloaded(60).await;
        let task = {
            let checkout = checkout.clone();
            tokio::spawn(async move { checkout.invoke(session("SUB-1")).await })
        };
        wait_for_waiter(&checkout, "SUB-1").await;

        let intruder = SessionKey::from_token("intruder-token");
        assert!(!checkout.is_waiting(&intruder, "SUB-1"));
        assert!(!checkout.deliver(
            &intruder,
            "SUB-1",
            CheckoutEvent::Success {
                result: CheckoutResult::default()
            }
        ));

        assert!(checkout.deliver(&owner(), "SUB-1", CheckoutEvent::Close));
        assert_eq!(task.await.unwrap().unwrap(), CheckoutOutcome::Closed);
    }
}
