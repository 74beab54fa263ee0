//! Post-payment verification and landing.
//!
//! The backend activates a subscription asynchronously after the gateway
//! notifies it, so a freshly paid subscription can still read as pending for
//! a few seconds. Verification asks once, waits briefly on the session cache,
//! then proceeds optimistically and lets the gate skip its check for a while.

use super::resolver::Landing;
use crate::config::PollingSettings;
use crate::services::{Claim, IdempotencyRegistry, SessionHandle, SubscriptionBackend};
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct VerificationPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl From<&PollingSettings> for VerificationPolicy {
    fn from(settings: &PollingSettings) -> Self {
        Self {
            attempts: settings.verify_attempts,
            interval: settings.verify_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The backend confirmed an active subscription.
    Confirmed,
    /// The session cache reported the subscription active while waiting.
    Cached,
    /// Nothing confirmed it; proceeding anyway.
    Optimistic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub outcome: VerificationOutcome,
    pub landing: Landing,
    /// Another request for the same session and code already called the backend.
    pub deduplicated: bool,
}

pub fn verify_operation(session: &SessionHandle, code: &str) -> String {
    format!("verify:{}:{}", session.key().as_str(), code)
}

pub async fn verify_after_payment(
    backend: &dyn SubscriptionBackend,
    registry: &IdempotencyRegistry,
    session: &SessionHandle,
    token: &str,
    code: &str,
    policy: VerificationPolicy,
) -> Verification {
    let operation = verify_operation(session, code);
    let mut confirmed = false;
    let mut deduplicated = false;

    match registry.claim(&operation, Utc::now()) {
        Claim::Fresh(key) => {
            let claim = registry.guard(operation.as_str());
            match backend
                .verify_subscription(token, code, &key.to_string())
                .await
            {
                Ok(result) => {
                    claim.complete(Utc::now());
                    confirmed = result.confirms_active();
                    if confirmed {
                        session.set_active_subscription(Some(code.to_string()));
                    }
                    tracing::info!(
                        session = %session.key(),
                        code,
                        status = result.subscription.status.as_str(),
                        confirmed,
                        "Subscription verification returned"
                    );
                }
                Err(e) => {
                    claim.release();
                    tracing::warn!(session = %session.key(), code, error = %e, "Subscription verification failed");
                }
            }
        }
        claim => {
            deduplicated = true;
            tracing::debug!(session = %session.key(), code, ?claim, "Verification already requested");
        }
    }

    let outcome = if confirmed {
        VerificationOutcome::Confirmed
    } else {
        let mut cached = false;
        for _ in 0..policy.attempts {
            tokio::time::sleep(policy.interval).await;
            if session.is_active_subscription(code) {
                cached = true;
                break;
            }
        }

        if cached {
            VerificationOutcome::Cached
        } else {
            tracing::info!(session = %session.key(), code, "Activation not confirmed, proceeding optimistically");
            VerificationOutcome::Optimistic
        }
    };

    session.grant_skip_check(Utc::now());

    Verification {
        outcome,
        landing: resolve_landing(backend, session, token).await,
        deduplicated,
    }
}

/// Business setup when the user owns no business yet, otherwise the
/// dashboard. A failed lookup lands on the dashboard.
pub async fn resolve_landing(
    backend: &dyn SubscriptionBackend,
    session: &SessionHandle,
    token: &str,
) -> Landing {
    if let Some(businesses) = session.cached_businesses() {
        return Landing::for_business(!businesses.is_empty());
    }

    match backend.businesses(token).await {
        Ok(businesses) => {
            let landing = Landing::for_business(!businesses.is_empty());
            session.cache_businesses(businesses);
            landing
        }
        Err(e) => {
            tracing::warn!(session = %session.key(), error = %e, "Business lookup failed, landing on dashboard");
            Landing::Dashboard
        }
    }
}
