use crate::models::Subscription;
use crate::services::{SessionHandle, SubscriptionBackend};
use chrono::{DateTime, Utc};
use portal_core::error::AppError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// Just paid; the backend may not have caught up yet.
    RecentPayment,
    CachedActive,
    ActiveSubscription,
    NoActiveSubscription,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: GateReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

impl GateDecision {
    fn allow(reason: GateReason, subscription: Option<Subscription>) -> Self {
        Self {
            allowed: true,
            reason,
            redirect: None,
            subscription,
        }
    }
}

/// Whether dashboard pages may render for this session.
pub async fn check_subscription_gate(
    backend: &dyn SubscriptionBackend,
    session: &SessionHandle,
    token: &str,
    now: DateTime<Utc>,
) -> Result<GateDecision, AppError> {
    if session.store().should_skip_check(session.key(), now) {
        return Ok(GateDecision::allow(GateReason::RecentPayment, None));
    }
    if session.has_active_subscription() {
        return Ok(GateDecision::allow(GateReason::CachedActive, None));
    }

    let current = match backend.current_subscription(token).await {
        Ok(current) => current,
        Err(AppError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    match current {
        Some(subscription) if subscription.is_active() => {
            session.set_active_subscription(Some(subscription.code.clone()));
            Ok(GateDecision::allow(
                GateReason::ActiveSubscription,
                Some(subscription),
            ))
        }
        other => Ok(GateDecision {
            allowed: false,
            reason: GateReason::NoActiveSubscription,
            redirect: Some("/subscription"),
            subscription: other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BusinessSummary, PaymentStatusSnapshot, PaymentToken, SubscriptionStatus, VerifyResult,
    };
    use crate::services::{SessionKey, SessionStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct CurrentOnly(Option<SubscriptionStatus>);

    #[async_trait]
    impl SubscriptionBackend for CurrentOnly {
        async fn payment_status(
            &self,
            _token: &str,
            _code: &str,
        ) -> Result<PaymentStatusSnapshot, AppError> {
            unimplemented!()
        }

        async fn current_subscription(
            &self,
            _token: &str,
        ) -> Result<Option<Subscription>, AppError> {
            match self.0 {
                Some(status) => Ok(Some(Subscription {
                    code: "SUB-1".into(),
                    plan: None,
                    status,
                    amount: 0,
                    starts_at: None,
                    ends_at: None,
                })),
                None => Err(AppError::NotFound(anyhow::anyhow!("none"))),
            }
        }

        async fn verify_subscription(
            &self,
            _token: &str,
            _code: &str,
            _key: &str,
        ) -> Result<VerifyResult, AppError> {
            unimplemented!()
        }

        async fn payment_token(&self, _token: &str, _code: &str) -> Result<PaymentToken, AppError> {
            unimplemented!()
        }

        async fn businesses(&self, _token: &str) -> Result<Vec<BusinessSummary>, AppError> {
            unimplemented!()
        }
    }

    fn session() -> SessionHandle {
        SessionHandle::new(Arc::new(SessionStore::new(60)), SessionKey::from_token("t"))
    }

    #[tokio::test]
    async fn test_skip_window_bypasses_backend() {
        let session = session();
        let now = Utc::now();
        session.grant_skip_check(now);

        let decision = check_subscription_gate(&CurrentOnly(None), &session, "t", now)
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, GateReason::RecentPayment);
    }

    #[tokio::test]
    async fn test_active_subscription_is_cached() {
        let session = session();
        let backend = CurrentOnly(Some(SubscriptionStatus::Active));

        let decision = check_subscription_gate(&backend, &session, "t", Utc::now())
            .await
            .unwrap();
        assert_eq!(decision.reason, GateReason::ActiveSubscription);
        assert!(session.has_active_subscription());
    }

    #[tokio::test]
    async fn test_missing_subscription_redirects() {
        let session = session();

        let decision = check_subscription_gate(&CurrentOnly(None), &session, "t", Utc::now())
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.redirect, Some("/subscription"));

        let expired = CurrentOnly(Some(SubscriptionStatus::Expired));
        let decision = check_subscription_gate(&expired, &session, "t", Utc::now())
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert!(decision.subscription.is_some());
    }
}
