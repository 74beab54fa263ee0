use crate::models::PaymentStatusSnapshot;
use crate::services::SubscriptionBackend;
use async_trait::async_trait;
use portal_core::error::AppError;
use std::sync::Arc;

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, code: &str) -> Result<PaymentStatusSnapshot, AppError>;
}

/// Payment-status endpoint, falling back to the current subscription when the
/// backend does not know the code yet. The fallback only counts when the
/// current subscription is the one being watched.
pub struct BackendStatusSource {
    backend: Arc<dyn SubscriptionBackend>,
    token: String,
}

impl BackendStatusSource {
    pub fn new(backend: Arc<dyn SubscriptionBackend>, token: impl Into<String>) -> Self {
        Self {
            backend,
            token: token.into(),
        }
    }
}

#[async_trait]
impl StatusSource for BackendStatusSource {
    async fn fetch(&self, code: &str) -> Result<PaymentStatusSnapshot, AppError> {
        match self.backend.payment_status(&self.token, code).await {
            Err(AppError::NotFound(_)) => {
                tracing::debug!(code, "Payment status not found, using current subscription");
                match self.backend.current_subscription(&self.token).await? {
                    Some(subscription) if subscription.code == code => {
                        Ok(PaymentStatusSnapshot::without_payments(subscription))
                    }
                    Some(subscription) => {
                        tracing::debug!(
                            code,
                            current = %subscription.code,
                            "Current subscription is a different one, skipping"
                        );
                        Err(AppError::NotFound(anyhow::anyhow!(
                            "No payment status for {}",
                            code
                        )))
                    }
                    None => Err(AppError::NotFound(anyhow::anyhow!(
                        "No subscription for {}",
                        code
                    ))),
                }
            }
            other => other,
        }
    }
}
