//! Payment attempt models reported by the payment gateway through the backend.

use super::subscription::Subscription;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gateway transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Settlement,
    Capture,
    Deny,
    Cancel,
    Expire,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Settlement => "settlement",
            TransactionStatus::Capture => "capture",
            TransactionStatus::Deny => "deny",
            TransactionStatus::Cancel => "cancel",
            TransactionStatus::Expire => "expire",
            TransactionStatus::Unknown => "unknown",
        }
    }

    /// Money has moved.
    pub fn is_paid(&self) -> bool {
        matches!(self, TransactionStatus::Settlement | TransactionStatus::Capture)
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Deny | TransactionStatus::Cancel | TransactionStatus::Expire
        )
    }

    /// Polling stops on these. `expire` is not among them; the resolver
    /// navigates away on it instead.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Settlement
                | TransactionStatus::Capture
                | TransactionStatus::Deny
                | TransactionStatus::Cancel
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub transaction_status: TransactionStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// What the payment-pending page polls for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusSnapshot {
    pub subscription: Subscription,
    #[serde(default)]
    pub payments: Vec<PaymentAttempt>,
}

impl PaymentStatusSnapshot {
    pub fn without_payments(subscription: Subscription) -> Self {
        Self {
            subscription,
            payments: Vec::new(),
        }
    }

    /// The attempt that determines display: latest `created_at`, later
    /// entries win ties and undated attempts.
    pub fn latest_payment(&self) -> Option<&PaymentAttempt> {
        self.payments
            .iter()
            .enumerate()
            .max_by_key(|(index, attempt)| (attempt.created_at, *index))
            .map(|(_, attempt)| attempt)
    }

    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        self.latest_payment().map(|p| p.transaction_status)
    }

    pub fn is_terminal(&self) -> bool {
        self.subscription.status.is_terminal()
            || self
                .transaction_status()
                .map(|s| s.is_terminal())
                .unwrap_or(false)
    }
}

/// Short-lived token that opens the hosted checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentToken {
    pub token: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::SubscriptionStatus;
    use chrono::TimeZone;

    fn subscription(status: SubscriptionStatus) -> Subscription {
        Subscription {
            code: "SUB-001".into(),
            plan: None,
            status,
            amount: 150_000,
            starts_at: None,
            ends_at: None,
        }
    }

    fn attempt(status: TransactionStatus, minute: u32) -> PaymentAttempt {
        PaymentAttempt {
            transaction_status: status,
            payment_method: Some("qris".into()),
            paid_at: None,
            created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()),
        }
    }

    #[test]
    fn test_latest_payment_by_created_at() {
        let snapshot = PaymentStatusSnapshot {
            subscription: subscription(SubscriptionStatus::PendingPayment),
            payments: vec![
                attempt(TransactionStatus::Settlement, 30),
                attempt(TransactionStatus::Expire, 5),
            ],
        };
        assert_eq!(
            snapshot.transaction_status(),
            Some(TransactionStatus::Settlement)
        );
    }

    #[test]
    fn test_expire_does_not_stop_polling() {
        let snapshot = PaymentStatusSnapshot {
            subscription: subscription(SubscriptionStatus::PendingPayment),
            payments: vec![attempt(TransactionStatus::Expire, 1)],
        };
        assert!(!snapshot.is_terminal());
    }

    #[test]
    fn test_active_subscription_is_terminal() {
        let snapshot = PaymentStatusSnapshot::without_payments(subscription(
            SubscriptionStatus::Active,
        ));
        assert!(snapshot.is_terminal());
        assert!(snapshot.latest_payment().is_none());
    }

    #[test]
    fn test_unknown_transaction_status() {
        let status: TransactionStatus = serde_json::from_str("\"refund\"").unwrap();
        assert_eq!(status, TransactionStatus::Unknown);
        assert!(!status.is_paid());
        assert!(!status.is_failed());
    }
}
