//! Subscription and plan models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    PendingPayment,
    Active,
    Expired,
    Cancelled,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::PendingPayment => "pending_payment",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Unknown => "unknown",
        }
    }

    /// No further payment can change this subscription.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
        )
    }
}

/// A subscription plan offered on the plan selection page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub code: String,
    pub name: String,
    /// Price in rupiah.
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub duration_days: u32,
    /// Trial plans are granted without payment.
    #[serde(default)]
    pub is_trial: bool,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Plan {
    pub fn requires_payment(&self) -> bool {
        !self.is_trial && self.price > 0
    }
}

/// Read-only snapshot of a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub code: String,
    #[serde(default)]
    pub plan: Option<Plan>,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Whole days left before `ends_at`, never negative.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.ends_at
            .map(|end| (end - now).num_days().max(0))
    }
}

/// Result of the verify-and-activate call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub subscription: Subscription,
    #[serde(default)]
    pub activated: bool,
}

impl VerifyResult {
    pub fn confirms_active(&self) -> bool {
        self.activated || self.subscription.is_active()
    }
}

/// Result of choosing a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeResult {
    pub subscription: Subscription,
    #[serde(default)]
    pub requires_payment: bool,
}
