//! Decides where a payment page goes once a status is known.
//!
//! Precedence, first match wins:
//!
//! 1. transaction settled or captured: success
//! 2. transaction cancelled, denied or expired: failure
//! 3. subscription active: success
//! 4. subscription cancelled or expired: failure
//! 5. transaction pending on a subscription pending payment: stay
//! 6. session remembers this subscription as active: success
//! 7. otherwise stay and keep polling

use crate::models::{PaymentStatusSnapshot, SubscriptionStatus, TransactionStatus};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverInput {
    pub subscription_status: Option<SubscriptionStatus>,
    pub transaction_status: Option<TransactionStatus>,
    pub has_business: bool,
    pub cached_active: bool,
}

impl ResolverInput {
    pub fn from_snapshot(snapshot: &PaymentStatusSnapshot, cached_active: bool) -> Self {
        Self {
            subscription_status: Some(snapshot.subscription.status),
            transaction_status: snapshot.transaction_status(),
            has_business: false,
            cached_active,
        }
    }

    pub fn with_business(mut self, has_business: bool) -> Self {
        self.has_business = has_business;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Landing {
    BusinessSetup,
    Dashboard,
}

impl Landing {
    pub fn for_business(has_business: bool) -> Self {
        if has_business {
            Landing::Dashboard
        } else {
            Landing::BusinessSetup
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Landing::BusinessSetup => "/business/setup",
            Landing::Dashboard => "/dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "landing", rename_all = "snake_case")]
pub enum Navigation {
    Success(Landing),
    Failure,
}

impl Navigation {
    pub fn path(&self) -> &'static str {
        match self {
            Navigation::Success(landing) => landing.path(),
            Navigation::Failure => "/subscription/failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Navigate(Navigation),
    Stay,
    /// A navigation already happened on this page.
    AlreadyRedirected,
}

/// Precedence ignoring business ownership.
pub fn classify(input: &ResolverInput) -> Verdict {
    if let Some(tx) = input.transaction_status {
        if tx.is_paid() {
            return Verdict::Success;
        }
        if tx.is_failed() {
            return Verdict::Failure;
        }
    }

    match input.subscription_status {
        Some(SubscriptionStatus::Active) => return Verdict::Success,
        Some(SubscriptionStatus::Cancelled) | Some(SubscriptionStatus::Expired) => {
            return Verdict::Failure
        }
        _ => {}
    }

    if input.transaction_status == Some(TransactionStatus::Pending)
        && input.subscription_status == Some(SubscriptionStatus::PendingPayment)
    {
        return Verdict::Stay;
    }

    if input.cached_active {
        Verdict::Success
    } else {
        Verdict::Stay
    }
}

pub fn decide(input: &ResolverInput) -> Option<Navigation> {
    match classify(input) {
        Verdict::Success => Some(Navigation::Success(Landing::for_business(
            input.has_business,
        ))),
        Verdict::Failure => Some(Navigation::Failure),
        Verdict::Stay => None,
    }
}

/// One per mounted page. At most one navigation ever leaves it.
#[derive(Debug, Default)]
pub struct RedirectResolver {
    redirected: AtomicBool,
}

impl RedirectResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_redirected(&self) -> bool {
        self.redirected.load(Ordering::Acquire)
    }

    pub fn resolve(&self, input: &ResolverInput) -> Resolution {
        if self.has_redirected() {
            return Resolution::AlreadyRedirected;
        }

        match decide(input) {
            Some(navigation) => self.navigate(navigation),
            None => Resolution::Stay,
        }
    }

    /// Navigate without consulting the precedence, still through the latch.
    pub fn navigate(&self, navigation: Navigation) -> Resolution {
        if self
            .redirected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::info!(target_path = navigation.path(), "Redirecting");
            Resolution::Navigate(navigation)
        } else {
            Resolution::AlreadyRedirected
        }
    }
}
