//! Per-session context shared between pages of the same signed-in user.

use crate::models::BusinessSummary;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Hex SHA-256 of the bearer token. Raw tokens are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn from_token(token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // enough to correlate log lines
        write!(f, "{}", &self.0[..12])
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub skip_subscription_check_until: Option<DateTime<Utc>>,
    pub businesses: Option<Vec<BusinessSummary>>,
    /// Code of the subscription last seen active for this session.
    pub active_subscription: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            skip_subscription_check_until: None,
            businesses: None,
            active_subscription: None,
            last_seen: Utc::now(),
        }
    }
}

pub struct SessionStore {
    sessions: DashMap<SessionKey, SessionContext>,
    skip_ttl: Duration,
}

impl SessionStore {
    pub fn new(skip_ttl_secs: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            skip_ttl: Duration::seconds(skip_ttl_secs),
        }
    }

    /// Let the subscription gate through for a short while after a payment
    /// landed, while the backend catches up.
    fn update(&self, key: &SessionKey, apply: impl FnOnce(&mut SessionContext)) {
        let mut ctx = self.sessions.entry(key.clone()).or_default();
        ctx.last_seen = Utc::now();
        apply(&mut ctx);
    }

    pub fn grant_skip_check(&self, key: &SessionKey, now: DateTime<Utc>) {
        let until = now + self.skip_ttl;
        self.update(key, |ctx| ctx.skip_subscription_check_until = Some(until));
    }

    pub fn should_skip_check(&self, key: &SessionKey, now: DateTime<Utc>) -> bool {
        self.sessions
            .get(key)
            .and_then(|ctx| ctx.skip_subscription_check_until)
            .map(|until| now < until)
            .unwrap_or(false)
    }

    /// Remember which subscription is active, or that none is.
    pub fn set_active_subscription(&self, key: &SessionKey, code: Option<String>) {
        self.update(key, |ctx| ctx.active_subscription = code);
    }

    pub fn has_active_subscription(&self, key: &SessionKey) -> bool {
        self.sessions
            .get(key)
            .map(|ctx| ctx.active_subscription.is_some())
            .unwrap_or(false)
    }

    /// Whether `code` itself is the subscription remembered as active.
    pub fn is_active_subscription(&self, key: &SessionKey, code: &str) -> bool {
        self.sessions
            .get(key)
            .map(|ctx| ctx.active_subscription.as_deref() == Some(code))
            .unwrap_or(false)
    }

    pub fn cache_businesses(&self, key: &SessionKey, businesses: Vec<BusinessSummary>) {
        self.update(key, |ctx| ctx.businesses = Some(businesses));
    }

    pub fn cached_businesses(&self, key: &SessionKey) -> Option<Vec<BusinessSummary>> {
        self.sessions.get(key).and_then(|ctx| ctx.businesses.clone())
    }

    pub fn snapshot(&self, key: &SessionKey) -> SessionContext {
        self.sessions
            .get(key)
            .map(|ctx| ctx.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self, key: &SessionKey) {
        self.sessions.remove(key);
    }

    /// Drop sessions untouched since `now - idle`.
    pub fn purge_idle(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, ctx| now - ctx.last_seen < idle);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// A store bound to one session.
#[derive(Clone)]
pub struct SessionHandle {
    store: Arc<SessionStore>,
    key: SessionKey,
}

impl SessionHandle {
    pub fn new(store: Arc<SessionStore>, key: SessionKey) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn has_active_subscription(&self) -> bool {
        self.store.has_active_subscription(&self.key)
    }

    pub fn is_active_subscription(&self, code: &str) -> bool {
        self.store.is_active_subscription(&self.key, code)
    }

    pub fn set_active_subscription(&self, code: Option<String>) {
        self.store.set_active_subscription(&self.key, code);
    }

    pub fn grant_skip_check(&self, now: DateTime<Utc>) {
        self.store.grant_skip_check(&self.key, now);
    }

    pub fn cached_businesses(&self) -> Option<Vec<BusinessSummary>> {
        self.store.cached_businesses(&self.key)
    }

    pub fn cache_businesses(&self, businesses: Vec<BusinessSummary>) {
        self.store.cache_businesses(&self.key, businesses);
    }
}
