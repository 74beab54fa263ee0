//! Collapses duplicate submissions of the same logical operation.
//!
//! Operations are named by the caller, e.g. `verify:<session>:<code>`. The
//! key issued for an operation is forwarded to the backend as the
//! `Idempotency-Key` header, so a retried request after a failure carries the
//! same key as the first attempt.
//!
//! An in-flight claim whose owner vanished (the request future was dropped)
//! is released by its [`ClaimGuard`]; one that is still stuck after the
//! in-flight TTL is handed out again.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Caller owns the operation and must `complete` or `release` it,
    /// usually through [`IdempotencyRegistry::guard`].
    Fresh(Uuid),
    InFlight,
    Completed,
}

#[derive(Debug, Clone, Copy)]
enum EntryState {
    InFlight { since: DateTime<Utc> },
    Completed { at: DateTime<Utc> },
    Released,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    key: Uuid,
    state: EntryState,
}

const DEFAULT_IN_FLIGHT_TTL_SECS: i64 = 60;

pub struct IdempotencyRegistry {
    slots: DashMap<String, Slot>,
    ttl: Duration,
    in_flight_ttl: Duration,
}

impl IdempotencyRegistry {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            slots: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
            in_flight_ttl: Duration::seconds(DEFAULT_IN_FLIGHT_TTL_SECS),
        }
    }

    pub fn with_in_flight_ttl(mut self, secs: i64) -> Self {
        self.in_flight_ttl = Duration::seconds(secs);
        self
    }

    pub fn claim(&self, operation: &str, now: DateTime<Utc>) -> Claim {
        match self.slots.entry(operation.to_string()) {
            Entry::Vacant(vacant) => {
                let key = Uuid::new_v4();
                vacant.insert(Slot {
                    key,
                    state: EntryState::InFlight { since: now },
                });
                Claim::Fresh(key)
            }
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                match slot.state {
                    EntryState::InFlight { since } if now < since + self.in_flight_ttl => {
                        Claim::InFlight
                    }
                    EntryState::Completed { at } if now < at + self.ttl => Claim::Completed,
                    EntryState::Completed { .. } => {
                        *slot = Slot {
                            key: Uuid::new_v4(),
                            state: EntryState::InFlight { since: now },
                        };
                        Claim::Fresh(slot.key)
                    }
                    // released, or abandoned in flight: same key again
                    EntryState::InFlight { .. } | EntryState::Released => {
                        slot.state = EntryState::InFlight { since: now };
                        Claim::Fresh(slot.key)
                    }
                }
            }
        }
    }

    pub fn complete(&self, operation: &str, now: DateTime<Utc>) {
        if let Some(mut slot) = self.slots.get_mut(operation) {
            slot.state = EntryState::Completed { at: now };
        }
    }

    /// Mark a failed attempt. The next claim gets the same key back.
    pub fn release(&self, operation: &str) {
        if let Some(mut slot) = self.slots.get_mut(operation) {
            slot.state = EntryState::Released;
        }
    }

    pub fn forget(&self, operation: &str) {
        self.slots.remove(operation);
    }

    /// Release `operation` when the returned guard drops, unless it was
    /// completed first.
    pub fn guard(&self, operation: impl Into<String>) -> ClaimGuard<'_> {
        ClaimGuard {
            registry: self,
            operation: operation.into(),
            settled: false,
        }
    }

    /// Drop completed entries past their TTL and in-flight ones nobody settled.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let in_flight_ttl = self.in_flight_ttl;
        let before = self.slots.len();
        self.slots.retain(|_, slot| match slot.state {
            EntryState::Completed { at } => now < at + ttl,
            EntryState::InFlight { since } => now < since + in_flight_ttl,
            EntryState::Released => true,
        });
        before - self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Owner of a fresh claim.
pub struct ClaimGuard<'a> {
    registry: &'a IdempotencyRegistry,
    operation: String,
    settled: bool,
}

impl ClaimGuard<'_> {
    pub fn complete(mut self, now: DateTime<Utc>) {
        self.settled = true;
        self.registry.complete(&self.operation, now);
    }

    pub fn release(mut self) {
        self.settled = true;
        self.registry.release(&self.operation);
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(operation = %self.operation, "Claim abandoned, releasing");
            self.registry.release(&self.operation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_claim_is_in_flight() {
        let registry = IdempotencyRegistry::new(300);
        let now = Utc::now();

        assert!(matches!(registry.claim("verify:s:SUB-1", now), Claim::Fresh(_)));
        assert_eq!(registry.claim("verify:s:SUB-1", now), Claim::InFlight);
        assert!(matches!(registry.claim("verify:s:SUB-2", now), Claim::Fresh(_)));
    }

    #[test]
    fn test_completed_until_ttl() {
        let registry = IdempotencyRegistry::new(300);
        let now = Utc::now();

        let Claim::Fresh(first) = registry.claim("op", now) else {
            panic!("expected fresh claim");
        };
        registry.complete("op", now);

        assert_eq!(
            registry.claim("op", now + Duration::seconds(299)),
            Claim::Completed
        );
        match registry.claim("op", now + Duration::seconds(300)) {
            Claim::Fresh(second) => assert_ne!(first, second),
            other => panic!("expected fresh claim, got {:?}", other),
        }
    }

    #[test]
    fn test_release_reissues_same_key() {
        let registry = IdempotencyRegistry::new(300);
        let now = Utc::now();

        let first = registry.claim("otp:s:628123", now);
        registry.release("otp:s:628123");
        let second = registry.claim("otp:s:628123", now);

        assert_eq!(first, second);
    }

    #[test]
    fn test_forget_starts_new_operation() {
        let registry = IdempotencyRegistry::new(300);
        let now = Utc::now();

        let first = registry.claim("otp:s:628123", now);
        registry.complete("otp:s:628123", now);
        registry.forget("otp:s:628123");

        let second = registry.claim("otp:s:628123", now);
        assert!(matches!(second, Claim::Fresh(_)));
        assert_ne!(first, second);
    }

    #[test]
    fn test_purge_keeps_recent_in_flight() {
        let registry = IdempotencyRegistry::new(10);
        let now = Utc::now();

        registry.claim("done", now);
        registry.complete("done", now);
        registry.claim("running", now);

        registry.purge_expired(now + Duration::seconds(11));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.claim("running", now), Claim::InFlight);
    }

    #[test]
    fn test_stale_in_flight_is_reclaimable() {
        let registry = IdempotencyRegistry::new(300).with_in_flight_ttl(30);
        let now = Utc::now();

        let first = registry.claim("otp:s:628123", now);
        assert_eq!(
            registry.claim("otp:s:628123", now + Duration::seconds(29)),
            Claim::InFlight
        );
        assert_eq!(registry.claim("otp:s:628123", now + Duration::seconds(30)), first);

        registry.claim("abandoned", now);
        registry.purge_expired(now + Duration::days(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dropped_guard_releases_claim() {
        let registry = IdempotencyRegistry::new(300);
        let now = Utc::now();

        let first = registry.claim("otp:s:628123", now);
        drop(registry.guard("otp:s:628123"));

        assert_eq!(registry.claim("otp:s:628123", now), first);
    }

    #[test]
    fn test_completed_guard_keeps_claim() {
        let registry = IdempotencyRegistry::new(300);
        let now = Utc::now();

        registry.claim("otp:s:628123", now);
        registry.guard("otp:s:628123").complete(now);

        assert_eq!(registry.claim("otp:s:628123", now), Claim::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_task_releases_claim() {
        let registry = std::sync::Arc::new(IdempotencyRegistry::new(300));
        let now = Utc::now();
        let Claim::Fresh(key) = registry.claim("verify:s:SUB-1", now) else {
            panic!("expected fresh claim");
        };

        let owner = registry.clone();
        let task = tokio::spawn(async move {
            let guard = owner.guard("verify:s:SUB-1");
            std::future::pending::<()>().await;
            guard.complete(Utc::now());
        });
        tokio::task::yield_now().await;
        task.abort();
        let _ = task.await;

        assert_eq!(registry.claim("verify:s:SUB-1", now), Claim::Fresh(key));
    }
}
