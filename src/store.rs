//! Capacity-bounded bundle store.
//!
//! Each node holds exactly one store. The invariant is that the sum of held
//! bundle sizes never exceeds the configured capacity; an insert that would
//! exceed it evicts the oldest bundles first, and an insert that cannot fit
//! at all is refused. Both are capacity-policy outcomes, never errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::Bundle;
use crate::types::{BundleId, SimTime};

/// Store capacity. Unbounded storage is an explicit variant; a numeric zero
/// is never reinterpreted as "no limit".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreCapacity {
    /// No capacity limit.
    Unbounded,
    /// At most this many bytes of bundle payload.
    Limited(u64),
}

impl StoreCapacity {
    /// Capacity in bytes as logged in `CONFIG`/`STORE` records (0 when
    /// unbounded, matching the replay format).
    pub fn as_bytes(&self) -> u64 {
        match self {
            StoreCapacity::Unbounded => 0,
            StoreCapacity::Limited(bytes) => *bytes,
        }
    }
}

/// Outcome of offering a bundle to a store.
#[derive(Clone, Debug, PartialEq)]
pub enum InsertOutcome {
    /// Stored without displacing anything.
    Stored,
    /// Stored after evicting the listed bundles (oldest creation time first).
    Evicted(Vec<Bundle>),
    /// The bundle is larger than the whole store; receipt refused.
    Refused,
    /// A copy with this id is already held; not re-stored.
    Duplicate,
}

/// A bounded mapping from bundle id to bundle.
#[derive(Clone, Debug)]
pub struct Store {
    capacity: StoreCapacity,
    bundles: BTreeMap<BundleId, Bundle>,
    used: u64,
}

impl Store {
    /// Creates an empty store with the given capacity.
    pub fn new(capacity: StoreCapacity) -> Self {
        Self {
            capacity,
            bundles: BTreeMap::new(),
            used: 0,
        }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> StoreCapacity {
        self.capacity
    }

    /// Bytes currently held.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Number of bundles currently held.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// True when no bundles are held.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// True when a copy of `id` is held.
    pub fn contains(&self, id: &str) -> bool {
        self.bundles.contains_key(id)
    }

    /// The held copy of `id`, if any.
    pub fn get(&self, id: &str) -> Option<&Bundle> {
        self.bundles.get(id)
    }

    /// Mutable access to the held copy of `id`, if any.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Bundle> {
        self.bundles.get_mut(id)
    }

    /// Ids of all held bundles (the summary vector exchanged on contact).
    pub fn summary(&self) -> Vec<BundleId> {
        self.bundles.keys().cloned().collect()
    }

    /// Iterates over held bundles in id order.
    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.values()
    }

    /// Offers a bundle to the store, applying the drop policy when space is
    /// needed: bundles with the earliest creation time are evicted first
    /// (ties broken by id for determinism). A bundle larger than the whole
    /// store is refused.
    pub fn insert(&mut self, bundle: Bundle) -> InsertOutcome {
        if self.bundles.contains_key(&bundle.id) {
            return InsertOutcome::Duplicate;
        }

        let evicted = match self.capacity {
            StoreCapacity::Unbounded => Vec::new(),
            StoreCapacity::Limited(cap) => {
                if bundle.size > cap {
                    return InsertOutcome::Refused;
                }
                let mut evicted = Vec::new();
                while self.used + bundle.size > cap {
                    let victim = self
                        .bundles
                        .values()
                        .min_by(|x, y| {
                            x.created
                                .total_cmp(&y.created)
                                .then_with(|| x.id.cmp(&y.id))
                        })
                        .map(|b| b.id.clone())
                        .expect("used > 0 implies a resident bundle");
                    let b = self.remove(&victim).expect("victim resident");
                    evicted.push(b);
                }
                evicted
            }
        };

        self.used += bundle.size;
        self.bundles.insert(bundle.id.clone(), bundle);
        debug_assert!(self.check_capacity());

        if evicted.is_empty() {
            InsertOutcome::Stored
        } else {
            InsertOutcome::Evicted(evicted)
        }
    }

    /// Removes and returns the copy of `id`, if held.
    pub fn remove(&mut self, id: &str) -> Option<Bundle> {
        let bundle = self.bundles.remove(id)?;
        self.used -= bundle.size;
        Some(bundle)
    }

    /// Purges every bundle whose age exceeds its time-to-live at `now` and
    /// returns them (counted as aborted by the caller).
    pub fn purge_expired(&mut self, now: SimTime) -> Vec<Bundle> {
        let expired: Vec<BundleId> = self
            .bundles
            .values()
            .filter(|b| b.is_expired(now))
            .map(|b| b.id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    /// Capacity invariant: sum of held sizes never exceeds the limit.
    pub fn check_capacity(&self) -> bool {
        let total: u64 = self.bundles.values().map(|b| b.size).sum();
        if total != self.used {
            return false;
        }
        match self.capacity {
            StoreCapacity::Unbounded => true,
            StoreCapacity::Limited(cap) => self.used <= cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Bundle;

    fn bundle(id: &str, created: SimTime, size: u64) -> Bundle {
        Bundle::new(id, 0, 1, created, size, 3600.0)
    }

    #[test]
    fn test_insert_within_capacity() {
        let mut s = Store::new(StoreCapacity::Limited(300));
        assert_eq!(s.insert(bundle("M1", 0.0, 100)), InsertOutcome::Stored);
        assert_eq!(s.insert(bundle("M2", 1.0, 100)), InsertOutcome::Stored);
        assert_eq!(s.used(), 200);
        assert!(s.check_capacity());
    }

    #[test]
    fn test_duplicate_not_restored() {
        let mut s = Store::new(StoreCapacity::Limited(300));
        s.insert(bundle("M1", 0.0, 100));
        assert_eq!(s.insert(bundle("M1", 5.0, 100)), InsertOutcome::Duplicate);
        assert_eq!(s.len(), 1);
        assert_eq!(s.used(), 100);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut s = Store::new(StoreCapacity::Limited(200));
        s.insert(bundle("M1", 0.0, 100));
        s.insert(bundle("M2", 5.0, 100));

        match s.insert(bundle("M3", 10.0, 150)) {
            InsertOutcome::Evicted(evicted) => {
                let ids: Vec<_> = evicted.iter().map(|b| b.id.as_str()).collect();
                assert_eq!(ids, ["M1", "M2"]);
            }
            other => panic!("expected eviction, got {other:?}"),
        }
        assert!(s.contains("M3"));
        assert!(s.check_capacity());
    }

    #[test]
    fn test_oversized_bundle_refused() {
        let mut s = Store::new(StoreCapacity::Limited(100));
        s.insert(bundle("M1", 0.0, 80));
        assert_eq!(s.insert(bundle("M2", 1.0, 200)), InsertOutcome::Refused);
        // refusal leaves the store untouched
        assert!(s.contains("M1"));
        assert_eq!(s.used(), 80);
    }

    #[test]
    fn test_unbounded_is_explicit() {
        let mut s = Store::new(StoreCapacity::Unbounded);
        for i in 0..100 {
            let outcome = s.insert(bundle(&format!("M{i}"), i as f64, 1_000_000));
            assert_eq!(outcome, InsertOutcome::Stored);
        }
        assert_eq!(s.len(), 100);
        assert_eq!(s.capacity().as_bytes(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let mut s = Store::new(StoreCapacity::Unbounded);
        s.insert(Bundle::new("M1", 0, 1, 0.0, 100, 50.0));
        s.insert(Bundle::new("M2", 0, 1, 40.0, 100, 50.0));

        let purged = s.purge_expired(60.0);
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id, "M1");
        assert!(s.contains("M2"));
        assert_eq!(s.used(), 100);
    }

    #[test]
    fn test_capacity_invariant_holds_after_every_mutation() {
        let mut s = Store::new(StoreCapacity::Limited(250));
        for i in 0..20 {
            s.insert(bundle(&format!("M{i}"), i as f64, 60 + (i % 3) * 20));
            assert!(s.check_capacity());
        }
        s.purge_expired(10_000.0);
        assert!(s.check_capacity());
    }
}
