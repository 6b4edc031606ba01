//! Bundle (message) definitions.
//!
//! A bundle is the unit of data routed opportunistically between nodes.
//! Under replication-based routing a bundle is copied when forwarded: each
//! node's store holds an independent copy, and every copy carries enough
//! metadata (the id) to be deduplicated at the destination.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{BundleId, NodeId, SimTime};

/// Destination of a bundle: a single node or a set of nodes.
///
/// A bundle delivered to one of several destinations is counted once per
/// delivery, not once per send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// A single destination node.
    Single(NodeId),
    /// A set of destination nodes.
    Set(BTreeSet<NodeId>),
}

impl Destination {
    /// True when `id` is one of the destinations.
    pub fn contains(&self, id: NodeId) -> bool {
        match self {
            Destination::Single(d) => *d == id,
            Destination::Set(set) => set.contains(&id),
        }
    }
}

impl From<NodeId> for Destination {
    fn from(id: NodeId) -> Self {
        Destination::Single(id)
    }
}

/// A message routed through the network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Unique bundle id; identical across all copies.
    pub id: BundleId,
    /// Originating node.
    pub src: NodeId,
    /// Destination node or node set.
    pub dst: Destination,
    /// Creation time.
    pub created: SimTime,
    /// Payload size in bytes.
    pub size: u64,
    /// Time-to-live in seconds, counted from `created`.
    pub ttl: SimTime,
    /// Hops taken by this copy so far.
    pub hops: u32,
    /// Remaining replication budget of this copy (spray-and-wait only).
    pub copies: u32,
}

impl Bundle {
    /// Creates a fresh bundle at its source.
    pub fn new(
        id: impl Into<BundleId>,
        src: NodeId,
        dst: impl Into<Destination>,
        created: SimTime,
        size: u64,
        ttl: SimTime,
    ) -> Self {
        Self {
            id: id.into(),
            src,
            dst: dst.into(),
            created,
            size,
            ttl,
            hops: 0,
            copies: 1,
        }
    }

    /// Sets the replication budget carried by this copy.
    pub fn with_copies(mut self, copies: u32) -> Self {
        self.copies = copies;
        self
    }

    /// Age of the bundle at `now`.
    pub fn age(&self, now: SimTime) -> SimTime {
        now - self.created
    }

    /// True once the bundle's age exceeds its time-to-live.
    pub fn is_expired(&self, now: SimTime) -> bool {
        self.age(now) > self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_destination() {
        let b = Bundle::new("M1", 0, 2, 0.0, 100, 3600.0);
        assert!(b.dst.contains(2));
        assert!(!b.dst.contains(1));
    }

    #[test]
    fn test_set_destination() {
        let dst = Destination::Set([2, 5, 9].into_iter().collect());
        let b = Bundle::new("M1", 0, dst, 0.0, 100, 3600.0);
        assert!(b.dst.contains(5));
        assert!(!b.dst.contains(3));
    }

    #[test]
    fn test_ttl_expiry_is_strict() {
        let b = Bundle::new("M1", 0, 1, 10.0, 100, 50.0);
        assert!(!b.is_expired(60.0)); // age == ttl: not yet expired
        assert!(b.is_expired(60.1));
    }
}
