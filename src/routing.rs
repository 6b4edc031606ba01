//! Routing strategies and the per-node router.
//!
//! A [`Router`] owns a node's bundle store plus the delivered-id set used
//! for at-most-once delivery accounting, and exposes the fixed capability
//! surface the engine drives during contacts: contact up/down notification,
//! local bundle creation, and bundle receipt.
//!
//! Strategies form a closed set of tagged variants sharing that contract;
//! dispatch is an explicit `match`, never introspection.

use std::collections::BTreeSet;

use crate::message::Bundle;
use crate::store::{InsertOutcome, Store, StoreCapacity};
use crate::types::{BundleId, NodeId, SimTime};

/// The routing strategy deciding which held bundles to replicate on contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutingStrategy {
    /// Flood: offer every bundle the peer lacks.
    Epidemic,
    /// Forward a bundle only to its destination.
    DirectDelivery,
    /// Binary spray-and-wait: replicate while the copy budget lasts, then
    /// wait for a direct contact with the destination.
    SprayAndWait {
        /// Total copy budget per bundle.
        copies: u32,
    },
}

impl RoutingStrategy {
    /// Display name of the strategy.
    pub fn name(&self) -> &'static str {
        match self {
            RoutingStrategy::Epidemic => "epidemic",
            RoutingStrategy::DirectDelivery => "direct_delivery",
            RoutingStrategy::SprayAndWait { .. } => "spray_and_wait",
        }
    }

    /// Replication budget stamped on locally created bundles.
    fn initial_copies(&self) -> u32 {
        match self {
            RoutingStrategy::SprayAndWait { copies } => (*copies).max(1),
            _ => 1,
        }
    }

    /// Whether a held bundle should be offered to `peer`.
    fn should_offer(&self, bundle: &Bundle, peer: NodeId) -> bool {
        match self {
            RoutingStrategy::Epidemic => true,
            RoutingStrategy::DirectDelivery => bundle.dst.contains(peer),
            RoutingStrategy::SprayAndWait { .. } => bundle.dst.contains(peer) || bundle.copies > 1,
        }
    }
}

/// Outcome of a bundle arriving at a node. Capacity refusals and duplicate
/// arrivals are routing outcomes recorded in statistics, never errors.
#[derive(Clone, Debug, PartialEq)]
pub enum ReceiveOutcome {
    /// This node is a destination and had not seen the bundle before.
    Delivered,
    /// Stored for carrying; `evicted` lists bundles displaced to make room.
    Stored { evicted: Vec<Bundle> },
    /// Already held or already delivered here; suppressed.
    Duplicate,
    /// Larger than the whole store; receipt refused.
    Refused,
}

/// Per-node routing state: strategy, bounded store, delivered-id set.
#[derive(Clone, Debug)]
pub struct Router {
    strategy: RoutingStrategy,
    store: Store,
    delivered: BTreeSet<BundleId>,
    peers: BTreeSet<NodeId>,
}

impl Router {
    /// Creates a router with the given strategy and store capacity.
    pub fn new(strategy: RoutingStrategy, capacity: StoreCapacity) -> Self {
        Self {
            strategy,
            store: Store::new(capacity),
            delivered: BTreeSet::new(),
            peers: BTreeSet::new(),
        }
    }

    pub fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Peers this router currently has a contact with.
    pub fn peers(&self) -> &BTreeSet<NodeId> {
        &self.peers
    }

    /// Ids delivered at this node so far.
    pub fn delivered_ids(&self) -> &BTreeSet<BundleId> {
        &self.delivered
    }

    /// Contact with `peer` came up.
    pub fn on_contact_up(&mut self, peer: NodeId) {
        self.peers.insert(peer);
    }

    /// Contact with `peer` went down.
    pub fn on_contact_down(&mut self, peer: NodeId) {
        self.peers.remove(&peer);
    }

    /// A bundle was created locally. Stamps the strategy's replication
    /// budget onto the copy and stores it.
    pub fn on_bundle_created(&mut self, bundle: Bundle) -> InsertOutcome {
        let copies = self.strategy.initial_copies();
        self.store.insert(bundle.with_copies(copies))
    }

    /// A bundle copy arrived from `_from`.
    pub fn on_bundle_received(&mut self, node: NodeId, bundle: Bundle, _from: NodeId) -> ReceiveOutcome {
        if self.delivered.contains(&bundle.id) {
            return ReceiveOutcome::Duplicate;
        }
        if bundle.dst.contains(node) {
            self.delivered.insert(bundle.id);
            return ReceiveOutcome::Delivered;
        }
        match self.store.insert(bundle) {
            InsertOutcome::Stored => ReceiveOutcome::Stored { evicted: Vec::new() },
            InsertOutcome::Evicted(evicted) => ReceiveOutcome::Stored { evicted },
            InsertOutcome::Duplicate => ReceiveOutcome::Duplicate,
            InsertOutcome::Refused => ReceiveOutcome::Refused,
        }
    }

    /// Ids this router offers to `peer`, given the peer's summary vector of
    /// held-or-delivered ids. Expired bundles are never offered; the TTL
    /// scan purges them separately.
    pub fn offers(&self, peer: NodeId, peer_known: &BTreeSet<BundleId>, now: SimTime) -> Vec<BundleId> {
        self.store
            .bundles()
            .filter(|b| !peer_known.contains(&b.id))
            .filter(|b| !b.is_expired(now))
            .filter(|b| self.strategy.should_offer(b, peer))
            .map(|b| b.id.clone())
            .collect()
    }

    /// Produces the copy of `id` to transmit, adjusting per-copy state:
    /// the copy's hop count is incremented, and under spray-and-wait the
    /// budget is split binarily (sender keeps the larger half).
    pub fn on_forward(&mut self, id: &str) -> Option<Bundle> {
        let local = self.store.get_mut(id)?;
        let mut copy = local.clone();
        copy.hops += 1;
        if let RoutingStrategy::SprayAndWait { .. } = self.strategy {
            if local.copies > 1 {
                let keep = local.copies.div_ceil(2);
                copy.copies = local.copies - keep;
                local.copies = keep;
            } else {
                copy.copies = 1;
            }
        }
        Some(copy)
    }

    /// The summary vector advertised during synchronization: held bundle
    /// ids plus ids already delivered here, so peers stop re-sending
    /// bundles this node has consumed.
    pub fn known_ids(&self) -> BTreeSet<BundleId> {
        let mut ids: BTreeSet<BundleId> = self.store.summary().into_iter().collect();
        ids.extend(self.delivered.iter().cloned());
        ids
    }
}
