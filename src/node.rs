//! Simulated network nodes.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::plan::ContactPlan;
use crate::routing::{Router, RoutingStrategy};
use crate::store::StoreCapacity;
use crate::types::NodeId;

/// A network interface: either dynamic (connectivity derived from positions
/// and `range`) or bound to a precomputed contact plan.
#[derive(Clone, Debug)]
pub struct NetworkInterface {
    /// Interface name; two nodes can only talk over interfaces with the
    /// same name.
    pub name: String,
    /// Radio range in distance units; `0.0` means "always in range".
    pub range: f64,
    /// Contact plan governing this interface, if any. A plan-bound
    /// interface bypasses the distance scan entirely.
    pub plan: Option<Arc<ContactPlan>>,
}

impl NetworkInterface {
    /// A dynamic interface with the given range.
    pub fn dynamic(name: impl Into<String>, range: f64) -> Self {
        Self {
            name: name.into(),
            range,
            plan: None,
        }
    }

    /// An interface driven by a contact plan.
    pub fn planned(name: impl Into<String>, plan: Arc<ContactPlan>) -> Self {
        Self {
            name: name.into(),
            range: 0.0,
            plan: Some(plan),
        }
    }
}

/// Per-node simulation state.
#[derive(Clone, Debug)]
pub struct Node {
    /// Unique id.
    pub id: NodeId,
    /// Display name, under which the node appears in event logs.
    pub name: String,
    /// Position.
    pub x: f64,
    /// Position.
    pub y: f64,
    /// Ids of nodes presently in contact.
    pub neighbors: BTreeSet<NodeId>,
    /// Network interfaces.
    pub net: Vec<NetworkInterface>,
    /// Routing state.
    pub router: Router,
}

impl Node {
    /// Creates a node at the origin.
    pub fn new(id: NodeId, net: Vec<NetworkInterface>, router: Router) -> Self {
        Self {
            id,
            name: format!("n{id}"),
            x: 0.0,
            y: 0.0,
            neighbors: BTreeSet::new(),
            net,
            router,
        }
    }

    /// Sets the initial position.
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// True when any interface is bound to a contact plan.
    pub fn uses_contactplan(&self) -> bool {
        self.net.iter().any(|n| n.plan.is_some())
    }

    /// True when any interface derives connectivity from positions.
    pub fn has_dynamic_interface(&self) -> bool {
        self.net.iter().any(|n| n.plan.is_none())
    }
}

/// Creates `count` identically-equipped nodes with ids `0..count`.
pub fn generate_nodes(
    count: u64,
    net: &[NetworkInterface],
    strategy: RoutingStrategy,
    capacity: StoreCapacity,
) -> Vec<Node> {
    (0..count)
        .map(|id| Node::new(id, net.to_vec(), Router::new(strategy, capacity)))
        .collect()
}
