//! # dtnsim
//!
//! A discrete-event simulator for opportunistic (delay-tolerant) networks:
//! mobile or intermittently-connected nodes exchange bundles only while in
//! radio contact, contact windows are either computed from node positions
//! or supplied by a precomputed contact plan, and pluggable routing
//! strategies decide which bundles to carry, replicate or drop under finite
//! per-node storage.
//!
//! ## Design principles
//!
//! - **Deterministic**: a single cooperative scheduler orders all events by
//!   `(time, class, registration)`; equal-time ties resolve FIFO and
//!   connectivity updates are applied before anything else at the same
//!   instant, so runs are exactly reproducible.
//! - **Engine-mediated contacts**: pairwise router synchronization runs to
//!   completion atomically at one instant; each store is mutated only
//!   through its own node's router callbacks.
//! - **Outcomes, not errors**: capacity refusals, TTL expiry and duplicate
//!   suppression are first-class routing outcomes recorded in statistics.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use dtnsim::{
//!     generate_nodes, Bundle, ContactPlan, NetSim, NetworkInterface, RoutingStrategy,
//!     SimConfig, StoreCapacity,
//! };
//!
//! // one contact window between nodes 0 and 1
//! let plan = Arc::new(ContactPlan::from_str("contact 10 50 0 1\n").unwrap());
//! let net = [NetworkInterface::planned("cp", plan)];
//! let nodes = generate_nodes(2, &net, RoutingStrategy::Epidemic, StoreCapacity::Unbounded);
//!
//! let mut sim = NetSim::new(120.0, nodes, SimConfig::quiet());
//! sim.inject_bundle(Bundle::new("M1", 0, 1, 0.0, 100, 3600.0));
//!
//! let report = sim.run().unwrap();
//! assert_eq!(report.routing.delivered, 1);
//! ```

pub mod config;
pub mod error;
pub mod event_log;
pub mod generator;
pub mod message;
pub mod mobility;
pub mod node;
pub mod plan;
pub mod routing;
pub mod scheduler;
pub mod sim;
pub mod stats;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigError, SimConfig};
pub use error::SimError;
pub use event_log::{Category, EventLogger};
pub use generator::{GeneratorKind, MessageGenerator, MsgGenConfig};
pub use message::{Bundle, Destination};
pub use mobility::Move;
pub use node::{generate_nodes, NetworkInterface, Node};
pub use plan::{Contact, ContactPlan, ParseError};
pub use routing::{ReceiveOutcome, Router, RoutingStrategy};
pub use scheduler::{ClockError, Scheduler, TaskClass};
pub use sim::NetSim;
pub use stats::{NetStats, RoutingReport, RoutingStats, SimReport};
pub use store::{InsertOutcome, Store, StoreCapacity};
pub use types::{BundleId, NodeId, SimTime, CONTACT_OPEN};

/// Initialize the tracing subscriber for logging.
///
/// Call this at the start of your program to enable logging.
///
/// # Example
///
/// ```rust,ignore
/// dtnsim::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
