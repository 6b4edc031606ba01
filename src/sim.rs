//! The network simulation engine.
//!
//! `NetSim` is the coordinator: it owns the nodes, the scheduler, the
//! statistics and the event-log handle, drives time forward to
//! `duration + 1` (the extra second samples one representative world-state
//! frame just past the nominal end), and mediates every pairwise
//! synchronization between routers so that each store is only ever mutated
//! through its own node's callbacks.
//!
//! The run loop advances in bounded slices of simulated time purely so a
//! host process can interleave progress reporting; the slice size never
//! affects simulation outcomes.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use crate::config::{ConfigError, SimConfig};
use crate::error::SimError;
use crate::event_log::{Category, EventLogger};
use crate::generator::{MessageGenerator, MsgGenConfig};
use crate::message::Bundle;
use crate::mobility::{in_range, Move};
use crate::node::Node;
use crate::plan::ContactPlan;
use crate::routing::ReceiveOutcome;
use crate::scheduler::{Scheduler, TaskClass};
use crate::stats::{NetStats, RoutingStats, SimReport};
use crate::store::InsertOutcome;
use crate::types::{pair_key, NodeId, SimTime};

/// Simulated seconds per run-loop slice. Observability granularity only.
const SLICE: SimTime = 5.0;

/// The closed set of scheduled task kinds. "Suspend for D" is expressed by
/// a task rescheduling itself at `now + D`; there is no other continuation
/// state.
#[derive(Clone, Debug)]
enum Task {
    /// A contact-plan boundary was reached; refresh connectivity and
    /// reschedule at the plan's next boundary.
    PlanBoundary { plan: usize },
    /// Periodic distance scan for dynamic interfaces.
    NeighborScan,
    /// A message generator fires.
    Generator { index: usize },
    /// One scripted movement-trace entry.
    Move { index: usize },
    /// Periodic TTL expiry scan over all stores.
    TtlScan,
    /// Periodic position report.
    MovementLogger,
    /// Periodic neighbor-set report.
    PeersLogger,
}

/// A network simulator.
pub struct NetSim {
    duration: SimTime,
    nodes: BTreeMap<NodeId, Node>,
    config: SimConfig,
    gen_configs: Vec<MsgGenConfig>,
    generators: Vec<MessageGenerator>,
    moves: Vec<Move>,
    seed_bundles: Vec<Bundle>,
    plans: Vec<Arc<ContactPlan>>,
    scheduler: Scheduler<Task>,
    logger: EventLogger,
    net_stats: NetStats,
    routing_stats: RoutingStats,
    ready: bool,
}

impl NetSim {
    /// Creates a simulator for `duration` simulated seconds.
    pub fn new(duration: SimTime, nodes: Vec<Node>, config: SimConfig) -> Self {
        Self {
            duration,
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            config,
            gen_configs: Vec::new(),
            generators: Vec::new(),
            moves: Vec::new(),
            seed_bundles: Vec::new(),
            plans: Vec::new(),
            scheduler: Scheduler::new(),
            logger: EventLogger::disabled(),
            net_stats: NetStats::default(),
            routing_stats: RoutingStats::default(),
            ready: false,
        }
    }

    /// Adds message generators to the scenario.
    pub fn with_msggens(mut self, gens: Vec<MsgGenConfig>) -> Self {
        self.gen_configs = gens;
        self
    }

    /// Adds a scripted movement trace.
    pub fn with_moves(mut self, mut moves: Vec<Move>) -> Self {
        moves.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.moves = moves;
        self
    }

    /// Injects an event logger for this run. Overrides the default sink
    /// opened when `event_logging` is set.
    pub fn with_logger(mut self, logger: EventLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Injects a bundle created at its source at t = 0.
    pub fn inject_bundle(&mut self, bundle: Bundle) {
        self.seed_bundles.push(bundle);
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Read access to a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Network-level counters accumulated so far.
    pub fn net_stats(&self) -> &NetStats {
        &self.net_stats
    }

    /// Raw routing counters accumulated so far.
    pub fn routing_stats(&self) -> &RoutingStats {
        &self.routing_stats
    }

    /// Validates the scenario and registers all tasks.
    ///
    /// Registration order is part of the reproducibility contract:
    /// connectivity sources first, then the TTL scan, generators, movement
    /// trace and loggers. Fails fast on any configuration problem, before
    /// simulated time elapses.
    pub fn setup(&mut self) -> Result<(), SimError> {
        tracing::info!(duration = self.duration, nodes = self.nodes.len(), "initialize simulation");
        self.config.validate()?;

        // generators, each with a distinct deterministic seed
        self.generators = self
            .gen_configs
            .iter()
            .enumerate()
            .map(|(i, cfg)| MessageGenerator::new(cfg.clone(), self.config.seed.wrapping_add(i as u64)))
            .collect::<Result<_, _>>()?;
        for cfg in &self.gen_configs {
            for (name, (lo, hi)) in [("src", cfg.src), ("dst", cfg.dst)] {
                for id in lo..hi {
                    if !self.nodes.contains_key(&id) {
                        return Err(ConfigError::Validation(format!(
                            "generator '{}': {name} range references unknown node {id}",
                            cfg.id
                        ))
                        .into());
                    }
                }
            }
        }
        for m in &self.moves {
            if !self.nodes.contains_key(&m.node) {
                return Err(
                    ConfigError::Validation(format!("move references unknown node {}", m.node)).into(),
                );
            }
        }

        // unique contact plans across all interfaces
        self.plans.clear();
        for node in self.nodes.values() {
            for net in &node.net {
                if let Some(plan) = &net.plan {
                    if !self.plans.iter().any(|p| Arc::ptr_eq(p, plan)) {
                        self.plans.push(Arc::clone(plan));
                    }
                }
            }
        }
        tracing::debug!(plans = self.plans.len(), "unique contact plans");

        if self.config.event_logging && !self.logger.is_logging() {
            self.logger = EventLogger::open("events.log")?;
        }
        if !self.config.event_filter.is_empty() {
            let filter = self.config.event_filter.clone();
            self.logger = std::mem::take(&mut self.logger).with_filter(filter);
        }

        // task registration, connectivity sources first
        for (i, plan) in self.plans.iter().enumerate() {
            if let Some(first) = plan.next_boundary(0.0) {
                self.scheduler
                    .schedule_at(first, TaskClass::Connectivity, Task::PlanBoundary { plan: i })?;
            }
        }
        if self.nodes.values().any(|n| n.has_dynamic_interface()) {
            self.scheduler.schedule_in(
                self.config.neighbor_scan_interval,
                TaskClass::Connectivity,
                Task::NeighborScan,
            )?;
        }
        for (i, m) in self.moves.iter().enumerate() {
            self.scheduler
                .schedule_at(m.time, TaskClass::Connectivity, Task::Move { index: i })?;
        }
        self.scheduler
            .schedule_in(self.config.ttl_scan_interval, TaskClass::Normal, Task::TtlScan)?;
        for i in 0..self.generators.len() {
            self.scheduler.schedule_in(
                self.generators[i].interval(),
                TaskClass::Normal,
                Task::Generator { index: i },
            )?;
        }
        if self.config.movement_logger {
            self.scheduler
                .schedule_in(self.config.log_interval, TaskClass::Normal, Task::MovementLogger)?;
        }
        if self.config.peers_logger {
            self.scheduler
                .schedule_in(self.config.log_interval, TaskClass::Normal, Task::PeersLogger)?;
        }

        self.ready = true;
        Ok(())
    }

    /// Runs the simulation to completion and returns the two summary
    /// reports. Calls [`setup`](Self::setup) first when needed.
    pub fn run(&mut self) -> Result<SimReport, SimError> {
        if !self.ready {
            self.setup()?;
        }
        tracing::info!("running simulation for {} seconds", self.duration);
        let start_real = Instant::now();

        // node appearance records, then initial connectivity at t = 0
        for node in self.nodes.values() {
            self.logger.log(
                0.0,
                Category::Config,
                json!({
                    "event": "START",
                    "id": node.id,
                    "name": node.name,
                    "x": node.x,
                    "y": node.y,
                    "capacity": node.router.store().capacity().as_bytes(),
                    "used": node.router.store().used(),
                }),
            );
        }
        self.refresh_connectivity(0.0)?;

        let seeds = std::mem::take(&mut self.seed_bundles);
        for bundle in seeds {
            self.create_bundle(bundle, 0.0)?;
        }

        let end = self.duration + 1.0;
        while self.now() < end {
            let slice_end = (self.now() + SLICE).min(end);
            while let Some((t, task)) = self.scheduler.pop_due(slice_end) {
                self.dispatch(t, task)?;
            }
            self.scheduler.advance_to(slice_end);
            tracing::debug!(sim_time = self.now(), "slice complete");
        }

        let elapsed = start_real.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { end / elapsed } else { 0.0 };
        tracing::info!(
            "simulated {:.0} seconds in {:.2} real seconds ({:.0} x real time)",
            end,
            elapsed,
            rate
        );

        self.logger.close();
        let routing = std::mem::take(&mut self.routing_stats).finalize();
        Ok(SimReport {
            net: self.net_stats.clone(),
            routing,
        })
    }

    fn dispatch(&mut self, t: SimTime, task: Task) -> Result<(), SimError> {
        match task {
            Task::PlanBoundary { plan } => {
                self.refresh_connectivity(t)?;
                let next = self.plans[plan].next_boundary(t);
                // the contact watcher self-terminates past the run horizon
                if let Some(next) = next {
                    if next <= self.duration + 1.0 {
                        self.scheduler
                            .schedule_at(next, TaskClass::Connectivity, Task::PlanBoundary { plan })?;
                    }
                }
            }
            Task::NeighborScan => {
                self.refresh_connectivity(t)?;
                let next = t + self.config.neighbor_scan_interval;
                if next <= self.duration + 1.0 {
                    self.scheduler
                        .schedule_at(next, TaskClass::Connectivity, Task::NeighborScan)?;
                }
            }
            Task::Move { index } => {
                let m = self.moves[index].clone();
                if let Some(node) = self.nodes.get_mut(&m.node) {
                    node.x = m.x;
                    node.y = m.y;
                }
                self.logger.log(
                    t,
                    Category::Move,
                    json!({"event": "SET", "id": m.node, "x": m.x, "y": m.y}),
                );
                self.refresh_connectivity(t)?;
            }
            Task::Generator { index } => {
                let bundles = self.generators[index].emit(t);
                for bundle in bundles {
                    self.create_bundle(bundle, t)?;
                }
                let next = t + self.generators[index].interval();
                if self.generators[index].reschedules() && next <= self.duration {
                    self.scheduler
                        .schedule_at(next, TaskClass::Normal, Task::Generator { index })?;
                }
            }
            Task::TtlScan => {
                let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
                for id in ids {
                    let node = self.nodes.get_mut(&id).expect("node exists");
                    let purged = node.router.store_mut().purge_expired(t);
                    if !purged.is_empty() {
                        for b in &purged {
                            tracing::trace!(node = id, bundle = %b.id, "ttl expired");
                            self.routing_stats.on_aborted();
                        }
                        self.log_store(t, id);
                    }
                }
                let next = t + self.config.ttl_scan_interval;
                if next <= self.duration + 1.0 {
                    self.scheduler
                        .schedule_at(next, TaskClass::Normal, Task::TtlScan)?;
                }
            }
            Task::MovementLogger => {
                for node in self.nodes.values() {
                    tracing::debug!(time = t, id = node.id, x = node.x, y = node.y, "position");
                }
                let next = t + self.config.log_interval;
                if next <= self.duration + 1.0 {
                    self.scheduler
                        .schedule_at(next, TaskClass::Normal, Task::MovementLogger)?;
                }
            }
            Task::PeersLogger => {
                for node in self.nodes.values() {
                    tracing::debug!(time = t, id = node.id, neighbors = ?node.neighbors, "peers");
                }
                let next = t + self.config.log_interval;
                if next <= self.duration + 1.0 {
                    self.scheduler
                        .schedule_at(next, TaskClass::Normal, Task::PeersLogger)?;
                }
            }
        }
        Ok(())
    }

    /// Recomputes the desired connectivity at `t` from every contact plan
    /// and every dynamic interface, then applies the diff against current
    /// neighbor sets: contact-up pairs synchronize immediately, contact-down
    /// pairs are torn down. Plan-driven scenarios never reach the distance
    /// scan ([`add_all_neighbors`](Self) path); dynamic pairs require the
    /// distance test on both interfaces.
    fn refresh_connectivity(&mut self, t: SimTime) -> Result<(), SimError> {
        let desired = self.desired_pairs(t);
        let current = self.current_pairs();

        for &(a, b) in desired.difference(&current) {
            self.contact_up(a, b, t)?;
        }
        let stale: Vec<_> = current.difference(&desired).copied().collect();
        for (a, b) in stale {
            self.contact_down(a, b, t);
        }
        Ok(())
    }

    /// Union of plan-active pairs (`add_all_neighbors`: seeded from the
    /// plan, no distance scan) and in-range dynamic pairs
    /// (`recompute_neighbors`: O(N²) distance test).
    fn desired_pairs(&self, t: SimTime) -> BTreeSet<(NodeId, NodeId)> {
        let mut pairs = BTreeSet::new();

        for plan in &self.plans {
            for (a, b) in plan.active_pairs_at(t) {
                if self.nodes.contains_key(&a) && self.nodes.contains_key(&b) {
                    pairs.insert((a, b));
                }
            }
        }

        let dynamic: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.has_dynamic_interface())
            .collect();
        for (i, a) in dynamic.iter().enumerate() {
            for b in &dynamic[i + 1..] {
                let connected = a.net.iter().filter(|ia| ia.plan.is_none()).any(|ia| {
                    b.net
                        .iter()
                        .filter(|ib| ib.plan.is_none())
                        .filter(|ib| ib.name == ia.name)
                        .any(|ib| {
                            in_range(a.x, a.y, b.x, b.y, ia.range)
                                && in_range(a.x, a.y, b.x, b.y, ib.range)
                        })
                });
                if connected {
                    pairs.insert(pair_key(a.id, b.id));
                }
            }
        }

        pairs
    }

    fn current_pairs(&self) -> BTreeSet<(NodeId, NodeId)> {
        let mut pairs = BTreeSet::new();
        for node in self.nodes.values() {
            for &peer in &node.neighbors {
                pairs.insert(pair_key(node.id, peer));
            }
        }
        pairs
    }

    fn contact_up(&mut self, a: NodeId, b: NodeId, t: SimTime) -> Result<(), SimError> {
        tracing::trace!(a, b, time = t, "link up");
        {
            let node_a = self.nodes.get_mut(&a).expect("node exists");
            node_a.neighbors.insert(b);
            node_a.router.on_contact_up(b);
            let node_b = self.nodes.get_mut(&b).expect("node exists");
            node_b.neighbors.insert(a);
            node_b.router.on_contact_up(a);
        }
        if t <= self.duration {
            self.logger
                .log(t, Category::Link, json!({"event": "UP", "nodes": [a, b]}));
        }
        self.sync_pair(a, b, t);
        Ok(())
    }

    fn contact_down(&mut self, a: NodeId, b: NodeId, t: SimTime) {
        tracing::trace!(a, b, time = t, "link down");
        {
            let node_a = self.nodes.get_mut(&a).expect("node exists");
            node_a.neighbors.remove(&b);
            node_a.router.on_contact_down(b);
            let node_b = self.nodes.get_mut(&b).expect("node exists");
            node_b.neighbors.remove(&a);
            node_b.router.on_contact_down(a);
        }
        if t <= self.duration {
            self.logger
                .log(t, Category::Link, json!({"event": "DOWN", "nodes": [a, b]}));
        }
    }

    /// Creates a bundle at its source and floods it to current neighbors.
    fn create_bundle(&mut self, bundle: Bundle, t: SimTime) -> Result<(), SimError> {
        let src = bundle.src;
        if !self.nodes.contains_key(&src) {
            return Err(
                ConfigError::Validation(format!("bundle source {src} is not a node")).into(),
            );
        }
        tracing::debug!(id = %bundle.id, src, time = t, "bundle created");
        self.routing_stats.on_created();

        let outcome = {
            let node = self.nodes.get_mut(&src).expect("node exists");
            node.router.on_bundle_created(bundle)
        };
        match outcome {
            InsertOutcome::Stored => {}
            InsertOutcome::Evicted(evicted) => self.count_evictions(&evicted),
            InsertOutcome::Refused => {
                self.routing_stats.on_dropped();
                self.net_stats.drop += 1;
            }
            InsertOutcome::Duplicate => self.routing_stats.on_duplicate(),
        }
        self.log_store(t, src);

        // a new bundle spreads through the current connected component
        let mut queue: VecDeque<(NodeId, NodeId)> = self
            .nodes
            .get(&src)
            .expect("node exists")
            .neighbors
            .iter()
            .map(|&peer| (src, peer))
            .collect();
        self.drain_transfers(&mut queue, t);
        Ok(())
    }

    /// Pairwise synchronization on contact-up: both directions exchange
    /// summary vectors and transfer what the other side lacks. Runs to
    /// completion atomically at instant `t`; no partial state is visible
    /// between two connectivity events.
    fn sync_pair(&mut self, a: NodeId, b: NodeId, t: SimTime) {
        let mut queue: VecDeque<(NodeId, NodeId)> = VecDeque::from([(a, b), (b, a)]);
        self.drain_transfers(&mut queue, t);
    }

    /// Work-queue flood: each entry is a one-directional offer from a
    /// holder to a peer. Successful receptions enqueue onward offers to the
    /// receiver's other neighbors, so a bundle crosses a whole connected
    /// component at one instant. Terminates because an offer only
    /// transfers bundles the receiver does not know yet.
    fn drain_transfers(&mut self, queue: &mut VecDeque<(NodeId, NodeId)>, t: SimTime) {
        while let Some((from, to)) = queue.pop_front() {
            let offers = {
                let (Some(sender), Some(receiver)) = (self.nodes.get(&from), self.nodes.get(&to))
                else {
                    continue;
                };
                if !sender.neighbors.contains(&to) {
                    continue;
                }
                let known = receiver.router.known_ids();
                sender.router.offers(to, &known, t)
            };

            let mut received_any = false;
            for id in offers {
                if self.transfer(from, to, &id, t) {
                    received_any = true;
                }
            }
            if received_any {
                let onward: Vec<NodeId> = self
                    .nodes
                    .get(&to)
                    .expect("node exists")
                    .neighbors
                    .iter()
                    .copied()
                    .filter(|&n| n != from)
                    .collect();
                for n in onward {
                    queue.push_back((to, n));
                }
            }
        }
    }

    /// Transfers one bundle copy from `from` to `to`. Returns true when the
    /// receiver stored it (i.e. onward propagation makes sense).
    fn transfer(&mut self, from: NodeId, to: NodeId, id: &str, t: SimTime) -> bool {
        // a plan-governed link must fit the transfer into its window
        if let Some((end, transfer_time)) = self.window_limit(from, to, id, t) {
            if t + transfer_time > end {
                tracing::trace!(from, to, bundle = id, "transfer lost: window closes");
                self.net_stats.loss += 1;
                return false;
            }
        }

        let Some(copy) = self
            .nodes
            .get_mut(&from)
            .and_then(|n| n.router.on_forward(id))
        else {
            return false;
        };

        self.routing_stats.on_relayed();
        self.net_stats.tx += 1;
        self.logger.log(
            t,
            Category::Router,
            json!({"event": "TX", "src": from, "dst": to}),
        );
        self.net_stats.rx += 1;
        self.logger.log(
            t,
            Category::Router,
            json!({"event": "RX", "src": from, "dst": to}),
        );
        self.log_store(t, from);

        let hops = copy.hops;
        let created = copy.created;
        let outcome = {
            let node = self.nodes.get_mut(&to).expect("node exists");
            node.router.on_bundle_received(to, copy, from)
        };
        match outcome {
            ReceiveOutcome::Delivered => {
                tracing::debug!(bundle = id, node = to, time = t, "delivered");
                self.routing_stats.on_delivered(hops, created, t);
                false
            }
            ReceiveOutcome::Stored { evicted } => {
                self.count_evictions(&evicted);
                self.log_store(t, to);
                true
            }
            ReceiveOutcome::Duplicate => {
                self.routing_stats.on_duplicate();
                false
            }
            ReceiveOutcome::Refused => {
                self.routing_stats.on_dropped();
                self.net_stats.drop += 1;
                false
            }
        }
    }

    /// The window end and transfer time for a plan-governed pair, if any
    /// plan interface covers it at `t`.
    fn window_limit(&self, from: NodeId, to: NodeId, id: &str, t: SimTime) -> Option<(SimTime, SimTime)> {
        let size = self
            .nodes
            .get(&from)?
            .router
            .store()
            .get(id)
            .map(|b| b.size)?;
        for plan in &self.plans {
            if let Some(contact) = plan.active_contact(from, to, t) {
                return Some((contact.end, contact.transfer_time(size)));
            }
        }
        None
    }

    fn count_evictions(&mut self, evicted: &[Bundle]) {
        for b in evicted {
            tracing::trace!(bundle = %b.id, "evicted by capacity policy");
            self.routing_stats.on_dropped();
            self.net_stats.drop += 1;
        }
    }

    fn log_store(&mut self, t: SimTime, id: NodeId) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let used = node.router.store().used();
        let capacity = node.router.store().capacity().as_bytes();
        self.logger
            .log(t, Category::Store, json!({"id": id, "used": used, "capacity": capacity}));
    }
}
