//! Static contact plans.
//!
//! A contact plan is a precomputed schedule of link windows between node
//! pairs, used instead of computing connectivity from positions. The plan
//! answers point queries ("which contacts are active or transitioning at
//! T?") and range queries ("when is the next boundary after T?") against a
//! sorted index, never by scanning per tick.
//!
//! # Text format
//!
//! One record per line; `#` starts a comment, blank lines are skipped:
//!
//! ```text
//! # contact <start> <end> <node_a> <node_b> [bw [loss [delay [jitter]]]]
//! contact 10 50 1 2 250000 0.0 0.05
//! contact 60 -1 1 3
//! ```
//!
//! `end == -1` marks a still-open contact. Intervals are half-open
//! `[start, end)`; for a given unordered node pair they must be disjoint,
//! otherwise loading fails with [`ParseError::Overlap`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{pair_key, NodeId, SimTime, CONTACT_OPEN};

/// Errors raised while loading a contact plan. All are fatal: a plan that
/// fails to load aborts the run before any simulated time elapses.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed contact record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("overlapping contact for pair ({a}, {b}) at line {line}")]
    Overlap { line: usize, a: NodeId, b: NodeId },
}

/// A scheduled link window between two nodes.
///
/// The link-quality attributes (bandwidth, loss, delay, jitter) are opaque
/// to the engine except through [`Contact::transfer_time`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// The node pair, as given in the plan.
    pub nodes: (NodeId, NodeId),
    /// Window start (inclusive).
    pub start: SimTime,
    /// Window end (exclusive); [`CONTACT_OPEN`] when still open.
    pub end: SimTime,
    /// Link bandwidth in bytes per second; 0 means unlimited.
    pub bandwidth: u64,
    /// Loss probability in `[0, 1]`.
    pub loss: f64,
    /// One-way link delay in seconds.
    pub delay: f64,
    /// Delay jitter in seconds.
    pub jitter: f64,
}

impl Contact {
    /// Returns the unordered pair key of this contact.
    pub fn pair(&self) -> (NodeId, NodeId) {
        pair_key(self.nodes.0, self.nodes.1)
    }

    /// True when the half-open window `[start, end)` contains `t`.
    pub fn contains(&self, t: SimTime) -> bool {
        self.start <= t && t < self.end
    }

    /// True when this contact has no resolved end yet.
    pub fn is_open(&self) -> bool {
        self.end == CONTACT_OPEN
    }

    /// Time needed to push `size` bytes over this link.
    ///
    /// Bandwidth 0 means the link is not rate-limited; only the fixed delay
    /// applies.
    pub fn transfer_time(&self, size: u64) -> SimTime {
        if self.bandwidth == 0 {
            self.delay
        } else {
            size as f64 / self.bandwidth as f64 + self.delay
        }
    }
}

/// A loaded, validated contact plan: disjoint per-pair windows sorted by
/// start time, plus a boundary index for `next_boundary` queries.
#[derive(Clone, Debug, Default)]
pub struct ContactPlan {
    contacts: Vec<Contact>,
    boundaries: Vec<SimTime>,
    by_pair: HashMap<(NodeId, NodeId), Vec<usize>>,
    horizon: Option<SimTime>,
}

impl ContactPlan {
    /// Parses a plan from its textual form.
    pub fn from_str(source: &str) -> Result<Self, ParseError> {
        let mut records = Vec::new();
        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let text = raw.split('#').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }
            records.push((line, parse_record(line, text)?));
        }
        Self::from_records(records)
    }

    /// Loads a plan from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Builds a plan from already-parsed contacts (e.g. assembled in code).
    pub fn from_contacts(contacts: Vec<Contact>) -> Result<Self, ParseError> {
        Self::from_records(contacts.into_iter().map(|c| (0, c)).collect())
    }

    fn from_records(mut records: Vec<(usize, Contact)>) -> Result<Self, ParseError> {
        records.sort_by(|(_, x), (_, y)| {
            x.start
                .total_cmp(&y.start)
                .then_with(|| x.pair().cmp(&y.pair()))
        });

        // Per-pair disjointness: with start-sorted windows an overlap is a
        // window starting before its predecessor ended.
        let mut by_pair: HashMap<(NodeId, NodeId), Vec<usize>> = HashMap::new();
        for (i, (line, c)) in records.iter().enumerate() {
            let key = c.pair();
            if let Some(indices) = by_pair.get(&key) {
                let (_, prev) = &records[*indices.last().expect("non-empty")];
                if c.start < prev.end {
                    return Err(ParseError::Overlap {
                        line: *line,
                        a: key.0,
                        b: key.1,
                    });
                }
            }
            by_pair.entry(key).or_default().push(i);
        }

        let contacts: Vec<Contact> = records.into_iter().map(|(_, c)| c).collect();

        let mut boundaries: Vec<SimTime> = contacts
            .iter()
            .flat_map(|c| {
                let end = (!c.is_open()).then_some(c.end);
                std::iter::once(c.start).chain(end)
            })
            .collect();
        boundaries.sort_by(f64::total_cmp);
        boundaries.dedup();

        Ok(Self {
            contacts,
            boundaries,
            by_pair,
            horizon: None,
        })
    }

    /// Sets an explicit time horizon used by [`max_time`](Self::max_time).
    pub fn with_horizon(mut self, horizon: SimTime) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// All contacts, sorted by start time.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Number of contacts in the plan.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// True when the plan holds no contacts.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// End of the last closed interval, or the explicit horizon if set.
    pub fn max_time(&self) -> SimTime {
        if let Some(h) = self.horizon {
            return h;
        }
        self.contacts
            .iter()
            .filter(|c| !c.is_open())
            .map(|c| c.end)
            .fold(0.0, f64::max)
    }

    /// Earliest start or (finite) end strictly greater than `after`, or
    /// `None` when no more boundaries exist.
    pub fn next_boundary(&self, after: SimTime) -> Option<SimTime> {
        let i = self.boundaries.partition_point(|&b| b <= after);
        self.boundaries.get(i).copied()
    }

    /// Every interval whose `[start, end)` contains `t`, plus any interval
    /// starting or ending exactly at `t`. Boundary intervals are reported
    /// once, at the boundary instant.
    pub fn events_active_at(&self, t: SimTime) -> Vec<&Contact> {
        self.contacts
            .iter()
            .take_while(|c| c.start <= t)
            .filter(|c| c.contains(t) || c.start == t || c.end == t)
            .collect()
    }

    /// Unordered pairs connected at `t` (half-open containment only).
    pub fn active_pairs_at(&self, t: SimTime) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<_> = self
            .contacts
            .iter()
            .take_while(|c| c.start <= t)
            .filter(|c| c.contains(t))
            .map(|c| c.pair())
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// The window governing the pair `(a, b)` at `t`, if any.
    pub fn active_contact(&self, a: NodeId, b: NodeId, t: SimTime) -> Option<&Contact> {
        let indices = self.by_pair.get(&pair_key(a, b))?;
        indices
            .iter()
            .map(|&i| &self.contacts[i])
            .find(|c| c.contains(t))
    }
}

fn parse_record(line: usize, text: &str) -> Result<Contact, ParseError> {
    let malformed = |reason: &str| ParseError::Malformed {
        line,
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields[0] != "contact" {
        return Err(malformed(&format!("unknown record type '{}'", fields[0])));
    }
    if fields.len() < 5 {
        return Err(malformed("expected: contact <start> <end> <a> <b>"));
    }

    let start: SimTime = fields[1]
        .parse()
        .map_err(|_| malformed("invalid start time"))?;
    let end_raw: SimTime = fields[2]
        .parse()
        .map_err(|_| malformed("invalid end time"))?;
    let a: NodeId = fields[3]
        .parse()
        .map_err(|_| malformed("invalid node id"))?;
    let b: NodeId = fields[4]
        .parse()
        .map_err(|_| malformed("invalid node id"))?;

    if start < 0.0 || !start.is_finite() {
        return Err(malformed("start time must be finite and non-negative"));
    }
    let end = if end_raw == -1.0 { CONTACT_OPEN } else { end_raw };
    if end <= start {
        return Err(malformed("end time must be after start time"));
    }
    if a == b {
        return Err(malformed("contact requires two distinct nodes"));
    }

    let opt = |i: usize| fields.get(i).map(|f| f.parse::<f64>());
    let bandwidth = match opt(5) {
        Some(Ok(v)) if v >= 0.0 => v as u64,
        Some(_) => return Err(malformed("invalid bandwidth")),
        None => 0,
    };
    let float_attr = |i: usize, name: &str| -> Result<f64, ParseError> {
        match opt(i) {
            Some(Ok(v)) if v >= 0.0 => Ok(v),
            Some(_) => Err(malformed(&format!("invalid {name}"))),
            None => Ok(0.0),
        }
    };
    let loss = float_attr(6, "loss")?;
    let delay = float_attr(7, "delay")?;
    let jitter = float_attr(8, "jitter")?;

    Ok(Contact {
        nodes: (a, b),
        start,
        end,
        bandwidth,
        loss,
        delay,
        jitter,
    })
}
