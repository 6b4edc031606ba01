//! Statistics aggregation.
//!
//! Counters are updated exclusively through the mutation methods below (one
//! per documented mutation point), never recomputed by re-scanning
//! simulation state. Derived metrics are computed once, at run completion,
//! by [`RoutingStats::finalize`]; the raw `hops` and `latency` sums exist
//! only to feed the averages and are not part of the exported report.

use serde::{Deserialize, Serialize};

use crate::types::SimTime;

/// Network-level counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetStats {
    /// Bundle instances transmitted.
    pub tx: u64,
    /// Bundle instances received.
    pub rx: u64,
    /// Receptions rejected by the capacity policy.
    pub drop: u64,
    /// Transmissions lost on the link (e.g. window closed mid-transfer).
    pub loss: u64,
}

/// Routing-level raw counters, accumulated over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutingStats {
    /// Bundles created by generators and applications.
    pub created: u64,
    /// Deliveries to a destination (once per destination, not per send).
    pub delivered: u64,
    /// Bundle copies dropped by the capacity policy.
    pub dropped: u64,
    /// Bundle copies forwarded to a peer.
    pub relayed: u64,
    /// Bundle copies purged on TTL expiry.
    pub aborted: u64,
    /// Duplicate arrivals suppressed.
    pub dups: u64,
    /// Sum of path hop counts over all deliveries (feeds `hops_avg` only).
    pub hops: u64,
    /// Sum of delivery latencies over all deliveries (feeds `latency_avg`).
    pub latency: f64,
}

impl RoutingStats {
    /// Bundle created.
    pub fn on_created(&mut self) {
        self.created += 1;
    }

    /// Bundle instance forwarded to a peer.
    pub fn on_relayed(&mut self) {
        self.relayed += 1;
    }

    /// Bundle copy dropped by the capacity policy.
    pub fn on_dropped(&mut self) {
        self.dropped += 1;
    }

    /// Bundle copy aborted on TTL expiry.
    pub fn on_aborted(&mut self) {
        self.aborted += 1;
    }

    /// Duplicate arrival suppressed.
    pub fn on_duplicate(&mut self) {
        self.dups += 1;
    }

    /// Bundle delivered to (one of) its destination(s).
    pub fn on_delivered(&mut self, path_hops: u32, created: SimTime, now: SimTime) {
        self.delivered += 1;
        self.hops += u64::from(path_hops);
        self.latency += now - created;
    }

    /// Computes the derived metrics and discards the raw sums that feed
    /// them. Must be called exactly once, at run end; dividing partial sums
    /// mid-run would be meaningless.
    ///
    /// All zero-denominator cases yield exactly `0.0`: `delivery_prob` when
    /// nothing was created, and the averages and `overhead_ratio` when
    /// nothing was delivered.
    pub fn finalize(self) -> RoutingReport {
        let delivered = self.delivered as f64;
        let (latency_avg, hops_avg, overhead_ratio) = if self.delivered > 0 {
            (
                self.latency / delivered,
                self.hops as f64 / delivered,
                (self.relayed as f64 - delivered) / delivered,
            )
        } else {
            (0.0, 0.0, 0.0)
        };
        let delivery_prob = if self.created > 0 {
            delivered / self.created as f64
        } else {
            0.0
        };

        RoutingReport {
            created: self.created,
            delivered: self.delivered,
            dropped: self.dropped,
            relayed: self.relayed,
            aborted: self.aborted,
            dups: self.dups,
            latency_avg,
            hops_avg,
            overhead_ratio,
            delivery_prob,
        }
    }
}

/// Final routing report: standalone counters plus the derived metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingReport {
    pub created: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub relayed: u64,
    pub aborted: u64,
    pub dups: u64,
    /// Average delivery latency in seconds (0 when nothing was delivered).
    pub latency_avg: f64,
    /// Average path hop count (0 when nothing was delivered).
    pub hops_avg: f64,
    /// Excess relays per delivery (0 when nothing was delivered).
    pub overhead_ratio: f64,
    /// delivered / created (0 when nothing was created).
    pub delivery_prob: f64,
}

/// The two run-summary reports returned at completion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimReport {
    pub net: NetStats,
    pub routing: RoutingReport,
}

impl SimReport {
    /// Pretty JSON, for printing at run end.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_metrics() {
        let mut s = RoutingStats::default();
        s.on_created();
        s.on_created();
        s.on_relayed();
        s.on_relayed();
        s.on_relayed();
        s.on_delivered(2, 0.0, 30.0);
        s.on_delivered(4, 10.0, 20.0);

        let r = s.finalize();
        assert_eq!(r.created, 2);
        assert_eq!(r.delivered, 2);
        assert_eq!(r.latency_avg, 20.0);
        assert_eq!(r.hops_avg, 3.0);
        assert_eq!(r.overhead_ratio, 0.5);
        assert_eq!(r.delivery_prob, 1.0);
    }

    #[test]
    fn test_zero_denominators_are_zero() {
        let r = RoutingStats::default().finalize();
        assert_eq!(r.latency_avg, 0.0);
        assert_eq!(r.hops_avg, 0.0);
        assert_eq!(r.overhead_ratio, 0.0);
        assert_eq!(r.delivery_prob, 0.0);
    }

    #[test]
    fn test_report_drops_raw_sums() {
        let mut s = RoutingStats::default();
        s.on_created();
        s.on_delivered(7, 0.0, 5.0);
        let json = serde_json::to_value(s.finalize()).unwrap();

        assert!(json.get("hops").is_none());
        assert!(json.get("latency").is_none());
        assert!(json.get("hops_avg").is_some());
        assert!(json.get("latency_avg").is_some());
    }

    #[test]
    fn test_report_json_export() {
        let report = SimReport::default();
        let json = report.to_json().unwrap();
        assert!(json.contains("delivery_prob"));
        assert!(json.contains("\"net\""));
    }
}
