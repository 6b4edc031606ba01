//! Neighbor model and scripted movement.
//!
//! When no contact plan governs a link, connectivity between two nodes is
//! derived from their positions and the interface's declared range. A range
//! of `0.0` is a sentinel meaning "always in range of everyone on the same
//! interface", used for fully-connected scenarios.
//!
//! Movement is a scripted trace of absolute position updates; each entry is
//! replayed by the engine at its timestamp and followed by a neighbor
//! recomputation.

use serde::{Deserialize, Serialize};

use crate::types::{NodeId, SimTime};

/// Euclidean distance between two positions.
pub fn distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = ax - bx;
    let dy = ay - by;
    (dx * dx + dy * dy).sqrt()
}

/// In-range test. `range == 0.0` always holds.
pub fn in_range(ax: f64, ay: f64, bx: f64, by: f64, range: f64) -> bool {
    range == 0.0 || distance(ax, ay, bx, by) <= range
}

/// One scripted position update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// When the node reaches this position.
    pub time: SimTime,
    /// The moving node.
    pub node: NodeId,
    /// New x coordinate.
    pub x: f64,
    /// New y coordinate.
    pub y: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        assert_eq!(distance(0.0, 0.0, 3.0, 4.0), 5.0);
    }

    #[test]
    fn test_in_range_boundary_inclusive() {
        assert!(in_range(0.0, 0.0, 3.0, 4.0, 5.0));
        assert!(!in_range(0.0, 0.0, 3.0, 4.0, 4.9));
    }

    #[test]
    fn test_zero_range_means_always_in_range() {
        assert!(in_range(0.0, 0.0, 1.0e6, 1.0e6, 0.0));
    }
}
