//! Core type definitions for the simulator.
//!
//! This module defines the fundamental types used throughout the engine.

/// Simulation time in seconds.
///
/// Time is monotone and non-negative; it is advanced only by the scheduler
/// and never rewound. All components share this single timeline.
pub type SimTime = f64;

/// Unique identifier for a node in the simulated network.
pub type NodeId = u64;

/// Unique identifier for a bundle (message).
///
/// Ids are strings built from a generator label prefix and a sequence number
/// (e.g. `"M1"`), so copies of the same bundle on different nodes can be
/// deduplicated by id at the destination.
pub type BundleId = String;

/// Sentinel end time for a contact that has not been closed yet.
///
/// A contact-plan record with end `-1` is parsed into this value; an open
/// contact overlaps every later interval of the same pair.
pub const CONTACT_OPEN: SimTime = f64::INFINITY;

/// Returns the unordered pair key for two node ids.
pub fn pair_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_unordered() {
        assert_eq!(pair_key(3, 7), (3, 7));
        assert_eq!(pair_key(7, 3), (3, 7));
        assert_eq!(pair_key(5, 5), (5, 5));
    }

    #[test]
    fn test_open_sentinel_is_beyond_any_horizon() {
        assert!(CONTACT_OPEN > 1.0e12);
    }
}
