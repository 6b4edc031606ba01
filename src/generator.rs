//! Message generators.
//!
//! Generators inject fresh bundles on their own schedule. The single-shot
//! generator emits one bundle per interval for the whole run (a fixed
//! cadence, not a fixed total); the burst generator emits a batch at one
//! instant and either repeats or stops. An unknown generator type fails
//! fast at setup, before any simulated time elapses.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::message::Bundle;
use crate::types::{NodeId, SimTime};

/// The closed set of generator kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorKind {
    /// One bundle per interval.
    Single,
    /// A batch of bundles at one instant.
    Burst,
}

/// Message-generator configuration, as it appears in a scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MsgGenConfig {
    /// Generator type: `single` (default) or `burst`.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Emission interval in seconds.
    pub interval: SimTime,

    /// Source ids are sampled from `[src.0, src.1)`.
    pub src: (NodeId, NodeId),

    /// Destination ids are sampled from `[dst.0, dst.1)`.
    pub dst: (NodeId, NodeId),

    /// Payload size in bytes.
    pub size: u64,

    /// Bundle id label prefix (e.g. `"M"` yields `M1`, `M2`, ...).
    pub id: String,

    /// Time-to-live of generated bundles, in seconds.
    pub ttl: SimTime,

    /// Burst batch size.
    #[serde(default = "default_count")]
    pub count: u64,

    /// Whether a burst repeats every `interval` or fires once.
    #[serde(default)]
    pub repeat: bool,
}

fn default_kind() -> String {
    "single".to_string()
}

fn default_count() -> u64 {
    1
}

impl MsgGenConfig {
    /// Resolves the generator type, failing fast on an unknown one.
    pub fn resolve_kind(&self) -> Result<GeneratorKind, ConfigError> {
        match self.kind.as_str() {
            "" | "single" => Ok(GeneratorKind::Single),
            "burst" => Ok(GeneratorKind::Burst),
            other => Err(ConfigError::UnknownGeneratorType(other.to_string())),
        }
    }

    /// Validates ranges and parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolve_kind()?;
        if !(self.interval > 0.0) || !self.interval.is_finite() {
            return Err(ConfigError::Validation(format!(
                "generator '{}': interval must be positive",
                self.id
            )));
        }
        for (name, (lo, hi)) in [("src", self.src), ("dst", self.dst)] {
            if lo >= hi {
                return Err(ConfigError::Validation(format!(
                    "generator '{}': empty {name} range [{lo}, {hi})",
                    self.id
                )));
            }
        }
        if self.size == 0 {
            return Err(ConfigError::Validation(format!(
                "generator '{}': size must be non-zero",
                self.id
            )));
        }
        if !(self.ttl > 0.0) {
            return Err(ConfigError::Validation(format!(
                "generator '{}': ttl must be positive",
                self.id
            )));
        }
        if self.count == 0 {
            return Err(ConfigError::Validation(format!(
                "generator '{}': burst count must be non-zero",
                self.id
            )));
        }
        Ok(())
    }
}

/// Runtime state of one generator: its config, a seeded RNG, and the bundle
/// sequence counter.
#[derive(Debug)]
pub struct MessageGenerator {
    cfg: MsgGenConfig,
    kind: GeneratorKind,
    rng: StdRng,
    seq: u64,
    fired: bool,
}

impl MessageGenerator {
    /// Builds a generator, validating the configuration.
    pub fn new(cfg: MsgGenConfig, seed: u64) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let kind = cfg.resolve_kind()?;
        Ok(Self {
            cfg,
            kind,
            rng: StdRng::seed_from_u64(seed),
            seq: 0,
            fired: false,
        })
    }

    pub fn kind(&self) -> GeneratorKind {
        self.kind
    }

    /// Emission interval.
    pub fn interval(&self) -> SimTime {
        self.cfg.interval
    }

    /// Whether the generator wants to fire again after an emission.
    pub fn reschedules(&self) -> bool {
        match self.kind {
            GeneratorKind::Single => true,
            GeneratorKind::Burst => self.cfg.repeat || !self.fired,
        }
    }

    /// Emits this instant's bundles.
    pub fn emit(&mut self, now: SimTime) -> Vec<Bundle> {
        self.fired = true;
        let n = match self.kind {
            GeneratorKind::Single => 1,
            GeneratorKind::Burst => self.cfg.count,
        };
        (0..n).map(|_| self.make_bundle(now)).collect()
    }

    fn make_bundle(&mut self, now: SimTime) -> Bundle {
        let src = self.rng.gen_range(self.cfg.src.0..self.cfg.src.1);
        let mut dst = self.rng.gen_range(self.cfg.dst.0..self.cfg.dst.1);
        // resample a self-addressed bundle when the range permits
        let dst_width = self.cfg.dst.1 - self.cfg.dst.0;
        while dst == src && dst_width > 1 {
            dst = self.rng.gen_range(self.cfg.dst.0..self.cfg.dst.1);
        }

        self.seq += 1;
        Bundle::new(
            format!("{}{}", self.cfg.id, self.seq),
            src,
            dst,
            now,
            self.cfg.size,
            self.cfg.ttl,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MsgGenConfig {
        MsgGenConfig {
            kind: "single".to_string(),
            interval: 40.0,
            src: (0, 1),
            dst: (1, 2),
            size: 100,
            id: "M".to_string(),
            ttl: 3600.0,
            count: 1,
            repeat: false,
        }
    }

    #[test]
    fn test_single_emits_one_bundle_per_firing() {
        let mut g = MessageGenerator::new(config(), 42).unwrap();
        let bundles = g.emit(40.0);
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].id, "M1");
        assert_eq!(bundles[0].src, 0);
        assert!(bundles[0].dst.contains(1));
        assert_eq!(bundles[0].created, 40.0);
        assert!(g.reschedules());

        assert_eq!(g.emit(80.0)[0].id, "M2");
    }

    #[test]
    fn test_burst_emits_batch_then_stops() {
        let cfg = MsgGenConfig {
            kind: "burst".to_string(),
            count: 5,
            ..config()
        };
        let mut g = MessageGenerator::new(cfg, 42).unwrap();
        assert!(g.reschedules());
        assert_eq!(g.emit(40.0).len(), 5);
        assert!(!g.reschedules());
    }

    #[test]
    fn test_repeating_burst_reschedules() {
        let cfg = MsgGenConfig {
            kind: "burst".to_string(),
            count: 2,
            repeat: true,
            ..config()
        };
        let mut g = MessageGenerator::new(cfg, 42).unwrap();
        g.emit(40.0);
        assert!(g.reschedules());
    }

    #[test]
    fn test_unknown_type_fails_fast() {
        let cfg = MsgGenConfig {
            kind: "flood".to_string(),
            ..config()
        };
        match MessageGenerator::new(cfg, 42) {
            Err(ConfigError::UnknownGeneratorType(t)) => assert_eq!(t, "flood"),
            other => panic!("expected UnknownGeneratorType, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_range_rejected() {
        let cfg = MsgGenConfig {
            src: (3, 3),
            ..config()
        };
        assert!(MessageGenerator::new(cfg, 42).is_err());
    }

    #[test]
    fn test_sampling_is_seeded() {
        let cfg = MsgGenConfig {
            src: (0, 10),
            dst: (10, 20),
            ..config()
        };
        let mut a = MessageGenerator::new(cfg.clone(), 7).unwrap();
        let mut b = MessageGenerator::new(cfg, 7).unwrap();
        for t in 0..20 {
            assert_eq!(a.emit(t as f64), b.emit(t as f64));
        }
    }

    #[test]
    fn test_dst_resampled_on_collision() {
        let cfg = MsgGenConfig {
            src: (0, 5),
            dst: (0, 5),
            ..config()
        };
        let mut g = MessageGenerator::new(cfg, 42).unwrap();
        for t in 0..50 {
            let b = &g.emit(t as f64)[0];
            assert!(!b.dst.contains(b.src));
        }
    }

    #[test]
    fn test_yaml_generator_config() {
        let yaml = r#"
type: burst
interval: 40
src: [0, 1]
dst: [1, 4]
size: 100
id: "B"
ttl: 3600
count: 3
"#;
        let cfg: MsgGenConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.resolve_kind().unwrap(), GeneratorKind::Burst);
        assert_eq!(cfg.count, 3);
        assert!(cfg.validate().is_ok());
    }
}
