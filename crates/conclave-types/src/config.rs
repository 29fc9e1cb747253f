//! Runtime configuration
//!
//! Loaded from the environment by the CLI; every knob has a documented
//! default so a bare environment still yields a working core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::motion::ConsensusLevel;

/// Adoption rule for one consensus level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Minimum yea fraction of cast votes, excluding abstains
    pub min_yea_fraction: f64,
    /// Minimum cast fraction of the roster
    pub min_cast_fraction: f64,
}

/// Adoption thresholds per consensus level. Configurable but required to
/// be monotone in level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptionThresholds {
    rules: BTreeMap<ConsensusLevel, ThresholdRule>,
}

impl Default for AdoptionThresholds {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(ConsensusLevel::Single, ThresholdRule { min_yea_fraction: 0.50, min_cast_fraction: 0.30 });
        rules.insert(ConsensusLevel::Low, ThresholdRule { min_yea_fraction: 0.55, min_cast_fraction: 0.40 });
        rules.insert(ConsensusLevel::Medium, ThresholdRule { min_yea_fraction: 0.60, min_cast_fraction: 0.50 });
        rules.insert(ConsensusLevel::High, ThresholdRule { min_yea_fraction: 0.67, min_cast_fraction: 0.60 });
        rules.insert(ConsensusLevel::Critical, ThresholdRule { min_yea_fraction: 0.75, min_cast_fraction: 0.67 });
        Self { rules }
    }
}

impl AdoptionThresholds {
    /// The rule for a given level
    pub fn rule(&self, level: ConsensusLevel) -> ThresholdRule {
        self.rules
            .get(&level)
            .copied()
            .unwrap_or(ThresholdRule { min_yea_fraction: 1.0, min_cast_fraction: 1.0 })
    }

    /// Replace the rule for one level
    pub fn set_rule(&mut self, level: ConsensusLevel, rule: ThresholdRule) {
        self.rules.insert(level, rule);
    }

    /// Thresholds must not decrease as the level rises
    pub fn is_monotone(&self) -> bool {
        let levels = ConsensusLevel::all();
        levels.windows(2).all(|pair| {
            let lo = self.rule(pair[0]);
            let hi = self.rule(pair[1]);
            hi.min_yea_fraction >= lo.min_yea_fraction && hi.min_cast_fraction >= lo.min_cast_fraction
        })
    }
}

/// Core configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConclaveConfig {
    /// Where the TimeAuthority lives; the core halts intake without it
    pub time_authority_url: String,
    /// Store DSN; `memory:` is the scheme the core ships
    pub store_dsn: String,
    /// Lease time-to-live in seconds
    pub lease_ttl_seconds: u64,
    /// Heartbeat safety margin in seconds; refresh must land before
    /// `expires_at - safety_margin`
    pub lease_safety_margin_seconds: u64,
    /// Minimum witness co-signatures per event
    pub witness_min: usize,
    /// Additional witnesses required on override and cessation events
    pub witness_extra_for_critical: usize,
    /// Quorum as a fraction of the roster (default: strict majority)
    pub quorum_fraction: f64,
    /// Default override time limit in hours
    pub override_default_hours: u64,
    /// Bounded intake queue capacity per cycle
    pub intake_capacity: usize,
    /// How many suppression attempts are tolerated before halt
    pub suppression_grace: u32,
    /// Witness pair-frequency above which an anomaly is flagged
    pub witness_pair_threshold: f64,
    /// Adoption thresholds per consensus level
    pub thresholds: AdoptionThresholds,
}

impl Default for ConclaveConfig {
    fn default() -> Self {
        Self {
            time_authority_url: "internal:monotonic".to_string(),
            store_dsn: "memory:".to_string(),
            lease_ttl_seconds: 30,
            lease_safety_margin_seconds: 5,
            witness_min: 2,
            witness_extra_for_critical: 1,
            quorum_fraction: 0.5,
            override_default_hours: 72,
            intake_capacity: 64,
            suppression_grace: 1,
            witness_pair_threshold: 0.5,
            thresholds: AdoptionThresholds::default(),
        }
    }
}

impl ConclaveConfig {
    /// Create config from environment variables, with defaults for
    /// anything unset or unparseable.
    ///
    /// Exactly six variables are read: `TIME_AUTHORITY_URL`,
    /// `STORE_DSN`, `LEASE_TTL_SECONDS`, `WITNESS_MIN`,
    /// `QUORUM_FRACTION`, `OVERRIDE_DEFAULT_HOURS`. Every other knob
    /// keeps its default and is set programmatically.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            time_authority_url: std::env::var("TIME_AUTHORITY_URL")
                .unwrap_or(defaults.time_authority_url),
            store_dsn: std::env::var("STORE_DSN").unwrap_or(defaults.store_dsn),
            lease_ttl_seconds: env_parse("LEASE_TTL_SECONDS", defaults.lease_ttl_seconds),
            lease_safety_margin_seconds: defaults.lease_safety_margin_seconds,
            witness_min: env_parse("WITNESS_MIN", defaults.witness_min),
            witness_extra_for_critical: defaults.witness_extra_for_critical,
            quorum_fraction: env_parse("QUORUM_FRACTION", defaults.quorum_fraction),
            override_default_hours: env_parse("OVERRIDE_DEFAULT_HOURS", defaults.override_default_hours),
            intake_capacity: defaults.intake_capacity,
            suppression_grace: defaults.suppression_grace,
            witness_pair_threshold: defaults.witness_pair_threshold,
            thresholds: AdoptionThresholds::default(),
        }
    }

    /// Sanity-check the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.quorum_fraction) {
            return Err(format!("quorum_fraction {} out of range", self.quorum_fraction));
        }
        if self.witness_min == 0 {
            return Err("witness_min must be at least 1".to_string());
        }
        if self.lease_safety_margin_seconds >= self.lease_ttl_seconds {
            return Err("lease safety margin must be smaller than the ttl".to_string());
        }
        if !self.thresholds.is_monotone() {
            return Err("adoption thresholds must be monotone in consensus level".to_string());
        }
        Ok(())
    }

    /// Witness requirement for a given event kind
    pub fn witnesses_required(&self, critical: bool) -> usize {
        if critical {
            self.witness_min + self.witness_extra_for_critical
        } else {
            self.witness_min
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
