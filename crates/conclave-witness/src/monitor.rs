//! Collusion monitoring
//!
//! Tracks the rolling distribution of witness pairs. Under honest seeded
//! selection every pair appears with roughly uniform frequency; a pair
//! whose empirical frequency exceeds the configured threshold is flagged
//! as a witness anomaly and escalated to breach by the pipeline.

use std::collections::{HashMap, VecDeque};

use conclave_types::ActorId;
use tracing::warn;

/// An ordered witness pair (normalized so (a,b) == (b,a)).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WitnessPair(pub ActorId, pub ActorId);

impl WitnessPair {
    /// Normalize the pair ordering
    pub fn new(a: ActorId, b: ActorId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// A flagged pair and its observed frequency.
#[derive(Debug, Clone)]
pub struct PairAnomaly {
    pub pair: WitnessPair,
    pub frequency: f64,
    pub observations: u32,
}

/// Rolling pair-frequency monitor.
pub struct CollusionMonitor {
    window: VecDeque<Vec<WitnessPair>>,
    counts: HashMap<WitnessPair, u32>,
    capacity: usize,
    threshold: f64,
}

impl CollusionMonitor {
    /// `capacity` is the number of recent events considered; `threshold`
    /// is the pair frequency above which an anomaly fires.
    pub fn new(capacity: usize, threshold: f64) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            counts: HashMap::new(),
            capacity: capacity.max(1),
            threshold,
        }
    }

    /// Record the witness set of one appended event.
    pub fn observe(&mut self, witnesses: &[ActorId]) {
        let mut pairs = Vec::new();
        for i in 0..witnesses.len() {
            for j in (i + 1)..witnesses.len() {
                pairs.push(WitnessPair::new(witnesses[i].clone(), witnesses[j].clone()));
            }
        }

        for pair in &pairs {
            *self.counts.entry(pair.clone()).or_insert(0) += 1;
        }
        self.window.push_back(pairs);

        while self.window.len() > self.capacity {
            if let Some(expired) = self.window.pop_front() {
                for pair in expired {
                    if let Some(count) = self.counts.get_mut(&pair) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            self.counts.remove(&pair);
                        }
                    }
                }
            }
        }
    }

    /// Events currently inside the window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Empirical frequency of a pair within the window
    pub fn frequency(&self, pair: &WitnessPair) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let count = self.counts.get(pair).copied().unwrap_or(0);
        count as f64 / self.window.len() as f64
    }

    /// All pairs currently above the threshold. A minimum of eight
    /// observations keeps early noise from firing the alarm.
    pub fn anomalies(&self) -> Vec<PairAnomaly> {
        let mut flagged = Vec::new();
        for (pair, count) in &self.counts {
            if *count < 8 {
                continue;
            }
            let frequency = self.frequency(pair);
            if frequency > self.threshold {
                warn!(
                    frequency,
                    observations = count,
                    "witness pair frequency above threshold"
                );
                flagged.push(PairAnomaly {
                    pair: pair.clone(),
                    frequency,
                    observations: *count,
                });
            }
        }
        flagged.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));
        flagged
    }
}
