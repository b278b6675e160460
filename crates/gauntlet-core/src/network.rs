//! Simulated network congestion.

use crate::random::RandomSource;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Discrete network load bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionTier {
    #[default]
    Low,
    Medium,
    High,
    Extreme,
}

impl CongestionTier {
    /// All tiers, calmest first.
    pub const ALL: [CongestionTier; 4] = [
        CongestionTier::Low,
        CongestionTier::Medium,
        CongestionTier::High,
        CongestionTier::Extreme,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CongestionTier::Low => "low",
            CongestionTier::Medium => "medium",
            CongestionTier::High => "high",
            CongestionTier::Extreme => "extreme",
        }
    }

    /// The canonical condition for this tier.
    pub fn condition(self) -> NetworkCondition {
        let (rate, latency, description) = match self {
            CongestionTier::Low => (95, 200, "Network is calm. Transactions should land easily."),
            CongestionTier::Medium => (80, 500, "Moderate traffic. Choose your strategy wisely."),
            CongestionTier::High => (60, 1200, "High congestion! You will need smart routing."),
            CongestionTier::Extreme => {
                (30, 3000, "Network storm! Only the best strategies will succeed.")
            }
        };
        NetworkCondition {
            tier: self,
            base_success_rate: Decimal::from(rate),
            average_latency_ms: latency,
            description,
        }
    }
}

impl fmt::Display for CongestionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Baseline reliability and latency for one congestion tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkCondition {
    pub tier: CongestionTier,
    /// Percent in [0, 100].
    pub base_success_rate: Decimal,
    pub average_latency_ms: u32,
    pub description: &'static str,
}

/// Holds the current condition and re-rolls it on every tick.
///
/// The model is passive: an external driver calls [`tick`](Self::tick) on a
/// fixed interval.
#[derive(Clone, Debug, Default)]
pub struct NetworkConditionModel {
    current: CongestionTier,
}

impl NetworkConditionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Condition selected by the last tick, `low` before the first one.
    pub fn current(&self) -> NetworkCondition {
        self.current.condition()
    }

    /// Select a tier uniformly at random, independent of the previous one.
    pub fn tick<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> NetworkCondition {
        let next = CongestionTier::ALL[rng.next_index(CongestionTier::ALL.len())];
        if next != self.current {
            info!(from = %self.current, to = %next, "network condition changed");
        }
        self.current = next;
        self.current()
    }
}
