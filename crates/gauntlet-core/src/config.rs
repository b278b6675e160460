//! Session configuration with serde defaults for every field.

use crate::state::DEFAULT_HISTORY_CAPACITY;
use crate::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tunable constants of the score engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// Flat reward for any landed transaction.
    pub success_bonus: Decimal,
    /// Cost at which the efficiency term equals the multiplier.
    pub reference_cost: Decimal,
    pub cost_efficiency_multiplier: Decimal,
    pub max_cost_efficiency: Decimal,
    pub speed_bonus: Decimal,
    /// Milliseconds of latency that cost one speed point.
    pub latency_divisor: Decimal,
    pub real_relay_bonus: Decimal,
    pub max_score_per_transaction: Decimal,
    /// Points deducted for a failed send (not level scaled).
    pub failure_penalty: Decimal,
    /// Extra multiplier per level above 1.
    pub level_step: Decimal,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            success_bonus: Decimal::from(50),
            reference_cost: Decimal::new(1, 5),
            cost_efficiency_multiplier: Decimal::from(100),
            max_cost_efficiency: Decimal::from(25),
            speed_bonus: Decimal::from(25),
            latency_divisor: Decimal::from(20),
            real_relay_bonus: Decimal::from(10),
            max_score_per_transaction: Decimal::from(100),
            failure_penalty: Decimal::from(5),
            level_step: Decimal::new(1, 1),
        }
    }
}

impl ScoringRules {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.reference_cost <= Decimal::ZERO {
            return Err(ValidationError::InvalidRule("reference_cost must be > 0"));
        }
        if self.latency_divisor <= Decimal::ZERO {
            return Err(ValidationError::InvalidRule("latency_divisor must be > 0"));
        }
        let non_negative = [
            self.success_bonus,
            self.cost_efficiency_multiplier,
            self.max_cost_efficiency,
            self.speed_bonus,
            self.real_relay_bonus,
            self.max_score_per_transaction,
            self.failure_penalty,
            self.level_step,
        ];
        if non_negative.iter().any(|v| *v < Decimal::ZERO) {
            return Err(ValidationError::InvalidRule("scoring constants must be >= 0"));
        }
        Ok(())
    }
}

/// Everything a session needs besides its collaborators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seconds between network condition changes.
    pub tick_interval_secs: u64,
    /// Seed for the session RNG.
    pub rng_seed: u64,
    /// Outcomes kept in the feed (10 or 20 in the shipped builds).
    pub history_capacity: usize,
    /// Upper bound on one relay round trip before falling back to simulation.
    pub relay_timeout_ms: u64,
    /// Whether sends try the real relay first.
    pub use_real_relay: bool,
    pub scoring: ScoringRules,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            rng_seed: 42,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            relay_timeout_ms: 5_000,
            use_real_relay: false,
            scoring: ScoringRules::default(),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=100).contains(&self.history_capacity) {
            return Err(ValidationError::HistoryCapacity(self.history_capacity));
        }
        if self.tick_interval_secs == 0 {
            return Err(ValidationError::InvalidRule("tick_interval_secs must be > 0"));
        }
        if self.relay_timeout_ms == 0 {
            return Err(ValidationError::InvalidRule("relay_timeout_ms must be > 0"));
        }
        self.scoring.validate()
    }
}
