//! Session progression: outcomes, cumulative counters and the bounded feed.

use crate::network::CongestionTier;
use crate::ValidationError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Score needed per level.
pub const POINTS_PER_LEVEL: u32 = 1000;

/// Default number of outcomes kept in the feed.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Level derived from a score: `floor(score / 1000) + 1`, never below 1.
pub fn level_for_score(score: Decimal) -> u32 {
    if score <= Decimal::ZERO {
        return 1;
    }
    let steps = (score / Decimal::from(POINTS_PER_LEVEL)).floor();
    steps.to_u32().unwrap_or(u32::MAX - 1).saturating_add(1)
}

/// Result of one send attempt. Created once and never changed.
///
/// Every field defaults when missing so older saved feeds keep loading.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Outcome {
    pub success: bool,
    /// Fee paid in SOL (>= 0).
    pub cost: Decimal,
    /// Observed latency in milliseconds (>= 0).
    pub latency_ms: Decimal,
    pub strategy_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub used_real_relay: bool,
    pub network_tier: CongestionTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Cumulative counters for one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameState {
    pub score: Decimal,
    pub attempts: u64,
    pub successes: u64,
    pub total_cost: Decimal,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always recomputed from the score.
    pub fn level(&self) -> u32 {
        level_for_score(self.score)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.successes > self.attempts {
            return Err(ValidationError::SuccessesExceedAttempts {
                successes: self.successes,
                attempts: self.attempts,
            });
        }
        if self.score < Decimal::ZERO {
            return Err(ValidationError::NegativeScore);
        }
        if self.total_cost < Decimal::ZERO {
            return Err(ValidationError::NegativeMoney);
        }
        Ok(())
    }
}

/// Most-recent-first feed of outcomes with FIFO eviction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionHistory {
    capacity: usize,
    entries: VecDeque<Outcome>,
}

impl Default for TransactionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TransactionHistory {
    /// A zero capacity is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Build from entries already ordered most-recent-first, dropping the
    /// oldest beyond capacity.
    pub fn from_entries(capacity: usize, entries: Vec<Outcome>) -> Self {
        let mut h = Self::with_capacity(capacity);
        h.entries.extend(entries.into_iter().take(h.capacity));
        h
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.entries.push_front(outcome);
        self.entries.truncate(self.capacity);
    }

    /// Most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Outcome> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Figures shown on the player dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub level: u32,
    /// Percent of attempts that landed; zero before the first attempt.
    pub success_rate_pct: Decimal,
    /// Percent of the way to the next level, in [0, 100].
    pub level_progress_pct: Decimal,
    pub next_level_score: Decimal,
    pub average_cost: Decimal,
}

impl DashboardStats {
    pub fn from_state(state: &GameState) -> Self {
        let per_level = Decimal::from(POINTS_PER_LEVEL);
        let level = state.level();
        let success_rate_pct = if state.attempts == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(state.successes) / Decimal::from(state.attempts) * Decimal::ONE_HUNDRED
        };
        let average_cost = if state.attempts == 0 {
            Decimal::ZERO
        } else {
            state.total_cost / Decimal::from(state.attempts)
        };
        let into_level = state.score.max(Decimal::ZERO) % per_level;
        let level_progress_pct =
            (into_level / per_level * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED);
        Self {
            level,
            success_rate_pct,
            level_progress_pct,
            next_level_score: Decimal::from(level) * per_level,
            average_cost,
        }
    }
}

/// Abbreviate a signature for display as `first12...last8`.
pub fn short_signature(sig: &str) -> String {
    let chars: Vec<char> = sig.chars().collect();
    if chars.len() <= 20 {
        return sig.to_string();
    }
    let head: String = chars[..12].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{head}...{tail}")
}
