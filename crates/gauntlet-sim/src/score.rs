//! Score deltas and level progression.

use crate::SimError;
use gauntlet_core::{GameState, Outcome, ScoringRules};
use rust_decimal::Decimal;
use tracing::debug;

/// Components of a successful send's score before level scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub base: Decimal,
    pub cost_efficiency: Decimal,
    pub speed_bonus: Decimal,
    pub real_relay_bonus: Decimal,
    /// Sum of the above, clamped to the per-transaction cap.
    pub raw_score: Decimal,
}

/// Result of applying one outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreUpdate {
    /// Change actually applied to the score.
    pub delta: Decimal,
    pub state: GameState,
}

/// Turns outcomes into score changes.
#[derive(Clone, Debug, Default)]
pub struct ScoreEngine {
    rules: ScoringRules,
}

impl ScoreEngine {
    pub fn new(rules: ScoringRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Unscaled score of a landed transaction.
    pub fn breakdown(&self, outcome: &Outcome) -> ScoreBreakdown {
        let r = &self.rules;
        let cost_efficiency = if outcome.cost <= Decimal::ZERO {
            r.max_cost_efficiency
        } else {
            (r.reference_cost / outcome.cost * r.cost_efficiency_multiplier)
                .min(r.max_cost_efficiency)
        };
        let speed_bonus =
            (r.speed_bonus - outcome.latency_ms / r.latency_divisor).max(Decimal::ZERO);
        let real_relay_bonus = if outcome.used_real_relay {
            r.real_relay_bonus
        } else {
            Decimal::ZERO
        };
        let raw_score = (r.success_bonus + cost_efficiency + speed_bonus + real_relay_bonus)
            .clamp(Decimal::ZERO, r.max_score_per_transaction);
        ScoreBreakdown {
            base: r.success_bonus,
            cost_efficiency,
            speed_bonus,
            real_relay_bonus,
            raw_score,
        }
    }

    /// `1 + (level - 1) * level_step`.
    pub fn level_multiplier(&self, level: u32) -> Decimal {
        Decimal::ONE + Decimal::from(level.saturating_sub(1)) * self.rules.level_step
    }

    /// Apply one outcome to the prior state.
    ///
    /// Failures cost a flat penalty that is not level scaled; the score
    /// never drops below zero, so the reported delta is the change actually
    /// applied.
    pub fn apply_outcome(
        &self,
        outcome: &Outcome,
        prior: &GameState,
    ) -> Result<ScoreUpdate, SimError> {
        if outcome.cost < Decimal::ZERO || outcome.latency_ms < Decimal::ZERO {
            return Err(SimError::InvalidOutcome);
        }
        let proposed = if outcome.success {
            self.breakdown(outcome).raw_score * self.level_multiplier(prior.level())
        } else {
            -self.rules.failure_penalty
        };
        let score = (prior.score + proposed).max(Decimal::ZERO);
        let delta = score - prior.score;

        let state = GameState {
            score,
            attempts: prior.attempts + 1,
            successes: prior.successes + u64::from(outcome.success),
            total_cost: prior.total_cost + outcome.cost,
        };
        debug!(
            strategy = %outcome.strategy_id,
            success = outcome.success,
            %delta,
            score = %state.score,
            level = state.level(),
            "scored outcome"
        );
        Ok(ScoreUpdate { delta, state })
    }
}
