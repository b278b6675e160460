//! Maps a strategy and the current network condition to an [`Outcome`].

use crate::SimError;
use gauntlet_core::{NetworkCondition, Outcome, RandomSource, RelayVerdict, StrategyCatalog};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::debug;

const BASE58: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const SIGNATURE_LEN: usize = 88;

/// Lower and upper bound of the latency jitter factor.
pub const JITTER_MIN: f64 = 0.8;
pub const JITTER_MAX: f64 = 1.2;

/// Message attached to failures that carry no relay error.
pub const FAILED_MESSAGE: &str = "Transaction failed";

/// Reliability and speed of a strategy, independent of its risk label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrategyProfile {
    /// Percent in [0, 100].
    pub base_success_rate: Decimal,
    pub base_latency_ms: Decimal,
}

/// Profile for a catalog id.
pub fn profile(strategy_id: &str) -> Option<StrategyProfile> {
    let (rate, latency) = match strategy_id {
        "safe" => (92, 300),
        "balanced" => (85, 200),
        "cheap" => (80, 500),
        "fast" => (75, 100),
        _ => return None,
    };
    Some(StrategyProfile {
        base_success_rate: Decimal::from(rate),
        base_latency_ms: Decimal::from(latency),
    })
}

/// Produces outcomes for user sends.
#[derive(Clone, Debug, Default)]
pub struct OutcomeSimulator {
    catalog: StrategyCatalog,
}

impl OutcomeSimulator {
    pub fn new(catalog: StrategyCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    /// Strategy reliability scaled multiplicatively by the network.
    ///
    /// Result is a percentage in [0, 100].
    pub fn effective_success_rate(
        &self,
        strategy_id: &str,
        condition: &NetworkCondition,
    ) -> Result<Decimal, SimError> {
        self.catalog.lookup(strategy_id)?;
        let p =
            profile(strategy_id).ok_or_else(|| SimError::UnknownStrategy(strategy_id.into()))?;
        let rate = p.base_success_rate * condition.base_success_rate / Decimal::ONE_HUNDRED;
        Ok(rate.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    /// Simulate one send.
    ///
    /// A relay verdict, when given, is authoritative for success. Otherwise
    /// success is drawn as `uniform(0, 100) < effective rate`.
    pub fn simulate<R: RandomSource + ?Sized>(
        &self,
        strategy_id: &str,
        condition: &NetworkCondition,
        remote: Option<&RelayVerdict>,
        rng: &mut R,
    ) -> Result<Outcome, SimError> {
        let strategy = self.catalog.lookup(strategy_id)?;
        let p =
            profile(strategy_id).ok_or_else(|| SimError::UnknownStrategy(strategy_id.into()))?;
        let effective = self.effective_success_rate(strategy_id, condition)?;

        let success = match remote {
            Some(v) => v.success,
            None => {
                let threshold = effective.to_f64().ok_or(SimError::NonFinite)?;
                rng.next_percent() < threshold
            }
        };

        let cost = if success {
            strategy.nominal_cost
        } else {
            strategy.nominal_cost * Decimal::new(5, 1)
        };

        let factor = JITTER_MIN + rng.next_unit() * (JITTER_MAX - JITTER_MIN);
        let factor = Decimal::from_f64(factor).ok_or(SimError::NonFinite)?;
        let latency_ms = (p.base_latency_ms * factor).round_dp(2);

        let signature = if success {
            Some(
                remote
                    .and_then(|v| v.signature.clone())
                    .unwrap_or_else(|| make_signature(rng)),
            )
        } else {
            None
        };
        let error_message = if success {
            None
        } else {
            Some(
                remote
                    .and_then(|v| v.error.clone())
                    .unwrap_or_else(|| FAILED_MESSAGE.to_string()),
            )
        };

        debug!(
            strategy = strategy_id,
            tier = %condition.tier,
            %effective,
            success,
            real_relay = remote.is_some(),
            "simulated send"
        );

        Ok(Outcome {
            success,
            cost,
            latency_ms,
            strategy_id: strategy.id.to_string(),
            signature,
            used_real_relay: remote.is_some(),
            network_tier: condition.tier,
            error_message,
        })
    }
}

fn make_signature<R: RandomSource + ?Sized>(rng: &mut R) -> String {
    (0..SIGNATURE_LEN)
        .map(|_| BASE58[rng.next_index(BASE58.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_core::{CongestionTier, FixedRandom, SeededRandom};
    use proptest::prelude::*;
    use std::str::FromStr;

    fn sim() -> OutcomeSimulator {
        OutcomeSimulator::new(StrategyCatalog::standard())
    }

    #[test]
    fn safe_in_calm_network_lands() {
        let low = CongestionTier::Low.condition();
        let rate = sim().effective_success_rate("safe", &low).unwrap();
        assert_eq!(rate, Decimal::from_str("87.4").unwrap());

        let o = sim().simulate("safe", &low, None, &mut FixedRandom(0.5)).unwrap();
        assert!(o.success);
        assert_eq!(o.cost, Decimal::new(1, 4));
        assert_eq!(o.latency_ms, Decimal::from(300));
        assert_eq!(o.signature.as_ref().map(|s| s.len()), Some(SIGNATURE_LEN));
        assert!(o.error_message.is_none());
        assert!(!o.used_real_relay);
        assert_eq!(o.network_tier, CongestionTier::Low);
    }

    #[test]
    fn fast_in_storm_fails_with_half_fee() {
        let extreme = CongestionTier::Extreme.condition();
        let rate = sim().effective_success_rate("fast", &extreme).unwrap();
        assert_eq!(rate, Decimal::from_str("22.5").unwrap());

        let o = sim().simulate("fast", &extreme, None, &mut FixedRandom(0.5)).unwrap();
        assert!(!o.success);
        assert_eq!(o.cost, Decimal::from_str("0.00025").unwrap());
        assert!(o.signature.is_none());
        assert_eq!(o.error_message.as_deref(), Some(FAILED_MESSAGE));
        assert_eq!(o.network_tier, CongestionTier::Extreme);
    }

    #[test]
    fn relay_verdict_overrides_the_draw() {
        let extreme = CongestionTier::Extreme.condition();
        let landed = RelayVerdict::landed("realsig");
        let o = sim()
            .simulate("fast", &extreme, Some(&landed), &mut FixedRandom(0.99))
            .unwrap();
        assert!(o.success);
        assert!(o.used_real_relay);
        assert_eq!(o.signature.as_deref(), Some("realsig"));

        let low = CongestionTier::Low.condition();
        let rejected = RelayVerdict::rejected("blockhash not found");
        let o = sim()
            .simulate("safe", &low, Some(&rejected), &mut FixedRandom(0.0))
            .unwrap();
        assert!(!o.success);
        assert!(o.used_real_relay);
        assert_eq!(o.error_message.as_deref(), Some("blockhash not found"));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let low = CongestionTier::Low.condition();
        let err = sim().simulate("turbo", &low, None, &mut FixedRandom(0.5)).unwrap_err();
        assert_eq!(err, SimError::UnknownStrategy("turbo".into()));
    }

    #[test]
    fn latency_jitter_bounds() {
        let low = CongestionTier::Low.condition();
        let lo = sim().simulate("cheap", &low, None, &mut FixedRandom(0.0)).unwrap();
        assert_eq!(lo.latency_ms, Decimal::from(400));
        let hi = sim().simulate("cheap", &low, None, &mut FixedRandom(1.0)).unwrap();
        assert!(hi.latency_ms <= Decimal::from(600));
        assert!(hi.latency_ms > Decimal::from(599));
    }

    proptest! {
        #[test]
        fn effective_rate_is_a_percentage(tier in 0usize..4, idx in 0usize..4) {
            let s = sim();
            let id = s.catalog().ids()[idx];
            let cond = CongestionTier::ALL[tier].condition();
            let r = s.effective_success_rate(id, &cond).unwrap();
            prop_assert!(r >= Decimal::ZERO && r <= Decimal::ONE_HUNDRED);
        }

        #[test]
        fn same_seed_same_outcome(seed in any::<u64>(), tier in 0usize..4, idx in 0usize..4) {
            let s = sim();
            let id = s.catalog().ids()[idx];
            let cond = CongestionTier::ALL[tier].condition();
            let a = s.simulate(id, &cond, None, &mut SeededRandom::new(seed)).unwrap();
            let b = s.simulate(id, &cond, None, &mut SeededRandom::new(seed)).unwrap();
            prop_assert_eq!(a.clone(), b);
            prop_assert!(a.cost >= Decimal::ZERO);
            prop_assert!(a.latency_ms >= Decimal::ZERO);
            prop_assert_eq!(a.success, a.signature.is_some());
        }
    }
}
