#![deny(warnings)]

//! Outcome simulation and scoring for Gateway Gauntlet.
//!
//! - [`OutcomeSimulator`] turns a strategy choice under a network condition
//!   into an [`Outcome`](gauntlet_core::Outcome), optionally using a real
//!   relay verdict.
//! - [`ScoreEngine`] turns outcomes into score deltas and level progression.

pub mod score;
pub mod simulator;

pub use score::{ScoreBreakdown, ScoreEngine, ScoreUpdate};
pub use simulator::{profile, OutcomeSimulator, StrategyProfile, FAILED_MESSAGE};

use gauntlet_core::CoreError;
use thiserror::Error;

/// Errors produced by the simulator and score engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// Strategy id is not in the catalog.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    /// Outcome carries a negative cost or latency.
    #[error("outcome has negative cost or latency")]
    InvalidOutcome,
    /// Numeric conversion between float and decimal failed.
    #[error("non-finite numeric conversion")]
    NonFinite,
}

impl From<CoreError> for SimError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownStrategy(id) => SimError::UnknownStrategy(id),
            CoreError::Validation(_) => SimError::InvalidOutcome,
        }
    }
}
