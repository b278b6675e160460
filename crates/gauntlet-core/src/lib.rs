#![deny(warnings)]

//! Core domain model for Gateway Gauntlet.
//!
//! This crate defines the network condition model, the strategy catalog, the
//! outcome and progression types, configuration, and the injectable random
//! source shared by every other crate.

pub mod catalog;
pub mod config;
pub mod network;
pub mod random;
pub mod state;

pub use catalog::{
    FeeRange, RelayOptions, RelayStrategy, RelayVerdict, RiskTier, Strategy, StrategyCatalog,
};
pub use config::{GameConfig, ScoringRules};
pub use network::{CongestionTier, NetworkCondition, NetworkConditionModel};
pub use random::{FixedRandom, RandomSource, SeededRandom};
pub use state::{
    level_for_score, short_signature, DashboardStats, GameState, Outcome, TransactionHistory,
    DEFAULT_HISTORY_CAPACITY, POINTS_PER_LEVEL,
};

use thiserror::Error;

/// Errors raised by core lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Strategy id is not one of the catalog entries.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Validation errors for state and configuration invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("successes ({successes}) exceed attempts ({attempts})")]
    SuccessesExceedAttempts { successes: u64, attempts: u64 },
    #[error("score must not be negative")]
    NegativeScore,
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    #[error("history capacity {0} is out of range [1, 100]")]
    HistoryCapacity(usize),
    #[error("invalid rule: {0}")]
    InvalidRule(&'static str),
}
