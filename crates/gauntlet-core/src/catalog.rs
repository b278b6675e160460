//! Static table of transaction delivery strategies.

use crate::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User-facing risk label of a strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Delivery route requested from the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStrategy {
    Sanctum,
    Hybrid,
    Jito,
    Rpc,
}

impl RelayStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayStrategy::Sanctum => "sanctum",
            RelayStrategy::Hybrid => "hybrid",
            RelayStrategy::Jito => "jito",
            RelayStrategy::Rpc => "rpc",
        }
    }
}

/// Coarse bucket for tip and compute-unit price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeRange {
    Low,
    Medium,
    High,
}

/// Options forwarded untouched to the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayOptions {
    pub strategy: RelayStrategy,
    pub jito_tip_range: FeeRange,
    pub cu_price_range: FeeRange,
    pub skip_simulation: bool,
}

/// Concrete answer from a real relay send.
///
/// When present it decides success outright instead of a random draw.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayVerdict {
    pub success: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
}

impl RelayVerdict {
    pub fn landed(signature: impl Into<String>) -> Self {
        Self {
            success: true,
            signature: Some(signature.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            signature: None,
            error: Some(error.into()),
        }
    }
}

/// A named delivery approach with its cost and risk profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub risk: RiskTier,
    /// Fee in SOL when the transaction lands.
    pub nominal_cost: Decimal,
    pub relay_options: RelayOptions,
}

/// Read-only lookup over the four canonical strategies.
#[derive(Clone, Debug)]
pub struct StrategyCatalog {
    entries: Vec<Strategy>,
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl StrategyCatalog {
    /// The canonical entries: safe, balanced, fast, cheap.
    pub fn standard() -> Self {
        let opts = |strategy, jito_tip_range, cu_price_range| RelayOptions {
            strategy,
            jito_tip_range,
            cu_price_range,
            skip_simulation: true,
        };
        let entries = vec![
            Strategy {
                id: "safe",
                display_name: "Safe Sender",
                description: "Uses Sanctum Sender for maximum reliability",
                risk: RiskTier::Low,
                nominal_cost: Decimal::new(1, 4),
                relay_options: opts(RelayStrategy::Sanctum, FeeRange::Low, FeeRange::Medium),
            },
            Strategy {
                id: "balanced",
                display_name: "Balanced Approach",
                description: "Jito + RPC fallback for good speed and cost savings",
                risk: RiskTier::Medium,
                nominal_cost: Decimal::new(2, 4),
                relay_options: opts(RelayStrategy::Hybrid, FeeRange::Medium, FeeRange::Medium),
            },
            Strategy {
                id: "fast",
                display_name: "Speed Demon",
                description: "Jito bundles only for maximum speed",
                risk: RiskTier::High,
                nominal_cost: Decimal::new(5, 4),
                relay_options: opts(RelayStrategy::Jito, FeeRange::High, FeeRange::High),
            },
            Strategy {
                id: "cheap",
                display_name: "Cost Saver",
                description: "RPC only with multiple endpoints",
                risk: RiskTier::Medium,
                nominal_cost: Decimal::new(5, 5),
                relay_options: opts(RelayStrategy::Rpc, FeeRange::Low, FeeRange::Low),
            },
        ];
        Self { entries }
    }

    pub fn lookup(&self, id: &str) -> Result<&Strategy, CoreError> {
        self.entries
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CoreError::UnknownStrategy(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Strategy> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|s| s.id).collect()
    }
}
