//! Candidate arbitrage routes

use crate::{
    venue::{Asset, FeeTier},
    EngineError, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Confidence band assigned at discovery time from profit headroom
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RouteConfidence {
    /// Barely above the discovery threshold
    Low,
    /// At least 1.5x the discovery threshold
    Medium,
    /// At least 2x the discovery threshold
    High,
}

impl fmt::Display for RouteConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteConfidence::Low => write!(f, "low"),
            RouteConfidence::Medium => write!(f, "medium"),
            RouteConfidence::High => write!(f, "high"),
        }
    }
}

impl RouteConfidence {
    /// Band a net profit percentage against the discovery threshold
    pub fn from_profit(net_profit_percent: Decimal, threshold: Decimal) -> Self {
        if net_profit_percent >= threshold * dec!(2) {
            RouteConfidence::High
        } else if net_profit_percent >= threshold * dec!(1.5) {
            RouteConfidence::Medium
        } else {
            RouteConfidence::Low
        }
    }
}

/// A discovered cyclic trade route. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Ordered asset sequence; first and last are the base asset
    pub path: Vec<Asset>,
    /// Human-readable symbols parallel to `path`
    pub symbols: Vec<String>,
    /// Fee tier per hop; one entry per consecutive pair in `path`
    pub fee_tiers: Vec<FeeTier>,
    /// Base-asset amount the route was sized for
    pub input_amount: Decimal,
    /// Quoted base-asset amount returned by the final hop
    pub expected_output: Decimal,
    /// Expected output minus input
    pub gross_profit: Decimal,
    /// Gross profit as a percentage of the input
    pub gross_profit_percent: Decimal,
    /// Gross profit minus estimated gas
    pub net_profit: Decimal,
    /// Net profit as a percentage of the input
    pub net_profit_percent: Decimal,
    /// Estimated gas cost across all hops, in base-asset units
    pub estimated_gas: Decimal,
    /// Discovery-time confidence band
    pub confidence: RouteConfidence,
    /// When the route was discovered
    pub discovered_at: DateTime<Utc>,
}

impl Route {
    /// Build a route from a quoted path, deriving profit fields and the
    /// confidence band. Validates the path shape.
    pub fn new(
        path: Vec<Asset>,
        fee_tiers: Vec<FeeTier>,
        input_amount: Decimal,
        expected_output: Decimal,
        estimated_gas: Decimal,
        threshold: Decimal,
    ) -> Result<Self> {
        validate_path(&path, &fee_tiers)?;
        if input_amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "Route input must be positive, got {}",
                input_amount
            ))
            .into());
        }

        let gross_profit = expected_output - input_amount;
        let gross_profit_percent = gross_profit / input_amount * dec!(100);
        let net_profit = gross_profit - estimated_gas;
        let net_profit_percent = net_profit / input_amount * dec!(100);
        let confidence = RouteConfidence::from_profit(net_profit_percent, threshold);
        let symbols = path.iter().map(|a| a.symbol.clone()).collect();

        Ok(Self {
            path,
            symbols,
            fee_tiers,
            input_amount,
            expected_output,
            gross_profit,
            gross_profit_percent,
            net_profit,
            net_profit_percent,
            estimated_gas,
            confidence,
            discovered_at: Utc::now(),
        })
    }

    /// Route identity: the symbol sequence joined with `->`
    pub fn signature(&self) -> String {
        self.symbols.join("->")
    }

    /// Number of swaps in the route
    pub fn hops(&self) -> usize {
        self.path.len() - 1
    }

    /// Every asset the route touches, by id (base included once)
    pub fn asset_ids(&self) -> HashSet<&str> {
        self.path.iter().map(|a| a.id.as_str()).collect()
    }

    /// Whether this route shares any asset with `other`
    pub fn conflicts_with(&self, other: &Route) -> bool {
        let ours = self.asset_ids();
        other.path.iter().any(|a| ours.contains(a.id.as_str()))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} hops, net {}%)",
            self.signature(),
            self.hops(),
            self.net_profit_percent.round_dp(4)
        )
    }
}

fn validate_path(path: &[Asset], fee_tiers: &[FeeTier]) -> Result<()> {
    if path.len() < 3 {
        return Err(EngineError::Validation(
            "A route needs at least two hops through one intermediate".to_string(),
        )
        .into());
    }

    let base = &path[0];
    if path.last().map(|a| &a.id) != Some(&base.id) {
        return Err(EngineError::Validation(
            "A route must end at its base asset".to_string(),
        )
        .into());
    }

    let intermediates = &path[1..path.len() - 1];
    let mut seen = HashSet::new();
    for asset in intermediates {
        if asset.id == base.id {
            return Err(EngineError::Validation(
                "The base asset cannot appear as an intermediate".to_string(),
            )
            .into());
        }
        if !seen.insert(asset.id.as_str()) {
            return Err(EngineError::Validation(format!(
                "Asset {} repeats along the route",
                asset.symbol
            ))
            .into());
        }
    }

    if fee_tiers.len() != path.len() - 1 {
        return Err(EngineError::Validation(format!(
            "Expected {} fee tiers for {} assets, got {}",
            path.len() - 1,
            path.len(),
            fee_tiers.len()
        ))
        .into());
    }

    Ok(())
}
