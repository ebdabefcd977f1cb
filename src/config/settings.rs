//! Configuration validation helpers and defaults

use crate::{EngineError, Result};
use rust_decimal::Decimal;

/// Validate that a value is a fraction in `[0, 1)`
pub fn validate_fraction(value: Decimal, name: &str) -> Result<()> {
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(EngineError::Config(format!(
            "{} must be a fraction in [0, 1), got {}",
            name, value
        ))
        .into());
    }
    Ok(())
}

/// Validate that a value is strictly positive
pub fn validate_positive(value: Decimal, name: &str) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(EngineError::Config(format!("{} must be positive, got {}", name, value)).into());
    }
    Ok(())
}

/// Built-in numeric defaults
pub mod defaults {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Default minimum net profit threshold, percent
    pub const MIN_PROFIT_THRESHOLD: Decimal = dec!(0.5);

    /// Default single-hop pruning floor, percent
    pub const LOSS_FLOOR: Decimal = dec!(-5);

    /// Default per-scan budget of evaluated complete routes
    pub const ROUTE_BUDGET: u64 = 200;

    /// Default estimated gas cost per hop, base-asset units
    pub const GAS_PER_HOP: Decimal = dec!(0.0005);

    /// Default implied-slippage ceiling for position sizing
    pub const SLIPPAGE_CEILING: Decimal = dec!(0.05);

    /// Default minimum-output safety margin
    pub const SAFETY_MARGIN: Decimal = dec!(0.02);

    /// Default inter-hop slippage buffer
    pub const INTER_HOP_SLIPPAGE_BUFFER: Decimal = dec!(0.005);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fraction_validation() {
        assert!(validate_fraction(dec!(0), "x").is_ok());
        assert!(validate_fraction(dec!(0.5), "x").is_ok());
        assert!(validate_fraction(dec!(0.999), "x").is_ok());
        assert!(validate_fraction(dec!(1), "x").is_err());
        assert!(validate_fraction(dec!(-0.1), "x").is_err());
    }

    #[test]
    fn test_positive_validation() {
        assert!(validate_positive(dec!(0.0001), "x").is_ok());
        assert!(validate_positive(dec!(0), "x").is_err());
        assert!(validate_positive(dec!(-1), "x").is_err());
    }
}
