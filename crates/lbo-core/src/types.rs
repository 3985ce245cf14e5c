use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g., 8.5x EV/EBITDA)
pub type Multiple = Decimal;

/// Days basis for working-capital ratios
pub const DAYS_IN_YEAR: Decimal = dec!(365);

/// Magnitude-scaled tolerance: max(0.01 currency units, 1e-6 × |scale|).
pub fn tolerance(scale: Money) -> Money {
    let relative = scale.abs() * dec!(0.000001);
    relative.max(dec!(0.01))
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_floor() {
        assert_eq!(tolerance(dec!(100)), dec!(0.01));
        assert_eq!(tolerance(Decimal::ZERO), dec!(0.01));
    }

    #[test]
    fn test_tolerance_scales_with_magnitude() {
        // 1e-6 of 100 million exceeds the floor
        assert_eq!(tolerance(dec!(100_000_000)), dec!(100));
        assert_eq!(tolerance(dec!(-100_000_000)), dec!(100));
    }
}
