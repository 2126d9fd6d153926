//! Numeric stages run on every extracted table: volume derivation,
//! proportional distribution and aggregation, plus the run-wide FOB summary.
//!
//! All arithmetic is done on [`Decimal`] with the precision passed in by the
//! caller and half-away-from-zero rounding.
pub mod aggregation;
pub mod cbm;
pub mod compounding;
pub mod distribution;

pub use aggregation::aggregate_custom_by_po_item;
pub use aggregation::aggregate_sqft_by_po_item_price;
pub use aggregation::Aggregation;
pub use aggregation::AggregationMode;
pub use cbm::process_cbm_column;
pub use compounding::perform_fob_compounding;
pub use compounding::FobSummary;
pub use distribution::distribute_values;

use crate::record::LengthMismatch;
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use thiserror::Error;

/// A failure confined to one table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("Basis column '{0}' not found")]
    MissingBasisColumn(String),

    #[error("Group starting at row {row} has no positive '{basis}' to distribute '{column}' over")]
    ZeroBasis { row: usize, column: String, basis: String },

    #[error("Distributing '{column}' overflows at row {row}")]
    Overflow { row: usize, column: String },

    #[error(transparent)]
    LengthMismatch(#[from] LengthMismatch),
}

pub(crate) fn round(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round(Decimal::from_str("2.00005").unwrap(), 4), Decimal::from_str("2.0001").unwrap());
        assert_eq!(round(Decimal::from_str("-2.00005").unwrap(), 4), Decimal::from_str("-2.0001").unwrap());
        assert_eq!(round(Decimal::from_str("0.125").unwrap(), 2), Decimal::from_str("0.13").unwrap());
    }
}
