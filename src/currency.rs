// Currency Successor - unit-suffix normalization for monetary figures
//
// A raw amount from a workbook carries a successor tag (no suffix, thousands,
// millions). Everything that stores or aggregates money goes through this one
// multiplier table so ingestion and reporting cannot drift apart.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencySuccessor {
    /// No suffix, amount is already in base units
    Unit,

    /// "K" - thousands
    Thousands,

    /// "M" - millions
    Millions,
}

impl CurrencySuccessor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencySuccessor::Unit => "",
            CurrencySuccessor::Thousands => "K",
            CurrencySuccessor::Millions => "M",
        }
    }

    /// Stable token used where the successor participates in a natural key;
    /// unlike `as_str`, the no-suffix case is non-empty.
    pub fn token(&self) -> &'static str {
        match self {
            CurrencySuccessor::Unit => "UNIT",
            CurrencySuccessor::Thousands => "K",
            CurrencySuccessor::Millions => "M",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            CurrencySuccessor::Unit => 1.0,
            CurrencySuccessor::Thousands => 1_000.0,
            CurrencySuccessor::Millions => 1_000_000.0,
        }
    }

    /// Parse a workbook suffix tag. Unrecognized tags fall back to base
    /// units, matching how the upload sheets treat a blank suffix cell.
    pub fn parse(tag: &str) -> CurrencySuccessor {
        match tag.trim().to_ascii_lowercase().as_str() {
            "k" | "thousand" | "thousands" => CurrencySuccessor::Thousands,
            "m" | "million" | "millions" => CurrencySuccessor::Millions,
            _ => CurrencySuccessor::Unit,
        }
    }
}

/// Scale a raw workbook amount into base units.
///
/// Applied exactly once, at the moment a financial record is first created;
/// stored and aggregated amounts are always already normalized.
pub fn normalize_amount(raw: f64, successor: CurrencySuccessor) -> f64 {
    raw * successor.multiplier()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipliers() {
        assert_eq!(normalize_amount(5.0, CurrencySuccessor::Unit), 5.0);
        assert_eq!(normalize_amount(5.0, CurrencySuccessor::Thousands), 5_000.0);
        assert_eq!(normalize_amount(5.0, CurrencySuccessor::Millions), 5_000_000.0);
    }

    #[test]
    fn test_parse_suffix_tags() {
        assert_eq!(CurrencySuccessor::parse("M"), CurrencySuccessor::Millions);
        assert_eq!(CurrencySuccessor::parse("m"), CurrencySuccessor::Millions);
        assert_eq!(CurrencySuccessor::parse("millions"), CurrencySuccessor::Millions);
        assert_eq!(CurrencySuccessor::parse("K"), CurrencySuccessor::Thousands);
        assert_eq!(CurrencySuccessor::parse("thousand"), CurrencySuccessor::Thousands);
        assert_eq!(CurrencySuccessor::parse(""), CurrencySuccessor::Unit);
    }

    #[test]
    fn test_unknown_tag_falls_back_to_unit() {
        assert_eq!(CurrencySuccessor::parse("B"), CurrencySuccessor::Unit);
        assert_eq!(normalize_amount(7.0, CurrencySuccessor::parse("B")), 7.0);
    }
}
