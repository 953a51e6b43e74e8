//! Structured monetary value with locale-rendered display string.
//!
//! Wire representation is always the three-field object
//! `{"amount": "...", "currency": "...", "formatted": "..."}`. The amount is
//! a decimal serialized as a string to preserve precision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Minor-unit precision used when a currency has no registered entry.
pub const DEFAULT_CURRENCY_PRECISION: u32 = 2;

/// A monetary amount tied to a currency, carrying its display rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount as string (preserves precision).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Locale-rendered display string (e.g., "$19.99").
    pub formatted: String,
}

impl Money {
    /// Create a new money value. The amount is rounded to the currency's
    /// minor-unit precision.
    #[must_use]
    pub fn new(amount: Decimal, currency: impl Into<String>, formatted: impl Into<String>) -> Self {
        let currency = currency.into();
        let precision = minor_units(&currency);
        let mut amount = amount.round_dp(precision);
        // Pad to the full minor-unit scale so "13.2" renders as "13.20".
        amount.rescale(precision);
        Self {
            amount,
            currency,
            formatted: formatted.into(),
        }
    }
}

/// Minor-unit precision for an ISO 4217 currency code.
///
/// Falls back to [`DEFAULT_CURRENCY_PRECISION`] for codes without a
/// registered precision.
#[must_use]
pub fn minor_units(currency: &str) -> u32 {
    match currency {
        // Zero-decimal currencies
        "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF" | "UGX"
        | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
        // Three-decimal currencies
        "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
        _ => DEFAULT_CURRENCY_PRECISION,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_new_rounds_to_minor_units() {
        let money = Money::new(dec("19.999"), "USD", "$20.00");
        assert_eq!(money.amount, dec("20.00"));
    }

    #[test]
    fn test_new_zero_decimal_currency() {
        let money = Money::new(dec("1999.4"), "JPY", "¥1,999");
        assert_eq!(money.amount, dec("1999"));
    }

    #[test]
    fn test_minor_units_default() {
        assert_eq!(minor_units("USD"), 2);
        assert_eq!(minor_units("EUR"), 2);
        assert_eq!(minor_units("XYZ"), DEFAULT_CURRENCY_PRECISION);
    }

    #[test]
    fn test_minor_units_registered() {
        assert_eq!(minor_units("JPY"), 0);
        assert_eq!(minor_units("KWD"), 3);
    }

    #[test]
    fn test_serde_shape() {
        let money = Money::new(dec("5.00"), "USD", "$5.00");
        let json = serde_json::to_value(&money).unwrap();
        assert_eq!(json["amount"], "5.00");
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["formatted"], "$5.00");
    }
}
