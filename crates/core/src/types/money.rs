//! Decimal money helpers.
//!
//! Amounts are stored as [`Decimal`] in the currency's standard unit
//! (dollars, not cents). Payment providers that want minor units get them
//! through [`to_minor_units`].

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Upper-case ISO code (`"USD"`), as PayPal expects it.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }

    /// Lower-case ISO code (`"usd"`), as Stripe expects it.
    #[must_use]
    pub const fn lower_code(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

/// Convert an amount into integer minor units (cents).
///
/// # Errors
///
/// Returns `DomainError::Validation` if the amount is negative, has more than
/// two decimal places, or does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, DomainError> {
    if amount.is_sign_negative() {
        return Err(DomainError::Validation(format!(
            "amount cannot be negative: {amount}"
        )));
    }

    let cents = amount * Decimal::ONE_HUNDRED;
    if cents.fract() != Decimal::ZERO {
        return Err(DomainError::Validation(format!(
            "amount has sub-cent precision: {amount}"
        )));
    }

    cents
        .to_i64()
        .ok_or_else(|| DomainError::Validation(format!("amount out of range: {amount}")))
}

/// Format an amount with exactly two decimal places (`"10.00"`).
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(dec!(10.00)), Ok(1000));
        assert_eq!(to_minor_units(dec!(59.99)), Ok(5999));
        assert_eq!(to_minor_units(dec!(0)), Ok(0));
    }

    #[test]
    fn test_to_minor_units_rejects_fractional_cents() {
        assert!(to_minor_units(dec!(1.005)).is_err());
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert!(to_minor_units(dec!(-1.00)).is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(10)), "10.00");
        assert_eq!(format_amount(dec!(4.5)), "4.50");
    }

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("eur".parse::<CurrencyCode>(), Ok(CurrencyCode::EUR));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
