//! Cart rules: price capture, quantity and stock checks, totals.
//!
//! A cart line's price is captured once when the line is created and never
//! re-derived from the catalog. Only stock is re-validated later, at checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Flat shipping fee applied to every cart.
pub const SHIPPING_FEE: Decimal = Decimal::ZERO;

/// Largest quantity accepted for a single line.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Price captured for a new cart line: the sale price when present.
#[must_use]
pub fn capture_price(price: Decimal, sale_price: Option<Decimal>) -> Decimal {
    sale_price.unwrap_or(price)
}

/// # Errors
///
/// Returns `DomainError::Validation` unless `1 <= quantity <= MAX_LINE_QUANTITY`.
pub fn ensure_quantity(quantity: i32) -> Result<(), DomainError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "quantity must be between 1 and {MAX_LINE_QUANTITY} (got {quantity})"
        )))
    }
}

/// Check that `stock` covers the total `requested` quantity.
///
/// # Errors
///
/// Returns `DomainError::InsufficientStock` naming the game otherwise.
pub fn ensure_stock(game_name: &str, stock: i32, requested: i32) -> Result<(), DomainError> {
    if stock >= requested {
        Ok(())
    } else {
        Err(DomainError::insufficient_stock(game_name))
    }
}

/// Quantity a line will hold after adding `quantity` more units.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the result exceeds the line cap.
pub fn cumulative_quantity(existing: i32, quantity: i32) -> Result<i32, DomainError> {
    let total = existing.saturating_add(quantity);
    ensure_quantity(total)?;
    Ok(total)
}

/// Totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    /// Sum of line quantities.
    pub item_count: i64,
}

impl CartSummary {
    /// Summarize `(captured price, quantity)` pairs.
    #[must_use]
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let (subtotal, item_count) = lines.into_iter().fold(
            (Decimal::ZERO, 0_i64),
            |(subtotal, count), (price, quantity)| {
                (
                    subtotal + line_total(price, quantity),
                    count + i64::from(quantity),
                )
            },
        );

        Self {
            subtotal,
            shipping: SHIPPING_FEE,
            total: subtotal + SHIPPING_FEE,
            item_count,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

/// `price × quantity`.
#[must_use]
pub fn line_total(price: Decimal, quantity: i32) -> Decimal {
    price * Decimal::from(quantity)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_capture_price_prefers_sale_price() {
        assert_eq!(capture_price(dec!(59.99), Some(dec!(39.99))), dec!(39.99));
        assert_eq!(capture_price(dec!(59.99), None), dec!(59.99));
    }

    #[test]
    fn test_ensure_quantity_bounds() {
        assert!(ensure_quantity(1).is_ok());
        assert!(ensure_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(ensure_quantity(0).is_err());
        assert!(ensure_quantity(-3).is_err());
        assert!(ensure_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_ensure_stock_names_the_game() {
        assert!(ensure_stock("Hades", 3, 3).is_ok());
        assert_eq!(
            ensure_stock("Hades", 2, 3),
            Err(DomainError::insufficient_stock("Hades"))
        );
    }

    #[test]
    fn test_cumulative_quantity() {
        assert_eq!(cumulative_quantity(2, 3), Ok(5));
        assert!(cumulative_quantity(MAX_LINE_QUANTITY, 1).is_err());
    }

    #[test]
    fn test_summary_totals() {
        let summary = CartSummary::from_lines([(dec!(10.00), 2), (dec!(4.50), 1)]);
        assert_eq!(summary.subtotal, dec!(24.50));
        assert_eq!(summary.shipping, Decimal::ZERO);
        assert_eq!(summary.total, dec!(24.50));
        assert_eq!(summary.item_count, 3);
    }

    #[test]
    fn test_empty_summary() {
        let summary = CartSummary::from_lines(std::iter::empty());
        assert!(summary.is_empty());
        assert_eq!(summary.total, Decimal::ZERO);
    }
}
