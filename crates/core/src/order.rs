//! Order planning and lifecycle rules.
//!
//! [`OrderDraft::plan`] is the validation half of the order factory: given the
//! cart lines and the stock read under lock, it either rejects the whole cart
//! or produces the exact items, total, and stock decrements to write. Storage
//! backends run it inside their transaction and apply the draft verbatim.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{ensure_stock, line_total};
use crate::{DomainError, GameId, OrderStatus, PaymentMethod};

/// A cart line joined with the current stock of its game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub game_id: GameId,
    pub game_name: String,
    pub quantity: i32,
    /// Price captured when the line was added to the cart.
    pub price: Decimal,
    /// Stock observed while holding the game row lock.
    pub stock: i32,
}

/// An order item about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftItem {
    pub game_id: GameId,
    pub game_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// Validated order contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub total: Decimal,
    pub items: Vec<DraftItem>,
}

impl OrderDraft {
    /// Validate every line against its stock and compute the total.
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation` if there are no lines.
    /// - `DomainError::InsufficientStock` for the first line whose game
    ///   cannot cover the requested quantity.
    pub fn plan(lines: &[CheckoutLine]) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::Validation("cart is empty".to_owned()));
        }

        for line in lines {
            ensure_stock(&line.game_name, line.stock, line.quantity)?;
        }

        let items: Vec<DraftItem> = lines
            .iter()
            .map(|line| DraftItem {
                game_id: line.game_id,
                game_name: line.game_name.clone(),
                quantity: line.quantity,
                price: line.price,
            })
            .collect();

        Ok(Self {
            total: total_of(items.iter().map(|item| (item.price, item.quantity))),
            items,
        })
    }
}

/// `Σ(price × quantity)`.
#[must_use]
pub fn total_of<I>(items: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    items
        .into_iter()
        .map(|(price, quantity)| line_total(price, quantity))
        .sum()
}

/// Result of checking a payment confirmation against the stored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Mark the order completed with the incoming payment id.
    Apply,
    /// The same payment already completed this order; change nothing.
    AlreadyConfirmed,
}

impl OrderStatus {
    /// Whether the order still accepts a payment.
    #[must_use]
    pub const fn is_awaiting_payment(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the order is pending.
    pub fn ensure_cancellable(self) -> Result<(), DomainError> {
        if self == Self::Pending {
            Ok(())
        } else {
            Err(DomainError::InvalidState(format!(
                "only pending orders can be cancelled (order is {self})"
            )))
        }
    }

    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the order is completed or cancelled.
    pub fn ensure_awaiting_payment(self) -> Result<(), DomainError> {
        if self.is_awaiting_payment() {
            Ok(())
        } else {
            Err(DomainError::InvalidState(format!(
                "order is {self} and no longer accepts payment"
            )))
        }
    }

    /// Move a pending order to processing.
    ///
    /// Returns `false` when the order is already processing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` for completed or cancelled orders.
    pub fn begin_processing(self) -> Result<bool, DomainError> {
        self.ensure_awaiting_payment()?;
        Ok(self == Self::Pending)
    }
}

/// Decide how to treat a provider confirmation for an order.
///
/// # Errors
///
/// Returns `DomainError::InvalidState` if the order was cancelled, or was
/// completed by a different payment.
pub fn confirm_payment(
    status: OrderStatus,
    current_payment_id: Option<&str>,
    incoming_payment_id: &str,
) -> Result<Confirmation, DomainError> {
    match status {
        OrderStatus::Pending | OrderStatus::Processing => Ok(Confirmation::Apply),
        OrderStatus::Completed if current_payment_id == Some(incoming_payment_id) => {
            Ok(Confirmation::AlreadyConfirmed)
        }
        OrderStatus::Completed => Err(DomainError::InvalidState(
            "order was already paid with a different payment".to_owned(),
        )),
        OrderStatus::Cancelled => Err(DomainError::InvalidState(
            "cannot confirm payment for a cancelled order".to_owned(),
        )),
    }
}

/// # Errors
///
/// Returns `DomainError::Validation` if the order was placed with a
/// different payment method than the adapter handling it.
pub fn ensure_payment_method(
    expected: PaymentMethod,
    actual: PaymentMethod,
) -> Result<(), DomainError> {
    if expected == actual {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "order uses {actual}, not {expected}"
        )))
    }
}

/// Sort order for order listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderSort {
    #[default]
    Newest,
    Oldest,
    TotalAsc,
    TotalDesc,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn line(id: i64, name: &str, quantity: i32, price: Decimal, stock: i32) -> CheckoutLine {
        CheckoutLine {
            game_id: GameId::new(id),
            game_name: name.to_owned(),
            quantity,
            price,
            stock,
        }
    }

    #[test]
    fn test_plan_computes_total_from_captured_prices() {
        let draft = OrderDraft::plan(&[
            line(1, "Celeste", 2, dec!(19.99), 5),
            line(2, "Hades", 1, dec!(24.99), 1),
        ])
        .unwrap();

        assert_eq!(draft.total, dec!(64.97));
        assert_eq!(draft.items.len(), 2);
        assert_eq!(
            draft.total,
            total_of(draft.items.iter().map(|i| (i.price, i.quantity)))
        );
    }

    #[test]
    fn test_plan_rejects_whole_cart_on_any_shortfall() {
        let result = OrderDraft::plan(&[
            line(1, "Celeste", 1, dec!(19.99), 5),
            line(2, "Hades", 2, dec!(24.99), 1),
        ]);
        assert_eq!(result, Err(DomainError::insufficient_stock("Hades")));
    }

    #[test]
    fn test_plan_rejects_empty_cart() {
        assert!(matches!(
            OrderDraft::plan(&[]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_only_pending_orders_cancel() {
        assert!(OrderStatus::Pending.ensure_cancellable().is_ok());
        for status in [
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert!(matches!(
                status.ensure_cancellable(),
                Err(DomainError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn test_confirm_payment_is_idempotent_for_same_id() {
        assert_eq!(
            confirm_payment(OrderStatus::Pending, None, "pi_1"),
            Ok(Confirmation::Apply)
        );
        assert_eq!(
            confirm_payment(OrderStatus::Completed, Some("pi_1"), "pi_1"),
            Ok(Confirmation::AlreadyConfirmed)
        );
        assert!(confirm_payment(OrderStatus::Completed, Some("pi_1"), "pi_2").is_err());
        assert!(confirm_payment(OrderStatus::Cancelled, Some("pi_1"), "pi_1").is_err());
    }

    #[test]
    fn test_begin_processing() {
        assert_eq!(OrderStatus::Pending.begin_processing(), Ok(true));
        assert_eq!(OrderStatus::Processing.begin_processing(), Ok(false));
        assert!(OrderStatus::Completed.begin_processing().is_err());
    }

    #[test]
    fn test_payment_method_mismatch() {
        assert!(ensure_payment_method(PaymentMethod::Stripe, PaymentMethod::Stripe).is_ok());
        assert!(ensure_payment_method(PaymentMethod::Stripe, PaymentMethod::Paypal).is_err());
    }
}
