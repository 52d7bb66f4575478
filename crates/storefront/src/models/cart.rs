//! Cart models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gamevault_core::cart::{CartSummary, line_total};
use gamevault_core::{CartItemId, GameId, UserId};

/// A stored cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub game_id: GameId,
    pub quantity: i32,
    /// Captured when the line was created.
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A cart line joined with its game, for display and checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: CartItemId,
    pub game_id: GameId,
    pub game_name: String,
    pub quantity: i32,
    pub price: Decimal,
    /// Current stock of the game (advisory until checkout).
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        line_total(self.price, self.quantity)
    }
}

/// Cart contents plus totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub summary: CartSummary,
}

impl CartView {
    #[must_use]
    pub fn new(items: Vec<CartLine>) -> Self {
        let summary = CartSummary::from_lines(items.iter().map(|l| (l.price, l.quantity)));
        Self { items, summary }
    }
}
