//! Catalog game, as seen by checkout.
//!
//! The catalog is managed elsewhere; checkout only reads price data and
//! mutates `stock`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gamevault_core::GameId;
use gamevault_core::cart::capture_price;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    /// Sellable units; never negative.
    pub stock: i32,
}

impl Game {
    /// Price a new cart line would capture right now.
    #[must_use]
    pub fn current_price(&self) -> Decimal {
        capture_price(self.price, self.sale_price)
    }
}
