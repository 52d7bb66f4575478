//! Cart service.

use tracing::{debug, instrument};

use gamevault_core::cart::CartSummary;
use gamevault_core::{Caller, CartItemId, GameId};

use crate::db::{RepositoryError, Store};
use crate::models::{CartItem, CartView};

/// Cart operations for the calling user.
pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The caller's lines, oldest first, with totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn list(&self, caller: &Caller) -> Result<CartView, RepositoryError> {
        let lines = self.store.cart_lines(caller.user_id).await?;
        Ok(CartView::new(lines))
    }

    /// Add units of a game. Existing lines keep their captured price.
    ///
    /// # Errors
    ///
    /// - `Validation` for quantities outside 1-99.
    /// - `NotFound` for unknown games.
    /// - `InsufficientStock` when stock cannot cover the line's new quantity.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn add(
        &self,
        caller: &Caller,
        game_id: GameId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let item = self
            .store
            .add_cart_item(caller.user_id, game_id, quantity)
            .await?;
        debug!(item_id = %item.id, quantity = item.quantity, "Cart line saved");
        Ok(item)
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// - `Validation` for quantities outside 1-99.
    /// - `NotFound` unless the line belongs to the caller.
    /// - `InsufficientStock` when stock cannot cover the quantity.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn update(
        &self,
        caller: &Caller,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        self.store
            .set_cart_quantity(caller.user_id, item_id, quantity)
            .await
    }

    /// # Errors
    ///
    /// Returns `NotFound` unless the line belongs to the caller.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn remove(&self, caller: &Caller, item_id: CartItemId) -> Result<(), RepositoryError> {
        self.store.remove_cart_item(caller.user_id, item_id).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn clear(&self, caller: &Caller) -> Result<u64, RepositoryError> {
        self.store.clear_cart(caller.user_id).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn summary(&self, caller: &Caller) -> Result<CartSummary, RepositoryError> {
        Ok(self.list(caller).await?.summary)
    }
}
