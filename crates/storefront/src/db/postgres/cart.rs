//! Cart repository.

use sqlx::PgPool;

use gamevault_core::cart::{cumulative_quantity, ensure_quantity, ensure_stock};
use gamevault_core::{CartItemId, GameId, UserId};

use super::unique_violation;
use crate::db::RepositoryError;
use crate::models::{CartItem, CartLine, Game};

const CART_ITEM_COLUMNS: &str = "id, user_id, game_id, quantity, price, created_at";

/// Repository for cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's lines joined with their games, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLine>(
            r"
            SELECT c.id, c.game_id, g.name AS game_name, c.quantity, c.price,
                   g.stock, c.created_at
            FROM storefront.cart_item c
            JOIN storefront.game g ON g.id = c.game_id
            WHERE c.user_id = $1
            ORDER BY c.created_at, c.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(lines)
    }

    /// Add units for a game, merging with the existing line.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` for an unknown game.
    /// - `RepositoryError::Domain` for invalid quantities or insufficient stock.
    /// - `RepositoryError::Conflict` if a concurrent add created the line first.
    pub async fn add(
        &self,
        user_id: UserId,
        game_id: GameId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        ensure_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let game = sqlx::query_as::<_, Game>(
            "SELECT id, name, price, sale_price, stock FROM storefront.game WHERE id = $1",
        )
        .bind(game_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let existing = sqlx::query_as::<_, CartItem>(&format!(
            "SELECT {CART_ITEM_COLUMNS} FROM storefront.cart_item
             WHERE user_id = $1 AND game_id = $2
             FOR UPDATE"
        ))
        .bind(user_id)
        .bind(game_id)
        .fetch_optional(&mut *tx)
        .await?;

        let item = match existing {
            Some(line) => {
                let total = cumulative_quantity(line.quantity, quantity)?;
                ensure_stock(&game.name, game.stock, total)?;

                sqlx::query_as::<_, CartItem>(&format!(
                    "UPDATE storefront.cart_item SET quantity = $2
                     WHERE id = $1
                     RETURNING {CART_ITEM_COLUMNS}"
                ))
                .bind(line.id)
                .bind(total)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                ensure_stock(&game.name, game.stock, quantity)?;

                sqlx::query_as::<_, CartItem>(&format!(
                    "INSERT INTO storefront.cart_item (user_id, game_id, quantity, price)
                     VALUES ($1, $2, $3, $4)
                     RETURNING {CART_ITEM_COLUMNS}"
                ))
                .bind(user_id)
                .bind(game_id)
                .bind(quantity)
                .bind(game.current_price())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| unique_violation(e, "cart line was modified concurrently"))?
            }
        };

        tx.commit().await?;
        Ok(item)
    }

    /// Set the absolute quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` unless the line belongs to the user.
    /// - `RepositoryError::Domain` for invalid quantities or insufficient stock.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        ensure_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let (name, stock): (String, i32) = sqlx::query_as(
            r"
            SELECT g.name, g.stock
            FROM storefront.cart_item c
            JOIN storefront.game g ON g.id = c.game_id
            WHERE c.id = $1 AND c.user_id = $2
            FOR UPDATE OF c
            ",
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        ensure_stock(&name, stock, quantity)?;

        let item = sqlx::query_as::<_, CartItem>(&format!(
            "UPDATE storefront.cart_item SET quantity = $2
             WHERE id = $1
             RETURNING {CART_ITEM_COLUMNS}"
        ))
        .bind(item_id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` unless the line belongs to the user.
    pub async fn remove(&self, user_id: UserId, item_id: CartItemId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM storefront.cart_item WHERE id = $1 AND user_id = $2")
                .bind(item_id)
                .bind(user_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
