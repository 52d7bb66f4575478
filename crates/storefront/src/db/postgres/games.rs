//! Game lookups.

use sqlx::PgPool;

use gamevault_core::GameId;

use crate::db::RepositoryError;
use crate::models::Game;

/// Repository for catalog reads.
pub struct GameRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GameRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a game by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: GameId) -> Result<Option<Game>, RepositoryError> {
        let game = sqlx::query_as::<_, Game>(
            r"
            SELECT id, name, price, sale_price, stock
            FROM storefront.game
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(game)
    }
}
