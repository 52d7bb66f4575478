//! `PostgreSQL` backend.
//!
//! Each table group has a repository over the shared pool; [`PgStore`]
//! wires them to the [`Store`] trait. Queries are built at runtime with
//! `sqlx::query_as` so the crate compiles without a live database.

mod cart;
mod games;
mod orders;
mod reviews;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use gamevault_core::review::RatingSummary;
use gamevault_core::shipping::TrackingUpdate;
use gamevault_core::{CartItemId, GameId, OrderId, Page, PageRequest, ReviewId, UserId};

pub use cart::CartRepository;
pub use games::GameRepository;
pub use orders::OrderRepository;
pub use reviews::ReviewRepository;

use super::{RepositoryError, Store};
use crate::models::{
    CartItem, CartLine, Game, HelpfulRecount, NewOrder, NewReview, Order, OrderDetail, OrderQuery,
    PaymentOutcome, Review, VoteOutcome,
};

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    const fn games(&self) -> GameRepository<'_> {
        GameRepository::new(&self.pool)
    }

    const fn carts(&self) -> CartRepository<'_> {
        CartRepository::new(&self.pool)
    }

    const fn orders(&self) -> OrderRepository<'_> {
        OrderRepository::new(&self.pool)
    }

    const fn reviews(&self) -> ReviewRepository<'_> {
        ReviewRepository::new(&self.pool)
    }
}

/// Map a unique violation to `Conflict`, passing other errors through.
pub(crate) fn unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn game(&self, id: GameId) -> Result<Option<Game>, RepositoryError> {
        self.games().get_by_id(id).await
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        self.carts().lines(user_id).await
    }

    async fn add_cart_item(
        &self,
        user_id: UserId,
        game_id: GameId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        self.carts().add(user_id, game_id, quantity).await
    }

    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        self.carts().set_quantity(user_id, item_id, quantity).await
    }

    async fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        self.carts().remove(user_id, item_id).await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        self.carts().clear(user_id).await
    }

    async fn place_order(
        &self,
        user_id: UserId,
        order: &NewOrder,
    ) -> Result<OrderDetail, RepositoryError> {
        self.orders().place(user_id, order).await
    }

    async fn order(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        self.orders().get_detail(id).await
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError> {
        self.orders().list(query).await
    }

    async fn cancel_order(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<OrderDetail, RepositoryError> {
        self.orders().cancel(user_id, id).await
    }

    async fn attach_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Order, RepositoryError> {
        self.orders().attach_payment(id, payment_id).await
    }

    async fn mark_processing(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Order, RepositoryError> {
        self.orders().mark_processing(id, payment_id).await
    }

    async fn complete_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<PaymentOutcome, RepositoryError> {
        self.orders().complete_payment(id, payment_id).await
    }

    async fn update_tracking(
        &self,
        id: OrderId,
        update: &TrackingUpdate,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        self.orders().update_tracking(id, update, now).await
    }

    async fn reviews_for_game(
        &self,
        game_id: GameId,
        page: PageRequest,
    ) -> Result<Page<Review>, RepositoryError> {
        self.reviews().for_game(game_id, page).await
    }

    async fn rating_summary(&self, game_id: GameId) -> Result<RatingSummary, RepositoryError> {
        self.reviews().rating_summary(game_id).await
    }

    async fn review(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        self.reviews().get_by_id(id).await
    }

    async fn purchased_order(
        &self,
        user_id: UserId,
        game_id: GameId,
    ) -> Result<Option<OrderId>, RepositoryError> {
        self.orders().purchased_order(user_id, game_id).await
    }

    async fn has_reviewed(
        &self,
        user_id: UserId,
        game_id: GameId,
    ) -> Result<bool, RepositoryError> {
        self.reviews().exists_for(user_id, game_id).await
    }

    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        self.reviews().create(review).await
    }

    async fn apply_vote(
        &self,
        voter: UserId,
        review_id: ReviewId,
        is_helpful: bool,
    ) -> Result<VoteOutcome, RepositoryError> {
        self.reviews().apply_vote(voter, review_id, is_helpful).await
    }

    async fn recount_helpful(
        &self,
        review_id: ReviewId,
    ) -> Result<HelpfulRecount, RepositoryError> {
        self.reviews().recount_helpful(review_id).await
    }
}
