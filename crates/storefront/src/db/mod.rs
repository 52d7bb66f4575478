//! Persistence for the storefront.
//!
//! # Database: `gamevault`
//!
//! ## Tables (schema `storefront`)
//!
//! - `game` - Catalog games (checkout reads prices and owns `stock`)
//! - `cart_item` - Pending cart lines, one per `(user_id, game_id)`
//! - `order` - Orders with payment and tracking state
//! - `order_item` - Immutable order lines
//! - `review` - Game reviews with a cached `helpful_count`
//! - `review_vote` - Helpful-vote ledger, one per `(user_id, review_id)`
//!
//! # Units of work
//!
//! Every [`Store`] method that mutates more than one row is a single
//! transaction: it either applies completely or not at all. Business rules
//! come from `gamevault_core` and run inside that transaction.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p gamevault-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use gamevault_core::review::RatingSummary;
use gamevault_core::shipping::TrackingUpdate;
use gamevault_core::{
    CartItemId, DomainError, GameId, OrderId, Page, PageRequest, ReviewId, UserId,
};

use crate::models::{
    CartItem, CartLine, Game, HelpfulRecount, NewOrder, NewReview, Order, OrderDetail, OrderQuery,
    PaymentOutcome, Review, VoteOutcome,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate key).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A business rule rejected the unit of work; it was rolled back.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Storage seam for every storefront operation.
///
/// Ownership checks that decide *visibility* (show, list) live in the
/// services; checks that guard a *mutation* (cancel, vote) run here, under
/// the same lock as the write.
#[async_trait]
pub trait Store: Send + Sync {
    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn game(&self, id: GameId) -> Result<Option<Game>, RepositoryError>;

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    /// The user's cart lines, oldest first.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Add `quantity` units, merging with an existing line for the game.
    ///
    /// Fails with `InsufficientStock` when stock cannot cover the cumulative
    /// quantity, and `NotFound` for unknown games.
    async fn add_cart_item(
        &self,
        user_id: UserId,
        game_id: GameId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;

    /// Set a line's absolute quantity, re-checking stock.
    async fn set_cart_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;

    async fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError>;

    /// Delete every line; returns how many were removed.
    async fn clear_cart(&self, user_id: UserId) -> Result<u64, RepositoryError>;

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Convert the user's cart into a pending order.
    ///
    /// Locks the games, validates stock for every line, writes the order and
    /// its items, decrements stock, and deletes the cart lines it read, all
    /// in one transaction. Any failure leaves stock and cart untouched.
    async fn place_order(
        &self,
        user_id: UserId,
        order: &NewOrder,
    ) -> Result<OrderDetail, RepositoryError>;

    async fn order(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError>;

    async fn list_orders(&self, query: &OrderQuery) -> Result<Page<Order>, RepositoryError>;

    /// Cancel the user's pending order and restock its items atomically.
    async fn cancel_order(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<OrderDetail, RepositoryError>;

    /// Record the provider reference on an order still awaiting payment.
    async fn attach_payment(&self, id: OrderId, payment_id: &str)
    -> Result<Order, RepositoryError>;

    /// Mark a pending order as processing under the given payment.
    async fn mark_processing(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<Order, RepositoryError>;

    /// Complete the order idempotently. Never touches stock.
    async fn complete_payment(
        &self,
        id: OrderId,
        payment_id: &str,
    ) -> Result<PaymentOutcome, RepositoryError>;

    async fn update_tracking(
        &self,
        id: OrderId,
        update: &TrackingUpdate,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError>;

    // -------------------------------------------------------------------------
    // Reviews
    // -------------------------------------------------------------------------

    /// Reviews ordered by `helpful_count DESC, created_at DESC`.
    async fn reviews_for_game(
        &self,
        game_id: GameId,
        page: PageRequest,
    ) -> Result<Page<Review>, RepositoryError>;

    async fn rating_summary(&self, game_id: GameId) -> Result<RatingSummary, RepositoryError>;

    async fn review(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError>;

    /// Oldest completed order of the user that contains the game.
    async fn purchased_order(
        &self,
        user_id: UserId,
        game_id: GameId,
    ) -> Result<Option<OrderId>, RepositoryError>;

    async fn has_reviewed(&self, user_id: UserId, game_id: GameId)
    -> Result<bool, RepositoryError>;

    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError>;

    /// Create, withdraw, or flip the voter's vote and move the cached count.
    async fn apply_vote(
        &self,
        voter: UserId,
        review_id: ReviewId,
        is_helpful: bool,
    ) -> Result<VoteOutcome, RepositoryError>;

    /// Re-derive `helpful_count` from the vote ledger and store it.
    async fn recount_helpful(&self, review_id: ReviewId)
    -> Result<HelpfulRecount, RepositoryError>;
}
