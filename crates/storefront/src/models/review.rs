//! Review models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gamevault_core::review::{RatingSummary, VoteAction};
use gamevault_core::{GameId, OrderId, Page, ReviewId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub game_id: GameId,
    /// Completed order that qualified the author to review.
    pub order_id: Option<OrderId>,
    pub rating: i16,
    pub comment: Option<String>,
    /// Cached count of helpful votes.
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Validated review input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub user_id: UserId,
    pub game_id: GameId,
    pub order_id: Option<OrderId>,
    pub rating: i16,
    pub comment: Option<String>,
}

/// A page of reviews with the game's rating summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPage {
    pub reviews: Page<Review>,
    pub rating: RatingSummary,
}

/// Result of a helpful vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub review_id: ReviewId,
    pub action: VoteAction,
    /// The caller's vote afterwards; `None` once withdrawn.
    pub is_helpful: Option<bool>,
    pub helpful_count: i32,
}

/// Cached versus ledger-derived helpful counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpfulRecount {
    pub review_id: ReviewId,
    /// Value found in the cache before the recount.
    pub cached: i32,
    /// Value derived from the vote ledger (now stored).
    pub derived: i32,
}

impl HelpfulRecount {
    #[must_use]
    pub const fn corrected(&self) -> bool {
        self.cached != self.derived
    }
}
