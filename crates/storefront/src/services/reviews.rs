//! Review service and helpful votes.

use tracing::{info, instrument, warn};

use gamevault_core::review::{ReviewEligibility, normalize_comment, validate_rating};
use gamevault_core::{Caller, GameId, PageRequest, ReviewId};

use crate::db::{RepositoryError, Store};
use crate::models::{HelpfulRecount, NewReview, Review, ReviewPage, VoteOutcome};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 50;

/// Review operations.
pub struct ReviewService<'a> {
    store: &'a dyn Store,
}

impl<'a> ReviewService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// A page of the game's reviews with its rating summary.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown games.
    pub async fn list_for_game(
        &self,
        game_id: GameId,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<ReviewPage, RepositoryError> {
        self.store
            .game(game_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let request = PageRequest::new(page, per_page, DEFAULT_PER_PAGE, MAX_PER_PAGE);
        Ok(ReviewPage {
            reviews: self.store.reviews_for_game(game_id, request).await?,
            rating: self.store.rating_summary(game_id).await?,
        })
    }

    /// # Errors
    ///
    /// Returns `NotFound` for unknown games.
    pub async fn can_review(
        &self,
        caller: &Caller,
        game_id: GameId,
    ) -> Result<ReviewEligibility, RepositoryError> {
        self.store
            .game(game_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let purchased = self.store.purchased_order(caller.user_id, game_id).await?;
        let reviewed = self.store.has_reviewed(caller.user_id, game_id).await?;
        Ok(ReviewEligibility::new(purchased.is_some(), reviewed))
    }

    /// Review a game the caller bought.
    ///
    /// # Errors
    ///
    /// - `Validation` for ratings outside 1-5 or overlong comments.
    /// - `NotFound` for unknown games.
    /// - `PermissionDenied` without a completed order containing the game.
    /// - `InvalidState` if the caller already reviewed it.
    #[instrument(skip(self, caller, comment), fields(user_id = %caller.user_id))]
    pub async fn create(
        &self,
        caller: &Caller,
        game_id: GameId,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<Review, RepositoryError> {
        validate_rating(rating)?;
        let comment = normalize_comment(comment)?;

        self.store
            .game(game_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let order_id = self.store.purchased_order(caller.user_id, game_id).await?;
        let reviewed = self.store.has_reviewed(caller.user_id, game_id).await?;
        ReviewEligibility::new(order_id.is_some(), reviewed).ensure_allowed()?;

        let review = self
            .store
            .create_review(&NewReview {
                user_id: caller.user_id,
                game_id,
                order_id,
                rating,
                comment,
            })
            .await?;

        info!(review_id = %review.id, rating, "Review created");
        Ok(review)
    }

    /// Vote a review helpful or unhelpful, toggling a repeated vote off.
    ///
    /// # Errors
    ///
    /// - `NotFound` for unknown reviews.
    /// - `PermissionDenied` when voting on one's own review.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn vote(
        &self,
        caller: &Caller,
        review_id: ReviewId,
        is_helpful: bool,
    ) -> Result<VoteOutcome, RepositoryError> {
        self.store
            .apply_vote(caller.user_id, review_id, is_helpful)
            .await
    }

    /// Re-derive a review's helpful count from its votes.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied` for non-admin callers.
    /// - `NotFound` for unknown reviews.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn recount_helpful(
        &self,
        caller: &Caller,
        review_id: ReviewId,
    ) -> Result<HelpfulRecount, RepositoryError> {
        caller.require_admin()?;

        let recount = self.store.recount_helpful(review_id).await?;
        if recount.corrected() {
            warn!(
                review_id = %review_id,
                cached = recount.cached,
                derived = recount.derived,
                "Helpful count drifted from votes; corrected"
            );
        }
        Ok(recount)
    }
}
