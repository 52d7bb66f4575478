//! Review repository and the helpful-vote ledger.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use gamevault_core::review::{RatingSummary, VoteAction, VoteChange, ensure_not_author, recount};
use gamevault_core::{DomainError, GameId, Page, PageRequest, ReviewId, UserId};

use crate::db::RepositoryError;
use crate::models::{HelpfulRecount, NewReview, Review, VoteOutcome};

const REVIEW_COLUMNS: &str =
    "id, user_id, game_id, order_id, rating, comment, helpful_count, created_at";

/// Repository for reviews and votes.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A page of reviews, most helpful first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_game(
        &self,
        game_id: GameId,
        page: PageRequest,
    ) -> Result<Page<Review>, RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM storefront.review WHERE game_id = $1")
                .bind(game_id)
                .fetch_one(self.pool)
                .await?;

        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM storefront.review
             WHERE game_id = $1
             ORDER BY helpful_count DESC, created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(game_id)
        .bind(i64::from(page.per_page()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(self.pool)
        .await?;

        Ok(Page::new(
            reviews,
            u64::try_from(total).unwrap_or_default(),
            page,
        ))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rating_summary(&self, game_id: GameId) -> Result<RatingSummary, RepositoryError> {
        let (count, average): (i64, Option<Decimal>) = sqlx::query_as(
            "SELECT COUNT(*), AVG(rating)::numeric FROM storefront.review WHERE game_id = $1",
        )
        .bind(game_id)
        .fetch_one(self.pool)
        .await?;

        Ok(RatingSummary::new(count, average))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_review(&mut conn, id, false).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists_for(
        &self,
        user_id: UserId,
        game_id: GameId,
    ) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM storefront.review WHERE user_id = $1 AND game_id = $2)",
        )
        .bind(user_id)
        .bind(game_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// # Errors
    ///
    /// - `RepositoryError::Domain` with `InvalidState` if the user already
    ///   reviewed the game.
    /// - `RepositoryError::Database` for other database errors.
    pub async fn create(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let created = sqlx::query_as::<_, Review>(&format!(
            "INSERT INTO storefront.review (user_id, game_id, order_id, rating, comment)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(review.user_id)
        .bind(review.game_id)
        .bind(review.order_id)
        .bind(review.rating)
        .bind(review.comment.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Domain(DomainError::InvalidState(
                    "you have already reviewed this game".to_owned(),
                ));
            }
            RepositoryError::Database(e)
        })?;

        Ok(created)
    }

    /// Apply one vote request and move the cached count, with the review
    /// row locked.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the review does not exist.
    /// - `RepositoryError::Domain` with `PermissionDenied` for the author's
    ///   own review.
    pub async fn apply_vote(
        &self,
        voter: UserId,
        review_id: ReviewId,
        is_helpful: bool,
    ) -> Result<VoteOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let review = fetch_review(&mut tx, review_id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        ensure_not_author(review.user_id, voter)?;

        let prior = sqlx::query_scalar::<_, bool>(
            "SELECT is_helpful FROM storefront.review_vote WHERE user_id = $1 AND review_id = $2",
        )
        .bind(voter)
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?;

        let change = VoteChange::resolve(prior, is_helpful);
        let helpful_count = change.apply_to(review.helpful_count)?;

        match change.action {
            VoteAction::Created => {
                sqlx::query(
                    "INSERT INTO storefront.review_vote (user_id, review_id, is_helpful)
                     VALUES ($1, $2, $3)",
                )
                .bind(voter)
                .bind(review_id)
                .bind(is_helpful)
                .execute(&mut *tx)
                .await?;
            }
            VoteAction::Removed => {
                sqlx::query(
                    "DELETE FROM storefront.review_vote WHERE user_id = $1 AND review_id = $2",
                )
                .bind(voter)
                .bind(review_id)
                .execute(&mut *tx)
                .await?;
            }
            VoteAction::Flipped => {
                sqlx::query(
                    "UPDATE storefront.review_vote SET is_helpful = $3
                     WHERE user_id = $1 AND review_id = $2",
                )
                .bind(voter)
                .bind(review_id)
                .bind(is_helpful)
                .execute(&mut *tx)
                .await?;
            }
        }

        if change.delta != 0 {
            set_helpful_count(&mut tx, review_id, helpful_count).await?;
        }

        tx.commit().await?;

        Ok(VoteOutcome {
            review_id,
            action: change.action,
            is_helpful: change.next,
            helpful_count,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn recount_helpful(
        &self,
        review_id: ReviewId,
    ) -> Result<HelpfulRecount, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let review = fetch_review(&mut tx, review_id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let votes = sqlx::query_scalar::<_, bool>(
            "SELECT is_helpful FROM storefront.review_vote WHERE review_id = $1",
        )
        .bind(review_id)
        .fetch_all(&mut *tx)
        .await?;

        let outcome = HelpfulRecount {
            review_id,
            cached: review.helpful_count,
            derived: recount(votes),
        };

        if outcome.corrected() {
            set_helpful_count(&mut tx, review_id, outcome.derived).await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

async fn fetch_review(
    conn: &mut PgConnection,
    id: ReviewId,
    for_update: bool,
) -> Result<Option<Review>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let review = sqlx::query_as::<_, Review>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM storefront.review WHERE id = $1{lock}"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(review)
}

async fn set_helpful_count(
    conn: &mut PgConnection,
    id: ReviewId,
    helpful_count: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE storefront.review SET helpful_count = $2 WHERE id = $1")
        .bind(id)
        .bind(helpful_count)
        .execute(conn)
        .await?;
    Ok(())
}
