//! Review rules and the helpful-vote ledger.
//!
//! `helpful_count` on a review is a cached aggregate: it always equals the
//! number of votes with `is_helpful = true`. Every vote mutation moves it by
//! the delta computed in [`VoteChange::resolve`], and [`recount`] re-derives
//! it from the ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DomainError, UserId};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

/// Longest accepted review comment, in characters.
pub const MAX_COMMENT_LENGTH: usize = 5000;

/// # Errors
///
/// Returns `DomainError::Validation` unless the rating is 1-5.
pub fn validate_rating(rating: i16) -> Result<(), DomainError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING} (got {rating})"
        )))
    }
}

/// Trim a comment, dropping it entirely when blank.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the comment is too long.
pub fn normalize_comment(comment: Option<&str>) -> Result<Option<String>, DomainError> {
    let Some(text) = comment.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_COMMENT_LENGTH {
        return Err(DomainError::Validation(format!(
            "comment must be at most {MAX_COMMENT_LENGTH} characters"
        )));
    }
    Ok(Some(text.to_owned()))
}

/// # Errors
///
/// Returns `DomainError::PermissionDenied` when a user votes on their own review.
pub fn ensure_not_author(author: UserId, voter: UserId) -> Result<(), DomainError> {
    if author == voter {
        Err(DomainError::PermissionDenied(
            "cannot vote on your own review".to_owned(),
        ))
    } else {
        Ok(())
    }
}

/// What happened to the caller's vote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteAction {
    /// No prior vote; one was recorded.
    Created,
    /// Same value voted twice; the vote was withdrawn.
    Removed,
    /// Opposite value; the vote was flipped.
    Flipped,
}

/// The ledger mutation for one vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteChange {
    pub action: VoteAction,
    /// The vote row's value afterwards (`None` when removed).
    pub next: Option<bool>,
    /// Change to apply to `helpful_count`.
    pub delta: i32,
}

impl VoteChange {
    /// Resolve a vote against the caller's prior vote, if any.
    #[must_use]
    pub const fn resolve(prior: Option<bool>, is_helpful: bool) -> Self {
        match prior {
            None => Self {
                action: VoteAction::Created,
                next: Some(is_helpful),
                delta: if is_helpful { 1 } else { 0 },
            },
            Some(previous) if previous == is_helpful => Self {
                action: VoteAction::Removed,
                next: None,
                delta: if previous { -1 } else { 0 },
            },
            Some(_) => Self {
                action: VoteAction::Flipped,
                next: Some(is_helpful),
                delta: if is_helpful { 1 } else { -1 },
            },
        }
    }

    /// Apply the delta to a cached count.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the cache would go negative,
    /// which means it had drifted from the ledger.
    pub fn apply_to(&self, helpful_count: i32) -> Result<i32, DomainError> {
        let next = helpful_count.saturating_add(self.delta);
        if next < 0 {
            return Err(DomainError::InvalidState(
                "helpful count out of sync with votes".to_owned(),
            ));
        }
        Ok(next)
    }
}

/// Derive the helpful count from vote values.
#[must_use]
pub fn recount<I>(votes: I) -> i32
where
    I: IntoIterator<Item = bool>,
{
    let helpful = votes.into_iter().filter(|is_helpful| *is_helpful).count();
    i32::try_from(helpful).unwrap_or(i32::MAX)
}

/// Average rating for a game, computed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Mean rating rounded to two places; `None` without reviews.
    pub average: Option<Decimal>,
    pub count: i64,
}

impl RatingSummary {
    #[must_use]
    pub fn new(count: i64, average: Option<Decimal>) -> Self {
        Self {
            average: average.filter(|_| count > 0).map(|a| a.round_dp(2)),
            count,
        }
    }

    #[must_use]
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = i16>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0_i64, 0_i64), |(sum, count), r| (sum + i64::from(r), count + 1));
        let average = (count > 0).then(|| Decimal::from(sum) / Decimal::from(count));
        Self::new(count, average)
    }
}

/// Whether a user may review a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEligibility {
    pub can_review: bool,
    pub has_purchased: bool,
    pub has_reviewed: bool,
}

impl ReviewEligibility {
    #[must_use]
    pub const fn new(has_purchased: bool, has_reviewed: bool) -> Self {
        Self {
            can_review: has_purchased && !has_reviewed,
            has_purchased,
            has_reviewed,
        }
    }

    /// # Errors
    ///
    /// - `DomainError::PermissionDenied` without a completed purchase.
    /// - `DomainError::InvalidState` if the user already reviewed the game.
    pub fn ensure_allowed(&self) -> Result<(), DomainError> {
        if !self.has_purchased {
            return Err(DomainError::PermissionDenied(
                "only customers who bought this game can review it".to_owned(),
            ));
        }
        if self.has_reviewed {
            return Err(DomainError::InvalidState(
                "you have already reviewed this game".to_owned(),
            ));
        }
        Ok(())
    }
}
