//! Review route handlers.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;

use gamevault_core::review::ReviewEligibility;
use gamevault_core::{GameId, ReviewId};

use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireCaller;
use crate::models::{Review, ReviewPage, VoteOutcome};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i16,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub is_helpful: bool,
}

/// Game reviews, most helpful first. Public.
pub async fn index(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
    Query(params): Query<PageParams>,
) -> Result<Json<ReviewPage>> {
    let page = state
        .reviews()
        .list_for_game(game_id, params.page, params.per_page)
        .await?;
    Ok(Json(page))
}

pub async fn create(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(game_id): Path<GameId>,
    Json(body): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = state
        .reviews()
        .create(&caller, game_id, body.rating, body.comment.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn can_review(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(game_id): Path<GameId>,
) -> Result<Json<ReviewEligibility>> {
    Ok(Json(state.reviews().can_review(&caller, game_id).await?))
}

/// Vote a review helpful or not; repeating a vote withdraws it.
pub async fn vote(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(review_id): Path<ReviewId>,
    Json(body): Json<VoteRequest>,
) -> Result<Json<VoteOutcome>> {
    let outcome = state
        .reviews()
        .vote(&caller, review_id, body.is_helpful)
        .await?;
    Ok(Json(outcome))
}
