//! Cart route handlers.

use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use gamevault_core::cart::CartSummary;
use gamevault_core::{CartItemId, GameId};

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireCaller;
use crate::models::{CartItem, CartView};
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub game_id: GameId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: u64,
}

/// Display the caller's cart.
pub async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<CartView>> {
    Ok(Json(state.carts().list(&caller).await?))
}

/// Totals only.
pub async fn summary(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<CartSummary>> {
    Ok(Json(state.carts().summary(&caller).await?))
}

/// Add a game, merging with an existing line.
#[instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let item = state
        .carts()
        .add(&caller, body.game_id, body.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<CartItemId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartItem>> {
    Ok(Json(state.carts().update(&caller, id, body.quantity).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<CartItemId>,
) -> Result<StatusCode> {
    state.carts().remove(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<ClearResponse>> {
    let removed = state.carts().clear(&caller).await?;
    Ok(Json(ClearResponse { removed }))
}
