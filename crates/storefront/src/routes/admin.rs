//! Admin route handlers.

use axum::extract::State;

use gamevault_core::shipping::TrackingUpdate;
use gamevault_core::{OrderId, ReviewId};

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireAdmin;
use crate::models::{HelpfulRecount, Order};
use crate::state::AppState;

/// Update shipment tracking on any order.
pub async fn update_tracking(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(update): Json<TrackingUpdate>,
) -> Result<Json<Order>> {
    let order = state.orders().update_tracking(&caller, id, &update).await?;
    Ok(Json(order))
}

pub async fn recount_helpful(
    State(state): State<AppState>,
    RequireAdmin(caller): RequireAdmin,
    Path(id): Path<ReviewId>,
) -> Result<Json<HelpfulRecount>> {
    Ok(Json(state.reviews().recount_helpful(&caller, id).await?))
}
