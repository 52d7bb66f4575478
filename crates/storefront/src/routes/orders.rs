//! Order route handlers.
//!
//! The shipping address arrives loosely typed from some clients, so the
//! create handler takes it as raw JSON and normalizes it once with
//! [`ShippingAddress::parse_value`].

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use gamevault_core::{OrderId, Page, PaymentMethod, ShippingAddress};

use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireCaller;
use crate::models::{NewOrder, Order, OrderDetail, OrderFilters};
use crate::state::AppState;

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: serde_json::Value,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_id: Option<String>,
}

impl TryFrom<CreateOrderRequest> for NewOrder {
    type Error = AppError;

    fn try_from(body: CreateOrderRequest) -> std::result::Result<Self, Self::Error> {
        let shipping_address = ShippingAddress::parse_value(&body.shipping_address)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let payment_id = body
            .payment_id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty());

        Ok(Self {
            shipping_address,
            payment_method: body.payment_method,
            payment_id,
        })
    }
}

pub async fn index(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Query(filters): Query<OrderFilters>,
) -> Result<Json<Page<Order>>> {
    Ok(Json(state.orders().list(&caller, filters).await?))
}

/// Place an order from the caller's cart.
#[instrument(skip(state, caller, body), fields(user_id = %caller.user_id))]
pub async fn create(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let order = NewOrder::try_from(body)?;
    let detail = state.orders().create(&caller, &order).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn show(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(state.orders().show(&caller, id).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(state.orders().cancel(&caller, id).await?))
}

/// Render the order's invoice with the configured renderer.
pub async fn invoice(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    let rendered = state
        .orders()
        .invoice(&caller, id, state.invoices())
        .await?;
    Ok(([(header::CONTENT_TYPE, rendered.content_type)], rendered.body))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(address: serde_json::Value, payment_id: Option<&str>) -> CreateOrderRequest {
        CreateOrderRequest {
            shipping_address: address,
            payment_method: PaymentMethod::Stripe,
            payment_id: payment_id.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn test_loose_address_is_normalized() {
        let order = NewOrder::try_from(request(
            json!({
                "address": " 1 Main St ",
                "city": "Leeds",
                "zip": 12345,
                "country": "UK",
                "phone": 447_700_900_123_i64
            }),
            None,
        ))
        .unwrap();

        assert_eq!(order.shipping_address.address(), "1 Main St");
        assert_eq!(order.shipping_address.postal_code(), "12345");
        assert_eq!(order.shipping_address.phone(), "447700900123");
    }

    #[test]
    fn test_missing_address_field_is_bad_request() {
        let err = NewOrder::try_from(request(json!({"city": "Leeds"}), None)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_blank_payment_id_is_dropped() {
        let order = NewOrder::try_from(request(
            json!({
                "address": "1 Main St",
                "city": "Leeds",
                "postalCode": "LS1",
                "country": "UK",
                "phone": "0113"
            }),
            Some("   "),
        ))
        .unwrap();

        assert_eq!(order.payment_id, None);
    }
}
