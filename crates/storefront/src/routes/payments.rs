//! Payment route handlers.
//!
//! Stripe: the client asks for an intent, confirms it in the browser, then
//! asks us to verify it. PayPal: the client asks for a PayPal order, the
//! buyer approves it, then the client asks us to capture it.

use axum::extract::State;
use serde::Deserialize;

use gamevault_core::OrderId;

use crate::error::Result;
use crate::extract::Json;
use crate::middleware::RequireCaller;
use crate::models::PaymentOutcome;
use crate::services::payments::{PaypalApproval, StripeIntent};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderRef {
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct VerifyIntentRequest {
    pub order_id: OrderId,
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub order_id: OrderId,
    pub paypal_order_id: String,
}

pub async fn stripe_intent(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Json(body): Json<OrderRef>,
) -> Result<Json<StripeIntent>> {
    let intent = state
        .payments()
        .create_stripe_intent(&caller, body.order_id)
        .await?;
    Ok(Json(intent))
}

pub async fn stripe_verify(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Json(body): Json<VerifyIntentRequest>,
) -> Result<Json<PaymentOutcome>> {
    let outcome = state
        .payments()
        .verify_stripe_payment(&caller, body.order_id, body.payment_intent_id.trim())
        .await?;
    Ok(Json(outcome))
}

pub async fn paypal_order(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Json(body): Json<OrderRef>,
) -> Result<Json<PaypalApproval>> {
    let approval = state
        .payments()
        .create_paypal_order(&caller, body.order_id)
        .await?;
    Ok(Json(approval))
}

pub async fn paypal_capture(
    State(state): State<AppState>,
    RequireCaller(caller): RequireCaller,
    Json(body): Json<CaptureRequest>,
) -> Result<Json<PaymentOutcome>> {
    let outcome = state
        .payments()
        .capture_paypal_order(&caller, body.order_id, body.paypal_order_id.trim())
        .await?;
    Ok(Json(outcome))
}
