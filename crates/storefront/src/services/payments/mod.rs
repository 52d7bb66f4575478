//! Payment confirmation.
//!
//! Orders are placed `pending` by the order factory; this module drives them
//! to `completed` through one of two provider shapes:
//!
//! - **Stripe** - a payment intent is created server-side, confirmed by the
//!   client, then verified here by retrieving it.
//! - **PayPal** - a provider order is created and approved by the buyer,
//!   then captured here.
//!
//! Provider calls never run inside a stock-mutating transaction, and a
//! failed confirmation leaves the order as it was. Confirmation only ever
//! touches `status` and `payment_id`.

mod error;
pub mod paypal;
pub mod stripe;

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use gamevault_core::order::{Confirmation, confirm_payment, ensure_payment_method};
use gamevault_core::{
    Caller, CurrencyCode, OrderId, OrderStatus, PaymentMethod, ShippingAddress, to_minor_units,
};

pub use error::PaymentError;
pub use paypal::PaypalClient;
pub use stripe::StripeClient;

use crate::db::{RepositoryError, Store};
use crate::models::{Order, PaymentOutcome};

// =============================================================================
// Stripe
// =============================================================================

/// Parameters for a new payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub order_id: OrderId,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    pub shipping: ShippingAddress,
}

/// Payment intent status as reported by Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

/// The subset of a Stripe payment intent the flow relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// The local order id recorded in the intent metadata.
    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        self.metadata.get("order_id").map(String::as_str)
    }
}

#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;
}

/// Returned to the client after creating an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeIntent {
    pub intent_id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
}

// =============================================================================
// PayPal
// =============================================================================

/// Parameters for a new PayPal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaypalOrderRequest {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

/// PayPal order and capture statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaypalStatus {
    Created,
    Saved,
    Approved,
    Voided,
    Completed,
    PayerActionRequired,
    Pending,
    Declined,
    #[serde(other)]
    Unknown,
}

/// A created PayPal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaypalOrder {
    pub id: String,
    pub status: PaypalStatus,
    /// Where the buyer approves the payment.
    pub approve_url: Option<String>,
}

/// Result of capturing a PayPal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaypalCapture {
    /// The PayPal order id.
    pub id: String,
    pub status: PaypalStatus,
    /// Local order id echoed back from the purchase unit.
    pub custom_id: Option<String>,
    /// Captured amount, when PayPal reports one.
    pub amount: Option<Decimal>,
    /// ISO 4217 code of the captured amount.
    pub currency: Option<String>,
}

#[async_trait]
pub trait PaypalGateway: Send + Sync {
    async fn create_order(&self, request: &PaypalOrderRequest)
    -> Result<PaypalOrder, PaymentError>;

    async fn capture_order(&self, paypal_order_id: &str) -> Result<PaypalCapture, PaymentError>;
}

/// Returned to the client after creating a PayPal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaypalApproval {
    pub paypal_order_id: String,
    pub approve_url: Option<String>,
}

// =============================================================================
// Service
// =============================================================================

/// Drives an order through a provider's payment flow.
pub struct PaymentService<'a> {
    store: &'a dyn Store,
    stripe: &'a dyn StripeGateway,
    paypal: &'a dyn PaypalGateway,
    currency: CurrencyCode,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        stripe: &'a dyn StripeGateway,
        paypal: &'a dyn PaypalGateway,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            store,
            stripe,
            paypal,
            currency,
        }
    }

    /// Create a payment intent for the caller's order and record its id.
    ///
    /// # Errors
    ///
    /// - `NotFound` unless the caller owns the order.
    /// - `Validation` if the order is not a Stripe order.
    /// - `InvalidState` once the order is completed or cancelled.
    /// - Provider errors from Stripe.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn create_stripe_intent(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<StripeIntent, PaymentError> {
        let order = self.payable_order(caller, order_id, PaymentMethod::Stripe).await?;
        order.status.ensure_awaiting_payment()?;

        let request = IntentRequest {
            order_id,
            amount: to_minor_units(order.total)?,
            currency: self.currency,
            shipping: order.shipping_address.clone(),
        };
        let intent = self.stripe.create_intent(&request).await?;
        self.store.attach_payment(order_id, &intent.id).await?;

        info!(intent_id = %intent.id, amount = intent.amount, "Created payment intent");

        Ok(StripeIntent {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: intent.amount,
            currency: intent.currency,
        })
    }

    /// Verify a payment intent and complete the order when it succeeded.
    ///
    /// A `processing` intent moves the order to `processing`; any other
    /// non-success status is a rejection and leaves the order unchanged.
    ///
    /// # Errors
    ///
    /// - `NotFound`, `Validation`, or `InvalidState` as for intent creation.
    /// - `PaymentError::Rejected` if the intent failed or belongs to a
    ///   different order, amount, or currency.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn verify_stripe_payment(
        &self,
        caller: &Caller,
        order_id: OrderId,
        intent_id: &str,
    ) -> Result<PaymentOutcome, PaymentError> {
        let order = self.payable_order(caller, order_id, PaymentMethod::Stripe).await?;
        if let Some(outcome) = already_confirmed(&order, intent_id)? {
            return Ok(outcome);
        }

        let intent = self.stripe.retrieve_intent(intent_id).await?;
        verify_intent_matches(&intent, &order, self.currency)?;

        match intent.status {
            IntentStatus::Succeeded => {
                let outcome = self.store.complete_payment(order_id, &intent.id).await?;
                info!(intent_id = %intent.id, "Stripe payment confirmed");
                Ok(outcome)
            }
            IntentStatus::Processing => {
                let order = self.store.mark_processing(order_id, &intent.id).await?;
                info!(intent_id = %intent.id, "Stripe payment processing");
                Ok(PaymentOutcome {
                    order,
                    already_confirmed: false,
                })
            }
            status => {
                warn!(intent_id = %intent.id, ?status, "Stripe payment not successful");
                Err(PaymentError::Rejected(format!(
                    "payment intent status is {status:?}"
                )))
            }
        }
    }

    /// Create a PayPal order for the caller's order and record its id.
    ///
    /// # Errors
    ///
    /// - `NotFound`, `Validation`, or `InvalidState` as for Stripe.
    /// - Provider errors from PayPal.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn create_paypal_order(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<PaypalApproval, PaymentError> {
        let order = self.payable_order(caller, order_id, PaymentMethod::Paypal).await?;
        order.status.ensure_awaiting_payment()?;

        let request = PaypalOrderRequest {
            order_id,
            amount: order.total,
            currency: self.currency,
        };
        let paypal_order = self.paypal.create_order(&request).await?;
        self.store.attach_payment(order_id, &paypal_order.id).await?;

        info!(paypal_order_id = %paypal_order.id, "Created PayPal order");

        Ok(PaypalApproval {
            paypal_order_id: paypal_order.id,
            approve_url: paypal_order.approve_url,
        })
    }

    /// Capture an approved PayPal order and complete the local order.
    ///
    /// # Errors
    ///
    /// - `NotFound`, `Validation`, or `InvalidState` as for Stripe.
    /// - `PaymentError::Rejected` if the PayPal order was not created for
    ///   this order, the capture did not complete, or the captured amount or
    ///   currency differs from the order.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn capture_paypal_order(
        &self,
        caller: &Caller,
        order_id: OrderId,
        paypal_order_id: &str,
    ) -> Result<PaymentOutcome, PaymentError> {
        let order = self.payable_order(caller, order_id, PaymentMethod::Paypal).await?;
        if let Some(outcome) = already_confirmed(&order, paypal_order_id)? {
            return Ok(outcome);
        }
        if order.payment_id.as_deref() != Some(paypal_order_id) {
            return Err(PaymentError::Rejected(
                "PayPal order was not created for this order".to_owned(),
            ));
        }

        let capture = self.paypal.capture_order(paypal_order_id).await?;
        verify_capture_matches(&capture, &order, self.currency)?;
        if capture.status != PaypalStatus::Completed {
            warn!(paypal_order_id, status = ?capture.status, "PayPal capture not completed");
            return Err(PaymentError::Rejected(format!(
                "PayPal capture status is {:?}",
                capture.status
            )));
        }

        let outcome = self
            .store
            .complete_payment(order_id, paypal_order_id)
            .await?;
        info!(paypal_order_id, "PayPal payment captured");
        Ok(outcome)
    }

    /// Load an order the caller owns and check it uses `method`.
    async fn payable_order(
        &self,
        caller: &Caller,
        order_id: OrderId,
        method: PaymentMethod,
    ) -> Result<Order, PaymentError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .map(|detail| detail.order)
            .filter(|order| caller.owns(order.user_id))
            .ok_or(RepositoryError::NotFound)?;

        ensure_payment_method(method, order.payment_method)?;
        Ok(order)
    }
}

/// Short-circuit a repeated confirmation without calling the provider.
fn already_confirmed(
    order: &Order,
    payment_id: &str,
) -> Result<Option<PaymentOutcome>, PaymentError> {
    match confirm_payment(order.status, order.payment_id.as_deref(), payment_id)? {
        Confirmation::AlreadyConfirmed => Ok(Some(PaymentOutcome {
            order: order.clone(),
            already_confirmed: true,
        })),
        Confirmation::Apply => Ok(None),
    }
}

fn verify_intent_matches(
    intent: &PaymentIntent,
    order: &Order,
    currency: CurrencyCode,
) -> Result<(), PaymentError> {
    let expected_id = order.id.to_string();
    if intent.order_id() != Some(expected_id.as_str()) {
        return Err(PaymentError::Rejected(
            "payment intent does not belong to this order".to_owned(),
        ));
    }
    if !intent.currency.eq_ignore_ascii_case(currency.lower_code()) {
        return Err(PaymentError::Rejected(format!(
            "payment intent currency {} does not match {}",
            intent.currency,
            currency.code()
        )));
    }
    if intent.amount != to_minor_units(order.total)? {
        return Err(PaymentError::Rejected(format!(
            "payment intent amount {} does not match order total {}",
            intent.amount, order.total
        )));
    }
    if order.status == OrderStatus::Processing
        && order.payment_id.as_deref().is_some_and(|id| id != intent.id)
    {
        return Err(PaymentError::Rejected(
            "order is already processing a different payment".to_owned(),
        ));
    }
    Ok(())
}

fn verify_capture_matches(
    capture: &PaypalCapture,
    order: &Order,
    currency: CurrencyCode,
) -> Result<(), PaymentError> {
    let expected_id = order.id.to_string();
    if capture.custom_id.as_deref() != Some(expected_id.as_str()) {
        return Err(PaymentError::Rejected(
            "PayPal order does not belong to this order".to_owned(),
        ));
    }
    if capture.amount != Some(order.total) {
        return Err(PaymentError::Rejected(format!(
            "PayPal capture amount {:?} does not match order total {}",
            capture.amount, order.total
        )));
    }
    if !capture
        .currency
        .as_deref()
        .is_some_and(|code| code.eq_ignore_ascii_case(currency.code()))
    {
        return Err(PaymentError::Rejected(format!(
            "PayPal capture currency {:?} does not match {}",
            capture.currency,
            currency.code()
        )));
    }
    Ok(())
}
