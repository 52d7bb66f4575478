//! Integration test support for GameVault.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gamevault-integration-tests
//! ```
//!
//! Scenarios run against [`MemoryStore`] with fake payment gateways, so no
//! database or provider sandbox is needed. The HTTP clients themselves are
//! exercised against `wiremock` servers in `tests/*_client.rs`.
//!
//! `tests/postgres_store.rs` drives `PgStore` against a real database and is
//! ignored by default:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/gamevault cargo test -p gamevault-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout` - Cart to order, stock, and concurrency
//! - `payments` - Stripe and PayPal confirmation flows
//! - `cancellation` / `tracking` - Order lifecycle after placement
//! - `reviews` - Eligibility and the helpful-vote ledger
//! - `routes` - The axum router end to end
//! - `postgres_store` - Locking and ledger behaviour of `PgStore`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use gamevault_core::{Caller, CurrencyCode, OrderId, PaymentMethod, ShippingAddress, UserId};
use gamevault_storefront::db::{MemoryStore, RepositoryError, Store};
use gamevault_storefront::models::{Game, NewOrder, OrderDetail, PaymentOutcome};
use gamevault_storefront::services::TextInvoiceRenderer;
use gamevault_storefront::services::payments::{
    IntentRequest, IntentStatus, PaymentError, PaymentIntent, PaypalCapture, PaypalGateway,
    PaypalOrder, PaypalOrderRequest, PaypalStatus, StripeGateway,
};
use gamevault_storefront::state::AppState;

// =============================================================================
// Fake Stripe
// =============================================================================

/// Stripe stand-in that keeps intents in memory.
///
/// New intents start in `requires_payment_method`; tests move them along
/// with [`FakeStripe::set_status`].
#[derive(Debug, Default)]
pub struct FakeStripe {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    retrievals: AtomicUsize,
}

impl FakeStripe {
    pub fn set_status(&self, intent_id: &str, status: IntentStatus) {
        let mut intents = self.intents.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(intent) = intents.get_mut(intent_id) {
            intent.status = status;
        }
    }

    /// Register an intent directly, e.g. one that belongs to another order.
    pub fn insert(&self, intent: PaymentIntent) {
        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(intent.id.clone(), intent);
    }

    /// How many times an intent was fetched from the "provider".
    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StripeGateway for FakeStripe {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, PaymentError> {
        let id = format!("pi_test_{}", request.order_id);
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret_fake")),
            amount: request.amount,
            currency: request.currency.lower_code().to_owned(),
            status: IntentStatus::RequiresPaymentMethod,
            metadata: HashMap::from([("order_id".to_owned(), request.order_id.to_string())]),
        };
        self.insert(intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::Api {
                status: 404,
                message: format!("No such payment_intent: '{intent_id}'"),
            })
    }
}

// =============================================================================
// Fake PayPal
// =============================================================================

/// PayPal stand-in. Captures complete unless told otherwise.
///
/// Each created order remembers the capture PayPal would report for it;
/// tests alter it with [`FakePaypal::edit_capture`].
#[derive(Debug, Default)]
pub struct FakePaypal {
    orders: Mutex<HashMap<String, PaypalCapture>>,
    captures: AtomicUsize,
}

impl FakePaypal {
    pub fn set_capture_status(&self, paypal_order_id: &str, status: PaypalStatus) {
        self.edit_capture(paypal_order_id, |capture| capture.status = status);
    }

    /// Change what capturing `paypal_order_id` reports.
    pub fn edit_capture(&self, paypal_order_id: &str, edit: impl FnOnce(&mut PaypalCapture)) {
        let mut orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(capture) = orders.get_mut(paypal_order_id) {
            edit(capture);
        }
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaypalGateway for FakePaypal {
    async fn create_order(
        &self,
        request: &PaypalOrderRequest,
    ) -> Result<PaypalOrder, PaymentError> {
        let id = format!("5O190127TN36471{}", request.order_id);
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.clone(),
                PaypalCapture {
                    id: id.clone(),
                    status: PaypalStatus::Completed,
                    custom_id: Some(request.order_id.to_string()),
                    amount: Some(request.amount),
                    currency: Some(request.currency.code().to_owned()),
                },
            );

        Ok(PaypalOrder {
            approve_url: Some(format!(
                "https://www.sandbox.paypal.com/checkoutnow?token={id}"
            )),
            id,
            status: PaypalStatus::Created,
        })
    }

    async fn capture_order(&self, paypal_order_id: &str) -> Result<PaypalCapture, PaymentError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(paypal_order_id)
            .cloned()
            .ok_or_else(|| PaymentError::Api {
                status: 404,
                message: "RESOURCE_NOT_FOUND".to_owned(),
            })
    }
}

// =============================================================================
// Test application
// =============================================================================

/// A storefront wired to in-memory collaborators.
#[derive(Clone)]
pub struct TestApp {
    pub store: MemoryStore,
    pub stripe: Arc<FakeStripe>,
    pub paypal: Arc<FakePaypal>,
    pub state: AppState,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let stripe = Arc::new(FakeStripe::default());
        let paypal = Arc::new(FakePaypal::default());
        let state = AppState::from_parts(
            Arc::new(store.clone()),
            stripe.clone(),
            paypal.clone(),
            Arc::new(TextInvoiceRenderer),
            CurrencyCode::USD,
        );

        Self {
            store,
            stripe,
            paypal,
            state,
        }
    }

    pub async fn game(&self, name: &str, price: Decimal, stock: i32) -> Game {
        self.store.insert_game(name, price, None, stock).await
    }

    pub async fn stock(&self, game: &Game) -> i32 {
        self.store.game_stock(game.id).await.unwrap_or(-1)
    }

    /// Add `quantity` of `game` to the caller's cart and place an order.
    ///
    /// # Errors
    ///
    /// Propagates cart or checkout failures.
    pub async fn buy(
        &self,
        caller: &Caller,
        game: &Game,
        quantity: i32,
        method: PaymentMethod,
    ) -> Result<OrderDetail, RepositoryError> {
        self.state.carts().add(caller, game.id, quantity).await?;
        self.state.orders().create(caller, &new_order(method)).await
    }

    /// Create a Stripe intent for the order, mark it succeeded at the fake
    /// provider, then verify it.
    ///
    /// # Errors
    ///
    /// Propagates payment service failures.
    pub async fn pay_with_stripe(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<PaymentOutcome, PaymentError> {
        let payments = self.state.payments();
        let intent = payments.create_stripe_intent(caller, order_id).await?;
        self.stripe
            .set_status(&intent.intent_id, IntentStatus::Succeeded);
        payments
            .verify_stripe_payment(caller, order_id, &intent.intent_id)
            .await
    }

    /// Buy one unit of a game and pay for it, leaving a completed order.
    ///
    /// # Errors
    ///
    /// Propagates checkout failures; payment failures become
    /// `RepositoryError::DataCorruption` so callers see one error type.
    pub async fn buy_and_pay(
        &self,
        caller: &Caller,
        game: &Game,
    ) -> Result<OrderDetail, RepositoryError> {
        let detail = self.buy(caller, game, 1, PaymentMethod::Stripe).await?;
        let paid = self
            .pay_with_stripe(caller, detail.order.id)
            .await
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(OrderDetail {
            order: paid.order,
            items: detail.items,
        })
    }

    pub async fn cart_is_empty(&self, caller: &Caller) -> bool {
        self.store
            .cart_lines(caller.user_id)
            .await
            .is_ok_and(|lines| lines.is_empty())
    }
}

#[must_use]
pub const fn customer(id: i64) -> Caller {
    Caller::customer(UserId::new(id))
}

#[must_use]
pub const fn admin(id: i64) -> Caller {
    Caller::admin(UserId::new(id))
}

/// A valid shipping address payload.
#[must_use]
pub fn address_json() -> serde_json::Value {
    json!({
        "address": "12 Pixel Lane",
        "city": "Portland",
        "postalCode": "97201",
        "country": "US",
        "phone": "+1 503 555 0100"
    })
}

/// # Panics
///
/// Never in practice; the fixture address is valid.
#[must_use]
pub fn new_order(method: PaymentMethod) -> NewOrder {
    NewOrder {
        shipping_address: ShippingAddress::parse_value(&address_json())
            .unwrap_or_else(|e| panic!("fixture address is valid: {e}")),
        payment_method: method,
        payment_id: None,
    }
}
