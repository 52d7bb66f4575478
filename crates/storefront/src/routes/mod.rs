//! HTTP route handlers for storefront.
//!
//! Every handler takes the caller from the identity extractors and returns
//! JSON. Admin-only routes use [`RequireAdmin`](crate::middleware::RequireAdmin).
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness check
//! GET    /health/ready                - Store connectivity check
//!
//! # Cart
//! GET    /cart                        - Lines and summary
//! DELETE /cart                        - Clear the cart
//! GET    /cart/summary                - Summary only
//! POST   /cart/items                  - Add a game
//! PATCH  /cart/items/{id}             - Set a line's quantity
//! DELETE /cart/items/{id}             - Remove a line
//!
//! # Orders
//! GET    /orders                      - Own orders (admins: all, with filters)
//! POST   /orders                      - Place an order from the cart
//! GET    /orders/{id}                 - Order with items
//! POST   /orders/{id}/cancel          - Cancel and restock
//! GET    /orders/{id}/invoice         - Rendered invoice
//!
//! # Payments
//! POST   /payments/stripe/intent      - Create a payment intent
//! POST   /payments/stripe/verify      - Verify an intent, complete the order
//! POST   /payments/paypal/orders      - Create a PayPal order
//! POST   /payments/paypal/capture     - Capture a PayPal order
//!
//! # Reviews
//! GET    /games/{id}/reviews          - Paginated reviews and rating
//! POST   /games/{id}/reviews          - Review a purchased game
//! GET    /games/{id}/can-review       - Review eligibility
//! POST   /reviews/{id}/vote           - Helpful vote (toggles)
//!
//! # Admin
//! PATCH  /admin/orders/{id}/tracking  - Shipment tracking update
//! POST   /admin/reviews/{id}/recount  - Re-derive a helpful count
//! ```

pub mod admin;
pub mod cart;
pub mod health;
pub mod orders;
pub mod payments;
pub mod reviews;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/summary", get(cart::summary))
        .route("/items", post(cart::add))
        .route(
            "/items/{id}",
            patch(cart::update).delete(cart::remove),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/invoice", get(orders::invoice))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/stripe/intent", post(payments::stripe_intent))
        .route("/stripe/verify", post(payments::stripe_verify))
        .route("/paypal/orders", post(payments::paypal_order))
        .route("/paypal/capture", post(payments::paypal_capture))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/tracking", patch(admin::update_tracking))
        .route("/reviews/{id}/recount", post(admin::recount_helpful))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health checks
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payments", payment_routes())
        // Reviews hang off games and reviews
        .route(
            "/games/{id}/reviews",
            get(reviews::index).post(reviews::create),
        )
        .route("/games/{id}/can-review", get(reviews::can_review))
        .route("/reviews/{id}/vote", post(reviews::vote))
        .nest("/admin", admin_routes())
}
