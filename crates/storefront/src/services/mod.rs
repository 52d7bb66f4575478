//! Business logic services for the storefront.
//!
//! Each service borrows the [`Store`](crate::db::Store) and takes the
//! [`Caller`](gamevault_core::Caller) explicitly on every operation.
//!
//! # Services
//!
//! - `cart` - Cart lines and totals
//! - `orders` - Order factory, listing, cancellation, tracking, invoices
//! - `payments` - Stripe and PayPal confirmation adapters
//! - `reviews` - Reviews, eligibility, and the helpful-vote ledger
//! - `invoice` - Invoice rendering collaborator

pub mod cart;
pub mod invoice;
pub mod orders;
pub mod payments;
pub mod reviews;

pub use cart::CartService;
pub use invoice::{InvoiceError, InvoiceRenderer, RenderedInvoice, TextInvoiceRenderer};
pub use orders::OrderService;
pub use payments::PaymentService;
pub use reviews::ReviewService;
