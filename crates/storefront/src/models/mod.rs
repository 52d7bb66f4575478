//! Domain models for storefront.
//!
//! These are the rows the [`Store`](crate::db::Store) reads and writes, plus
//! the request/response shapes built from them.

pub mod cart;
pub mod game;
pub mod order;
pub mod review;

pub use cart::{CartItem, CartLine, CartView};
pub use game::Game;
pub use order::{NewOrder, Order, OrderDetail, OrderFilters, OrderItem, OrderQuery, PaymentOutcome};
pub use review::{HelpfulRecount, NewReview, Review, ReviewPage, VoteOutcome};
