//! GameVault Core - Domain types and rules.
//!
//! This crate provides the types and invariants shared by every GameVault
//! component:
//! - `storefront` - Cart, checkout, payment confirmation, and review API
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Storage backends call these rules from inside their
//! own transactions so every backend enforces the same invariants.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money helpers, statuses, addresses, and callers
//! - [`cart`] - Price capture, stock checks, and cart totals
//! - [`order`] - Order planning, cancellation, and payment confirmation rules
//! - [`shipping`] - Shipment tracking state machine
//! - [`review`] - Rating validation and the helpful-vote ledger
//! - [`error`] - Domain error kinds

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod error;
pub mod order;
pub mod review;
pub mod shipping;
pub mod types;

pub use error::DomainError;
pub use types::*;
