//! Core types for GameVault.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod caller;
pub mod id;
pub mod money;
pub mod page;
pub mod status;

pub use address::{AddressError, ShippingAddress};
pub use caller::{Caller, CallerRole};
pub use id::*;
pub use money::{CurrencyCode, format_amount, to_minor_units};
pub use page::{Page, PageRequest};
pub use status::*;
