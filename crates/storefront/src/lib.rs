//! GameVault Storefront library.
//!
//! This crate provides the checkout service as a library, allowing it to be
//! tested and reused. The binary in `main.rs` wires it to `PostgreSQL`, the
//! payment providers, and an axum server.
//!
//! # Layers
//!
//! - [`routes`] - axum JSON handlers; parse input once, pass an explicit [`Caller`]
//! - [`services`] - cart, order, payment, and review operations
//! - [`db`] - the [`db::Store`] unit-of-work seam with `PostgreSQL` and in-memory backends
//!
//! [`Caller`]: gamevault_core::Caller

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
