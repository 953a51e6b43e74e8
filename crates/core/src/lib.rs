//! Stonefruit Core - Shared types library.
//!
//! This crate provides common types used across the Stonefruit cart
//! components:
//! - `cart-api` - Versioned REST resource tree over the shopping cart
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money amounts, and emails

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
