//! Envasado Core - Shared types library.
//!
//! This crate provides the types used by every layer of the storefront
//! client:
//! - `storefront` - Cart store, checkout wizard and backend API client
//! - `integration-tests` - End-to-end tests against a fake backend
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients. Cart totals are derived here so every consumer computes them
//! the same way.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, emails, the cart data model and checkout stages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
