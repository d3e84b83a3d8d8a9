//! Core types for the Envasado storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use cart::{Cart, CartItem, CartItemShapeError, Purchasable};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, round_money};
pub use status::*;
