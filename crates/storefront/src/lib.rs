//! Envasado storefront client core.
//!
//! Cart and checkout state for the storefront UI: optimistic cart edits,
//! reconciliation with the backend before payment, and the three-step
//! checkout wizard. The UI layer owns rendering; this crate owns state.
//!
//! # Architecture
//!
//! - [`cart::CartStore`] owns the cart and persists edits via the backend
//! - [`cart::Reconciler`] gates payment on an unchanged server cart
//! - [`checkout::CheckoutSession`] drives Address, Payment, Confirmation
//! - [`api::ApiClient`] talks JSON over HTTP to the storefront backend
//!
//! # Example
//!
//! ```rust,ignore
//! let config = StorefrontConfig::from_env()?;
//! let _telemetry = telemetry::init(&config)?;
//! let state = AppState::new(config)?;
//!
//! let mut session = Session::new();
//! let mut store = state.cart_store(&session, cart);
//! store.add_item(sealer, "Vacuum sealer", price, 1).await?;
//!
//! let mut checkout = state.checkout(&session, gateway);
//! checkout.submit_addresses(&mut session, addresses)?;
//! checkout.next(&mut store).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod telemetry;

pub use error::{Result, StorefrontError};
