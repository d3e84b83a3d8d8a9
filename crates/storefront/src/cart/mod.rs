//! Cart state: the store, its pricing, and reconciliation with the backend.
//!
//! # Flow
//!
//! ```text
//! customer action -> CartStore mutation (optimistic) -> CartBackend call
//!                                 |                          |
//!                      totals recomputed               failure: rollback
//!                                 |
//!                      CartSummary published to subscribers
//!
//! checkout confirmation -> Reconciler::gate -> CartStore::check_cart
//!                                           -> Proceed | Blocked | Discarded
//! ```

pub mod pricing;
pub mod reconcile;
pub mod store;

use std::future::Future;

use envasado_core::{Cart, CartId, CartItem};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::api::ApiError;

pub use pricing::{CartBreakdown, cart_breakdown, item_total_price_value};
pub use reconcile::{
    AbandonHandle, CheckAttempt, Discrepancy, GateDecision, ReconciliationResult, Reconciler,
    ReconcilerState, diff_carts,
};
pub use store::{CartStore, UpdateOutcome};

/// Remote operations the cart store depends on.
///
/// Implemented by [`ApiClient`](crate::api::ApiClient) over HTTP.
pub trait CartBackend {
    /// Create a new line; returns it with its backend id.
    fn create_item(
        &self,
        cart_id: CartId,
        item: &CartItem,
    ) -> impl Future<Output = Result<CartItem, ApiError>> + Send;

    /// Persist a new quantity for an existing line.
    fn update_item(
        &self,
        cart_id: CartId,
        item: &CartItem,
    ) -> impl Future<Output = Result<CartItem, ApiError>> + Send;

    /// Remove a line.
    fn delete_item(
        &self,
        cart_id: CartId,
        item: &CartItem,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Recompute the cart against current stock and prices.
    fn check_cart(&self, cart: &Cart) -> impl Future<Output = Result<CheckedCart, ApiError>> + Send;
}

/// Authoritative cart returned by a cart check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedCart {
    pub cart: Cart,
    /// Lines whose quantity the backend reduced for lack of stock.
    #[serde(default)]
    pub changed_items_by_inventory: Vec<CartItem>,
}

/// Snapshot of the cart totals, published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSummary {
    pub cart_id: CartId,
    pub line_count: usize,
    pub total_quantity: u32,
    pub total_price: Decimal,
    /// Incremented on every local change, rollback and reconciliation.
    pub revision: u64,
}

impl CartSummary {
    pub(crate) fn of(cart: &Cart, revision: u64) -> Self {
        Self {
            cart_id: cart.id,
            line_count: cart.items.len(),
            total_quantity: cart.total_quantity(),
            total_price: cart.total_price(),
            revision,
        }
    }
}
