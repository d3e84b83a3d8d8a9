//! Checkout gate: reconcile the local cart with the backend before paying.
//!
//! The cart a customer assembled may be stale by the time they pay: stock
//! runs out, prices change. Before a transaction is created the backend
//! recomputes the cart and the [`Reconciler`] decides whether checkout may
//! proceed. This is an optimistic-concurrency check, not a lock.
//!
//! Each check runs under a [`CheckAttempt`]. Leaving checkout while a check
//! is in flight bumps the shared epoch through an [`AbandonHandle`]; the
//! response is then discarded without touching the cart.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use envasado_core::{Cart, CartItem, CartItemId};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::CartBackend;
use super::store::CartStore;
use crate::error::{Result, StorefrontError};

/// Outcome of comparing the local cart with the backend's recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Lines were added, removed, or changed quantity.
    pub changed_cart: bool,
    /// Lines the backend reduced for lack of stock.
    pub changed_items_by_inventory: Vec<CartItem>,
}

impl ReconciliationResult {
    /// Whether checkout may go ahead with the cart as it is.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.changed_items_by_inventory.is_empty() && !self.changed_cart
    }
}

/// Whether the server cart differs from the one the customer saw.
///
/// Order-independent: the carts differ if they hold a different number of
/// lines or if any `(id, quantity)` pair of `before` is missing from `after`.
#[must_use]
pub fn diff_carts(before: &Cart, after: &Cart) -> bool {
    if before.items.len() != after.items.len() {
        return true;
    }
    let after_lines: HashSet<(CartItemId, u32)> = after
        .items
        .iter()
        .map(|item| (item.id, item.quantity))
        .collect();
    before
        .items
        .iter()
        .any(|item| !after_lines.contains(&(item.id, item.quantity)))
}

/// Description of what changed, for the customer to review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub changed_cart: bool,
    pub changed_items_by_inventory: Vec<CartItem>,
}

impl From<ReconciliationResult> for Discrepancy {
    fn from(result: ReconciliationResult) -> Self {
        Self {
            changed_cart: result.changed_cart,
            changed_items_by_inventory: result.changed_items_by_inventory,
        }
    }
}

/// What the gate decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Cart unchanged; create the transaction.
    Proceed,
    /// Cart changed; the customer must review and confirm again.
    Blocked(Discrepancy),
    /// Checkout was abandoned while the check was in flight.
    Discarded,
}

/// Identifies one cart check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckAttempt {
    pub id: Uuid,
    epoch: u64,
}

/// Reconciler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilerState {
    #[default]
    Idle,
    Checking(CheckAttempt),
}

/// Invalidates in-flight checks from outside the checkout flow.
#[derive(Debug, Clone)]
pub struct AbandonHandle {
    epoch: Arc<AtomicU64>,
}

impl AbandonHandle {
    /// Discard whatever check is currently in flight.
    pub fn abandon(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Two-state checkout gate.
#[derive(Debug, Default)]
pub struct Reconciler {
    state: ReconcilerState,
    epoch: Arc<AtomicU64>,
}

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> ReconcilerState {
        self.state
    }

    /// Handle that abandons in-flight checks, e.g. on navigation.
    #[must_use]
    pub fn abandon_handle(&self) -> AbandonHandle {
        AbandonHandle {
            epoch: Arc::clone(&self.epoch),
        }
    }

    /// Abandon any in-flight check and return to `Idle`.
    pub fn abandon(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.state = ReconcilerState::Idle;
    }

    /// Enter `Checking` under a fresh attempt, superseding any previous one.
    pub fn begin(&mut self) -> CheckAttempt {
        let attempt = CheckAttempt {
            id: Uuid::new_v4(),
            epoch: self.epoch.load(Ordering::SeqCst),
        };
        self.state = ReconcilerState::Checking(attempt);
        attempt
    }

    /// Whether `attempt` is still the one the reconciler is waiting for.
    #[must_use]
    pub fn is_current(&self, attempt: CheckAttempt) -> bool {
        self.state == ReconcilerState::Checking(attempt)
            && self.epoch.load(Ordering::SeqCst) == attempt.epoch
    }

    /// Leave `Checking` and turn a reconciliation into a decision.
    ///
    /// Returns `Discarded` for an attempt that is no longer current.
    pub fn finish(&mut self, attempt: CheckAttempt, result: ReconciliationResult) -> GateDecision {
        if !self.is_current(attempt) {
            debug!(attempt = %attempt.id, "Discarding stale cart check");
            return GateDecision::Discarded;
        }
        self.state = ReconcilerState::Idle;

        if result.is_unchanged() {
            GateDecision::Proceed
        } else {
            GateDecision::Blocked(result.into())
        }
    }

    /// Check the cart against the backend and decide whether checkout may
    /// proceed.
    ///
    /// The authoritative cart replaces the local one only if the attempt is
    /// still current when the response arrives.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::ReconciliationFailed`] if the backend check
    /// fails; checkout must not proceed.
    #[instrument(skip_all, fields(cart_id = %store.cart().id))]
    pub async fn gate<B: CartBackend>(&mut self, store: &mut CartStore<B>) -> Result<GateDecision> {
        let attempt = self.begin();
        debug!(attempt = %attempt.id, "Checking cart before payment");

        let fetched = store.fetch_check().await;

        if !self.is_current(attempt) {
            debug!(attempt = %attempt.id, "Checkout abandoned during cart check");
            return Ok(GateDecision::Discarded);
        }

        let checked = match fetched {
            Ok(checked) => checked,
            Err(e) => {
                self.state = ReconcilerState::Idle;
                warn!(attempt = %attempt.id, error = %e, "Cart check failed");
                return Err(StorefrontError::ReconciliationFailed(e));
            }
        };

        let result = store.apply_check(checked);
        let decision = self.finish(attempt, result);
        match &decision {
            GateDecision::Proceed => info!(attempt = %attempt.id, "Cart unchanged, proceeding"),
            GateDecision::Blocked(d) => info!(
                attempt = %attempt.id,
                changed_cart = d.changed_cart,
                out_of_stock = d.changed_items_by_inventory.len(),
                "Cart changed since it was assembled"
            ),
            GateDecision::Discarded => {}
        }
        Ok(decision)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use envasado_core::{CartId, InventoryId, Purchasable};
    use rust_decimal::Decimal;

    use super::*;
    use crate::api::ApiError;
    use crate::cart::CheckedCart;
    use crate::cart::testing::FakeBackend;

    fn line(id: i64, inventory: i64, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            purchasable: Purchasable::Inventory(InventoryId::new(inventory)),
            name: format!("item {inventory}"),
            quantity,
            unit_price: Decimal::new(1000, 2),
        }
    }

    fn cart(items: Vec<CartItem>) -> Cart {
        Cart {
            id: CartId::new(1),
            items,
        }
    }

    #[test]
    fn test_diff_same_cart_is_unchanged() {
        let before = cart(vec![line(1, 10, 2)]);
        let after = cart(vec![line(1, 10, 2)]);
        assert!(!diff_carts(&before, &after));
    }

    #[test]
    fn test_diff_quantity_change() {
        let before = cart(vec![line(1, 10, 2)]);
        let after = cart(vec![line(1, 10, 1)]);
        assert!(diff_carts(&before, &after));
    }

    #[test]
    fn test_diff_is_order_independent() {
        let before = cart(vec![line(1, 10, 2), line(2, 11, 1)]);
        let after = cart(vec![line(2, 11, 1), line(1, 10, 2)]);
        assert!(!diff_carts(&before, &after));
    }

    #[test]
    fn test_diff_cardinality_change() {
        let before = cart(vec![line(1, 10, 2), line(2, 11, 1)]);
        let after = cart(vec![line(1, 10, 2)]);
        assert!(diff_carts(&before, &after));
    }

    #[test]
    fn test_finish_unchanged_proceeds() {
        let mut reconciler = Reconciler::new();
        let attempt = reconciler.begin();
        assert_eq!(reconciler.state(), ReconcilerState::Checking(attempt));

        let decision = reconciler.finish(
            attempt,
            ReconciliationResult {
                changed_cart: false,
                changed_items_by_inventory: vec![],
            },
        );
        assert_eq!(decision, GateDecision::Proceed);
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
    }

    #[test]
    fn test_finish_out_of_stock_blocks_even_if_cart_unchanged() {
        let mut reconciler = Reconciler::new();
        let attempt = reconciler.begin();
        let decision = reconciler.finish(
            attempt,
            ReconciliationResult {
                changed_cart: false,
                changed_items_by_inventory: vec![line(1, 10, 1)],
            },
        );
        assert!(matches!(decision, GateDecision::Blocked(_)));
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
    }

    #[test]
    fn test_superseded_attempt_is_discarded() {
        let mut reconciler = Reconciler::new();
        let first = reconciler.begin();
        let second = reconciler.begin();

        let unchanged = ReconciliationResult {
            changed_cart: false,
            changed_items_by_inventory: vec![],
        };
        assert_eq!(
            reconciler.finish(first, unchanged.clone()),
            GateDecision::Discarded
        );
        assert_eq!(reconciler.finish(second, unchanged), GateDecision::Proceed);
    }

    #[test]
    fn test_abandon_handle_discards_in_flight_attempt() {
        let mut reconciler = Reconciler::new();
        let handle = reconciler.abandon_handle();
        let attempt = reconciler.begin();
        handle.abandon();
        assert!(!reconciler.is_current(attempt));
        let decision = reconciler.finish(
            attempt,
            ReconciliationResult {
                changed_cart: false,
                changed_items_by_inventory: vec![],
            },
        );
        assert_eq!(decision, GateDecision::Discarded);
    }

    #[tokio::test]
    async fn test_gate_unchanged_cart_proceeds() {
        let backend = FakeBackend::new();
        let mut store = CartStore::new(backend.clone(), cart(vec![line(1, 10, 2)]), 10);
        let mut reconciler = Reconciler::new();

        let decision = reconciler.gate(&mut store).await.unwrap();
        assert_eq!(decision, GateDecision::Proceed);
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
    }

    #[tokio::test]
    async fn test_gate_changed_cart_blocks_and_adopts_server_cart() {
        let backend = FakeBackend::new();
        backend.push_check(Ok(CheckedCart {
            cart: cart(vec![line(1, 10, 1)]),
            changed_items_by_inventory: vec![line(1, 10, 1)],
        }));
        let mut store = CartStore::new(backend.clone(), cart(vec![line(1, 10, 2)]), 10);
        let mut reconciler = Reconciler::new();

        let decision = reconciler.gate(&mut store).await.unwrap();
        let GateDecision::Blocked(discrepancy) = decision else {
            panic!("expected blocked, got {decision:?}");
        };
        assert!(discrepancy.changed_cart);
        assert_eq!(discrepancy.changed_items_by_inventory.len(), 1);
        assert_eq!(store.total_quantity(), 1);
    }

    #[tokio::test]
    async fn test_gate_failure_blocks_checkout() {
        let backend = FakeBackend::new();
        backend.push_check(Err(ApiError::Api {
            status: 503,
            message: "maintenance".to_string(),
        }));
        let mut store = CartStore::new(backend, cart(vec![line(1, 10, 2)]), 10);
        let mut reconciler = Reconciler::new();

        let err = reconciler.gate(&mut store).await.unwrap_err();
        assert!(matches!(err, StorefrontError::ReconciliationFailed(_)));
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
        assert_eq!(store.total_quantity(), 2);
    }
}
