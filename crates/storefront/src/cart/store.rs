//! The cart store.
//!
//! Sole owner of the session's [`Cart`]. Every mutation is applied locally
//! first so the UI updates immediately, then persisted through the
//! [`CartBackend`]. If the backend rejects it, the cart is restored to the
//! snapshot taken before the mutation.

use envasado_core::{Cart, CartItem, CartItemId, Purchasable};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::reconcile::{ReconciliationResult, diff_carts};
use super::{CartBackend, CartSummary, CheckedCart};
use crate::api::ApiError;
use crate::error::{CartAction, Result, StorefrontError, add_breadcrumb};

/// Result of [`CartStore::update_item_quantity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Same quantity and not forced; nothing was sent.
    Unchanged,
    /// Quantity persisted.
    Updated(CartItem),
    /// Quantity was zero; the line was deleted.
    Removed,
}

/// Owns the cart and keeps it in step with the backend.
pub struct CartStore<B> {
    backend: B,
    cart: Cart,
    max_quantity: u32,
    revision: u64,
    summary_tx: watch::Sender<CartSummary>,
}

impl<B> std::fmt::Debug for CartStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("cart", &self.cart)
            .field("max_quantity", &self.max_quantity)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl<B: CartBackend> CartStore<B> {
    /// Take ownership of `cart`, limiting it to `max_quantity` units.
    pub fn new(backend: B, cart: Cart, max_quantity: u32) -> Self {
        let (summary_tx, _) = watch::channel(CartSummary::of(&cart, 0));
        Self {
            backend,
            cart,
            max_quantity,
            revision: 0,
            summary_tx,
        }
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.cart.total_quantity()
    }

    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.cart.total_price()
    }

    #[must_use]
    pub const fn max_quantity(&self) -> u32 {
        self.max_quantity
    }

    /// Number of local changes, rollbacks and reconciliations so far.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Current totals.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        self.summary_tx.borrow().clone()
    }

    /// Receive a new [`CartSummary`] after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSummary> {
        self.summary_tx.subscribe()
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Talk to the backend through `backend` from now on, e.g. with the
    /// customer's token after login.
    pub fn set_backend(&mut self, backend: B) {
        self.backend = backend;
    }

    /// Replace the whole cart, e.g. with one loaded after login.
    pub fn replace_cart(&mut self, cart: Cart) {
        self.cart = cart;
        self.publish();
    }

    /// Drop every line locally once the backend has turned them into an
    /// order.
    pub fn clear_items(&mut self) {
        if self.cart.items.is_empty() {
            return;
        }
        self.cart.items.clear();
        self.publish();
    }

    fn publish(&mut self) {
        self.revision += 1;
        self.summary_tx
            .send_replace(CartSummary::of(&self.cart, self.revision));
    }

    fn rollback(&mut self, snapshot: Cart, action: CartAction, source: ApiError) -> StorefrontError {
        warn!(cart_id = %self.cart.id, %action, error = %source, "Cart mutation failed, rolling back");
        self.cart = snapshot;
        self.publish();
        StorefrontError::RemoteMutationFailed { action, source }
    }

    fn line_mut(&mut self, purchasable: &Purchasable) -> Option<&mut CartItem> {
        self.cart
            .items
            .iter_mut()
            .find(|item| item.purchasable == *purchasable)
    }

    fn take_line(&mut self, purchasable: &Purchasable) -> Option<CartItem> {
        let index = self.cart.position(purchasable)?;
        Some(self.cart.items.remove(index))
    }

    fn check_ceiling(&self, requested: u32) -> Result<()> {
        if requested > self.max_quantity {
            return Err(StorefrontError::QuantityLimitExceeded {
                requested,
                max: self.max_quantity,
            });
        }
        Ok(())
    }

    /// Add `quantity` units of `purchasable`.
    ///
    /// Merges into an existing line for the same purchasable, keeping that
    /// line's price snapshot; otherwise appends a new line and adopts the id
    /// the backend assigns.
    ///
    /// # Errors
    ///
    /// - [`StorefrontError::InvalidQuantity`] for zero units
    /// - [`StorefrontError::QuantityLimitExceeded`] past the cart ceiling;
    ///   the cart is untouched
    /// - [`StorefrontError::RemoteMutationFailed`] if the backend rejects the
    ///   change; the cart is rolled back
    #[instrument(skip(self, name, unit_price), fields(cart_id = %self.cart.id, item = %purchasable))]
    pub async fn add_item(
        &mut self,
        purchasable: Purchasable,
        name: impl Into<String> + Send,
        unit_price: Decimal,
        quantity: u32,
    ) -> Result<CartItem> {
        if quantity == 0 {
            return Err(StorefrontError::InvalidQuantity);
        }
        self.check_ceiling(self.total_quantity().saturating_add(quantity))?;

        add_breadcrumb(
            "cart",
            "Add item",
            &[
                ("item", purchasable.to_string()),
                ("quantity", quantity.to_string()),
            ],
        );

        let snapshot = self.cart.clone();
        let cart_id = self.cart.id;

        let merged = self.line_mut(&purchasable).map(|line| {
            line.quantity = line.quantity.saturating_add(quantity);
            line.clone()
        });
        if let Some(pending) = merged {
            self.publish();

            return match self.backend.update_item(cart_id, &pending).await {
                Ok(saved) => {
                    debug!(item_id = %pending.id, quantity = pending.quantity, "Cart line incremented");
                    Ok(saved)
                }
                Err(e) => Err(self.rollback(snapshot, CartAction::Update, e)),
            };
        }

        let pending = CartItem::new(purchasable, name, quantity, unit_price);
        self.cart.items.push(pending.clone());
        self.publish();

        match self.backend.create_item(cart_id, &pending).await {
            Ok(saved) => {
                if let Some(line) = self.line_mut(&purchasable) {
                    line.id = saved.id;
                }
                info!(item_id = %saved.id, quantity, "Cart line created");
                Ok(CartItem {
                    id: saved.id,
                    ..pending
                })
            }
            Err(e) => Err(self.rollback(snapshot, CartAction::Create, e)),
        }
    }

    /// Set the quantity of the line for `purchasable`.
    ///
    /// An unchanged quantity is a no-op unless `force_update` is set.
    /// Zero deletes the line.
    ///
    /// # Errors
    ///
    /// - [`StorefrontError::ItemNotInCart`] if there is no such line
    /// - [`StorefrontError::QuantityLimitExceeded`] if raising the quantity
    ///   would pass the ceiling; lowering is always allowed
    /// - [`StorefrontError::RemoteMutationFailed`] if the backend rejects the
    ///   change; the cart is rolled back
    #[instrument(skip(self), fields(cart_id = %self.cart.id, item = %purchasable))]
    pub async fn update_item_quantity(
        &mut self,
        purchasable: &Purchasable,
        quantity: u32,
        force_update: bool,
    ) -> Result<UpdateOutcome> {
        let current = self
            .cart
            .item(purchasable)
            .ok_or(StorefrontError::ItemNotInCart(*purchasable))?
            .quantity;

        if current == quantity && !force_update {
            return Ok(UpdateOutcome::Unchanged);
        }
        if quantity > current {
            let requested = self
                .total_quantity()
                .saturating_sub(current)
                .saturating_add(quantity);
            self.check_ceiling(requested)?;
        }

        add_breadcrumb(
            "cart",
            "Update quantity",
            &[
                ("item", purchasable.to_string()),
                ("from", current.to_string()),
                ("to", quantity.to_string()),
            ],
        );

        let snapshot = self.cart.clone();
        let cart_id = self.cart.id;

        if quantity == 0 {
            let removed = self
                .take_line(purchasable)
                .ok_or(StorefrontError::ItemNotInCart(*purchasable))?;
            self.publish();
            return match self.backend.delete_item(cart_id, &removed).await {
                Ok(()) => {
                    info!(item_id = %removed.id, "Cart line removed");
                    Ok(UpdateOutcome::Removed)
                }
                Err(e) => Err(self.rollback(snapshot, CartAction::Delete, e)),
            };
        }

        let pending = self
            .line_mut(purchasable)
            .map(|line| {
                line.quantity = quantity;
                line.clone()
            })
            .ok_or(StorefrontError::ItemNotInCart(*purchasable))?;
        self.publish();

        match self.backend.update_item(cart_id, &pending).await {
            Ok(saved) => {
                debug!(item_id = %pending.id, quantity, "Cart line updated");
                Ok(UpdateOutcome::Updated(saved))
            }
            Err(e) => Err(self.rollback(snapshot, CartAction::Update, e)),
        }
    }

    /// Ask the backend to recompute the current cart without applying it.
    pub(crate) async fn fetch_check(&self) -> std::result::Result<CheckedCart, ApiError> {
        self.backend.check_cart(&self.cart).await
    }

    /// Adopt the backend's cart and report what changed.
    pub(crate) fn apply_check(&mut self, checked: CheckedCart) -> ReconciliationResult {
        let changed_cart = diff_carts(&self.cart, &checked.cart);
        if changed_cart {
            info!(
                cart_id = %self.cart.id,
                before = self.cart.items.len(),
                after = checked.cart.items.len(),
                "Backend cart differs from local cart"
            );
        }
        self.cart = checked.cart;
        self.publish();
        ReconciliationResult {
            changed_cart,
            changed_items_by_inventory: checked.changed_items_by_inventory,
        }
    }

    /// Replace the cart with the backend's recomputation.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::ReconciliationFailed`] if the check fails;
    /// the local cart is left as it was.
    #[instrument(skip(self), fields(cart_id = %self.cart.id))]
    pub async fn check_cart(&mut self) -> Result<ReconciliationResult> {
        let checked = self
            .fetch_check()
            .await
            .map_err(StorefrontError::ReconciliationFailed)?;
        Ok(self.apply_check(checked))
    }

    /// Whether every line has been persisted by the backend.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.cart
            .items
            .iter()
            .all(|item| item.id != CartItemId::UNSAVED)
    }
}
