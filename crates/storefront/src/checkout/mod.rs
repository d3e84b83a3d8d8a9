//! Checkout orchestration.
//!
//! [`CheckoutSession`] drives one checkout from address entry to a placed
//! order. It owns the wizard, the reconciler and the payment adapter, and
//! borrows the cart store and visitor session for each call.
//!
//! # Flow
//!
//! ```text
//! Address --submit_addresses/next--> Payment --select_payment_method/next-->
//! Confirmation (cart checked, advisory) --place_order-->
//!     gate: Blocked   -> stay on Confirmation, show what changed
//!     gate: Proceed   -> create_transaction
//!                          failed    -> back to Payment
//!                          succeeded -> completed
//! ```

pub mod payment;
pub mod wizard;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use envasado_core::CheckoutSection;

use crate::cart::{AbandonHandle, CartBackend, CartStore, Discrepancy, GateDecision, Reconciler};
use crate::error::{Result, StorefrontError, add_breadcrumb};
use crate::models::{CheckoutAddresses, Session};

pub use payment::{
    CheckedPayment, GatewayError, PaymentAdapter, PaymentBackend, PaymentError, PaymentGateway,
    PaymentNonce, SelectedPaymentMethod, Transaction,
};
pub use wizard::CheckoutWizard;

/// Result of moving forward in the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub section: CheckoutSection,
    /// Cart changes found on entering confirmation.
    pub discrepancy: Option<Discrepancy>,
}

/// Result of [`CheckoutSession::place_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOrderOutcome {
    /// Charged; holds the transaction id.
    Completed(String),
    /// The cart changed; the customer must review it and confirm again.
    CartChanged(Discrepancy),
    /// Checkout was abandoned while the cart was being checked.
    Abandoned,
}

/// One checkout in progress.
#[derive(Debug)]
pub struct CheckoutSession<G, P> {
    wizard: CheckoutWizard,
    reconciler: Reconciler,
    payment: PaymentAdapter<G, P>,
    checked_payment: Option<CheckedPayment>,
}

impl<G: PaymentGateway, P: PaymentBackend> CheckoutSession<G, P> {
    pub fn new(payment: PaymentAdapter<G, P>) -> Self {
        Self {
            wizard: CheckoutWizard::new(),
            reconciler: Reconciler::new(),
            payment,
            checked_payment: None,
        }
    }

    #[must_use]
    pub const fn wizard(&self) -> &CheckoutWizard {
        &self.wizard
    }

    #[must_use]
    pub const fn section(&self) -> CheckoutSection {
        self.wizard.section()
    }

    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    #[must_use]
    pub const fn checked_payment(&self) -> Option<&CheckedPayment> {
        self.checked_payment.as_ref()
    }

    /// Handle for abandoning in-flight cart checks from elsewhere, e.g. a
    /// navigation hook.
    #[must_use]
    pub fn abandon_handle(&self) -> AbandonHandle {
        self.reconciler.abandon_handle()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.wizard.is_completed() {
            return Err(StorefrontError::CheckoutCompleted);
        }
        Ok(())
    }

    fn ensure_section(&self, expected: CheckoutSection) -> Result<()> {
        self.ensure_open()?;
        let actual = self.wizard.section();
        if actual != expected {
            return Err(StorefrontError::WrongCheckoutStage { expected, actual });
        }
        Ok(())
    }

    /// Validate and record the checkout addresses.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::InvalidAddress`]; the wizard then cannot
    /// leave the address step.
    pub fn submit_addresses(
        &mut self,
        session: &mut Session,
        addresses: CheckoutAddresses,
    ) -> Result<()> {
        self.ensure_open()?;
        if let Err(e) = addresses.validate() {
            self.wizard.mark_address_validated(false);
            return Err(e.into());
        }
        add_breadcrumb(
            "checkout",
            "Addresses submitted",
            &[
                ("shipping_country", addresses.shipping.country.clone()),
                (
                    "billing_country",
                    addresses.effective_billing().country.clone(),
                ),
            ],
        );
        session.set_addresses(addresses);
        self.wizard.mark_address_validated(true);
        Ok(())
    }

    /// Advance one step.
    ///
    /// Entering confirmation checks the cart so the customer reviews what
    /// they are about to pay for. Changes found here are reported, not
    /// blocking; [`place_order`](Self::place_order) checks again.
    ///
    /// # Errors
    ///
    /// - navigation errors from [`CheckoutWizard::next`]
    /// - [`StorefrontError::ReconciliationFailed`] if the cart check fails;
    ///   the wizard stays on payment
    #[instrument(skip_all, fields(from = %self.wizard.section()))]
    pub async fn next<B: CartBackend>(&mut self, store: &mut CartStore<B>) -> Result<Advance> {
        let from = self.wizard.section();
        let section = self.wizard.next()?;

        if section != CheckoutSection::Confirmation || from == CheckoutSection::Confirmation {
            return Ok(Advance {
                section,
                discrepancy: None,
            });
        }

        match self.reconciler.gate(store).await {
            Ok(GateDecision::Blocked(discrepancy)) => Ok(Advance {
                section,
                discrepancy: Some(discrepancy),
            }),
            Ok(GateDecision::Proceed | GateDecision::Discarded) => Ok(Advance {
                section,
                discrepancy: None,
            }),
            Err(e) => {
                self.wizard.back();
                Err(e)
            }
        }
    }

    /// Go back one step, abandoning any in-flight cart check.
    pub fn back(&mut self) -> CheckoutSection {
        self.reconciler.abandon();
        self.wizard.back()
    }

    /// Check the payment method picked in the payment step.
    ///
    /// # Errors
    ///
    /// - [`StorefrontError::WrongCheckoutStage`] outside the payment step
    /// - [`StorefrontError::PaymentFailed`] if the gateway rejects it
    #[instrument(skip_all, fields(kind = %method.kind))]
    pub async fn select_payment_method(
        &mut self,
        method: &SelectedPaymentMethod,
    ) -> Result<&CheckedPayment> {
        self.ensure_section(CheckoutSection::Payment)?;
        self.checked_payment = None;
        self.wizard.mark_payment_checked(false);

        let checked = self.payment.check_payment_method(method).await?;
        add_breadcrumb(
            "checkout",
            "Payment method checked",
            &[("kind", checked.kind.to_string())],
        );
        self.wizard.mark_payment_checked(true);
        Ok(&*self.checked_payment.insert(checked))
    }

    /// Place the order.
    ///
    /// The cart is checked against the backend first; nothing is charged
    /// unless it is unchanged. After a successful charge the local cart is
    /// emptied and the session gets the refreshed payment client token.
    ///
    /// # Errors
    ///
    /// - [`StorefrontError::WrongCheckoutStage`] outside confirmation
    /// - [`StorefrontError::CheckoutCompleted`] if already placed
    /// - [`StorefrontError::PaymentMethodRequired`] without a checked method
    /// - [`StorefrontError::EmptyCart`] if there is nothing to pay for
    /// - [`StorefrontError::ReconciliationFailed`] if the cart check fails
    /// - [`StorefrontError::PaymentFailed`] if the charge fails; the wizard is
    ///   back on the payment step
    #[instrument(skip_all, fields(cart_id = %store.cart().id))]
    pub async fn place_order<B: CartBackend>(
        &mut self,
        store: &mut CartStore<B>,
        session: &mut Session,
    ) -> Result<PlaceOrderOutcome> {
        self.ensure_section(CheckoutSection::Confirmation)?;
        let payment = self
            .checked_payment
            .clone()
            .ok_or(StorefrontError::PaymentMethodRequired)?;
        if store.cart().is_empty() || store.total_price() <= Decimal::ZERO {
            return Err(StorefrontError::EmptyCart);
        }

        match self.reconciler.gate(store).await? {
            GateDecision::Proceed => {}
            GateDecision::Blocked(discrepancy) => {
                return Ok(PlaceOrderOutcome::CartChanged(discrepancy));
            }
            GateDecision::Discarded => return Ok(PlaceOrderOutcome::Abandoned),
        }

        add_breadcrumb(
            "checkout",
            "Placing order",
            &[
                ("kind", payment.kind.to_string()),
                ("total", store.total_price().to_string()),
            ],
        );

        match self.payment.create_transaction(&payment).await {
            Ok(transaction) => {
                info!(
                    transaction_id = %transaction.transaction_id,
                    "Order placed"
                );
                session.set_payment_client_token(transaction.client_token);
                store.clear_items();
                self.checked_payment = None;
                self.wizard.complete(transaction.transaction_id.clone());
                Ok(PlaceOrderOutcome::Completed(transaction.transaction_id))
            }
            Err(e) => {
                warn!(error = %e, "Order payment failed, returning to payment step");
                self.checked_payment = None;
                self.wizard.return_to_payment();
                Err(StorefrontError::PaymentFailed(e))
            }
        }
    }

    /// Leave checkout, discarding any in-flight cart check.
    pub fn abandon(&mut self) {
        self.reconciler.abandon();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use envasado_core::{
        Cart, CartId, CartItem, CartItemId, Email, InventoryId, PaymentMethodKind, Purchasable,
    };
    use rust_decimal::Decimal;

    use super::payment::testing::{FakeGateway, FakePaymentBackend};
    use super::*;
    use crate::api::ApiError;
    use crate::cart::CheckedCart;
    use crate::cart::testing::{Call, FakeBackend};
    use crate::models::Address;

    type TestCheckout = CheckoutSession<FakeGateway, FakePaymentBackend>;

    struct Harness {
        cart_backend: FakeBackend,
        payments: FakePaymentBackend,
        store: CartStore<FakeBackend>,
        session: Session,
        checkout: TestCheckout,
    }

    fn harness() -> Harness {
        let cart_backend = FakeBackend::new();
        let cart = Cart {
            id: CartId::new(1),
            items: vec![CartItem {
                id: CartItemId::new(1),
                purchasable: Purchasable::Inventory(InventoryId::new(10)),
                name: "Vacuum sealer".to_string(),
                quantity: 2,
                unit_price: Decimal::new(2250, 2),
            }],
        };
        let store = CartStore::new(cart_backend.clone(), cart, 10);
        let payments = FakePaymentBackend::default();
        let checkout = CheckoutSession::new(PaymentAdapter::new(
            FakeGateway::default(),
            payments.clone(),
        ));
        Harness {
            cart_backend,
            payments,
            store,
            session: Session::new(),
            checkout,
        }
    }

    fn addresses() -> CheckoutAddresses {
        CheckoutAddresses {
            email: Email::parse("lucia@example.es").unwrap(),
            shipping: Address {
                first_name: "Lucia".to_string(),
                last_name: "Moreno".to_string(),
                address_line1: "Calle Mayor 1".to_string(),
                address_line2: None,
                postal_code: "28013".to_string(),
                locality: "Madrid".to_string(),
                country: "Spain".to_string(),
            },
            billing: Address::default(),
            same_as_shipping: true,
        }
    }

    fn card() -> SelectedPaymentMethod {
        SelectedPaymentMethod {
            kind: PaymentMethodKind::Card,
            remember: false,
        }
    }

    async fn to_confirmation(h: &mut Harness) {
        h.checkout
            .submit_addresses(&mut h.session, addresses())
            .unwrap();
        h.checkout.next(&mut h.store).await.unwrap();
        h.checkout.select_payment_method(&card()).await.unwrap();
        let advance = h.checkout.next(&mut h.store).await.unwrap();
        assert_eq!(advance.section, CheckoutSection::Confirmation);
    }

    fn checks(backend: &FakeBackend) -> usize {
        backend
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Check(_)))
            .count()
    }

    #[tokio::test]
    async fn test_invalid_address_blocks_payment_step() {
        let mut h = harness();
        let mut bad = addresses();
        bad.shipping.postal_code = String::new();

        let err = h
            .checkout
            .submit_addresses(&mut h.session, bad)
            .unwrap_err();
        assert!(matches!(err, StorefrontError::InvalidAddress(_)));
        assert!(matches!(
            h.checkout.next(&mut h.store).await,
            Err(StorefrontError::AddressRequired)
        ));
        assert!(h.session.addresses().is_none());
    }

    #[tokio::test]
    async fn test_payment_method_only_in_payment_step() {
        let mut h = harness();
        let err = h.checkout.select_payment_method(&card()).await.unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::WrongCheckoutStage {
                expected: CheckoutSection::Payment,
                actual: CheckoutSection::Address
            }
        ));
    }

    #[tokio::test]
    async fn test_entering_confirmation_checks_cart() {
        let mut h = harness();
        to_confirmation(&mut h).await;
        assert_eq!(checks(&h.cart_backend), 1);
    }

    #[tokio::test]
    async fn test_place_order_success() {
        let mut h = harness();
        to_confirmation(&mut h).await;

        let outcome = h
            .checkout
            .place_order(&mut h.store, &mut h.session)
            .await
            .unwrap();

        assert_eq!(outcome, PlaceOrderOutcome::Completed("tx_1".to_string()));
        assert!(h.checkout.wizard().is_completed());
        assert_eq!(h.checkout.wizard().completed_transaction(), Some("tx_1"));
        assert_eq!(h.session.payment_client_token(), Some("client_token_1"));
        assert!(h.store.cart().is_empty());
        assert_eq!(checks(&h.cart_backend), 2);
    }

    #[tokio::test]
    async fn test_changed_cart_blocks_before_charging() {
        let mut h = harness();
        to_confirmation(&mut h).await;

        let mut server = h.store.cart().clone();
        server.items[0].quantity = 1;
        h.cart_backend.push_check(Ok(CheckedCart {
            cart: server,
            changed_items_by_inventory: vec![],
        }));

        let outcome = h
            .checkout
            .place_order(&mut h.store, &mut h.session)
            .await
            .unwrap();

        let PlaceOrderOutcome::CartChanged(discrepancy) = outcome else {
            panic!("expected cart change, got {outcome:?}");
        };
        assert!(discrepancy.changed_cart);
        assert!(h.payments.charged().is_empty());
        assert_eq!(h.checkout.section(), CheckoutSection::Confirmation);
        assert!(!h.checkout.wizard().is_completed());
        assert_eq!(h.store.total_quantity(), 1);
    }

    #[tokio::test]
    async fn test_failed_check_blocks_before_charging() {
        let mut h = harness();
        to_confirmation(&mut h).await;
        h.cart_backend.push_check(Err(ApiError::RateLimited(1)));

        let err = h
            .checkout
            .place_order(&mut h.store, &mut h.session)
            .await
            .unwrap_err();

        assert!(matches!(err, StorefrontError::ReconciliationFailed(_)));
        assert!(h.payments.charged().is_empty());
    }

    #[tokio::test]
    async fn test_payment_failure_returns_to_payment_step() {
        let mut h = harness();
        to_confirmation(&mut h).await;
        h.payments.push(Err(ApiError::Api {
            status: 402,
            message: "Insufficient Funds".to_string(),
        }));

        let err = h
            .checkout
            .place_order(&mut h.store, &mut h.session)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorefrontError::PaymentFailed(PaymentError::InsufficientFunds)
        ));
        assert_eq!(h.checkout.section(), CheckoutSection::Payment);
        assert!(h.checkout.checked_payment().is_none());
        assert!(!h.store.cart().is_empty());
    }

    #[tokio::test]
    async fn test_completed_checkout_rejects_second_order() {
        let mut h = harness();
        to_confirmation(&mut h).await;
        h.checkout
            .place_order(&mut h.store, &mut h.session)
            .await
            .unwrap();

        let err = h
            .checkout
            .place_order(&mut h.store, &mut h.session)
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::CheckoutCompleted));
        assert_eq!(h.payments.charged().len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_outside_confirmation() {
        let mut h = harness();
        let err = h
            .checkout
            .place_order(&mut h.store, &mut h.session)
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::WrongCheckoutStage { .. }));
        assert!(h.cart_backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_is_never_charged() {
        let mut h = harness();
        h.store = CartStore::new(h.cart_backend.clone(), Cart::new(CartId::new(1)), 10);
        to_confirmation(&mut h).await;
        let checks_before = checks(&h.cart_backend);

        let err = h
            .checkout
            .place_order(&mut h.store, &mut h.session)
            .await
            .unwrap_err();

        assert!(matches!(err, StorefrontError::EmptyCart));
        assert_eq!(err.user_message(), "Your cart is empty");
        assert!(h.payments.charged().is_empty());
        assert_eq!(checks(&h.cart_backend), checks_before);
        assert_eq!(h.checkout.section(), CheckoutSection::Confirmation);
        assert!(!h.checkout.wizard().is_completed());
    }
}
