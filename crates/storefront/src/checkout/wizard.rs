//! Checkout wizard position.
//!
//! Moves over [`CheckoutSection`] one step at a time. Once the order is
//! placed the wizard is terminal and ignores navigation.

use tracing::debug;

use envasado_core::CheckoutSection;

use crate::error::{Result, StorefrontError};

/// Position in the checkout flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutWizard {
    section: CheckoutSection,
    address_validated: bool,
    payment_checked: bool,
    completed: Option<String>,
}

impl CheckoutWizard {
    /// A wizard at [`CheckoutSection::Address`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn section(&self) -> CheckoutSection {
        self.section
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    /// Transaction id of the placed order.
    #[must_use]
    pub fn completed_transaction(&self) -> Option<&str> {
        self.completed.as_deref()
    }

    pub const fn mark_address_validated(&mut self, validated: bool) {
        self.address_validated = validated;
    }

    pub const fn mark_payment_checked(&mut self, checked: bool) {
        self.payment_checked = checked;
    }

    /// Advance one step. No-op at the last step or once completed.
    ///
    /// # Errors
    ///
    /// - [`StorefrontError::AddressRequired`] leaving `Address` without a
    ///   validated address
    /// - [`StorefrontError::PaymentMethodRequired`] leaving `Payment` without
    ///   a checked payment method
    pub fn next(&mut self) -> Result<CheckoutSection> {
        if self.is_completed() {
            return Ok(self.section);
        }
        match self.section {
            CheckoutSection::Address if !self.address_validated => {
                return Err(StorefrontError::AddressRequired);
            }
            CheckoutSection::Payment if !self.payment_checked => {
                return Err(StorefrontError::PaymentMethodRequired);
            }
            _ => {}
        }
        if let Some(next) = self.section.next() {
            debug!(from = %self.section, to = %next, "Checkout advanced");
            self.section = next;
        }
        Ok(self.section)
    }

    /// Go back one step. No-op at the first step or once completed.
    pub fn back(&mut self) -> CheckoutSection {
        if !self.is_completed()
            && let Some(previous) = self.section.previous()
        {
            debug!(from = %self.section, to = %previous, "Checkout went back");
            self.section = previous;
        }
        self.section
    }

    /// Send the customer back to pick another payment method.
    pub fn return_to_payment(&mut self) {
        if self.is_completed() {
            return;
        }
        self.section = CheckoutSection::Payment;
        self.payment_checked = false;
    }

    /// Mark the order as placed.
    pub fn complete(&mut self, transaction_id: impl Into<String>) {
        if self.is_completed() {
            return;
        }
        self.completed = Some(transaction_id.into());
    }
}
