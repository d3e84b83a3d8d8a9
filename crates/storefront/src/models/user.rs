//! Customer and address types.
//!
//! These are validated domain objects; the UI collects raw strings and
//! calls [`CheckoutAddresses::validate`] before checkout moves on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use envasado_core::{Email, UserId};

/// The logged-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    /// Tax region code, e.g. `MD` or `IC`.
    #[serde(default)]
    pub region: Option<String>,
    /// Preferred locale for content such as reviews.
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "es".to_string()
}

impl Customer {
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

/// Why an address was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },
}

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub postal_code: String,
    pub locality: String,
    pub country: String,
}

fn check_len(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), AddressError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(AddressError::Missing { field });
    }
    if !(min..=max).contains(&len) {
        return Err(AddressError::Length { field, min, max });
    }
    Ok(())
}

impl Address {
    /// Check every field against the lengths the backend accepts.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails.
    pub fn validate(&self) -> Result<(), AddressError> {
        check_len("first name", &self.first_name, 3, 12)?;
        check_len("last name", &self.last_name, 3, 12)?;
        check_len("address", &self.address_line1, 3, 200)?;
        if let Some(line2) = self.address_line2.as_deref().filter(|l| !l.trim().is_empty()) {
            check_len("address line 2", line2, 3, 200)?;
        }
        check_len("postal code", &self.postal_code, 5, 7)?;
        check_len("locality", &self.locality, 3, 30)?;
        check_len("country", &self.country, 3, 30)?;
        Ok(())
    }
}

/// Addresses entered in the first checkout step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutAddresses {
    /// Where receipts and shipping notices go.
    pub email: Email,
    pub shipping: Address,
    pub billing: Address,
    pub same_as_shipping: bool,
}

impl CheckoutAddresses {
    /// Billing address actually in effect.
    #[must_use]
    pub const fn effective_billing(&self) -> &Address {
        if self.same_as_shipping {
            &self.shipping
        } else {
            &self.billing
        }
    }

    /// Validate the shipping address, and the billing one unless it mirrors
    /// shipping.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), AddressError> {
        self.shipping.validate()?;
        if !self.same_as_shipping {
            self.billing.validate()?;
        }
        Ok(())
    }
}
