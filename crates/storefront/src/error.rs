//! Unified error handling with Sentry integration.
//!
//! Every cart and checkout operation returns [`Result<T>`]. The variants are
//! the user-visible failure taxonomy: none of them is fatal, none is retried
//! automatically, and each one maps to a message a UI can show as-is via
//! [`StorefrontError::user_message`].

use thiserror::Error;

use envasado_core::{CheckoutSection, Purchasable};

use crate::api::ApiError;
use crate::checkout::payment::PaymentError;
use crate::models::AddressError;

/// Which remote cart mutation was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for CartAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Storefront error type.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// The mutation would push the cart past its unit ceiling.
    #[error("Quantity limit exceeded: {requested} units requested, maximum is {max}")]
    QuantityLimitExceeded { requested: u32, max: u32 },

    /// Adding zero units.
    #[error("Quantity must be greater than zero")]
    InvalidQuantity,

    /// The referenced line is not in the cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(Purchasable),

    /// Creating, updating or deleting a cart line failed remotely. The
    /// optimistic local change has been rolled back.
    #[error("Cart item {action} failed: {source}")]
    RemoteMutationFailed {
        action: CartAction,
        #[source]
        source: ApiError,
    },

    /// The backend could not recompute the cart; checkout is blocked.
    #[error("Cart check failed: {0}")]
    ReconciliationFailed(#[source] ApiError),

    /// Payment method check or transaction failed.
    #[error("Payment failed: {0}")]
    PaymentFailed(#[from] PaymentError),

    /// Payment entry attempted without a validated address.
    #[error("A validated address is required before payment")]
    AddressRequired,

    /// Confirmation attempted without a checked payment method.
    #[error("A checked payment method is required before confirmation")]
    PaymentMethodRequired,

    /// Address failed validation.
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Operation is not valid at the current checkout stage.
    #[error("Operation requires the {expected} step, checkout is at {actual}")]
    WrongCheckoutStage {
        expected: CheckoutSection,
        actual: CheckoutSection,
    },

    /// Nothing to pay for.
    #[error("Cart is empty")]
    EmptyCart,

    /// The checkout already produced a transaction.
    #[error("Checkout already completed")]
    CheckoutCompleted,
}

impl StorefrontError {
    /// Message safe to show to the customer.
    ///
    /// Internal details (status codes, backend messages) are never exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::QuantityLimitExceeded { max, .. } => {
                format!("You can't have more than {max} units in your cart")
            }
            Self::InvalidQuantity => "Choose at least one unit".to_string(),
            Self::ItemNotInCart(_) => "That item is no longer in your cart".to_string(),
            Self::RemoteMutationFailed {
                action: CartAction::Create,
                ..
            } => "We couldn't add the item to your cart, please try again".to_string(),
            Self::RemoteMutationFailed { .. } => {
                "We couldn't update your cart, please try again".to_string()
            }
            Self::ReconciliationFailed(_) => {
                "We couldn't check your cart, please try again".to_string()
            }
            Self::PaymentFailed(err) => err.user_message().to_string(),
            Self::AddressRequired => "Enter your shipping address first".to_string(),
            Self::PaymentMethodRequired => "Choose a payment method first".to_string(),
            Self::EmptyCart => "Your cart is empty".to_string(),
            Self::InvalidAddress(err) => err.to_string(),
            Self::WrongCheckoutStage { .. } | Self::CheckoutCompleted => {
                "This checkout step is not available".to_string()
            }
        }
    }

    /// Whether the error came from the backend rather than the customer.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteMutationFailed { .. }
                | Self::ReconciliationFailed(_)
                | Self::PaymentFailed(PaymentError::Generic { .. })
        )
    }

    /// Capture remote failures to Sentry and log them.
    ///
    /// Customer-correctable errors are only logged at debug level.
    pub fn report(&self) {
        if self.is_remote() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront operation failed"
            );
        } else {
            tracing::debug!(error = %self, "Storefront operation rejected");
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a customer action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart and
/// checkout actions leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String(value.clone()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use envasado_core::InventoryId;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorefrontError::QuantityLimitExceeded {
            requested: 12,
            max: 10,
        };
        assert_eq!(
            err.to_string(),
            "Quantity limit exceeded: 12 units requested, maximum is 10"
        );

        let err = StorefrontError::ItemNotInCart(Purchasable::Inventory(InventoryId::new(4)));
        assert_eq!(err.to_string(), "Item not in cart: inventory:4");
    }

    #[test]
    fn test_user_message_hides_backend_details() {
        let err = StorefrontError::RemoteMutationFailed {
            action: CartAction::Update,
            source: ApiError::Api {
                status: 500,
                message: "SQLSTATE 23505 duplicate key".to_string(),
            },
        };
        let message = err.user_message();
        assert!(!message.contains("SQLSTATE"));
        assert!(!message.contains("500"));
    }

    #[test]
    fn test_is_remote() {
        assert!(StorefrontError::ReconciliationFailed(ApiError::RateLimited(3)).is_remote());
        assert!(!StorefrontError::InvalidQuantity.is_remote());
        assert!(!StorefrontError::PaymentFailed(PaymentError::InsufficientFunds).is_remote());
        assert!(
            StorefrontError::PaymentFailed(PaymentError::Generic {
                reason: "declined".to_string()
            })
            .is_remote()
        );
    }

    #[test]
    fn test_report_without_sentry_client_is_noop() {
        // No Sentry client is bound in tests; capture must not panic.
        StorefrontError::ReconciliationFailed(ApiError::RateLimited(1)).report();
        StorefrontError::AddressRequired.report();
    }
}
