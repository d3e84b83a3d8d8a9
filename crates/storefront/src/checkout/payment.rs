//! Payment adapter.
//!
//! Two seams meet here:
//!
//! - [`PaymentGateway`]: the payment provider's client SDK, which turns the
//!   method the customer picked into a single-use [`PaymentNonce`]
//! - [`PaymentBackend`]: the storefront backend, which charges the nonce and
//!   creates the order
//!
//! Neither step is retried. A failed charge is classified into a
//! [`PaymentError`] the customer can act on.

use std::future::Future;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use envasado_core::PaymentMethodKind;

use crate::api::ApiError;

/// Backend message fragment identifying a declined-for-funds charge.
const INSUFFICIENT_FUNDS: &str = "Insufficient Funds";

/// Single-use token standing in for the customer's payment details.
#[derive(Clone)]
pub struct PaymentNonce(SecretString);

impl PaymentNonce {
    #[must_use]
    pub fn new(nonce: impl Into<String>) -> Self {
        Self(SecretString::from(nonce.into()))
    }

    /// Raw nonce, for the transaction request body only.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for PaymentNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PaymentNonce([REDACTED])")
    }
}

/// What the customer picked in the payment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPaymentMethod {
    pub kind: PaymentMethodKind,
    /// Ask the provider to vault the method for next time.
    pub remember: bool,
}

/// A payment method the gateway accepted and tokenized.
#[derive(Debug, Clone)]
pub struct CheckedPayment {
    pub kind: PaymentMethodKind,
    pub nonce: PaymentNonce,
    /// Short description for the confirmation step, e.g. `Visa ending 1111`.
    pub description: Option<String>,
}

/// Result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    /// Fresh client token for the payment SDK.
    #[serde(rename = "braintreeToken", default)]
    pub client_token: Option<String>,
}

/// Failure reported by the payment SDK while tokenizing.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment method rejected: {0}")]
    Rejected(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Why a payment did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("payment failed: {reason}")]
    Generic { reason: String },
}

impl PaymentError {
    /// Classify a failed transaction request by the backend's message.
    #[must_use]
    pub fn classify(error: &ApiError) -> Self {
        match error.backend_message() {
            Some(message) if message.contains(INSUFFICIENT_FUNDS) => Self::InsufficientFunds,
            _ => Self::Generic {
                reason: error.to_string(),
            },
        }
    }

    /// Message safe to show to the customer.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InsufficientFunds => "Payment declined: insufficient funds",
            Self::Generic { .. } => {
                "Payment failed, check your details or choose a different payment method"
            }
        }
    }
}

/// Client-side payment SDK.
pub trait PaymentGateway {
    /// Validate `method` with the provider and obtain a nonce for it.
    fn tokenize(
        &self,
        method: &SelectedPaymentMethod,
    ) -> impl Future<Output = Result<CheckedPayment, GatewayError>> + Send;
}

/// Backend endpoint that charges a nonce.
///
/// Implemented by [`ApiClient`](crate::api::ApiClient) over HTTP.
pub trait PaymentBackend {
    fn create_transaction(
        &self,
        nonce: &PaymentNonce,
    ) -> impl Future<Output = Result<Transaction, ApiError>> + Send;
}

/// Ties the gateway and the backend together.
#[derive(Debug, Clone)]
pub struct PaymentAdapter<G, P> {
    gateway: G,
    backend: P,
}

impl<G: PaymentGateway, P: PaymentBackend> PaymentAdapter<G, P> {
    pub const fn new(gateway: G, backend: P) -> Self {
        Self { gateway, backend }
    }

    pub const fn backend(&self) -> &P {
        &self.backend
    }

    /// Tokenize the selected method before anything is charged.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Generic`] if the gateway rejects the method.
    #[instrument(skip(self), fields(kind = %method.kind))]
    pub async fn check_payment_method(
        &self,
        method: &SelectedPaymentMethod,
    ) -> Result<CheckedPayment, PaymentError> {
        self.gateway.tokenize(method).await.map_err(|e| {
            warn!(error = %e, "Payment method check failed");
            PaymentError::Generic {
                reason: e.to_string(),
            }
        })
    }

    /// Charge a checked payment and create the order.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InsufficientFunds`] when the backend says so,
    /// [`PaymentError::Generic`] for any other failure.
    #[instrument(skip(self, payment), fields(kind = %payment.kind))]
    pub async fn create_transaction(
        &self,
        payment: &CheckedPayment,
    ) -> Result<Transaction, PaymentError> {
        match self.backend.create_transaction(&payment.nonce).await {
            Ok(transaction) => {
                info!(transaction_id = %transaction.transaction_id, "Transaction created");
                Ok(transaction)
            }
            Err(e) => {
                let classified = PaymentError::classify(&e);
                warn!(error = %e, classified = %classified, "Transaction failed");
                Err(classified)
            }
        }
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::testing::{FakeGateway, FakePaymentBackend};
    use super::*;

    fn card() -> SelectedPaymentMethod {
        SelectedPaymentMethod {
            kind: PaymentMethodKind::Card,
            remember: false,
        }
    }

    fn declined(message: &str) -> ApiError {
        ApiError::Api {
            status: 402,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_classify_insufficient_funds() {
        assert_eq!(
            PaymentError::classify(&declined("Processor declined: Insufficient Funds")),
            PaymentError::InsufficientFunds
        );
    }

    #[test]
    fn test_classify_everything_else_is_generic() {
        assert!(matches!(
            PaymentError::classify(&declined("Card type not accepted")),
            PaymentError::Generic { .. }
        ));
        assert!(matches!(
            PaymentError::classify(&ApiError::RateLimited(3)),
            PaymentError::Generic { .. }
        ));
    }

    #[test]
    fn test_transaction_wire_shape() {
        let json = r#"{"transactionId":"tx_9","braintreeToken":"ct_1"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.transaction_id, "tx_9");
        assert_eq!(tx.client_token.as_deref(), Some("ct_1"));
    }

    #[test]
    fn test_nonce_debug_is_redacted() {
        let nonce = PaymentNonce::new("nonce-secret");
        assert!(!format!("{nonce:?}").contains("nonce-secret"));
        assert_eq!(nonce.expose(), "nonce-secret");
    }

    #[tokio::test]
    async fn test_check_payment_method() {
        let adapter = PaymentAdapter::new(FakeGateway::default(), FakePaymentBackend::default());
        let checked = adapter.check_payment_method(&card()).await.unwrap();
        assert_eq!(checked.kind, PaymentMethodKind::Card);
    }

    #[tokio::test]
    async fn test_rejected_method_is_generic_failure() {
        let gateway = FakeGateway::default();
        gateway.reject(true);
        let adapter = PaymentAdapter::new(gateway, FakePaymentBackend::default());
        let err = adapter.check_payment_method(&card()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Generic { .. }));
    }

    #[tokio::test]
    async fn test_create_transaction_classifies_failure() {
        let backend = FakePaymentBackend::default();
        backend.push(Err(declined("Insufficient Funds")));
        let adapter = PaymentAdapter::new(FakeGateway::default(), backend.clone());
        let checked = adapter.check_payment_method(&card()).await.unwrap();

        let err = adapter.create_transaction(&checked).await.unwrap_err();
        assert_eq!(err, PaymentError::InsufficientFunds);
        assert_eq!(backend.charged().len(), 1);
    }
}
