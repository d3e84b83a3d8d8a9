//! Session state for one storefront visitor.
//!
//! Holds what the UI would otherwise keep in a global auth context: the
//! bearer token, the logged-in customer, the addresses entered at checkout,
//! and the payment client token the backend refreshes after every
//! transaction.

use secrecy::SecretString;
use tracing::info;

use super::user::{CheckoutAddresses, Customer};
use crate::api::ApiClient;
use crate::error::{clear_sentry_user, set_sentry_user};

/// Per-visitor state.
#[derive(Default)]
pub struct Session {
    token: Option<SecretString>,
    customer: Option<Customer>,
    addresses: Option<CheckoutAddresses>,
    payment_client_token: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("customer", &self.customer.as_ref().map(|c| c.id))
            .field("has_addresses", &self.addresses.is_some())
            .field(
                "payment_client_token",
                &self.payment_client_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Session {
    /// An anonymous session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a logged-in customer and their bearer token.
    pub fn log_in(&mut self, token: SecretString, customer: Customer) {
        set_sentry_user(&customer.id, Some(customer.email.as_str()));
        info!(user_id = %customer.id, "Customer logged in");
        self.token = Some(token);
        self.customer = Some(customer);
    }

    /// Forget the customer and everything entered for them.
    pub fn log_out(&mut self) {
        if let Some(customer) = self.customer.take() {
            info!(user_id = %customer.id, "Customer logged out");
        }
        clear_sentry_user();
        *self = Self::default();
    }

    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub const fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    /// Locale for content requests, `es` when anonymous.
    #[must_use]
    pub fn locale(&self) -> &str {
        self.customer.as_ref().map_or("es", |c| c.locale.as_str())
    }

    #[must_use]
    pub const fn addresses(&self) -> Option<&CheckoutAddresses> {
        self.addresses.as_ref()
    }

    /// Record addresses that have already been validated.
    pub fn set_addresses(&mut self, addresses: CheckoutAddresses) {
        self.addresses = Some(addresses);
    }

    #[must_use]
    pub fn payment_client_token(&self) -> Option<&str> {
        self.payment_client_token.as_deref()
    }

    pub fn set_payment_client_token(&mut self, token: Option<String>) {
        if token.is_some() {
            self.payment_client_token = token;
        }
    }

    /// API client carrying this session's credentials.
    #[must_use]
    pub fn api(&self, client: &ApiClient) -> ApiClient {
        match &self.token {
            Some(token) => client.with_token(token.clone()),
            None => client.anonymous(),
        }
    }
}
