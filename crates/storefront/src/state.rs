//! Process-wide storefront state.
//!
//! One [`AppState`] per process; every visitor gets their own [`Session`],
//! [`CartStore`] and [`CheckoutSession`] built from it.

use std::sync::Arc;

use envasado_core::{Cart, Price};
use rust_decimal::Decimal;

use crate::api::{ApiClient, ApiError};
use crate::cart::{CartBreakdown, CartStore, cart_breakdown};
use crate::checkout::{CheckoutSession, PaymentAdapter, PaymentGateway};
use crate::config::StorefrontConfig;
use crate::models::Session;

/// Shared configuration and HTTP client.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Debug)]
struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
}

impl AppState {
    /// Create the shared state.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config)?;
        Ok(Self {
            inner: Arc::new(AppStateInner { config, api }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Anonymous API client; use [`Session::api`] for the visitor's one.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Cart store for `cart`, talking to the backend as `session`.
    ///
    /// The store keeps the credentials `session` had when it was built; call
    /// [`resume_cart`](Self::resume_cart) after the visitor logs in or out.
    #[must_use]
    pub fn cart_store(&self, session: &Session, cart: Cart) -> CartStore<ApiClient> {
        CartStore::new(
            session.api(self.api()),
            cart,
            self.inner.config.max_cart_quantity,
        )
    }

    /// Point `store` at `session`'s credentials and adopt `cart`, the one
    /// the backend holds for the now logged-in customer.
    pub fn resume_cart(&self, session: &Session, store: &mut CartStore<ApiClient>, cart: Cart) {
        store.set_backend(session.api(self.api()));
        store.replace_cart(cart);
    }

    /// A fresh checkout for `session`, charging through `gateway`.
    #[must_use]
    pub fn checkout<G: PaymentGateway>(
        &self,
        session: &Session,
        gateway: G,
    ) -> CheckoutSession<G, ApiClient> {
        CheckoutSession::new(PaymentAdapter::new(gateway, session.api(self.api())))
    }

    /// VAT breakdown of `total_price` for the session's customer.
    #[must_use]
    pub fn breakdown(&self, total_price: Decimal, session: &Session) -> CartBreakdown {
        cart_breakdown(total_price, session.customer(), &self.inner.config.tax)
    }

    /// `amount` in the store currency.
    #[must_use]
    pub fn price(&self, amount: Decimal) -> Price {
        Price::new(amount, self.inner.config.currency)
    }
}
