//! Backend REST API client.
//!
//! # Architecture
//!
//! - Plain JSON request/response over HTTP with `reqwest`
//! - The backend is the source of truth for stock and prices; the client
//!   keeps no local copy beyond the session's cart
//! - Authenticated with a bearer token when the customer is logged in
//! - Review pages are cached in memory via `moka`
//! - Nothing is retried here; callers surface failures to the customer
//!
//! # Example
//!
//! ```rust,ignore
//! use envasado_storefront::api::ApiClient;
//!
//! let client = ApiClient::new(&config)?.with_token(token);
//!
//! let orders = client.list_orders(0).await?;
//! let checked = client.check_cart(&cart).await?;
//! ```

mod cart;
mod orders;
mod payments;
mod reviews;
pub mod types;

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::StorefrontConfig;

pub use reviews::ReviewError;
pub use types::*;

/// Maximum number of review pages kept in memory.
const REVIEWS_CACHE_CAPACITY: u64 = 200;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Missing or rejected bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Backend-provided message, if the backend answered at all.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } | Self::Unauthorized(message) => Some(message),
            _ => None,
        }
    }
}

/// Error body returned by the backend.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: String,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront backend.
///
/// Cheap to clone; clones share the HTTP connection pool and review cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
    token: Option<SecretString>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    reviews: Cache<ReviewsQuery, Page<ProductReview>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ApiClient {
    /// Create a new unauthenticated API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let reviews = Cache::builder()
            .max_capacity(REVIEWS_CACHE_CAPACITY)
            .time_to_live(config.reviews_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.backend_url.clone(),
                reviews,
            }),
            token: None,
        })
    }

    /// A client that sends `token` as a bearer token.
    #[must_use]
    pub fn with_token(&self, token: SecretString) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            token: Some(token),
        }
    }

    /// A client that sends no credentials.
    #[must_use]
    pub fn anonymous(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            token: None,
        }
    }

    /// Whether requests carry a bearer token.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, url)).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        self.send(self.request(Method::POST, url).json(body)).await
    }

    pub(crate) async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        self.send(self.request(Method::PUT, url).json(body)).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.send(self.request(Method::DELETE, url)).await
    }

    /// Send a request and decode a JSON response.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Read the body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map_or_else(|_| body.chars().take(200).collect(), |e| e.message);
            debug!(status = %status, message = %message, "Backend returned non-success status");

            if status == StatusCode::UNAUTHORIZED {
                return Err(ApiError::Unauthorized(message));
            }
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }
}
