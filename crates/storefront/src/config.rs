//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; defaults match a local development backend.
//!
//! - `STOREFRONT_BACKEND_URL` - Backend API base URL (default: `http://localhost:8000/api`)
//! - `STOREFRONT_MAX_CART_QUANTITY` - Ceiling on total units in a cart (default: 10)
//! - `STOREFRONT_CURRENCY` - ISO 4217 currency code (default: EUR)
//! - `STOREFRONT_VAT_RATE` - VAT rate included in prices, 0..1 (default: 0.21)
//! - `STOREFRONT_VAT_EXEMPT_REGIONS` - Comma-separated region codes without VAT (default: IC,CE,ML)
//! - `STOREFRONT_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `STOREFRONT_REVIEWS_CACHE_TTL_SECS` - Review page cache TTL (default: 300)
//! - `STOREFRONT_LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use envasado_core::CurrencyCode;
use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api";
const DEFAULT_MAX_CART_QUANTITY: u32 = 10;
const DEFAULT_VAT_RATE: &str = "0.21";
const DEFAULT_VAT_EXEMPT_REGIONS: &str = "IC,CE,ML";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REVIEWS_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend API base URL, always ending in `/`
    pub backend_url: Url,
    /// Maximum number of units a cart may hold
    pub max_cart_quantity: u32,
    /// Currency prices are expressed in
    pub currency: CurrencyCode,
    /// VAT rules applied to the cart breakdown
    pub tax: TaxRules,
    /// Timeout applied to every backend request
    pub request_timeout: Duration,
    /// How long a page of reviews stays cached
    pub reviews_cache_ttl: Duration,
    /// Emit JSON log lines instead of human-readable text
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// VAT rules for the cart breakdown.
///
/// Catalog prices already include VAT at `default_rate`. Customers whose
/// region is listed in `exempt_regions` pay no VAT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxRules {
    pub default_rate: Decimal,
    pub exempt_regions: Vec<String>,
}

impl TaxRules {
    /// Rate that applies to a region; `None` means the default rate.
    #[must_use]
    pub fn rate_for(&self, region: Option<&str>) -> Decimal {
        match region {
            Some(region)
                if self
                    .exempt_regions
                    .iter()
                    .any(|exempt| exempt.eq_ignore_ascii_case(region)) =>
            {
                Decimal::ZERO
            }
            _ => self.default_rate,
        }
    }
}

impl Default for TaxRules {
    fn default() -> Self {
        Self {
            default_rate: Decimal::new(21, 2),
            exempt_regions: split_list(DEFAULT_VAT_EXEMPT_REGIONS),
        }
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            backend_url: normalize_base_url(DEFAULT_BACKEND_URL)
                .unwrap_or_else(|_| unreachable!("default backend URL is valid")),
            max_cart_quantity: DEFAULT_MAX_CART_QUANTITY,
            currency: CurrencyCode::default(),
            tax: TaxRules::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            reviews_cache_ttl: Duration::from_secs(DEFAULT_REVIEWS_CACHE_TTL_SECS),
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let backend_url = normalize_base_url(&env("STOREFRONT_BACKEND_URL", DEFAULT_BACKEND_URL))
            .map_err(|e| invalid("STOREFRONT_BACKEND_URL", e))?;

        let max_cart_quantity = env(
            "STOREFRONT_MAX_CART_QUANTITY",
            &DEFAULT_MAX_CART_QUANTITY.to_string(),
        )
        .parse::<u32>()
        .map_err(|e| invalid("STOREFRONT_MAX_CART_QUANTITY", e))?;
        if max_cart_quantity == 0 {
            return Err(invalid("STOREFRONT_MAX_CART_QUANTITY", "must be greater than 0"));
        }

        let currency = env("STOREFRONT_CURRENCY", CurrencyCode::default().code())
            .parse::<CurrencyCode>()
            .map_err(|e| invalid("STOREFRONT_CURRENCY", e))?;

        let default_rate = env("STOREFRONT_VAT_RATE", DEFAULT_VAT_RATE)
            .trim()
            .parse::<Decimal>()
            .map_err(|e| invalid("STOREFRONT_VAT_RATE", e))?;
        if default_rate.is_sign_negative() || default_rate >= Decimal::ONE {
            return Err(invalid("STOREFRONT_VAT_RATE", "must be in the range 0..1"));
        }
        let tax = TaxRules {
            default_rate,
            exempt_regions: split_list(&env(
                "STOREFRONT_VAT_EXEMPT_REGIONS",
                DEFAULT_VAT_EXEMPT_REGIONS,
            )),
        };

        let request_timeout = parse_secs(
            "STOREFRONT_REQUEST_TIMEOUT_SECS",
            &env(
                "STOREFRONT_REQUEST_TIMEOUT_SECS",
                &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
            ),
        )?;
        let reviews_cache_ttl = parse_secs(
            "STOREFRONT_REVIEWS_CACHE_TTL_SECS",
            &env(
                "STOREFRONT_REVIEWS_CACHE_TTL_SECS",
                &DEFAULT_REVIEWS_CACHE_TTL_SECS.to_string(),
            ),
        )?;

        let json_logs = match env("STOREFRONT_LOG_FORMAT", "text").to_lowercase().as_str() {
            "json" => true,
            "text" => false,
            other => {
                return Err(invalid(
                    "STOREFRONT_LOG_FORMAT",
                    format!("expected 'text' or 'json', got '{other}'"),
                ));
            }
        };

        Ok(Self {
            backend_url,
            max_cart_quantity,
            currency,
            tax,
            request_timeout,
            reviews_cache_ttl,
            json_logs,
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn invalid(key: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.to_string())
}

/// Parse a base URL and make sure it ends with `/` so `Url::join` appends
/// paths instead of replacing the last segment.
fn normalize_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| invalid(key, e))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .collect()
}
