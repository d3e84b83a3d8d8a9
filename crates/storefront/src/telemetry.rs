//! Logging and error reporting setup.
//!
//! Call [`init`] once, as early as possible, from the application that
//! embeds the storefront core. Sentry must be initialized before the
//! tracing subscriber so the Sentry layer finds a bound client.

use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::StorefrontConfig;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "envasado_storefront=info";

/// Keeps Sentry flushing until dropped.
#[must_use = "dropping the guard stops Sentry from sending events"]
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Install Sentry (when a DSN is configured) and the global tracing
/// subscriber.
///
/// Output is JSON when `STOREFRONT_LOG_FORMAT=json`, human-readable
/// otherwise.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init(config: &StorefrontConfig) -> Result<TelemetryGuard, TryInitError> {
    let sentry = init_sentry(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = config.json_logs.then(|| fmt::layer().json());
    let pretty = (!config.json_logs).then(fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(pretty)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .try_init()?;

    Ok(TelemetryGuard { _sentry: sentry })
}
