//! Structured logging setup for hosts that do not install their own subscriber.
//!
//! # Telemetry invariants
//!
//! - **No plaintext, ciphertext or key material** appears in any log field;
//!   events carry type names, field names, counts and key-file paths only.
//! - Log level is configurable via `FIELD_CRYPT_LOG_LEVEL` (default: `info`)
//!   and overridable with `RUST_LOG`.

use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// Outputs one flattened JSON object per event to stdout, filtered at
/// `log_level` unless `RUST_LOG` is set.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    build(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise field-crypt tracing subscriber: {e}"))
}

/// The JSON subscriber [`init`] installs, for hosts that scope it themselves.
pub fn build(filter: EnvFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_env_filter(filter)
        .finish()
}
