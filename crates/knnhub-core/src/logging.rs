//! Subscriber setup for applications embedding the crate.
//!
//! The library only emits `tracing` events; nothing is printed unless the
//! host installs a subscriber, either its own or the one built here.

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global `fmt` subscriber described by `config`.
///
/// `RUST_LOG`, when set, takes precedence over `config.level`. The format
/// is `text` or `json`. Returns false, leaving the existing one in place, if
/// a global subscriber was already installed.
///
/// # Errors
///
/// Returns [`Error::Config`] if the format is unknown or the filter cannot
/// be parsed.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives),
        Err(_) => EnvFilter::try_new(&config.level),
    }
    .map_err(|e| Error::Config(format!("invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format.as_str() {
        "text" => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        other => {
            return Err(Error::Config(format!(
                "unknown log format '{other}', expected text or json"
            )))
        }
    };
    match installed {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::debug!(error = %e, "Subscriber already installed");
            Ok(false)
        }
    }
}
