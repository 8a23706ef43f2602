//! Logging bootstrap.
//!
//! The engine logs through `tracing` and never installs a subscriber on its
//! own. Host programs call [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert_eq!(EnvFilter::new(DEFAULT_FILTER).to_string(), "info");
    }

    #[test]
    fn test_scoped_subscriber_accepts_filter() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_test_writer()
            .finish();

        let seen = tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("scoped");
            true
        });
        assert!(seen);
    }
}
