//! Process bootstrap helpers.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

/// Log filter from the GAPIC_LOG environment variable, "info" if unset or
/// unparsable.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with the GAPIC_LOG environment variable.
///
/// Intended for binaries; a library embedding this crate installs its own
/// subscriber.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
