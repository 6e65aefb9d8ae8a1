//! Logging setup.
//!
//! Diagnostics go to stderr through `tracing`, so stdout stays reserved for
//! answers, extracted text, and JSON. `RUST_LOG` wins over the configured
//! level when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// Filter directive for a configured level, e.g. `"warn,docqa=warn"`.
pub fn filter_directive(level: &str) -> String {
    format!("{level},docqa={level},docqa_core={level}", level = level)
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.level)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .try_init();

    tracing::debug!("Logging initialized with level: {}", config.level);
}
