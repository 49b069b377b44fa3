use std::env::var;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber at the default `INFO` level.
pub fn init() {
    init_with_level(LevelFilter::INFO);
}

/// Initialize the tracing subscriber with an explicit default level.
///
/// The `RUST_LOG` environment variable still overrides the default, and
/// `RUST_LOG_FORMAT=json` switches to machine-readable output.
pub fn init_with_level(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).init();
}
