use tracing_subscriber::EnvFilter;

use crate::config::DEFAULT_LOG_FILTER;

/// Installs a stderr `fmt` subscriber filtered by `filter`.
///
/// Invalid filter directives fall back to the default level. Calling this
/// more than once keeps the first subscriber.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|error| {
        eprintln!("invalid log filter '{filter}': {error}; using '{DEFAULT_LOG_FILTER}'");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
