//! Tracing setup.
//!
//! - LOG_LEVEL holds the filter, e.g. "debug" or "info,drill_core=debug,tower_http=debug".
//! - LOG_FORMAT selects "pretty" (default) or "json" output.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,server=debug,drill_core=info,tower_http=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
