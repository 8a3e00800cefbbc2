//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor configuration names one.
pub const DEFAULT_FILTER: &str = "info";

/// JSON logs filtered by `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// JSON logs filtered by an explicit directive string, e.g. `"tamirhane_infra=debug,info"`.
///
/// An unparsable directive falls back to [`DEFAULT_FILTER`] and is reported once the
/// subscriber is installed.
pub fn init_with_filter(directives: &str) {
    match EnvFilter::try_new(directives) {
        Ok(filter) => install(filter),
        Err(err) => {
            install(EnvFilter::new(DEFAULT_FILTER));
            ::tracing::warn!(directives, error = %err, "invalid log filter, using default");
        }
    }
}

fn install(filter: EnvFilter) {
    // Repeat calls keep the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_a_no_op() {
        init_with_filter("debug");
        init_with_filter("not a [valid filter");
        init();

        assert!(::tracing::dispatcher::has_been_set());
        assert!(::tracing::enabled!(::tracing::Level::DEBUG));
        assert!(!::tracing::enabled!(::tracing::Level::TRACE));
    }
}
