//! Process-wide tracing setup shared by the ledger binaries.

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Initialize process-wide tracing from `RUST_LOG`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize process-wide tracing with an explicit filter, typically `log.filter`
/// from configuration.
pub fn init_with_filter(directives: &str) {
    tracing::init_with_filter(directives);
}
