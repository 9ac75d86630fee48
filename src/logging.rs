//! Logging and tracing configuration
//!
//! Operational logs and the chain-of-custody trail share one subscriber.
//! Audit events use the `forensic_audit` target (see [`crate::common::audit`]).
//!
//! # Environment Variable Control
//!
//! Set `RUST_LOG` to control log levels at runtime:
//! ```bash
//! RUST_LOG=debug mobex ingest ...                  # All debug logs
//! RUST_LOG=mobex_lib::extract=trace mobex extract x.zip
//! RUST_LOG=warn,forensic_audit=info mobex export ...  # Audit trail only
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter: info in release, debug in debug builds
fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) {
        EnvFilter::new("mobex=debug,mobex_lib=debug,forensic_audit=info")
    } else {
        EnvFilter::new("mobex=info,mobex_lib=info,forensic_audit=info")
    }
}

/// Initialize the logging/tracing system
///
/// Call this once at startup (in main.rs). Logs go to stderr so stdout
/// stays machine-readable.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        );

    // Ignore error if already set
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with verbose output (file:line, thread IDs)
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info};

    #[test]
    fn test_init() {
        init();
        info!("Test log message");
        debug!(key = "value", "Structured log");
        info!(target: "forensic_audit", operation = "test", "Audit event");
    }
}
