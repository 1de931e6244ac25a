//! Observability infrastructure for Tally.
//!
//! Structured logging with consistent spans for allocation and merge work.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `tally_queue=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match format {
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        };
        if let Err(err) = result {
            eprintln!("tally: logging already initialised: {err}");
        }
    });
}

/// Creates a span for one ticket allocation.
#[must_use]
pub fn allocation_span(category: &str, range: &str) -> Span {
    tracing::info_span!("allocate", category = category, range = range)
}

/// Creates a span for one merge cycle.
#[must_use]
pub fn merge_span(trigger: &str, destination: &str) -> Span {
    tracing::info_span!("merge", trigger = trigger, destination = destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn test_span_helpers_create_spans() {
        let span = allocation_span("latte", "Giselle!A2:C");
        let _guard = span.enter();
        tracing::info!("allocating");

        let span = merge_span("periodic", "Combined sheet!A2:C");
        let _guard = span.enter();
        tracing::info!("merging");
    }
}
