/*!
 * Structured Tracing
 * Subscriber setup and timed spans for provisioning runs
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Reconciles slower than this are reported at warn level
const SLOW_RUN_MS: u128 = 2_000;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - APPSTAGE_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("APPSTAGE_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if result.is_ok() {
        debug!(json = use_json, "Structured tracing initialized");
    }
}

/// Unique ID correlating every event of one run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one provisioning run
///
/// Records its duration on drop.
pub struct RunSpan {
    span: tracing::Span,
    start: Instant,
    operation: &'static str,
    run_id: String,
}

impl RunSpan {
    pub fn new(operation: &'static str) -> Self {
        let run_id = generate_run_id();
        let span = span!(
            Level::INFO,
            "run",
            run_id = %run_id,
            operation,
            apps = tracing::field::Empty,
            result = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            operation,
            run_id,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn record_apps(&self, count: usize) {
        self.span.record("apps", count);
    }

    pub fn record_result(&self, success: bool) {
        self.span.record("result", if success { "success" } else { "error" });
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for RunSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_millis();
        self.span.record("duration_ms", elapsed);
        let _entered = self.span.enter();

        if elapsed > SLOW_RUN_MS {
            warn!(
                run_id = %self.run_id,
                operation = self.operation,
                duration_ms = elapsed,
                slow = true,
                "slow provisioning run"
            );
        } else {
            info!(
                run_id = %self.run_id,
                operation = self.operation,
                duration_ms = elapsed,
                "provisioning run finished"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_unique() {
        assert_ne!(generate_run_id(), generate_run_id());
    }

    #[test]
    fn test_span_without_subscriber() {
        let span = RunSpan::new("reconcile");
        span.record_apps(3);
        span.record_result(true);
        assert_eq!(span.run_id().len(), 36);
    }

    #[test]
    fn test_init_twice() {
        init_tracing();
        init_tracing();
    }
}
