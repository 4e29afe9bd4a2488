use std::io;
use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr; stdout is reserved for command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "livetable_events_applied_total",
            Unit::Count,
            "Total number of push events folded into the cached views."
        );
        describe_counter!(
            "livetable_events_dropped_total",
            Unit::Count,
            "Total number of push messages dropped because they could not be decoded."
        );
        describe_counter!(
            "livetable_views_changed_total",
            Unit::Count,
            "Total number of cached views modified by reconciliation."
        );
        describe_counter!(
            "livetable_reconcile_view_errors_total",
            Unit::Count,
            "Total number of malformed cached views skipped during reconciliation."
        );
        describe_counter!(
            "livetable_version_bumps_total",
            Unit::Count,
            "Total number of debounced cache version notifications."
        );
        describe_gauge!(
            "livetable_cached_views",
            Unit::Count,
            "Current number of cached views."
        );
        describe_histogram!(
            "livetable_reconcile_ms",
            Unit::Milliseconds,
            "Reconciliation latency per event in milliseconds."
        );
    });
}
