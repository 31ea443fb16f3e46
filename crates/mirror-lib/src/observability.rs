//! Observability infrastructure for the route mirror
//!
//! Provides:
//! - Prometheus metrics (cycle latency, table size, sync state, row churn)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for cycle durations (in seconds)
const CYCLE_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MirrorMetricsInner> = OnceLock::new();

struct MirrorMetricsInner {
    cycle_duration_seconds: Histogram,
    table_rows: IntGauge,
    sync_state: IntGauge,
    cycles_completed: IntCounter,
    rows_inserted: IntCounter,
    rows_replaced: IntCounter,
    rows_confirmed: IntCounter,
    rows_removed: IntCounter,
    rows_skipped: IntCounter,
    start_failures: IntCounter,
    stream_errors: IntCounter,
    row_aborts: IntCounter,
}

impl MirrorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "route_mirror_cycle_duration_seconds",
                "Time from route list start to the end of the sweep",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            table_rows: register_int_gauge!(
                "route_mirror_table_rows",
                "Number of rows in the local snapshot table"
            )
            .expect("Failed to register table_rows"),

            sync_state: register_int_gauge!(
                "route_mirror_sync_state",
                "Current sync phase (0 resting, 1 updating, 2 cleaning)"
            )
            .expect("Failed to register sync_state"),

            cycles_completed: register_int_counter!(
                "route_mirror_cycles_completed_total",
                "Refresh cycles whose pass ran to end of stream"
            )
            .expect("Failed to register cycles_completed"),

            rows_inserted: register_int_counter!(
                "route_mirror_rows_inserted_total",
                "Rows added to the local table"
            )
            .expect("Failed to register rows_inserted"),

            rows_replaced: register_int_counter!(
                "route_mirror_rows_replaced_total",
                "Rows replaced because their attributes changed"
            )
            .expect("Failed to register rows_replaced"),

            rows_confirmed: register_int_counter!(
                "route_mirror_rows_confirmed_total",
                "Unchanged rows re-tagged by a pass"
            )
            .expect("Failed to register rows_confirmed"),

            rows_removed: register_int_counter!(
                "route_mirror_rows_removed_total",
                "Stale rows removed by the sweep"
            )
            .expect("Failed to register rows_removed"),

            rows_skipped: register_int_counter!(
                "route_mirror_rows_skipped_total",
                "Received routes that could not be decoded"
            )
            .expect("Failed to register rows_skipped"),

            start_failures: register_int_counter!(
                "route_mirror_start_failures_total",
                "Route list start calls that failed"
            )
            .expect("Failed to register start_failures"),

            stream_errors: register_int_counter!(
                "route_mirror_stream_errors_total",
                "Passes cut short by a failed next call"
            )
            .expect("Failed to register stream_errors"),

            row_aborts: register_int_counter!(
                "route_mirror_row_aborts_total",
                "Passes ended early by an undecodable route"
            )
            .expect("Failed to register row_aborts"),
        }
    }
}

/// Mirror metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct MirrorMetrics {
    _private: (),
}

impl Default for MirrorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorMetrics {
    /// Create a new metrics handle (registers global metrics on first use)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MirrorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MirrorMetricsInner {
        GLOBAL_METRICS.get_or_init(MirrorMetricsInner::new)
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    pub fn set_table_rows(&self, rows: i64) {
        self.inner().table_rows.set(rows);
    }

    pub fn set_sync_state(&self, state: i64) {
        self.inner().sync_state.set(state);
    }

    pub fn inc_cycles_completed(&self) {
        self.inner().cycles_completed.inc();
    }

    /// Add the row churn of one cycle
    pub fn add_rows(&self, inserted: u64, replaced: u64, confirmed: u64, removed: u64, skipped: u64) {
        let inner = self.inner();
        inner.rows_inserted.inc_by(inserted);
        inner.rows_replaced.inc_by(replaced);
        inner.rows_confirmed.inc_by(confirmed);
        inner.rows_removed.inc_by(removed);
        inner.rows_skipped.inc_by(skipped);
    }

    pub fn inc_start_failures(&self) {
        self.inner().start_failures.inc();
    }

    pub fn inc_stream_errors(&self) {
        self.inner().stream_errors.inc();
    }

    pub fn inc_row_aborts(&self) {
        self.inner().row_aborts.inc();
    }
}

/// Structured logger for mirror events
///
/// Emits one consistently shaped record per significant event so that
/// refresh history can be reconstructed from the JSON log alone.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, source: &str) {
        info!(
            event = "mirror_started",
            instance = %self.instance,
            version = %version,
            source = %source,
            "Route mirror started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "mirror_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Route mirror shutting down"
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_cycle_completed(
        &self,
        token: u32,
        received: u64,
        inserted: u64,
        replaced: u64,
        removed: u64,
        table_size: usize,
        duration_ms: u64,
    ) {
        info!(
            event = "cycle_completed",
            instance = %self.instance,
            token = token,
            received = received,
            inserted = inserted,
            replaced = replaced,
            removed = removed,
            table_size = table_size,
            duration_ms = duration_ms,
            "Local route table updated"
        );
    }

    pub fn log_source_unavailable(&self, error: &str, failures: u64) {
        warn!(
            event = "source_unavailable",
            instance = %self.instance,
            error = %error,
            failures = failures,
            "Route list start failed, retrying after rest interval"
        );
    }

    pub fn log_pass_aborted(
        &self,
        token: u32,
        error: &str,
        received: u64,
        swept: bool,
        removed: u64,
    ) {
        if swept {
            warn!(
                event = "stream_aborted",
                instance = %self.instance,
                token = token,
                error = %error,
                received = received,
                removed = removed,
                "Route list aborted mid-stream, unconfirmed rows were swept"
            );
        } else {
            warn!(
                event = "stream_aborted",
                instance = %self.instance,
                token = token,
                error = %error,
                received = received,
                "Route list aborted mid-stream, previous rows retained"
            );
        }
    }
}
