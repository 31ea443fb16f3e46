//! Sync engine state machine
//!
//! One cycle pulls a complete pass from the remote source and reconciles it
//! into the snapshot table in two steps: every received row is merged and
//! tagged with the pass token (mark), then every row carrying an older tag
//! is removed (sweep). The table is never rebuilt from scratch, so a query
//! arriving early in a refresh still sees the previous pass rather than an
//! almost empty table.

use super::{RowErrorPolicy, StreamErrorPolicy, SyncConfig};
use crate::error::{RowError, SourceError};
use crate::models::DecodeRow;
use crate::observability::MirrorMetrics;
use crate::source::{Enumeration, ListToken, RemoteSource};
use crate::table::{Generation, MergeOutcome, SnapshotTable};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Row key type produced by a source
pub type KeyOf<S> = <<S as RemoteSource>::Record as DecodeRow>::Key;
/// Row attribute type produced by a source
pub type AttrsOf<S> = <<S as RemoteSource>::Record as DecodeRow>::Attrs;

/// Phase of the refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Idle, no cycle in progress
    Resting,
    /// Rows are streaming in and being merged
    Updating,
    /// Stale rows are being swept
    Cleaning,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Resting => "resting",
            SyncState::Updating => "updating",
            SyncState::Cleaning => "cleaning",
        }
    }

    /// Numeric encoding used for the state gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            SyncState::Resting => 0,
            SyncState::Updating => 1,
            SyncState::Cleaning => 2,
        }
    }
}

/// Why a pass stopped delivering rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassEnd {
    /// The source reported end of stream
    Exhausted,
    /// A `next` call failed
    StreamError(SourceError),
    /// A record could not be decoded and the row policy aborts the pass
    RowError(RowError),
}

impl PassEnd {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PassEnd::Exhausted)
    }

    /// Error that ended the pass early, if any
    pub fn error_message(&self) -> Option<String> {
        match self {
            PassEnd::Exhausted => None,
            PassEnd::StreamError(e) => Some(e.to_string()),
            PassEnd::RowError(e) => Some(e.to_string()),
        }
    }
}

/// Summary of one cycle that got past `start`
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub token: ListToken,
    pub received: u64,
    pub inserted: u64,
    pub replaced: u64,
    pub confirmed: u64,
    pub skipped: u64,
    pub removed: u64,
    /// False when the sweep was withheld after an aborted pass
    pub swept: bool,
    pub end: PassEnd,
    pub table_size: usize,
    pub duration: Duration,
}

/// Result of asking the engine to advance
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// `start` failed; nothing was touched and the engine stayed resting
    StartFailed(SourceError),
    /// The cycle ran through cleaning back to resting
    Completed(CycleReport),
}

/// Cumulative engine statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Cycles whose pass ran to end of stream
    pub cycles_completed: u64,
    /// Cycles whose pass ended early
    pub cycles_aborted: u64,
    pub start_failures: u64,
    pub rows_received: u64,
    pub rows_inserted: u64,
    pub rows_replaced: u64,
    pub rows_confirmed: u64,
    pub rows_skipped: u64,
    pub rows_removed: u64,
    pub last_token: Option<u32>,
    pub last_error: Option<String>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Drives refresh cycles from a remote source into a snapshot table.
///
/// The engine is the only writer of its table. Cycles take `&mut self`, so a
/// new pass can never start while a previous one is still outstanding.
pub struct SyncEngine<S: RemoteSource> {
    source: Arc<S>,
    table: Arc<SnapshotTable<KeyOf<S>, AttrsOf<S>>>,
    config: SyncConfig,
    state: watch::Sender<SyncState>,
    stats: SyncStats,
    metrics: MirrorMetrics,
}

impl<S: RemoteSource> SyncEngine<S> {
    pub fn new(
        source: Arc<S>,
        table: Arc<SnapshotTable<KeyOf<S>, AttrsOf<S>>>,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Resting);
        Self {
            source,
            table,
            config,
            state,
            stats: SyncStats::default(),
            metrics: MirrorMetrics::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Read handle on the table this engine maintains
    pub fn table(&self) -> Arc<SnapshotTable<KeyOf<S>, AttrsOf<S>>> {
        Arc::clone(&self.table)
    }

    fn set_state(&self, state: SyncState) {
        debug!(state = state.as_str(), "Sync state changed");
        self.state.send_replace(state);
        self.metrics.set_sync_state(state.as_gauge());
    }

    /// Run one full cycle: start a pass, merge every row, sweep, rest.
    ///
    /// Errors never escape: a failed start leaves the engine resting with the
    /// table untouched, and a failed `next` ends the pass early.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let started = Instant::now();
        let source = Arc::clone(&self.source);

        debug!(table_size = self.table.len(), "Updating local table");

        let mut pass = match Enumeration::begin(source.as_ref()).await {
            Ok(pass) => pass,
            Err(e) => {
                warn!(error = %e, "Failed to start route list pass");
                self.stats.start_failures += 1;
                self.stats.last_error = Some(e.to_string());
                self.metrics.inc_start_failures();
                return CycleOutcome::StartFailed(e);
            }
        };

        let token = pass.token();
        let generation = Generation::from(token);
        self.set_state(SyncState::Updating);
        debug!(token = %token, "Receiving route list");

        let mut report = CycleReport {
            token,
            received: 0,
            inserted: 0,
            replaced: 0,
            confirmed: 0,
            skipped: 0,
            removed: 0,
            swept: false,
            end: PassEnd::Exhausted,
            table_size: 0,
            duration: Duration::ZERO,
        };

        let end = loop {
            let record = match pass.next_record().await {
                Ok(Some(record)) => record,
                Ok(None) => break PassEnd::Exhausted,
                Err(e) => break PassEnd::StreamError(e),
            };
            report.received += 1;

            match record.decode() {
                Ok((key, attrs)) => match self.table.merge(key, attrs, generation) {
                    MergeOutcome::Inserted => report.inserted += 1,
                    MergeOutcome::Confirmed => report.confirmed += 1,
                    MergeOutcome::Replaced => report.replaced += 1,
                },
                Err(e) => match self.config.row_error_policy {
                    RowErrorPolicy::Skip => {
                        warn!(token = %token, error = %e, "Skipping undecodable route");
                        report.skipped += 1;
                    }
                    RowErrorPolicy::AbortCycle => break PassEnd::RowError(e),
                },
            }
        };
        report.end = end;

        debug!(token = %token, end = ?report.end, "Received last route of pass");
        self.set_state(SyncState::Cleaning);

        report.swept = report.end.is_exhausted()
            || self.config.stream_error_policy == StreamErrorPolicy::Sweep;

        if report.swept {
            report.removed = self.table.sweep(generation).len() as u64;
        } else {
            info!(
                token = %token,
                stale = self.table.stale_keys(generation).len(),
                "Pass aborted, keeping unconfirmed rows until the next complete pass"
            );
        }

        report.table_size = self.table.len();
        report.duration = started.elapsed();
        self.finish_cycle(&report);
        self.set_state(SyncState::Resting);

        CycleOutcome::Completed(report)
    }

    fn finish_cycle(&mut self, report: &CycleReport) {
        let stats = &mut self.stats;
        if report.end.is_exhausted() {
            stats.cycles_completed += 1;
        } else {
            stats.cycles_aborted += 1;
        }
        stats.rows_received += report.received;
        stats.rows_inserted += report.inserted;
        stats.rows_replaced += report.replaced;
        stats.rows_confirmed += report.confirmed;
        stats.rows_skipped += report.skipped;
        stats.rows_removed += report.removed;
        stats.last_token = Some(report.token.value());
        stats.last_cycle_at = Some(Utc::now());
        stats.last_error = report.end.error_message();

        self.metrics.add_rows(
            report.inserted,
            report.replaced,
            report.confirmed,
            report.removed,
            report.skipped,
        );
        match report.end {
            PassEnd::Exhausted => self.metrics.inc_cycles_completed(),
            PassEnd::StreamError(_) => self.metrics.inc_stream_errors(),
            PassEnd::RowError(_) => self.metrics.inc_row_aborts(),
        }
        self.metrics.set_table_rows(report.table_size as i64);
        self.metrics.observe_cycle_duration(report.duration.as_secs_f64());
    }
}
