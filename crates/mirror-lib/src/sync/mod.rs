//! Table synchronization
//!
//! This module provides:
//! - The sync engine: a RESTING → UPDATING → CLEANING state machine that
//!   merges one remote pass into the snapshot table and sweeps stale rows
//! - The sync loop: the scheduler that re-arms the engine after a fixed
//!   rest interval
//! - Policies for mid-stream failures and undecodable rows

mod engine;
mod r#loop;


pub use engine::{
    AttrsOf, CycleOutcome, CycleReport, KeyOf, PassEnd, SyncEngine, SyncState, SyncStats,
};
pub use r#loop::{SyncLoop, SyncLoopBuilder};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay between the end of one cycle and the start of the next
pub const DEFAULT_REST_INTERVAL: Duration = Duration::from_millis(1000);

/// What to do with unconfirmed rows when a pass ends in a `next` failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorPolicy {
    /// Sweep as if the pass had completed. Rows the aborted pass did not
    /// reach are deleted even if they still exist upstream.
    #[default]
    Sweep,
    /// Skip the sweep. Rows keep their previous generation and are
    /// reconciled by the next complete pass.
    Retain,
}

/// What to do with a received record that cannot be decoded into a row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorPolicy {
    /// Log the record, count it and continue with the pass
    #[default]
    Skip,
    /// End the pass as if `next` had failed
    AbortCycle,
}

/// Configuration for the sync engine and its scheduler
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between cycles and after a failed start (default: 1 second)
    pub rest_interval: Duration,
    /// Delay before the very first cycle (default: none)
    pub initial_delay: Duration,
    pub stream_error_policy: StreamErrorPolicy,
    pub row_error_policy: RowErrorPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rest_interval: DEFAULT_REST_INTERVAL,
            initial_delay: Duration::ZERO,
            stream_error_policy: StreamErrorPolicy::default(),
            row_error_policy: RowErrorPolicy::default(),
        }
    }
}
