//! Refresh scheduling loop
//!
//! Re-arms the sync engine after every cycle and after every failed start
//! with a fixed rest interval. There is no backoff growth and no retry cap:
//! the upstream can always be re-fetched from the beginning.

use super::engine::{AttrsOf, CycleOutcome, KeyOf, SyncEngine, SyncStats};
use super::{RowErrorPolicy, StreamErrorPolicy, SyncConfig};
use crate::error::MirrorError;
use crate::health::{components, HealthRegistry};
use crate::observability::StructuredLogger;
use crate::source::RemoteSource;
use crate::table::SnapshotTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Scheduler that keeps one engine cycling until shut down
pub struct SyncLoop<S: RemoteSource> {
    engine: SyncEngine<S>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
}

impl<S: RemoteSource> SyncLoop<S> {
    pub fn engine(&self) -> &SyncEngine<S> {
        &self.engine
    }

    /// Run cycles until `shutdown` fires or its sender is dropped.
    ///
    /// Shutdown is only observed between cycles; a cycle in flight always
    /// runs through its sweep first. Returns the final engine statistics.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> SyncStats {
        let config = self.engine.config().clone();
        info!(
            rest_interval_ms = config.rest_interval.as_millis() as u64,
            stream_error_policy = ?config.stream_error_policy,
            row_error_policy = ?config.row_error_policy,
            "Starting table sync loop"
        );

        let mut delay = config.initial_delay;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let outcome = self.engine.run_cycle().await;
                    self.report(&outcome).await;
                    delay = config.rest_interval;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down table sync loop");
                    break;
                }
            }
        }

        self.engine.stats().clone()
    }

    /// Publish a cycle outcome to health and the event log
    async fn report(&self, outcome: &CycleOutcome) {
        let report = match outcome {
            CycleOutcome::StartFailed(error) => {
                if let Some(logger) = &self.logger {
                    logger.log_source_unavailable(
                        &error.to_string(),
                        self.engine.stats().start_failures,
                    );
                }
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::REMOTE_SOURCE, error.to_string())
                        .await;
                }
                return;
            }
            CycleOutcome::Completed(report) => report,
        };

        let aborted = report.end.error_message();

        if let Some(logger) = &self.logger {
            match &aborted {
                None => logger.log_cycle_completed(
                    report.token.value(),
                    report.received,
                    report.inserted,
                    report.replaced,
                    report.removed,
                    report.table_size,
                    report.duration.as_millis() as u64,
                ),
                Some(error) => logger.log_pass_aborted(
                    report.token.value(),
                    error,
                    report.received,
                    report.swept,
                    report.removed,
                ),
            }
        }

        if let Some(health) = &self.health {
            health.set_healthy(components::REMOTE_SOURCE).await;
            match aborted {
                None => {
                    health.set_healthy(components::SYNC_ENGINE).await;
                    health.mark_synced().await;
                }
                Some(error) => {
                    health
                        .set_degraded(
                            components::SYNC_ENGINE,
                            format!("pass {} aborted: {}", report.token, error),
                        )
                        .await;
                }
            }
        }
    }
}

/// Builder for creating the sync loop
pub struct SyncLoopBuilder<S: RemoteSource> {
    source: Option<Arc<S>>,
    table: Option<Arc<SnapshotTable<KeyOf<S>, AttrsOf<S>>>>,
    config: SyncConfig,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
}

impl<S: RemoteSource> SyncLoopBuilder<S> {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            table: None,
            config: SyncConfig::default(),
            health: None,
            logger: None,
        }
    }

    /// Set the remote source
    pub fn source(mut self, source: Arc<S>) -> Self {
        self.source = Some(source);
        self
    }

    /// Share an existing table; a fresh one is created otherwise
    pub fn table(mut self, table: Arc<SnapshotTable<KeyOf<S>, AttrsOf<S>>>) -> Self {
        self.table = Some(table);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the rest interval
    pub fn rest_interval(mut self, interval: Duration) -> Self {
        self.config.rest_interval = interval;
        self
    }

    /// Set the delay before the first cycle
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    pub fn stream_error_policy(mut self, policy: StreamErrorPolicy) -> Self {
        self.config.stream_error_policy = policy;
        self
    }

    pub fn row_error_policy(mut self, policy: RowErrorPolicy) -> Self {
        self.config.row_error_policy = policy;
        self
    }

    /// Report cycle outcomes to a health registry
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Emit structured cycle events
    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the sync loop
    pub fn build(self) -> Result<SyncLoop<S>, MirrorError> {
        let source = self
            .source
            .ok_or(MirrorError::MissingComponent("remote source"))?;
        let table = self
            .table
            .unwrap_or_else(|| Arc::new(SnapshotTable::new()));

        Ok(SyncLoop {
            engine: SyncEngine::new(source, table, self.config),
            health: self.health,
            logger: self.logger,
        })
    }
}

impl<S: RemoteSource> Default for SyncLoopBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRoute;
    use crate::source::MemorySource;

    #[test]
    fn test_sync_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.rest_interval, Duration::from_millis(1000));
        assert_eq!(config.initial_delay, Duration::ZERO);
        assert_eq!(config.stream_error_policy, StreamErrorPolicy::Sweep);
        assert_eq!(config.row_error_policy, RowErrorPolicy::Skip);
    }

    #[tokio::test]
    async fn test_builder_missing_source() {
        let result = SyncLoopBuilder::<MemorySource<RawRoute>>::new()
            .rest_interval(Duration::from_millis(5))
            .build();

        assert!(matches!(
            result,
            Err(MirrorError::MissingComponent("remote source"))
        ));
    }

    #[tokio::test]
    async fn test_builder_shares_table() {
        let source = Arc::new(MemorySource::<RawRoute>::new(vec![]));
        let table = Arc::new(SnapshotTable::new());

        let sync_loop = SyncLoopBuilder::new()
            .source(source)
            .table(Arc::clone(&table))
            .stream_error_policy(StreamErrorPolicy::Retain)
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&sync_loop.engine().table(), &table));
        assert_eq!(
            sync_loop.engine().config().stream_error_policy,
            StreamErrorPolicy::Retain
        );
    }
}
