//! Route table mirroring library
//!
//! This crate provides the core functionality for:
//! - Pulling a paginated remote route table through a start/next interface
//! - Reconciling each pass into a locally queryable snapshot (mark and sweep)
//! - Scheduling refresh cycles with a fixed rest interval
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod source;
pub mod sync;
pub mod table;

pub use error::{MirrorError, RowError, SourceError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MirrorMetrics, StructuredLogger};
pub use table::{Generation, MergeOutcome, Row, Snapshot, SnapshotTable};

/// Snapshot table specialised to the BGP path attribute domain
pub type RouteTable = SnapshotTable<RouteKey, PathAttributes>;

/// Row specialised to the BGP path attribute domain
pub type RouteRow = Row<RouteKey, PathAttributes>;
