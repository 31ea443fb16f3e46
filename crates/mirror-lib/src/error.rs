//! Error types for the mirror library

use thiserror::Error;

/// Failures reported by a remote source adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached or refused to begin a pass
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// A `next` call carried a token the source does not recognise
    #[error("unknown list token {0}")]
    UnknownToken(u32),

    /// A response arrived but could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),
}

/// A received record whose key or attributes cannot be built into a row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("invalid prefix length {0} (must be 0..=32)")]
    InvalidPrefixLength(u8),

    #[error("invalid aggregator attribute length {0} (expected 0 or 6 bytes)")]
    InvalidAggregator(usize),
}

/// Top level error type
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Row(#[from] RowError),

    #[error("{0} is required")]
    MissingComponent(&'static str),
}
