//! Remote source adapters
//!
//! A remote source is only reachable through a token based pagination
//! protocol: `start` opens a pass and hands out a token, `next(token)`
//! returns one record at a time until the pass is exhausted. Exactly one
//! request is outstanding at any moment.

mod file;
mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

use crate::error::SourceError;
use crate::models::DecodeRow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque pagination cursor returned by `start` and echoed on every `next`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListToken(u32);

impl ListToken {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ListToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait for paginated remote table implementations
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Record type delivered by `next`
    type Record: DecodeRow + Send;

    /// Begin a new enumeration pass
    async fn start(&self) -> Result<ListToken, SourceError>;

    /// Fetch the next record of the pass, `None` once it is exhausted
    async fn next(&self, token: ListToken) -> Result<Option<Self::Record>, SourceError>;
}

/// One enumeration pass over a remote source.
///
/// Records are pulled lazily, one call at a time. Restarting means calling
/// [`Enumeration::begin`] again, which opens a fresh pass with a new token.
pub struct Enumeration<'a, S: RemoteSource + ?Sized> {
    source: &'a S,
    token: ListToken,
    finished: bool,
}

impl<'a, S: RemoteSource + ?Sized> Enumeration<'a, S> {
    /// Open a pass by calling `start` on the source
    pub async fn begin(source: &'a S) -> Result<Self, SourceError> {
        let token = source.start().await?;
        Ok(Self {
            source,
            token,
            finished: false,
        })
    }

    pub fn token(&self) -> ListToken {
        self.token
    }

    /// Pull the next record.
    ///
    /// Once the pass has ended, either by exhaustion or by an error, no
    /// further calls reach the source and `Ok(None)` is returned.
    pub async fn next_record(&mut self) -> Result<Option<S::Record>, SourceError> {
        if self.finished {
            return Ok(None);
        }

        match self.source.next(self.token).await {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }
}

/// Pass bookkeeping shared by the bundled adapters: hands out tokens and
/// serves one pass worth of records.
#[derive(Debug)]
struct PassCursor<R> {
    last_token: u32,
    active: Option<ActivePass<R>>,
}

#[derive(Debug)]
struct ActivePass<R> {
    token: ListToken,
    records: std::vec::IntoIter<R>,
}

impl<R> Default for PassCursor<R> {
    fn default() -> Self {
        Self {
            last_token: 0,
            active: None,
        }
    }
}

impl<R> PassCursor<R> {
    /// Open a new pass over `records`, superseding any previous one
    fn open(&mut self, records: Vec<R>) -> ListToken {
        self.last_token = self.last_token.wrapping_add(1).max(1);
        let token = ListToken::new(self.last_token);
        self.active = Some(ActivePass {
            token,
            records: records.into_iter(),
        });
        token
    }

    fn next(&mut self, token: ListToken) -> Result<Option<R>, SourceError> {
        match self.active.as_mut() {
            Some(pass) if pass.token == token => Ok(pass.records.next()),
            _ => Err(SourceError::UnknownToken(token.value())),
        }
    }
}
