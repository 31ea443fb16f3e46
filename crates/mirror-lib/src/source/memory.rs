//! In-memory remote source
//!
//! Serves a replaceable set of records through the start/next protocol.
//! Failures can be scripted, which makes it the source of choice for
//! exercising the sync engine.

use super::{ListToken, PassCursor, RemoteSource};
use crate::error::SourceError;
use crate::models::DecodeRow;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
struct MemoryState<R> {
    records: Vec<R>,
    cursor: PassCursor<R>,
    fail_next_start: Option<String>,
    /// Records still served in the current pass before `next` starts failing
    fail_after: Option<usize>,
}

/// Remote source backed by an in-memory record list
#[derive(Debug)]
pub struct MemorySource<R> {
    state: Mutex<MemoryState<R>>,
    start_calls: AtomicUsize,
    next_calls: AtomicUsize,
}

impl<R: Clone> MemorySource<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records,
                cursor: PassCursor::default(),
                fail_next_start: None,
                fail_after: None,
            }),
            start_calls: AtomicUsize::new(0),
            next_calls: AtomicUsize::new(0),
        }
    }

    /// Replace the upstream contents; takes effect on the next pass
    pub fn set_records(&self, records: Vec<R>) {
        self.state.lock().records = records;
    }

    /// Make the next `start` call fail with `reason`
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_start = Some(reason.into());
    }

    /// Let the next pass deliver `count` records, then fail the following `next`
    pub fn fail_after(&self, count: usize) {
        self.state.lock().fail_after = Some(count);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn next_calls(&self) -> usize {
        self.next_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R> RemoteSource for MemorySource<R>
where
    R: DecodeRow + Clone + Send + Sync,
{
    type Record = R;

    async fn start(&self) -> Result<ListToken, SourceError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();

        if let Some(reason) = state.fail_next_start.take() {
            return Err(SourceError::Unavailable(reason));
        }

        let records = state.records.clone();
        Ok(state.cursor.open(records))
    }

    async fn next(&self, token: ListToken) -> Result<Option<R>, SourceError> {
        self.next_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();

        match state.fail_after {
            Some(0) => {
                state.fail_after = None;
                return Err(SourceError::Unavailable("connection reset".to_string()));
            }
            Some(remaining) => state.fail_after = Some(remaining - 1),
            None => {}
        }

        state.cursor.next(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Enumeration;
    use crate::RowError;

    #[derive(Debug, Clone, PartialEq)]
    struct Pair(u32, &'static str);

    impl DecodeRow for Pair {
        type Key = u32;
        type Attrs = &'static str;

        fn decode(self) -> Result<(u32, &'static str), RowError> {
            Ok((self.0, self.1))
        }
    }

    #[tokio::test]
    async fn test_enumerates_all_records() {
        let source = MemorySource::new(vec![Pair(1, "a"), Pair(2, "b")]);

        let mut pass = Enumeration::begin(&source).await.unwrap();
        assert_eq!(pass.next_record().await.unwrap(), Some(Pair(1, "a")));
        assert_eq!(pass.next_record().await.unwrap(), Some(Pair(2, "b")));
        assert_eq!(pass.next_record().await.unwrap(), None);

        // Exhausted passes no longer reach the source
        assert_eq!(pass.next_record().await.unwrap(), None);
        assert_eq!(source.next_calls(), 3);
    }

    #[tokio::test]
    async fn test_tokens_are_fresh_per_pass() {
        let source = MemorySource::new(vec![Pair(1, "a")]);

        let first = source.start().await.unwrap();
        let second = source.start().await.unwrap();
        assert_ne!(first, second);

        assert_eq!(
            source.next(first).await,
            Err(SourceError::UnknownToken(first.value()))
        );
        assert_eq!(source.next(second).await, Ok(Some(Pair(1, "a"))));
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let source = MemorySource::new(vec![Pair(1, "a"), Pair(2, "b")]);

        source.fail_next_start("down");
        assert!(matches!(
            source.start().await,
            Err(SourceError::Unavailable(_))
        ));

        source.fail_after(1);
        let mut pass = Enumeration::begin(&source).await.unwrap();
        assert!(pass.next_record().await.unwrap().is_some());
        assert!(pass.next_record().await.is_err());
        assert_eq!(pass.next_record().await.unwrap(), None);

        // Failure is one-shot; a restarted pass runs to completion
        let mut pass = Enumeration::begin(&source).await.unwrap();
        let mut count = 0;
        while pass.next_record().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert_eq!(source.start_calls(), 3);
    }

    #[tokio::test]
    async fn test_set_records_applies_to_next_pass() {
        let source = MemorySource::new(vec![Pair(1, "a")]);
        let mut pass = Enumeration::begin(&source).await.unwrap();

        source.set_records(vec![Pair(9, "z")]);
        assert_eq!(pass.next_record().await.unwrap(), Some(Pair(1, "a")));

        let mut pass = Enumeration::begin(&source).await.unwrap();
        assert_eq!(pass.next_record().await.unwrap(), Some(Pair(9, "z")));
    }
}
