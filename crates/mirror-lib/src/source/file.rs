//! Remote source backed by a JSON route dump
//!
//! Every pass re-reads the file from the beginning, so an external process
//! can rewrite the dump between cycles and the mirror converges on it.

use super::{ListToken, PassCursor, RemoteSource};
use crate::error::SourceError;
use crate::models::DecodeRow;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remote source reading a JSON array of records from disk
pub struct FileSource<R> {
    path: PathBuf,
    cursor: Mutex<PassCursor<R>>,
}

impl<R> FileSource<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cursor: Mutex::new(PassCursor::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<R> RemoteSource for FileSource<R>
where
    R: DecodeRow + DeserializeOwned + Send + Sync,
{
    type Record = R;

    async fn start(&self) -> Result<ListToken, SourceError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            SourceError::Unavailable(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        let records: Vec<R> = serde_json::from_slice(&bytes).map_err(|e| {
            SourceError::Decode(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), records = records.len(), "Loaded route dump");
        Ok(self.cursor.lock().open(records))
    }

    async fn next(&self, token: ListToken) -> Result<Option<R>, SourceError> {
        self.cursor.lock().next(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRoute;
    use crate::source::Enumeration;
    use tempfile::TempDir;
    use tokio::fs;

    const DUMP: &str = r#"[
  {
    "peer_id": "192.0.2.1",
    "prefix": "10.0.0.0",
    "prefix_len": 8,
    "best_and_origin": 65536,
    "next_hop": "192.0.2.254",
    "local_pref": 100
  },
  {
    "peer_id": "192.0.2.2",
    "prefix": "172.16.0.0",
    "prefix_len": 12,
    "best_and_origin": 0,
    "as_path": [2, 1, 253, 232],
    "next_hop": "192.0.2.253",
    "aggregator": [198, 51, 100, 7, 253, 233]
  }
]"#;

    #[tokio::test]
    async fn test_reads_dump() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("routes.json");
        fs::write(&path, DUMP).await.unwrap();

        let source: FileSource<RawRoute> = FileSource::new(&path);
        let mut pass = Enumeration::begin(&source).await.unwrap();

        let first = pass.next_record().await.unwrap().unwrap();
        assert_eq!(first.prefix_len, 8);
        assert_eq!(first.local_pref, 100);
        assert!(first.aggregator.is_empty());

        let second = pass.next_record().await.unwrap().unwrap();
        assert_eq!(second.aggregator.len(), 6);

        assert!(pass.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rereads_on_every_pass() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("routes.json");
        fs::write(&path, DUMP).await.unwrap();

        let source: FileSource<RawRoute> = FileSource::new(&path);
        let first_token = source.start().await.unwrap();

        fs::write(&path, "[]").await.unwrap();
        let second_token = source.start().await.unwrap();

        assert_ne!(first_token, second_token);
        assert!(source.next(second_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let source: FileSource<RawRoute> = FileSource::new(temp_dir.path().join("absent.json"));
        assert!(source.path().ends_with("absent.json"));

        assert!(matches!(
            source.start().await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_file_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("routes.json");
        fs::write(&path, "{ not json").await.unwrap();

        let source: FileSource<RawRoute> = FileSource::new(&path);
        assert!(matches!(
            source.start().await,
            Err(SourceError::Decode(_))
        ));
    }
}
