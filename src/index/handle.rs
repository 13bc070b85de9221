//! Shared, swappable reference to the loaded index
//!
//! Handlers take an `Arc` to the current index once per request and keep
//! using it until they finish, so a reload never exposes a partially
//! replaced structure.

use crate::index::error::IndexResult;
use crate::index::matchup::MatchupIndex;
use crate::index::snapshot::read_snapshot;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owner of the index currently being served
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<MatchupIndex>>,
    source: Option<PathBuf>,
}

impl IndexHandle {
    /// Wrap an already loaded index
    pub fn new(index: MatchupIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
            source: None,
        }
    }

    /// Load the snapshot at `path`; fails if it is missing or corrupt
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        let index = read_snapshot(&path)?;

        Ok(Self {
            current: RwLock::new(Arc::new(index)),
            source: Some(path),
        })
    }

    /// The index to use for one request
    pub async fn snapshot(&self) -> Arc<MatchupIndex> {
        Arc::clone(&*self.current.read().await)
    }

    /// Replace the served index, returning the previous one
    pub async fn swap(&self, index: MatchupIndex) -> Arc<MatchupIndex> {
        let mut current = self.current.write().await;
        std::mem::replace(&mut *current, Arc::new(index))
    }

    /// Re-read the snapshot this handle was opened from.
    ///
    /// On failure the current index keeps serving.
    pub async fn reload(&self) -> IndexResult<Arc<MatchupIndex>> {
        let Some(path) = self.source.clone() else {
            return Ok(self.snapshot().await);
        };

        let index = tokio::task::spawn_blocking(move || read_snapshot(path))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        let total = index.total();
        self.swap(index).await;
        tracing::info!(matches = total, "Index snapshot reloaded");

        Ok(self.snapshot().await)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
