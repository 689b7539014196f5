//! Query cache keyed by resource and parameters.
//!
//! Entries are never evicted by mutations; they are marked stale and refetched
//! on the next access. Invalidation matches keys by prefix, so invalidating
//! `["runs"]` also marks `["runs", 7]` and `["runs", {filters}]` stale.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::ClientError;
use crate::models::RunFilters;

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Name(&'static str),
    Id(i64),
    Runs(RunFilters),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Every run query: lists under any filters and individual runs.
    pub fn runs() -> Self {
        Self(vec![KeyPart::Name("runs")])
    }

    pub fn run_list(filters: &RunFilters) -> Self {
        Self(vec![KeyPart::Name("runs"), KeyPart::Runs(filters.clone())])
    }

    pub fn run(id: i64) -> Self {
        Self(vec![KeyPart::Name("runs"), KeyPart::Id(id)])
    }

    pub fn projects() -> Self {
        Self(vec![KeyPart::Name("projects")])
    }

    pub fn project(id: i64) -> Self {
        Self(vec![KeyPart::Name("project"), KeyPart::Id(id)])
    }

    pub fn suites(project_id: i64) -> Self {
        Self(vec![
            KeyPart::Name("projects"),
            KeyPart::Id(project_id),
            KeyPart::Name("suites"),
        ])
    }

    pub fn environments(project_id: i64) -> Self {
        Self(vec![
            KeyPart::Name("projects"),
            KeyPart::Id(project_id),
            KeyPart::Name("environments"),
        ])
    }

    pub fn features(project_id: i64) -> Self {
        Self(vec![KeyPart::Name("features"), KeyPart::Id(project_id)])
    }

    pub fn current_user() -> Self {
        Self(vec![KeyPart::Name("currentUser")])
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0.iter().zip(&prefix.0).all(|(a, b)| a == b)
    }
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    stale: bool,
}

/// Shared, cloneable query cache.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached value for `key` if it is fresh; otherwise run `fetcher`
    /// and cache its result. A failed fetch leaves any previous entry untouched.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, ClientError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        if let Some(value) = self.fresh::<T>(&key) {
            tracing::trace!("cache hit {:?}", key);
            return Ok(value);
        }

        let value = fetcher().await?;
        self.lock().insert(
            key,
            Entry {
                value: Arc::new(value.clone()),
                stale: false,
            },
        );
        Ok(value)
    }

    fn fresh<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        let entries = self.lock();
        let entry = entries.get(key).filter(|e| !e.stale)?;
        entry.value.downcast_ref::<T>().cloned()
    }

    /// The cached value regardless of staleness.
    pub fn peek<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.lock()
            .get(key)
            .and_then(|e| e.value.downcast_ref::<T>().cloned())
    }

    /// Mark every entry under `prefix` stale. Returns how many were marked.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let mut marked = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.stale = true;
                marked += 1;
            }
        }
        tracing::debug!("invalidated {} cache entries under {:?}", marked, prefix);
        marked
    }

    /// `None` if nothing is cached for `key`.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.lock().get(key).map(|e| e.stale)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .finish()
    }
}
