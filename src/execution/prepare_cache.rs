//! Prepared-statement cache.
//!
//! Preparing a statement costs a round trip to the backend, so prepared
//! handles are memoized by logical identity. Concurrent requests for the
//! same key while a prepare is still in flight are coalesced onto one
//! shared future; the backend sees at most one outstanding prepare per
//! key at any time.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{BackendError, PreparedStatement};

/// Logical identity of a prepared statement.
///
/// The same statement text prepared under a different default keyspace
/// or a different user is a different entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrepareKey {
    pub keyspace: Option<String>,
    pub user: Option<String>,
    pub statement: String,
}

type SharedPrepare = Shared<BoxFuture<'static, Result<Arc<PreparedStatement>, BackendError>>>;

struct CacheSlot {
    /// Identifies this insertion, so a failure evicts exactly the entry
    /// it belongs to and never a newer retry.
    epoch: u64,
    last_access: Instant,
    future: SharedPrepare,
}

/// Memoizes backend prepares keyed by [`PrepareKey`].
pub struct PreparedStatementCache {
    entries: DashMap<PrepareKey, CacheSlot>,
    max_entries: usize,
    /// Keep failed prepares cached (fail fast on repeats) instead of
    /// evicting them.
    preserve_failures: bool,
    epochs: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PreparedStatementCache {
    pub fn new(max_entries: usize, preserve_failures: bool) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            preserve_failures,
            epochs: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the cached handle for `key`, or run `prepare_fn` and cache
    /// its outcome.
    ///
    /// Callers that miss while another prepare for the same key is in
    /// flight await that same future; `prepare_fn` runs at most once per
    /// cached entry. By default a failed prepare is evicted so the next
    /// identical request retries; with `preserve_failures` the failure
    /// stays cached and repeats fail fast.
    pub async fn get_or_prepare<F, Fut>(
        &self,
        key: &PrepareKey,
        prepare_fn: F,
    ) -> Result<Arc<PreparedStatement>, BackendError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<PreparedStatement>, BackendError>> + Send + 'static,
    {
        if let Some(mut slot) = self.entries.get_mut(key) {
            slot.last_access = Instant::now();
            self.hits.fetch_add(1, Ordering::Relaxed);
            let (epoch, future) = (slot.epoch, slot.future.clone());
            drop(slot);
            return self.await_prepare(key, epoch, future).await;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        if self.entries.len() >= self.max_entries {
            self.evict_lru();
        }

        // The entry call holds the key's shard lock, so exactly one
        // racer inserts; the rest share its future.
        let (epoch, future) = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.last_access = Instant::now();
                (slot.epoch, slot.future.clone())
            }
            Entry::Vacant(vacant) => {
                let epoch = self.epochs.fetch_add(1, Ordering::Relaxed);
                let future: SharedPrepare = prepare_fn().boxed().shared();
                vacant.insert(CacheSlot {
                    epoch,
                    last_access: Instant::now(),
                    future: future.clone(),
                });
                (epoch, future)
            }
        };
        self.await_prepare(key, epoch, future).await
    }

    async fn await_prepare(
        &self,
        key: &PrepareKey,
        epoch: u64,
        future: SharedPrepare,
    ) -> Result<Arc<PreparedStatement>, BackendError> {
        match future.await {
            Ok(prepared) => Ok(prepared),
            Err(err) => {
                if !self.preserve_failures {
                    self.entries.remove_if(key, |_, slot| slot.epoch == epoch);
                }
                Err(err)
            }
        }
    }

    /// Evict the least recently used resolved entry. In-flight entries
    /// are never evicted.
    fn evict_lru(&self) {
        let mut oldest_key: Option<PrepareKey> = None;
        let mut oldest_time = Instant::now();

        for entry in self.entries.iter() {
            if entry.future.peek().is_none() {
                continue;
            }
            if entry.last_access < oldest_time {
                oldest_time = entry.last_access;
                oldest_key = Some(entry.key().clone());
            }
        }

        if let Some(key) = oldest_key {
            tracing::debug!("Evicting prepared statement for {:?}", key.statement);
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> PreparedCacheStats {
        PreparedCacheStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct PreparedCacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}
