use std::{
    collections::HashMap,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

use crate::{
    error::{ClientError, ClientResult},
    query::{QueryFilter, QueryKey, QueryState, QueryStatus},
};

/// Result of one fetch, shared by every caller waiting on the same key
type SharedFetch = Shared<BoxFuture<'static, ClientResult<Value>>>;

/// Cache timing settings
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    /// How long a successful result counts as fresh
    pub stale_time: Duration,
    /// How long an unobserved entry is kept before garbage collection
    pub gc_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(300),
            gc_time: Duration::from_secs(300),
        }
    }
}

struct CacheEntry {
    /// Distinguishes this entry from a removed predecessor under the same key
    generation: u64,
    /// Bumped by every invalidation
    revision: u64,
    data: Option<Value>,
    data_updated_at: Option<Instant>,
    fetched_at: Option<DateTime<Utc>>,
    error: Option<ClientError>,
    in_flight: Option<SharedFetch>,
    invalidated: bool,
    observers: usize,
    last_observed: Instant,
}

impl CacheEntry {
    fn new(generation: u64, now: Instant) -> Self {
        Self {
            generation,
            revision: 0,
            data: None,
            data_updated_at: None,
            fetched_at: None,
            error: None,
            in_flight: None,
            invalidated: false,
            observers: 0,
            last_observed: now,
        }
    }

    fn is_stale(&self, now: Instant, stale_time: Duration) -> bool {
        if self.invalidated {
            return true;
        }
        match self.data_updated_at {
            Some(updated_at) => now.duration_since(updated_at) >= stale_time,
            None => true,
        }
    }

    fn needs_fetch(&self, now: Instant, stale_time: Duration) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        if self.invalidated {
            return true;
        }
        // A failed query waits for an explicit re-trigger
        if self.error.is_some() {
            return false;
        }
        self.data.is_none() || self.is_stale(now, stale_time)
    }

    fn snapshot<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
        now: Instant,
        stale_time: Duration,
    ) -> QueryState<T> {
        let data = self
            .data
            .as_ref()
            .and_then(|value| match serde_json::from_value(value.clone()) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Cached value has unexpected shape");
                    None
                }
            });

        let is_fetching = self.in_flight.is_some();
        let status = match (&data, &self.error) {
            (None, _) if is_fetching => QueryStatus::Loading,
            (None, Some(_)) => QueryStatus::Error,
            (None, None) => QueryStatus::Idle,
            (Some(_), Some(_)) => QueryStatus::Error,
            (Some(_), None) => QueryStatus::Success,
        };

        QueryState {
            status,
            data,
            error: self.error.clone(),
            is_fetching,
            is_stale: self.is_stale(now, stale_time),
            fetched_at: self.fetched_at,
        }
    }
}

/// A fetch still running for an entry that was removed from the cache
struct DetachedFetch {
    generation: u64,
    fetch: SharedFetch,
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    /// Lock order: `entries` before `detached`
    detached: Mutex<HashMap<QueryKey, DetachedFetch>>,
    config: QueryConfig,
    next_generation: AtomicU64,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        // The map is never left half-updated, so a poisoned lock is still usable
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn detached(&self) -> MutexGuard<'_, HashMap<QueryKey, DetachedFetch>> {
        self.detached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Keeps a removed entry's running fetch joinable so the key never has two requests
    fn detach(&self, key: QueryKey, entry: CacheEntry) {
        if let Some(fetch) = entry.in_flight {
            self.detached().insert(
                key,
                DetachedFetch {
                    generation: entry.generation,
                    fetch,
                },
            );
        }
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Stores the outcome of a fetch started at (`generation`, `revision`)
    fn complete(
        &self,
        key: &QueryKey,
        generation: u64,
        revision: u64,
        result: &ClientResult<Value>,
    ) {
        let mut entries = self.entries();

        let Some(entry) = entries
            .get_mut(key)
            .filter(|entry| entry.generation == generation)
        else {
            let mut detached = self.detached();
            if detached.get(key).is_some_and(|d| d.generation == generation) {
                detached.remove(key);
            }
            tracing::debug!(key = %key, "Discarding result for query that is no longer cached");
            return;
        };

        entry.in_flight = None;
        if entry.revision == revision {
            entry.invalidated = false;
        }

        match result {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.data_updated_at = Some(Instant::now());
                entry.fetched_at = Some(Utc::now());
                entry.error = None;
                tracing::debug!(key = %key, "Query resolved");
            }
            Err(err) => {
                tracing::warn!(
                    key = %key,
                    error = %err,
                    has_previous_data = entry.data.is_some(),
                    "Query failed"
                );
                entry.error = Some(err.clone());
            }
        }
    }
}

/// Client-side query cache
///
/// Keyed by [`QueryKey`]. Deduplicates in-flight fetches, serves fresh results without
/// touching the network, and serves stale results while refreshing them in the background.
/// Values are stored as JSON so one cache can hold every response type.
///
/// Constructed once by the composition root and cloned into each view; clones share state.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

/// Entry counts for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub observed: usize,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl QueryClient {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                detached: Mutex::new(HashMap::new()),
                config,
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    /// Returns the current state for `key` without waiting
    ///
    /// Starts a fetch when the key has never been requested, when its data is stale, or when
    /// it was invalidated. A stale result keeps being returned while the refresh runs.
    /// Concurrent observers share one in-flight fetch.
    pub fn observe<T, F, Fut>(&self, key: &QueryKey, fetch: F) -> QueryState<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        self.observe_with_pending(key, fetch).0
    }

    /// Like [`QueryClient::observe`], but waits for the first result when nothing is cached
    pub async fn query<T, F, Fut>(&self, key: &QueryKey, fetch: F) -> QueryState<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let (state, pending) = self.observe_with_pending(key, fetch);

        if state.data.is_some() {
            return state;
        }

        match pending {
            Some(pending) => {
                let _ = pending.await;
                self.state(key)
            }
            None => state,
        }
    }

    /// Forces a fetch (or joins the one in flight) and waits for it
    ///
    /// This is the explicit re-trigger that moves a query out of the error state.
    pub async fn refetch<T, F, Fut>(&self, key: &QueryKey, fetch: F) -> QueryState<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let pending = {
            let now = Instant::now();
            let mut entries = self.inner.entries();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(self.inner.next_generation(), now));
            entry.last_observed = now;

            match &entry.in_flight {
                Some(in_flight) => in_flight.clone(),
                None => {
                    tracing::debug!(key = %key, "Explicit refetch");
                    self.spawn_fetch(key, entry, fetch)
                }
            }
        };

        let _ = pending.await;
        self.state(key)
    }

    /// Read-only snapshot; never starts a fetch
    pub fn state<T: DeserializeOwned>(&self, key: &QueryKey) -> QueryState<T> {
        let entries = self.inner.entries();
        match entries.get(key) {
            Some(entry) => entry.snapshot(key, Instant::now(), self.inner.config.stale_time),
            None => QueryState::idle(),
        }
    }

    /// Marks matching entries stale so their next observation refetches
    ///
    /// A fetch already in flight still lands, but the entry stays stale afterwards.
    pub fn invalidate(&self, filter: &QueryFilter) -> usize {
        let mut entries = self.inner.entries();
        let mut invalidated = 0;

        for (key, entry) in entries.iter_mut() {
            if filter.matches(key) {
                entry.revision += 1;
                entry.invalidated = true;
                invalidated += 1;
            }
        }

        tracing::info!(filter = ?filter, invalidated = invalidated, "Invalidated queries");
        invalidated
    }

    /// Drops an entry
    ///
    /// A fetch still in flight for it keeps running. Its result is discarded, but a new
    /// observation of the key joins it instead of issuing a second request.
    pub fn remove(&self, key: &QueryKey) -> bool {
        let mut entries = self.inner.entries();
        match entries.remove_entry(key) {
            Some((key, entry)) => {
                self.inner.detach(key, entry);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut entries = self.inner.entries();
        for (key, entry) in entries.drain() {
            self.inner.detach(key, entry);
        }
        tracing::info!("Query cache cleared");
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries().contains_key(key)
    }

    pub fn stats(&self) -> QueryCacheStats {
        let entries = self.inner.entries();
        QueryCacheStats {
            entries: entries.len(),
            in_flight: entries.values().filter(|e| e.in_flight.is_some()).count(),
            observed: entries.values().filter(|e| e.observers > 0).count(),
        }
    }

    /// Runs a write and, only if it succeeds, invalidates the given filters
    pub async fn mutate<T, Fut>(
        &self,
        mutation: Fut,
        invalidates: &[QueryFilter],
    ) -> ClientResult<T>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        let result = mutation.await;

        match &result {
            Ok(_) => {
                for filter in invalidates {
                    self.invalidate(filter);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Mutation failed; cache left untouched");
            }
        }

        result
    }

    /// Registers interest in `key` for as long as the returned guard lives
    pub fn subscribe(&self, key: &QueryKey) -> QuerySubscription {
        let now = Instant::now();
        let mut entries = self.inner.entries();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(self.inner.next_generation(), now));
        entry.observers += 1;
        entry.last_observed = now;

        QuerySubscription {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            generation: entry.generation,
        }
    }

    /// Removes idle, unobserved entries older than `gc_time`
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.config.gc_time;
        let mut entries = self.inner.entries();
        let before = entries.len();

        entries.retain(|_, entry| {
            entry.observers > 0
                || entry.in_flight.is_some()
                || now.duration_since(entry.last_observed) < gc_time
        });

        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(
                removed = removed,
                remaining = entries.len(),
                "Collected unused queries"
            );
        }
        removed
    }

    /// Spawns a task that runs [`QueryClient::collect_garbage`] every `interval`
    pub fn start_garbage_collector(&self, interval: Duration) -> GarbageCollectorHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let client = self.clone();

        let task = tokio::spawn(async move {
            client.garbage_collector_task(interval, shutdown_rx).await;
        });

        GarbageCollectorHandle { shutdown_tx, task }
    }

    async fn garbage_collector_task(
        &self,
        interval: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(interval_secs = interval.as_secs(), "Query garbage collector started");
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.collect_garbage();
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Query garbage collector stopped");
                    break;
                }
            }
        }
    }

    fn observe_with_pending<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetch: F,
    ) -> (QueryState<T>, Option<SharedFetch>)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let now = Instant::now();
        let stale_time = self.inner.config.stale_time;
        let mut entries = self.inner.entries();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(self.inner.next_generation(), now));
        entry.last_observed = now;

        if entry.needs_fetch(now, stale_time) {
            if entry.data.is_some() {
                tracing::debug!(key = %key, "Serving stale data while refetching");
            } else {
                tracing::debug!(key = %key, "Cache miss");
            }
            self.spawn_fetch(key, entry, fetch);
        } else if entry.in_flight.is_some() {
            tracing::debug!(key = %key, "Joining in-flight fetch");
        } else {
            tracing::debug!(key = %key, "Cache hit");
        }

        (
            entry.snapshot(key, now, stale_time),
            entry.in_flight.clone(),
        )
    }

    /// Starts the fetch on its own task so it completes even if every waiter goes away
    ///
    /// Called with the entries lock held.
    fn spawn_fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        entry: &mut CacheEntry,
        fetch: F,
    ) -> SharedFetch
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let generation = entry.generation;
        let revision = entry.revision;
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let detached = self.inner.detached().remove(key);

        let handle: JoinHandle<ClientResult<Value>> = match detached {
            Some(detached) => {
                tracing::debug!(key = %key, "Joining fetch left behind by a removed entry");
                tokio::spawn(async move {
                    let result = detached.fetch.await;
                    inner.complete(&task_key, generation, revision, &result);
                    result
                })
            }
            None => tokio::spawn(async move {
                let outcome = AssertUnwindSafe(async move { fetch().await })
                    .catch_unwind()
                    .await;

                let result = match outcome {
                    Ok(Ok(data)) => serde_json::to_value(data).map_err(ClientError::from),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(ClientError::Internal("fetch panicked".to_string())),
                };

                inner.complete(&task_key, generation, revision, &result);
                result
            }),
        };

        let shared = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ClientError::Internal(format!("fetch task failed: {}", e))))
        }
        .boxed()
        .shared();

        entry.in_flight = Some(shared.clone());
        shared
    }
}

/// RAII marker that a view is displaying a key
///
/// While any subscription is alive the entry is exempt from garbage collection.
pub struct QuerySubscription {
    inner: Arc<Inner>,
    key: QueryKey,
    generation: u64,
}

impl QuerySubscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for QuerySubscription {
    fn drop(&mut self) {
        let mut entries = self.inner.entries();
        if let Some(entry) = entries
            .get_mut(&self.key)
            .filter(|entry| entry.generation == self.generation)
        {
            entry.observers = entry.observers.saturating_sub(1);
            entry.last_observed = Instant::now();
        }
    }
}

/// Handle for stopping the background garbage collector
pub struct GarbageCollectorHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl GarbageCollectorHandle {
    /// Signals the collector to stop and waits for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}
