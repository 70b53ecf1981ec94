//! crates/atlas_core/src/cache.rs
//!
//! Keyed read cache with a freshness window and single-flight requests.
//!
//! Every read the controllers make goes through a `ReadCache`: a fresh entry is
//! served without touching the gateway, concurrent requests for the same key share
//! one in-flight fetch, and a response is always filed under the key that issued it.
//! All caches of one `ReadCaches` set share an epoch; bumping it (after a successful
//! vote) makes every entry stale at once.

use crate::domain::{Tool, ToolPage};
use crate::ports::{GatewayResult, ToolQuery};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

type SharedFetch<V> = Shared<BoxFuture<'static, GatewayResult<V>>>;

struct Entry<V> {
    value: V,
    fetched_at: Instant,
    epoch: u64,
}

struct InFlight<V> {
    id: u64,
    epoch: u64,
    fetch: SharedFetch<V>,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    in_flight: HashMap<K, InFlight<V>>,
    next_id: u64,
}

impl<K: Eq + Hash, V> Inner<K, V> {
    /// Drops entries that can no longer be served.
    fn prune(&mut self, epoch: u64, ttl: Duration) {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.epoch == epoch && e.fetched_at.elapsed() < ttl);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!(dropped, "Pruned stale cache entries.");
        }
    }
}

/// One keyed cache of gateway reads.
pub struct ReadCache<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
    epoch: Arc<AtomicU64>,
    ttl: Duration,
}

impl<K, V> ReadCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn new(ttl: Duration, epoch: Arc<AtomicU64>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                next_id: 0,
            })),
            epoch,
            ttl,
        }
    }

    /// Returns the fresh cached value for `key`, if any.
    pub async fn peek(&self, key: &K) -> Option<V> {
        let inner = self.inner.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        inner
            .entries
            .get(key)
            .filter(|e| e.epoch == epoch && e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    /// Whether a fetch for `key` is currently in flight.
    pub async fn is_fetching(&self, key: &K) -> bool {
        let inner = self.inner.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        inner.in_flight.get(key).is_some_and(|f| f.epoch == epoch)
    }

    /// Serves `key` from the cache, joins an in-flight fetch for it, or starts one.
    ///
    /// Failed fetches are never cached. A fetch that completes after the epoch moved
    /// on is returned to its callers but not stored.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> GatewayResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<V>> + Send + 'static,
    {
        let shared = {
            let mut inner = self.inner.lock().await;
            let epoch = self.epoch.load(Ordering::SeqCst);

            if let Some(entry) = inner.entries.get(&key) {
                if entry.epoch == epoch && entry.fetched_at.elapsed() < self.ttl {
                    debug!("Cache hit.");
                    return Ok(entry.value.clone());
                }
            }

            match inner.in_flight.get(&key) {
                Some(in_flight) if in_flight.epoch == epoch => {
                    debug!("Joining in-flight fetch.");
                    in_flight.fetch.clone()
                }
                _ => {
                    debug!("Cache miss, fetching.");
                    let id = inner.next_id;
                    inner.next_id += 1;
                    let shared = self.spawn_fetch(key.clone(), id, epoch, fetch());
                    inner.in_flight.insert(
                        key,
                        InFlight {
                            id,
                            epoch,
                            fetch: shared.clone(),
                        },
                    );
                    shared
                }
            }
        };
        shared.await
    }

    /// Wraps `fut` so that its completion files the result, whichever waiter polls it.
    fn spawn_fetch<Fut>(&self, key: K, id: u64, epoch: u64, fut: Fut) -> SharedFetch<V>
    where
        Fut: Future<Output = GatewayResult<V>> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let current_epoch = Arc::clone(&self.epoch);
        let ttl = self.ttl;
        async move {
            let result = fut.await;
            let mut inner = store.lock().await;
            if inner.in_flight.get(&key).is_some_and(|f| f.id == id) {
                inner.in_flight.remove(&key);
            }
            if let Ok(value) = &result {
                if current_epoch.load(Ordering::SeqCst) == epoch {
                    inner.prune(epoch, ttl);
                    inner.entries.insert(
                        key,
                        Entry {
                            value: value.clone(),
                            fetched_at: Instant::now(),
                            epoch,
                        },
                    );
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}

//=========================================================================================
// The Cache Set Shared by All Controllers
//=========================================================================================

/// Key of a listing read. The two pagination modes never share entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolsKey {
    Page { query: ToolQuery, page: usize },
    Feed { query: ToolQuery, page: usize },
}

/// Every cached read of the application, invalidated together.
pub struct ReadCaches {
    epoch: Arc<AtomicU64>,
    pub tools: ReadCache<ToolsKey, ToolPage>,
    pub quick: ReadCache<String, Vec<Tool>>,
    pub votes: ReadCache<(), HashSet<Uuid>>,
}

impl ReadCaches {
    pub fn new(ttl: Duration) -> Self {
        let epoch = Arc::new(AtomicU64::new(0));
        Self {
            tools: ReadCache::new(ttl, Arc::clone(&epoch)),
            quick: ReadCache::new(ttl, Arc::clone(&epoch)),
            votes: ReadCache::new(ttl, Arc::clone(&epoch)),
            epoch,
        }
    }

    /// Marks every cached read stale so the next access revalidates.
    pub fn invalidate_all(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(epoch, "Invalidated all cached reads.");
    }

    /// Bumped on every invalidation; lets accumulated views detect staleness.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}
