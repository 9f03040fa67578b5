//! Short-lived cache of fetched pages
//!
//! Entries are keyed by [`QueryKey`] and served for a bounded window. A fetch
//! that is still running is shared with every caller asking for the same key,
//! so there is at most one request in flight per distinct query.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::FetchError;
use crate::models::ResultEnvelope;
use crate::query::QueryKey;

pub type CachedPage<R> = Arc<ResultEnvelope<R>>;

type SharedFetch<R> = Shared<BoxFuture<'static, Result<CachedPage<R>, FetchError>>>;

struct CacheEntry<R> {
    fetched_at: Instant,
    page: CachedPage<R>,
}

struct CacheState<R> {
    entries: HashMap<QueryKey, CacheEntry<R>>,
    in_flight: HashMap<QueryKey, SharedFetch<R>>,
}

pub struct QueryCache<R> {
    ttl: Duration,
    state: Mutex<CacheState<R>>,
}

impl<R> QueryCache<R>
where
    R: Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Return the fresh cached page for `key`, join the running fetch for it, or
    /// start `fetch`. Only successful results are stored.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &QueryKey,
        fetch: F,
    ) -> Result<CachedPage<R>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResultEnvelope<R>, FetchError>> + Send + 'static,
    {
        let pending = {
            let mut state = self.state.lock().await;

            if let Some(entry) = state.entries.get(key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    debug!("Cache hit for {}", key.as_str());
                    return Ok(Arc::clone(&entry.page));
                }
            }

            match state.in_flight.get(key) {
                Some(running) => {
                    debug!("Joining in-flight fetch for {}", key.as_str());
                    running.clone()
                }
                None => {
                    let shared = fetch().map(|result| result.map(Arc::new)).boxed().shared();
                    state.in_flight.insert(key.clone(), shared.clone());
                    shared
                }
            }
        };

        let result = pending.clone().await;

        let mut state = self.state.lock().await;
        let owns_slot = state
            .in_flight
            .get(key)
            .is_some_and(|running| running.ptr_eq(&pending));
        if owns_slot {
            state.in_flight.remove(key);
            if let Ok(page) = &result {
                let ttl = self.ttl;
                state.entries.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
                state.entries.insert(
                    key.clone(),
                    CacheEntry {
                        fetched_at: Instant::now(),
                        page: Arc::clone(page),
                    },
                );
            }
        }

        result
    }

    /// Drop the stored page for `key` so the next request goes to the server.
    pub async fn invalidate(&self, key: &QueryKey) {
        self.state.lock().await.entries.remove(key);
    }

    pub async fn contains(&self, key: &QueryKey) -> bool {
        self.state
            .lock()
            .await
            .entries
            .get(key)
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.ttl)
    }
}
