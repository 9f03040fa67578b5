//! Requests issued by a list view and the outcomes that come back

use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CachedPage, QueryCache};
use crate::errors::FetchError;
use crate::models::ResultEnvelope;
use crate::query::{QueryKey, RemoteQuery};
use crate::transport::Transport;

/// One query a controller wants answered. `seq` orders requests of the same
/// controller; only the outcome of the latest one is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub seq: u64,
    pub url: String,
    pub query: RemoteQuery,
    pub key: QueryKey,
    /// Skip the cached page, used by explicit refreshes
    pub bypass_cache: bool,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome<R> {
    pub seq: u64,
    pub result: Result<CachedPage<R>, FetchError>,
}

/// Executes [`FetchRequest`]s through the cache and the injected transport.
/// Cheap to clone so fetches can run on spawned tasks.
pub struct Fetcher<R> {
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache<R>>,
}

impl<R> Clone for Fetcher<R> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<R> fmt::Debug for Fetcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

impl<R> Fetcher<R>
where
    R: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<QueryCache<R>>) -> Self {
        Self { transport, cache }
    }

    pub async fn fetch(&self, request: FetchRequest) -> FetchOutcome<R> {
        if request.bypass_cache {
            self.cache.invalidate(&request.key).await;
        }

        let transport = Arc::clone(&self.transport);
        let url = request.url.clone();
        let params = request.query.to_params();

        debug!("Fetch #{} for {}", request.seq, request.url);
        let result = self
            .cache
            .get_or_fetch(&request.key, move || async move {
                let body = transport.get_json(&url, &params).await?;
                Ok(ResultEnvelope::from_response(&body))
            })
            .await;

        FetchOutcome {
            seq: request.seq,
            result,
        }
    }
}
