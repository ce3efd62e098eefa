//! Bounded concurrent fetch execution
//!
//! A batch of URLs becomes a stream of fetch futures driven by
//! `buffer_unordered`, so at most `workers` requests are open at once and
//! results come back in completion order.

use crate::config::FetchConfig;
use crate::crawler::fetcher::{fetch_url, FetchOutcome};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One URL together with its fetch outcome
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub outcome: FetchOutcome,
}

/// Fixed-size pool of concurrent fetches
#[derive(Clone)]
pub struct WorkerPool {
    client: Client,
    config: Arc<FetchConfig>,
    workers: usize,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        client: Client,
        config: FetchConfig,
        workers: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            config: Arc::new(config),
            workers: workers.max(1),
            shutdown,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetches every URL of `batch`, yielding one result per URL
    ///
    /// Fetch failures are reported as [`FetchOutcome::Failed`]. Once the
    /// shutdown token is cancelled, URLs whose fetch has not started yield
    /// [`FetchOutcome::Cancelled`].
    pub fn dispatch(&self, batch: Vec<String>) -> BoxStream<'static, FetchResult> {
        let client = self.client.clone();
        let config = Arc::clone(&self.config);

        dispatch_with(batch, self.workers, self.shutdown.clone(), move |url| {
            let client = client.clone();
            let config = Arc::clone(&config);
            async move { fetch_url(&client, &url, &config).await }
        })
    }
}

/// Runs `fetch` over `batch` with at most `workers` calls in flight
pub fn dispatch_with<F, Fut>(
    batch: Vec<String>,
    workers: usize,
    shutdown: CancellationToken,
    fetch: F,
) -> BoxStream<'static, FetchResult>
where
    F: Fn(String) -> Fut + Send + 'static,
    Fut: Future<Output = FetchOutcome> + Send + 'static,
{
    stream::iter(batch)
        .map(move |url| {
            // Evaluated when a slot frees up, right before the fetch starts.
            let pending = (!shutdown.is_cancelled()).then(|| fetch(url.clone()));
            async move {
                let outcome = match pending {
                    Some(fut) => fut.await,
                    None => FetchOutcome::Cancelled,
                };
                FetchResult { url, outcome }
            }
        })
        .buffer_unordered(workers.max(1))
        .boxed()
}
