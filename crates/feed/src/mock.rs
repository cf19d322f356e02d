//! In-memory feed for testing.

use crate::error::{ErrorKind, Result};
use crate::retry::RetryPolicy;
use crate::source::{FeedSource, parse_shard};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU32, Ordering};

/// In-memory [`FeedSource`] for testing.
///
/// Shard bodies are held as text and run through [`parse_shard`] exactly as
/// the HTTP feed does. Failures can be scripted per shard to exercise the
/// retry policy and the builder's failure handling.
pub struct MockFeed {
    shards: Vec<String>,
    failures: Mutex<HashMap<u32, u32>>,
    fetches: AtomicU32,
    retry: RetryPolicy,
}

impl MockFeed {
    pub fn with_shards(shards: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            shards: shards.into_iter().map(Into::into).collect(),
            failures: Mutex::new(HashMap::new()),
            fetches: AtomicU32::new(0),
            retry: RetryPolicy::from(&vigil_config::RetryConfig {
                max_attempts: Some(5),
                initial_delay_ms: 1,
                max_delay_ms: 5,
                multiplier: 2.0,
            }),
        }
    }

    /// Shard `index` fails with a transient error the next `times` times it
    /// is fetched. `u32::MAX` is as good as "forever".
    pub fn failing(self, index: u32, times: u32) -> Self {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).insert(index, times);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Total number of fetch attempts so far, retries included.
    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn fetch_once(&self, index: u32) -> Result<Vec<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let Some(body) = self.shards.get(index as usize) else {
            exn::bail!(ErrorKind::NoSuchShard(index));
        };
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(remaining) = failures.get_mut(&index)
            && *remaining > 0
        {
            *remaining -= 1;
            exn::bail!(ErrorKind::Status(503));
        }
        Ok(parse_shard(body))
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    fn name(&self) -> &str {
        "mock"
    }

    fn shard_count(&self) -> u32 {
        u32::try_from(self.shards.len()).unwrap_or(u32::MAX)
    }

    async fn fetch(&self, index: u32) -> Result<Vec<String>> {
        self.retry.run(|| async move { self.fetch_once(index) }).await
    }
}
