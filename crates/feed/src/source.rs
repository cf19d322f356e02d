use crate::error::Result;
use async_trait::async_trait;

/// A numbered, sharded source of digest lines.
///
/// Shards are indexed `0..shard_count()`. Implementations own their retry
/// behaviour: by the time [`fetch`](Self::fetch) fails, retrying the call is
/// not expected to help.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Used for logging only.
    fn name(&self) -> &str;

    fn shard_count(&self) -> u32;

    /// Fetch one shard and return its digests, already filtered through
    /// [`parse_shard`].
    async fn fetch(&self, index: u32) -> Result<Vec<String>>;
}

/// Split a shard body into digest lines.
///
/// Surrounding whitespace (`\r` included) is trimmed. Blank lines and `#`
/// comment lines are dropped. Lines are otherwise passed through untouched,
/// the feed is trusted to contain lowercase hex digests.
pub fn parse_shard(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
