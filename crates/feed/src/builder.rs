use crate::error::{ErrorKind, Result};
use crate::source::FeedSource;
use async_stream::{stream, try_stream};
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::ffi::OsString;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::instrument;
use vigil_config::Config;
use vigil_store::{Database, HashStore};

const STAGING_SUFFIX: &str = ".partial";
const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Progress events emitted by [`DatabaseBuilder::build`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`ShardFetched`](Self::ShardFetched) and [`ShardStored`](Self::ShardStored),
///    once per shard each, in pairs, shards in no particular order.
/// 3. [`Finalized`](Self::Finalized), exactly once.
/// 4. [`Complete`](Self::Complete), exactly once, once the store is in place.
///
/// An error terminates the stream early, in which case nothing after it is
/// emitted and no store is left behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildEvent {
    Started { shards: u32 },
    ShardFetched { index: u32, lines: usize },
    ShardStored { index: u32, rows: u64 },
    /// Every shard is in and the sentinel digest has been removed.
    Finalized { rows: u64, sentinels_removed: u64 },
    Complete,
}

/// Builds a digest store from a [`FeedSource`].
///
/// The store is written to a staging file next to the final path and only
/// renamed into place once every shard made it in. A failed build leaves
/// nothing behind, and an existing store at the final path stays untouched
/// until the very last step.
pub struct DatabaseBuilder<'a> {
    feed: &'a dyn FeedSource,
    path: PathBuf,
    concurrency: usize,
}

impl<'a> DatabaseBuilder<'a> {
    pub fn new(feed: &'a dyn FeedSource, path: impl Into<PathBuf>) -> Self {
        Self {
            feed,
            path: path.into(),
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Maximum number of shard fetches in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<store>.partial`, where the store is built before being moved into place.
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_default();
        name.push(STAGING_SUFFIX);
        self.path.with_file_name(name)
    }

    /// Stream [`BuildEvent`]s while fetching every shard and storing its
    /// digests.
    ///
    /// Shards are fetched concurrently (see [`with_concurrency`](Self::with_concurrency)),
    /// but written one at a time through the store's single connection, each
    /// shard in its own transaction.
    pub fn build(&self) -> impl Stream<Item = Result<BuildEvent>> + '_ {
        stream!({
            let staging = self.staging_path();
            let mut inner = Box::pin(self.build_inner(&staging));
            while let Some(event) = inner.next().await {
                match event {
                    Ok(event) => yield Ok(event),
                    Err(err) => {
                        // Release the staging store before deleting it.
                        drop(inner);
                        discard(&staging).await;
                        yield Err(err);
                        return;
                    },
                }
            }
        })
    }

    fn build_inner<'s>(&'s self, staging: &'s Path) -> impl Stream<Item = Result<BuildEvent>> + 's {
        try_stream!({
            let shards = self.feed.shard_count();
            yield BuildEvent::Started { shards };
            tracing::info!(feed = self.feed.name(), shards, store = %self.path.display(), "Building digest store");

            discard(staging).await;
            if let Some(parent) = staging.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
            }
            let db = Database::create(staging).await.or_raise(|| ErrorKind::Store)?;
            let store = HashStore::from(&db);

            let feed = self.feed;
            let mut fetches = futures::stream::iter(0..shards)
                .map(move |index| async move { (index, feed.fetch(index).await) })
                .buffer_unordered(self.concurrency);
            while let Some((index, result)) = fetches.next().await {
                let lines = result?;
                yield BuildEvent::ShardFetched { index, lines: lines.len() };
                let rows = store.insert_batch(&lines).await.or_raise(|| ErrorKind::Store)?;
                tracing::debug!(index, rows, "Shard stored");
                yield BuildEvent::ShardStored { index, rows };
            }

            let sentinels_removed = store.remove_sentinel().await.or_raise(|| ErrorKind::Store)?;
            let rows = store.count().await.or_raise(|| ErrorKind::Store)?;
            db.close().await;
            yield BuildEvent::Finalized { rows, sentinels_removed };

            tokio::fs::rename(staging, &self.path).await.or_raise(|| ErrorKind::Io(self.path.clone()))?;
            tracing::info!(rows, store = %self.path.display(), "Digest store built");
            yield BuildEvent::Complete;
        })
    }
}

/// Remove a staging file, if there is one.
async fn discard(staging: &Path) {
    match tokio::fs::remove_file(staging).await {
        Ok(()) => tracing::debug!(path = %staging.display(), "Removed staging store"),
        Err(e) if e.kind() == IoErrorKind::NotFound => {},
        Err(e) => tracing::warn!(path = %staging.display(), error = %e, "Could not remove staging store"),
    }
}

/// Make sure a valid store exists at the configured path, building it if
/// needed.
///
/// - With `store.bypass_validation` set, returns straight away.
/// - A store that validates is used as is.
/// - Otherwise the store is rebuilt and revalidated, up to
///   `store.max_build_attempts` times, before giving up with
///   [`ErrorKind::Integrity`].
///
/// Build errors are logged and count as a failed attempt, except
/// cancellation which is returned immediately. `observer` sees every
/// [`BuildEvent`] of every attempt.
#[instrument(skip_all, fields(store = %config.store.path.display()))]
pub async fn ensure_database(
    config: &Config,
    feed: &dyn FeedSource,
    mut observer: impl FnMut(&BuildEvent),
) -> Result<()> {
    let store = &config.store;
    if store.bypass_validation {
        tracing::info!("Skipping digest store validation");
        return Ok(());
    }
    if HashStore::validate(&store.path, store.expected_rows).await {
        tracing::info!("Digest store is valid");
        return Ok(());
    }

    let builder = DatabaseBuilder::new(feed, &store.path).with_concurrency(config.feed.concurrency);
    for attempt in 1..=store.max_build_attempts {
        tracing::info!(attempt, max = store.max_build_attempts, "Digest store is missing or invalid, building");
        let mut events = Box::pin(builder.build());
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => observer(&event),
                Err(err) if matches!(&*err, ErrorKind::Cancelled) => return Err(err),
                Err(err) => {
                    tracing::error!(attempt, error = ?err, "Digest store build failed");
                    break;
                },
            }
        }
        drop(events);
        if HashStore::validate(&store.path, store.expected_rows).await {
            return Ok(());
        }
    }
    exn::bail!(ErrorKind::Integrity(store.max_build_attempts))
}
