//! Deciding what gets scanned, and on how many workers.
//!
//! A scan starts from a single target path and turns it into [`Work`]:
//! - *visit* a file: sniff it, then either digest it or, if it's a container,
//!   extract it into a scratch directory and visit everything inside;
//! - *digest* a file: digest and look up, no sniffing.
//!
//! Archive expansion feeds new work back into the same queue, tagged with its
//! nesting depth, so arbitrarily nested archives never recurse. How that
//! queue is drained is the [`ScanPolicy`]:
//! - [`ScanPolicy::Block`] (see [`block`]) runs everything, expansions
//!   included, through one bounded pool. Whichever worker is free takes the
//!   next item.
//! - [`ScanPolicy::Cycle`] (see [`cycle`]) first expands every archive, then
//!   deals the files out round-robin to a fixed set of workers that each
//!   process their own list, one file at a time.

mod block;
mod cycle;

use crate::engine::scan_file;
use crate::error::{ErrorKind, Result};
use crate::scratch::ScratchDir;
use crate::task::{Match, ScanContext, ScanTask};
use crate::walk::walk;
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use vigil_archive::Container;
use vigil_config::{HashingMode, ScanConfig, ScanPolicy};
use vigil_store::HashStore;

/// Everything that shapes a scan.
#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// Number of workers (tasks in flight at once). At least one.
    pub threads: usize,
    pub policy: ScanPolicy,
    pub hashing: HashingMode,
    /// Archives inside this many other archives are not expanded.
    pub max_archive_depth: usize,
    /// Digest container files too, not just their members.
    pub digest_containers: bool,
    /// Where scratch directories are created. Defaults to the system
    /// temporary directory.
    pub scratch_root: Option<PathBuf>,
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            threads: config.threads.max(1),
            policy: config.policy,
            hashing: config.hashing,
            max_archive_depth: config.max_archive_depth,
            digest_containers: config.digest_containers,
            scratch_root: None,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

/// Progress events emitted by [`scan`].
///
/// [`Started`](Self::Started) always comes first and
/// [`Complete`](Self::Complete) last. [`DiscoveryComplete`](Self::DiscoveryComplete)
/// is only emitted under [`ScanPolicy::Cycle`], once every archive has been
/// expanded and the files have been dealt out. Everything else arrives in no
/// particular order.
///
/// A fatal error terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug)]
pub enum ScanEvent {
    Started,
    /// Number of files about to be digested.
    DiscoveryComplete(u64),
    /// An archive was extracted; `entries` files came out of it.
    Expanded { archive: PathBuf, entries: u64 },
    /// A file or archive that couldn't be scanned. The scan carries on.
    Skipped { path: PathBuf, reason: String },
    Matched(Match),
    Complete(ScanSummary),
}

/// Running totals of a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Files digested and looked up.
    pub files_scanned: u64,
    /// Files and archives given up on (see [`ScanEvent::Skipped`]).
    pub files_skipped: u64,
    pub archives_expanded: u64,
    /// Archives that could not be extracted. Also counted as skipped.
    pub archives_failed: u64,
    pub matches: u64,
}

impl ScanSummary {
    fn record(&mut self, step: &Step) {
        self.files_scanned += step.scanned;
        self.archives_failed += step.failed_archives;
        for event in &step.events {
            match event {
                ScanEvent::Expanded { .. } => self.archives_expanded += 1,
                ScanEvent::Skipped { .. } => self.files_skipped += 1,
                ScanEvent::Matched(_) => self.matches += 1,
                _ => {},
            }
        }
    }
}

/// One unit of scheduled work.
#[derive(Debug)]
enum Work {
    /// Sniff the file: expand it if it's a container, digest it otherwise.
    Visit(ScanTask),
    /// Digest the file, whatever it is.
    Digest(ScanTask),
}

/// What happens to plain files found while visiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Leaves {
    Scan,
    /// Hand them back as [`Work::Digest`] instead, for later.
    Collect,
}

/// Outcome of a single unit of work.
#[derive(Default)]
struct Step {
    events: Vec<ScanEvent>,
    work: Vec<Work>,
    scanned: u64,
    failed_archives: u64,
}

impl Step {
    fn skip(&mut self, task: &ScanTask, err: &crate::error::Error) {
        tracing::warn!(path = %task.display.display(), error = ?err, "Skipping");
        let kind: &ErrorKind = err;
        self.events.push(ScanEvent::Skipped {
            path: task.display.clone(),
            reason: kind.to_string(),
        });
    }
}

/// Where a scan starts from.
struct Plan {
    work: Vec<Work>,
    events: Vec<ScanEvent>,
    concurrency: usize,
}

/// Scan `target`, streaming [`ScanEvent`]s.
///
/// - A directory is walked; every regular file in it is visited.
/// - A container file is expanded and its contents scanned.
/// - Any other regular file is scanned on its own, on a single worker.
/// - Anything else (missing, a socket...) is [`ErrorKind::InvalidPath`] and
///   nothing is scanned.
///
/// Per-file problems become [`ScanEvent::Skipped`]. The only other error
/// that ends the stream is a failing digest store.
pub fn scan<'a>(
    store: &'a HashStore,
    target: impl Into<PathBuf>,
    options: &'a ScanOptions,
) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    let target = target.into();
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(ScanEvent::Started);
        tracing::info!(path = %target.display(), policy = %options.policy, threads = options.threads, "Scan started");
        let plan = match plan(&target, options).await {
            Ok(plan) => plan,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        let events: Pin<Box<dyn Stream<Item = Result<ScanEvent>> + 'a>> = match options.policy {
            ScanPolicy::Block => Box::pin(block::run(store, plan, options)),
            ScanPolicy::Cycle => Box::pin(cycle::run(store, plan, options)),
        };
        for await event in events {
            if let Ok(ScanEvent::Complete(summary)) = &event {
                tracing::info!(?summary, "Scan complete");
            }
            yield event;
        }
    })
}

async fn plan(target: &Path, options: &ScanOptions) -> Result<Plan> {
    let Ok(metadata) = tokio::fs::metadata(target).await else {
        exn::bail!(ErrorKind::InvalidPath(target.to_path_buf()));
    };
    if metadata.is_dir() {
        let mut step = Step::default();
        let mut files = Box::pin(walk(target));
        while let Some(entry) = files.next().await {
            match entry {
                Ok(path) => step.work.push(Work::Visit(ScanTask::new(path, ScanContext::Directory))),
                Err(e) => step.skip(&ScanTask::new(target, ScanContext::Directory), &e),
            }
        }
        return Ok(Plan {
            work: step.work,
            events: step.events,
            concurrency: options.threads.max(1),
        });
    }
    if !metadata.is_file() {
        exn::bail!(ErrorKind::InvalidPath(target.to_path_buf()));
    }
    let task = ScanTask::new(target, ScanContext::File);
    let plan = match detect(&task.path).await {
        Ok(Some(_)) => Plan {
            work: vec![Work::Visit(task)],
            events: Vec::new(),
            concurrency: options.threads.max(1),
        },
        // Unreadable files go down the single-file path, which will report
        // the read failure.
        Ok(None) | Err(_) => Plan {
            work: vec![Work::Digest(task)],
            events: Vec::new(),
            concurrency: 1,
        },
    };
    Ok(plan)
}

/// Sniff the file at `path` for a container format, on a blocking thread.
async fn detect(path: &Path) -> Result<Option<Container>> {
    let owned = path.to_path_buf();
    let detected = tokio::task::spawn_blocking(move || Container::detect(owned)).await;
    match detected {
        Ok(Ok(container)) => Ok(container),
        _ => exn::bail!(ErrorKind::FileAccess(path.to_path_buf())),
    }
}

/// Carry out one unit of work.
///
/// Only a store failure is an error; everything else is reported through the
/// returned [`Step`].
async fn step(store: &HashStore, work: Work, options: &ScanOptions, leaves: Leaves) -> Result<Step> {
    let mut step = Step::default();
    let task = match work {
        Work::Digest(task) => {
            digest(store, &task, options, &mut step).await?;
            return Ok(step);
        },
        Work::Visit(task) => task,
    };
    let container = match detect(&task.path).await {
        Ok(container) => container,
        Err(e) => {
            step.skip(&task, &e);
            return Ok(step);
        },
    };
    match (container, leaves) {
        (None, Leaves::Scan) => digest(store, &task, options, &mut step).await?,
        (None, Leaves::Collect) => step.work.push(Work::Digest(task)),
        (Some(container), _) => {
            if options.digest_containers {
                step.work.push(Work::Digest(task.clone()));
            }
            expand(&task, container, options, &mut step).await;
        },
    }
    Ok(step)
}

async fn digest(store: &HashStore, task: &ScanTask, options: &ScanOptions, step: &mut Step) -> Result<()> {
    match scan_file(store, task, options.hashing).await {
        Ok(found) => {
            step.scanned += 1;
            if let Some(found) = found {
                step.events.push(ScanEvent::Matched(found));
            }
        },
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => step.skip(task, &e),
    }
    Ok(())
}

/// Extract the container `task` into a fresh scratch directory and queue
/// everything that came out of it for a visit.
async fn expand(task: &ScanTask, container: Container, options: &ScanOptions, step: &mut Step) {
    if task.depth >= options.max_archive_depth {
        tracing::warn!(
            path = %task.display.display(),
            depth = task.depth,
            max = options.max_archive_depth,
            "Archive nested too deeply, not expanding"
        );
        step.events.push(ScanEvent::Skipped {
            path: task.display.clone(),
            reason: format!("archive nested deeper than {} levels", options.max_archive_depth),
        });
        return;
    }

    let scratch = match ScratchDir::create(options.scratch_root.as_deref(), &task.display, task.scratch.clone()) {
        Ok(scratch) => Arc::new(scratch),
        Err(e) => {
            let err = exn::Exn::from(ErrorKind::Extraction(task.display.clone()));
            tracing::error!(path = %task.display.display(), error = %e, "Could not create scratch directory");
            step.failed_archives += 1;
            step.skip(task, &err);
            return;
        },
    };

    let (archive, dest) = (task.path.clone(), scratch.path().to_path_buf());
    let extracted = tokio::task::spawn_blocking(move || container.extract(archive, dest)).await;
    let entries = match extracted {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            tracing::error!(path = %task.display.display(), format = %container, error = ?e, "Could not extract archive");
            step.failed_archives += 1;
            step.skip(task, &exn::Exn::from(ErrorKind::Extraction(task.display.clone())));
            return;
        },
        Err(e) => {
            tracing::error!(path = %task.display.display(), error = %e, "Extraction task failed");
            step.failed_archives += 1;
            step.skip(task, &exn::Exn::from(ErrorKind::Extraction(task.display.clone())));
            return;
        },
    };
    tracing::info!(path = %task.display.display(), format = %container, entries, "Expanded archive");
    step.events.push(ScanEvent::Expanded {
        archive: task.display.clone(),
        entries,
    });

    let mut members = Box::pin(walk(scratch.path()));
    while let Some(member) = members.next().await {
        match member {
            Ok(path) => step.work.push(Work::Visit(ScanTask::member(task, &scratch, path))),
            Err(e) => step.skip(task, &e),
        }
    }
}
