//! Discover everything, then deal tasks out round-robin.

use super::{Leaves, Plan, ScanEvent, ScanOptions, ScanSummary, Work, step};
use crate::error::Result;
use crate::task::ScanTask;
use async_stream::stream;
use futures::stream::{self, FuturesUnordered};
use futures::{Stream, StreamExt};
use vigil_store::HashStore;

/// Deal `tasks` out to `workers` lists, round-robin, in order.
pub(super) fn partition(tasks: Vec<ScanTask>, workers: usize) -> Vec<Vec<ScanTask>> {
    let workers = workers.max(1);
    let mut lists: Vec<Vec<ScanTask>> = (0..workers).map(|_| Vec::new()).collect();
    for (task, list) in tasks.into_iter().zip((0..workers).cycle()) {
        lists[list].push(task);
    }
    lists
}

/// Two phases.
///
/// 1. Discovery: visit everything, expanding archives (transitively) as they
///    turn up, using up to `plan.concurrency` workers. Plain files are only
///    collected.
/// 2. The collected files are partitioned across `plan.concurrency` workers
///    before any of them is digested. Each worker then goes through its own
///    list, one file at a time.
///
/// Assignment is deterministic for a given discovery order; the price is that
/// one big file holds up everything else on its worker.
pub(super) fn run<'a>(
    store: &'a HashStore,
    plan: Plan,
    options: &'a ScanOptions,
) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    stream!({
        let mut summary = ScanSummary::default();
        for event in plan.events {
            summary.files_skipped += u64::from(matches!(event, ScanEvent::Skipped { .. }));
            yield Ok(event);
        }

        let mut tasks = Vec::new();
        let mut pending = plan.work;
        pending.reverse();
        let mut processing = FuturesUnordered::new();
        loop {
            while processing.len() < plan.concurrency
                && let Some(work) = pending.pop()
            {
                match work {
                    Work::Digest(task) => tasks.push(task),
                    visit @ Work::Visit(_) => processing.push(step(store, visit, options, Leaves::Collect)),
                }
            }
            let Some(result) = processing.next().await else {
                break;
            };
            let done = match result {
                Ok(done) => done,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            summary.record(&done);
            pending.extend(done.work.into_iter().rev());
            for event in done.events {
                yield Ok(event);
            }
        }

        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(ScanEvent::DiscoveryComplete(u64::try_from(tasks.len()).unwrap_or(0)));
        tracing::debug!(tasks = tasks.len(), workers = plan.concurrency, "Discovery complete, partitioning");

        let workers = partition(tasks, plan.concurrency).into_iter().filter(|list| !list.is_empty()).map(move |list| {
            Box::pin(stream::iter(list).then(move |task| step(store, Work::Digest(task), options, Leaves::Scan)))
        });
        let mut merged = stream::select_all(workers);
        while let Some(result) = merged.next().await {
            let done = match result {
                Ok(done) => done,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            summary.record(&done);
            for event in done.events {
                yield Ok(event);
            }
        }

        yield Ok(ScanEvent::Complete(summary));
    })
}
