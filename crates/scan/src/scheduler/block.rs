//! Every task in one shared, bounded pool.

use super::{Leaves, Plan, ScanEvent, ScanOptions, ScanSummary, step};
use crate::error::Result;
use async_stream::stream;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use vigil_store::HashStore;

/// Drain the plan's work through a single pool of `plan.concurrency` slots.
///
/// Expanding an archive occupies a slot just like digesting a file does, and
/// whatever comes out of it joins the same queue. Newest work is taken first,
/// so an archive's members are scanned (and its scratch directory released)
/// before the walk moves on.
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

        let mut pending = plan.work;
        pending.reverse();
        let mut processing = FuturesUnordered::new();
        loop {
            while processing.len() < plan.concurrency
                && let Some(work) = pending.pop()
            {
                processing.push(step(store, work, options, Leaves::Scan));
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

        yield Ok(ScanEvent::Complete(summary));
    })
}
