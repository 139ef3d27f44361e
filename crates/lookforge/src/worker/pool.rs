use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures_util::future::join_all;
use futures_util::FutureExt;
use log::{debug, warn};

use crate::worker::progress::{ProgressEvent, ProgressReporter, RunProgress};

/// Runs `tasks` with at most `concurrency` of them in flight and returns one
/// slot per task in submission order: `Some` on success, `None` on failure.
///
/// A failing or panicking task is logged and recorded as `None`; it never
/// affects its siblings, and this function itself never fails. A
/// `concurrency` of zero is treated as one.
///
/// Workers share a cursor into the task list, so a new task starts as soon
/// as any running one settles.
pub async fn run_bounded<T, E, Fut>(
    tasks: Vec<Fut>,
    concurrency: usize,
    progress: &dyn ProgressReporter,
) -> Vec<Option<T>>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let total = tasks.len();
    if total == 0 {
        return Vec::new();
    }

    let worker_count = concurrency.max(1).min(total);
    progress.report(ProgressEvent::Started {
        total,
        concurrency: worker_count,
    });

    let slots: Vec<Mutex<Option<Fut>>> = tasks.into_iter().map(|t| Mutex::new(Some(t))).collect();
    let cursor = AtomicUsize::new(0);
    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let workers = (0..worker_count).map(|worker_id| {
        let slots = &slots;
        let cursor = &cursor;
        let succeeded = &succeeded;
        let failed = &failed;

        async move {
            let mut finished: Vec<(usize, Option<T>)> = Vec::new();
            loop {
                let slot = cursor.fetch_add(1, Ordering::SeqCst);
                if slot >= total {
                    break;
                }

                let task = slots[slot]
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .take();
                let Some(task) = task else {
                    continue;
                };

                debug!("Worker {} starting task {}", worker_id, slot);
                let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(value)) => {
                        succeeded.fetch_add(1, Ordering::SeqCst);
                        Some(value)
                    }
                    Ok(Err(e)) => {
                        warn!("Task {} failed: {}", slot, e);
                        failed.fetch_add(1, Ordering::SeqCst);
                        None
                    }
                    Err(_) => {
                        warn!("Task {} panicked", slot);
                        failed.fetch_add(1, Ordering::SeqCst);
                        None
                    }
                };

                progress.report(ProgressEvent::TaskFinished {
                    slot,
                    ok: outcome.is_some(),
                    progress: RunProgress {
                        succeeded: succeeded.load(Ordering::SeqCst),
                        failed: failed.load(Ordering::SeqCst),
                        total,
                    },
                });
                finished.push((slot, outcome));
            }
            finished
        }
    });

    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    for (slot, outcome) in join_all(workers).await.into_iter().flatten() {
        results[slot] = outcome;
    }

    progress.report(ProgressEvent::Finished {
        progress: RunProgress {
            succeeded: succeeded.load(Ordering::SeqCst),
            failed: failed.load(Ordering::SeqCst),
            total,
        },
    });

    results
}
