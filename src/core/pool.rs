//! Bounded, order-preserving execution of a batch of copy jobs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::core::models::{BatchReport, CopyJob, CopyResult};
use crate::core::worker::VerifiedCopyWorker;

/// Fixed-size group of blocking workers draining a shared job queue.
#[derive(Clone)]
pub struct WorkerPool {
    worker: VerifiedCopyWorker,
}

impl WorkerPool {
    pub fn new(worker: VerifiedCopyWorker) -> Self {
        Self { worker }
    }

    /// Run every job with at most `max_parallel` copies in flight.
    ///
    /// The report has one result per job, in submission order, regardless of
    /// completion order. Failed jobs never cancel their siblings.
    pub async fn run(&self, jobs: Vec<CopyJob>, max_parallel: usize) -> BatchReport {
        let total = jobs.len();
        if total == 0 {
            return BatchReport::default();
        }

        let workers = max_parallel.clamp(1, total);
        let jobs: Arc<[CopyJob]> = jobs.into();
        let next = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, CopyResult)>();

        debug!(jobs = total, workers, "Dispatching batch");

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let jobs = Arc::clone(&jobs);
            let next = Arc::clone(&next);
            let tx = tx.clone();
            let worker = self.worker.clone();

            set.spawn_blocking(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(job) = jobs.get(index) else {
                        break;
                    };
                    let result = worker.execute(job);
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut slots: Vec<Option<CopyResult>> = vec![None; total];
        while let Some((index, result)) = rx.recv().await {
            slots[index] = Some(result);
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Copy worker terminated abnormally");
            }
        }

        let results = slots
            .into_iter()
            .zip(jobs.iter())
            .map(|(slot, job)| slot.unwrap_or_else(|| CopyResult::failed(job.destination.clone(), 0)))
            .collect();

        BatchReport { results }
    }
}
