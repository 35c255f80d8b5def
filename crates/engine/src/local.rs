//! Pool slot that relaxes jobs inside the host process.
//!
//! Compute runs on Tokio's blocking pool so it never stalls the async
//! runtime. The relaxer is moved into each blocking call and handed back
//! when the job is done, so it stays owned by exactly one slot.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use relax_core::collaborators::{Relaxer, RelaxerFactory};
use relax_core::job::Job;
use relax_worker::{construct_with_retry, process_job};
use tokio_util::sync::CancellationToken;

use crate::channels::{ProgressSender, TaskReceiver};
use crate::pool::report_abandoned;

const WORKER_CRASHED: &str = "worker crashed before finishing the job";

pub(crate) async fn run_slot(
    index: usize,
    factory: Arc<dyn RelaxerFactory>,
    retry_backoff: Duration,
    tasks: TaskReceiver,
    progress: ProgressSender,
    cancel: CancellationToken,
) {
    let Some(mut relaxer) = build_relaxer(index, &factory, retry_backoff, &cancel).await else {
        tracing::debug!(worker = index, "Worker slot stopped before relaxer was ready");
        return;
    };
    tracing::info!(worker = index, "In-process worker ready");

    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = tasks.recv() => match job {
                Some(job) => job,
                None => {
                    tracing::info!(worker = index, "Task channel closed, worker slot exiting");
                    break;
                }
            },
        };

        let job_id = job.id;
        let last = Arc::new(Mutex::new(job.clone()));
        let seen = Arc::clone(&last);
        let sender = progress.clone();
        let run = tokio::task::spawn_blocking(move || {
            let mut relaxer = relaxer;
            process_job(relaxer.as_mut(), job, &mut |snapshot: &Job| {
                if let Ok(mut latest) = seen.lock() {
                    latest.clone_from(snapshot);
                }
                sender.send(snapshot.clone());
            });
            relaxer
        });

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!(worker = index, job_id = %job_id, "Abandoning in-flight job on shutdown");
                break;
            }
            joined = run => match joined {
                Ok(returned) => relaxer = returned,
                Err(e) => {
                    tracing::error!(worker = index, job_id = %job_id, error = %e, "Worker task crashed, rebuilding relaxer");
                    let latest = last.lock().map(|job| job.clone()).ok();
                    if let Some(latest) = latest {
                        report_abandoned(index, &progress, latest, WORKER_CRASHED);
                    }
                    match build_relaxer(index, &factory, retry_backoff, &cancel).await {
                        Some(rebuilt) => relaxer = rebuilt,
                        None => break,
                    }
                }
            },
        }
    }
    tracing::debug!(worker = index, "Worker slot stopped");
}

/// Build a relaxer on the blocking pool, starting over if the construction
/// task itself crashes. `None` once the slot is cancelled.
async fn build_relaxer(
    index: usize,
    factory: &Arc<dyn RelaxerFactory>,
    retry_backoff: Duration,
    cancel: &CancellationToken,
) -> Option<Box<dyn Relaxer>> {
    loop {
        let factory = Arc::clone(factory);
        let stop = cancel.clone();
        let build = tokio::task::spawn_blocking(move || {
            construct_with_retry(factory.as_ref(), retry_backoff, &|| stop.is_cancelled())
        });
        match build.await {
            Ok(relaxer) => return relaxer,
            Err(e) => {
                tracing::error!(worker = index, error = %e, "Relaxer construction task failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(retry_backoff) => {}
                }
            }
        }
    }
}
