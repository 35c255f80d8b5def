//! Progress listener: the only writer of job state after creation.

use std::sync::Arc;
use std::time::Duration;

use relax_core::job::Job;
use relax_store::JobRepository;
use tokio_util::sync::CancellationToken;

use crate::channels::{ProgressReceiver, Received};

pub struct ProgressListener {
    repo: Arc<dyn JobRepository>,
    poll: Duration,
}

impl ProgressListener {
    pub fn new(repo: Arc<dyn JobRepository>, poll: Duration) -> Self {
        Self { repo, poll }
    }

    /// Apply snapshots until `cancel` fires or every sender is gone.
    ///
    /// Waits at most one `poll` interval per iteration so a shutdown request
    /// is noticed promptly even when no worker is reporting.
    pub async fn run(self, mut progress: ProgressReceiver, cancel: CancellationToken) {
        tracing::info!(poll_ms = self.poll.as_millis() as u64, "Progress listener started");

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Progress listener shutting down");
                break;
            }

            match progress.recv_timeout(self.poll).await {
                Received::Message(snapshot) => self.apply(*snapshot).await,
                Received::Timeout => continue,
                Received::Closed => {
                    tracing::info!("Progress channel closed, listener exiting");
                    break;
                }
            }
        }
    }

    /// Write one snapshot, refusing anything the state machine forbids.
    async fn apply(&self, snapshot: Job) {
        let stored = match self.repo.get(snapshot.id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(job_id = %snapshot.id, error = %e, "Snapshot for unknown job dropped");
                return;
            }
        };

        if !stored.status.can_transition_to(snapshot.status) {
            tracing::error!(
                job_id = %snapshot.id,
                from = %stored.status,
                to = %snapshot.status,
                "Illegal status transition in snapshot, dropped",
            );
            return;
        }

        let job_id = snapshot.id;
        let status = snapshot.status;
        let progress = snapshot.progress;
        match self.repo.update(snapshot).await {
            Ok(()) => {
                tracing::debug!(job_id = %job_id, %status, progress, "Snapshot applied");
                if status.is_terminal() {
                    tracing::info!(job_id = %job_id, %status, "Job reached terminal state");
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to apply snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relax_core::job::{JobParameters, JobStatus};
    use relax_core::structure::Structure;
    use relax_store::InMemoryJobRepo;

    use super::*;
    use crate::channels::progress_channel;

    fn job() -> Job {
        let s = Structure::new(
            vec!["Cu".into()],
            vec![[0.0; 3]],
            [[3.6, 0.0, 0.0], [0.0, 3.6, 0.0], [0.0, 0.0, 3.6]],
            [true; 3],
        );
        Job::new(
            uuid::Uuid::new_v4(),
            JobParameters {
                fmax: 0.05,
                max_steps: 2,
            },
            "mp-30",
            s.clone(),
            s,
        )
    }

    fn spawn_listener(
        repo: Arc<InMemoryJobRepo>,
    ) -> (
        crate::channels::ProgressSender,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let (tx, rx) = progress_channel();
        let cancel = CancellationToken::new();
        let listener = ProgressListener::new(repo, Duration::from_millis(20));
        let handle = tokio::spawn(listener.run(rx, cancel.clone()));
        (tx, cancel, handle)
    }

    #[tokio::test]
    async fn applies_snapshots_in_order() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let mut job = job();
        repo.create(job.clone()).await.unwrap();
        let (tx, cancel, handle) = spawn_listener(Arc::clone(&repo));

        job.start().unwrap();
        tx.send(job.clone());
        job.record_step(-1.0, 0.2).unwrap();
        tx.send(job.clone());
        job.finish(job.slab.clone()).unwrap();
        tx.send(job.clone());
        drop(tx);

        handle.await.unwrap();
        cancel.cancel();
        assert_eq!(repo.get(job.id).await.unwrap(), job);
    }

    #[tokio::test]
    async fn drops_backward_and_unknown_snapshots() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let mut job = job();
        repo.create(job.clone()).await.unwrap();
        let (tx, _cancel, handle) = spawn_listener(Arc::clone(&repo));

        let pending = job.clone();
        job.start().unwrap();
        job.fail("boom").unwrap();
        tx.send(job.clone());
        // FAILED -> PENDING must not be applied.
        tx.send(pending);
        // Nobody created this one.
        let mut stranger = self::job();
        stranger.start().unwrap();
        tx.send(stranger.clone());
        drop(tx);

        handle.await.unwrap();
        assert_eq!(repo.get(job.id).await.unwrap().status, JobStatus::Failed);
        assert!(repo.get(stranger.id).await.is_err());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn stops_within_a_poll_interval_when_cancelled() {
        let repo = Arc::new(InMemoryJobRepo::new());
        let (_tx, cancel, handle) = spawn_listener(repo);

        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener should stop")
            .unwrap();
    }
}
