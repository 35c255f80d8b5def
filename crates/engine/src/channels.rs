//! Task and progress channels between the orchestrator and its workers.
//!
//! Both carry whole [`Job`] values. The task channel fans out to every pool
//! slot: whichever idle slot asks first gets the next job. The progress
//! channel fans in to the single listener and preserves the order in which
//! each slot sent its snapshots.

use std::sync::Arc;
use std::time::Duration;

use relax_core::error::CoreError;
use relax_core::job::Job;
use tokio::sync::{mpsc, Mutex};

/// Create the orchestrator → worker channel.
pub fn task_channel() -> (TaskSender, TaskReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskSender(tx), TaskReceiver(Arc::new(Mutex::new(rx))))
}

/// Create the worker → listener channel.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender(tx), ProgressReceiver(rx))
}

#[derive(Clone)]
pub struct TaskSender(mpsc::UnboundedSender<Job>);

impl TaskSender {
    /// Enqueue a job. Fails once every receiver is gone.
    pub fn send(&self, job: Job) -> Result<(), CoreError> {
        self.0.send(job).map_err(|_| CoreError::ShuttingDown)
    }
}

/// Shared receiving end; clones compete for jobs.
#[derive(Clone)]
pub struct TaskReceiver(Arc<Mutex<mpsc::UnboundedReceiver<Job>>>);

impl TaskReceiver {
    /// Wait for the next job. `None` once all senders are dropped and the
    /// queue is drained. Cancel safe.
    pub async fn recv(&self) -> Option<Job> {
        self.0.lock().await.recv().await
    }
}

#[derive(Clone)]
pub struct ProgressSender(mpsc::UnboundedSender<Job>);

impl ProgressSender {
    /// Publish a snapshot. Returns `false` when the listener is gone, in
    /// which case the snapshot is discarded.
    pub fn send(&self, snapshot: Job) -> bool {
        self.0.send(snapshot).is_ok()
    }
}

/// Outcome of a bounded wait on the progress channel.
#[derive(Debug)]
pub enum Received {
    Message(Box<Job>),
    Timeout,
    /// Every sender is gone and the queue is empty.
    Closed,
}

pub struct ProgressReceiver(mpsc::UnboundedReceiver<Job>);

impl ProgressReceiver {
    /// Wait at most `timeout` for the next snapshot.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Received {
        match tokio::time::timeout(timeout, self.0.recv()).await {
            Ok(Some(job)) => Received::Message(Box::new(job)),
            Ok(None) => Received::Closed,
            Err(_) => Received::Timeout,
        }
    }
}
