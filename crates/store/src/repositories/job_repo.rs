//! Job repository contract and its in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use relax_core::error::CoreError;
use relax_core::job::Job;
use relax_core::types::JobId;
use tokio::sync::Mutex;

/// Concurrency-safe store of current job snapshots, keyed by id.
///
/// Values are whole snapshots: `update` replaces the stored record, it does
/// not merge fields.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job. Fails with `JobAlreadyExists` if the id is taken.
    async fn create(&self, job: Job) -> Result<(), CoreError>;

    /// Point-in-time copy of a job. Fails with `JobNotFound`.
    async fn get(&self, id: JobId) -> Result<Job, CoreError>;

    /// Replace an existing job. Fails with `JobNotFound`.
    async fn update(&self, job: Job) -> Result<(), CoreError>;
}

/// Stores every job in RAM behind a single lock.
///
/// No eviction and no persistence: memory grows linearly with the number of
/// jobs and everything is lost on restart.
#[derive(Default)]
pub struct InMemoryJobRepo {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepo {
    async fn create(&self, job: Job) -> Result<(), CoreError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(CoreError::JobAlreadyExists(job.id));
        }
        tracing::debug!(job_id = %job.id, "Job stored");
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        self.jobs
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(CoreError::JobNotFound(id))
    }

    async fn update(&self, job: Job) -> Result<(), CoreError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job;
                Ok(())
            }
            None => Err(CoreError::JobNotFound(job.id)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
