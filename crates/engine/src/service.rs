//! Relaxation service: composition root and lifecycle owner of the pipeline.

use std::sync::Arc;
use std::time::Duration;

use relax_core::collaborators::{StructureSource, StructureTransform};
use relax_core::error::CoreError;
use relax_core::job::{Job, JobParameters};
use relax_core::types::JobId;
use relax_store::JobRepository;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channels::{progress_channel, task_channel, TaskReceiver, TaskSender};
use crate::listener::ProgressListener;
use crate::pool::{WorkerBackend, WorkerPool};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Number of workers in the pool. With zero, jobs are accepted and stay
    /// queued as `PENDING`.
    pub workers: usize,
    /// Bounded wait of the listener between shutdown checks.
    pub listener_poll: Duration,
    /// How long `shutdown` waits for the listener to exit.
    pub listener_join_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            listener_poll: Duration::from_secs(5),
            listener_join_timeout: Duration::from_secs(10),
        }
    }
}

/// Background machinery torn down by `shutdown`.
struct Runtime {
    listener: JoinHandle<()>,
    pool: WorkerPool,
}

/// Creates jobs, hands them to the worker pool and serves their current
/// state from the repository.
///
/// Created once at startup via [`RelaxationService::start`]; the returned
/// `Arc` can be cloned into request handlers.
pub struct RelaxationService {
    repo: Arc<dyn JobRepository>,
    source: Arc<dyn StructureSource>,
    transform: Arc<dyn StructureTransform>,
    tasks: TaskSender,
    /// Holds the queue open while no slot is alive to receive.
    _queue: TaskReceiver,
    /// Shutdown flag, also observed by the listener.
    cancel: CancellationToken,
    runtime: Mutex<Option<Runtime>>,
    config: ServiceConfig,
}

impl RelaxationService {
    /// Spawn the worker pool and the progress listener.
    pub fn start(
        repo: Arc<dyn JobRepository>,
        source: Arc<dyn StructureSource>,
        transform: Arc<dyn StructureTransform>,
        backend: WorkerBackend,
        config: ServiceConfig,
    ) -> Arc<Self> {
        let (task_tx, task_rx) = task_channel();
        let (progress_tx, progress_rx) = progress_channel();
        let cancel = CancellationToken::new();

        let pool = WorkerPool::start(&backend, config.workers, task_rx.clone(), progress_tx);
        let listener = ProgressListener::new(Arc::clone(&repo), config.listener_poll);
        let listener = tokio::spawn(listener.run(progress_rx, cancel.clone()));

        tracing::info!(workers = config.workers, "Relaxation service started");

        Arc::new(Self {
            repo,
            source,
            transform,
            tasks: task_tx,
            _queue: task_rx,
            cancel,
            runtime: Mutex::new(Some(Runtime { listener, pool })),
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fetch the material, derive its slab, store a PENDING job and queue it.
    ///
    /// Returns the job as created; callers poll [`get_job`](Self::get_job)
    /// for progress. Structure source errors are returned unchanged.
    pub async fn create_job(
        &self,
        material_id: &str,
        fmax: f64,
        max_steps: u32,
        api_key: &str,
    ) -> Result<Job, CoreError> {
        let parameters = JobParameters { fmax, max_steps };
        parameters.validate()?;
        if self.is_shutting_down() {
            return Err(CoreError::ShuttingDown);
        }

        let bulk = self.source.fetch(material_id, api_key).await?;
        let slab = self.transform.derive_relaxation_structure(&bulk)?;

        let job = Job::new(uuid::Uuid::new_v4(), parameters, material_id, bulk, slab);
        let job_id = job.id;

        if let Err(e) = self.repo.create(job.clone()).await {
            tracing::error!(job_id = %job_id, error = %e, "Job id collision on create");
            return Err(match e {
                CoreError::JobAlreadyExists(id) => {
                    CoreError::Internal(format!("generated job id {id} already exists"))
                }
                other => other,
            });
        }

        if let Err(e) = self.tasks.send(job.clone()) {
            tracing::error!(job_id = %job_id, error = %e, "Could not queue job");
            self.discard_unqueued(job).await;
            return Err(CoreError::Internal(format!("job {job_id} could not be queued")));
        }

        tracing::info!(
            job_id = %job_id,
            material_id,
            formula = %job.chemical_formula,
            atoms = job.slab.len(),
            fmax,
            max_steps,
            "Relaxation job queued",
        );
        Ok(job)
    }

    /// Mark a stored job that never reached the queue as failed.
    async fn discard_unqueued(&self, mut job: Job) {
        let job_id = job.id;
        if let Err(e) = job.fail("job could not be queued") {
            tracing::error!(job_id = %job_id, error = %e, "Could not fail unqueued job");
            return;
        }
        if let Err(e) = self.repo.update(job).await {
            tracing::error!(job_id = %job_id, error = %e, "Could not store failure of unqueued job");
        }
    }

    /// Current snapshot of a job.
    pub async fn get_job(&self, id: JobId) -> Result<Job, CoreError> {
        self.repo.get(id).await
    }

    /// Stop the listener and terminate every worker.
    ///
    /// In-flight jobs are not drained. Only the first call does anything;
    /// later calls return immediately.
    pub async fn shutdown(&self) {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return;
        };
        tracing::info!("Shutting down relaxation service");
        self.cancel.cancel();

        let join_timeout = self.config.listener_join_timeout;
        let abort = runtime.listener.abort_handle();
        match tokio::time::timeout(join_timeout, runtime.listener).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Progress listener task failed"),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = join_timeout.as_secs_f64(),
                    "Progress listener did not stop in time, aborting",
                );
                abort.abort();
            }
        }

        runtime.pool.terminate().await;
        tracing::info!("Relaxation service shut down complete");
    }
}
