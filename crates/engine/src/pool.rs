//! Fixed-size pool of isolated workers.
//!
//! Each slot is a long-lived Tokio task that owns one worker (a child
//! process or an in-process relaxer) and feeds it one job at a time from
//! the shared task channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relax_core::collaborators::RelaxerFactory;
use relax_core::job::Job;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channels::{ProgressSender, TaskReceiver};
use crate::{local, process};

/// How long `terminate` waits for a slot before aborting it.
const SLOT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Launch settings for `relax-worker` child processes.
#[derive(Debug, Clone)]
pub struct ProcessWorkerConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra environment for the child on top of the inherited one.
    pub envs: Vec<(String, String)>,
    /// Pause before respawning a child that died.
    pub respawn_backoff: Duration,
}

impl ProcessWorkerConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            respawn_backoff: Duration::from_secs(1),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Where slots get their relaxer from.
#[derive(Clone)]
pub enum WorkerBackend {
    /// Every slot supervises a `relax-worker` child process.
    Process(ProcessWorkerConfig),
    /// Every slot builds its own relaxer from `factory` on the blocking pool.
    InProcess {
        factory: Arc<dyn RelaxerFactory>,
        retry_backoff: Duration,
    },
}

impl WorkerBackend {
    fn name(&self) -> &'static str {
        match self {
            WorkerBackend::Process(_) => "process",
            WorkerBackend::InProcess { .. } => "in-process",
        }
    }
}

/// Close out a job whose worker went away before finishing it.
///
/// `last` is the newest snapshot the slot saw for the job. It becomes
/// `FAILED` with `reason` so callers never wait on a job nobody is running.
pub(crate) fn report_abandoned(index: usize, progress: &ProgressSender, mut last: Job, reason: &str) {
    let job_id = last.id;
    if let Err(e) = last.fail(reason) {
        tracing::warn!(worker = index, job_id = %job_id, error = %e, "Abandoned job already terminal");
        return;
    }
    tracing::error!(worker = index, job_id = %job_id, reason, "Marking abandoned job as failed");
    if !progress.send(last) {
        tracing::debug!(worker = index, job_id = %job_id, "Listener gone, failure snapshot discarded");
    }
}

pub struct WorkerPool {
    slots: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Spawn `count` slots pulling from `tasks` and reporting to `progress`.
    pub fn start(
        backend: &WorkerBackend,
        count: usize,
        tasks: TaskReceiver,
        progress: ProgressSender,
    ) -> Self {
        let cancel = CancellationToken::new();
        let slots = (0..count)
            .map(|index| {
                let tasks = tasks.clone();
                let progress = progress.clone();
                let cancel = cancel.child_token();
                match backend {
                    WorkerBackend::Process(config) => tokio::spawn(process::run_slot(
                        index,
                        config.clone(),
                        tasks,
                        progress,
                        cancel,
                    )),
                    WorkerBackend::InProcess {
                        factory,
                        retry_backoff,
                    } => tokio::spawn(local::run_slot(
                        index,
                        Arc::clone(factory),
                        *retry_backoff,
                        tasks,
                        progress,
                        cancel,
                    )),
                }
            })
            .collect();

        tracing::info!(workers = count, backend = backend.name(), "Worker pool started");
        Self { slots, cancel }
    }

    /// Stop every slot without draining in-flight jobs.
    ///
    /// Child processes are killed. A computation already running on the
    /// blocking pool cannot be preempted; it finishes in the background and
    /// its snapshots are discarded.
    pub async fn terminate(self) {
        self.cancel.cancel();
        for (index, handle) in self.slots.into_iter().enumerate() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(SLOT_STOP_TIMEOUT, handle).await.is_err() {
                tracing::warn!(worker = index, "Worker slot did not stop in time, aborting");
                abort.abort();
            }
        }
        tracing::info!("Worker pool terminated");
    }
}
