use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use relax_core::collaborators::RelaxerFactory;

use crate::pool::{ProcessWorkerConfig, WorkerBackend};
use crate::service::ServiceConfig;

/// Name of the worker executable looked up next to the running binary.
const WORKER_BIN_NAME: &str = "relax-worker";

/// How pool slots isolate their relaxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerIsolation {
    /// One `relax-worker` child process per slot.
    Process,
    /// One Tokio task per slot, computing on the blocking pool.
    InProcess,
}

impl FromStr for WorkerIsolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(WorkerIsolation::Process),
            "in-process" | "in_process" | "inprocess" => Ok(WorkerIsolation::InProcess),
            other => Err(format!("unknown worker isolation: {other}")),
        }
    }
}

/// Orchestration settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of pool slots (default: `2`).
    pub workers: usize,
    pub isolation: WorkerIsolation,
    /// Worker executable for process isolation.
    pub worker_bin: PathBuf,
    /// Bounded wait of the progress listener (default: 5s).
    pub listener_poll: Duration,
    /// How long shutdown waits for the listener (default: 10s).
    pub listener_join_timeout: Duration,
    /// Relaxer construction backoff for in-process slots (default: 10s).
    pub worker_retry: Duration,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                               |
    /// |------------------------------|---------------------------------------|
    /// | `NUM_WORKERS`                | `2`                                   |
    /// | `WORKER_ISOLATION`           | `process`                             |
    /// | `WORKER_BIN`                 | `relax-worker` beside the current exe |
    /// | `LISTENER_POLL_MS`           | `5000`                                |
    /// | `LISTENER_JOIN_TIMEOUT_SECS` | `10`                                  |
    /// | `WORKER_RETRY_SECS`          | `10`                                  |
    pub fn from_env() -> Self {
        let workers: usize = std::env::var("NUM_WORKERS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("NUM_WORKERS must be a valid usize");
        assert!(workers > 0, "NUM_WORKERS must be at least 1");

        let isolation: WorkerIsolation = std::env::var("WORKER_ISOLATION")
            .unwrap_or_else(|_| "process".into())
            .parse()
            .expect("WORKER_ISOLATION must be `process` or `in-process`");

        let worker_bin = std::env::var("WORKER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_worker_bin());

        let listener_poll_ms: u64 = std::env::var("LISTENER_POLL_MS")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("LISTENER_POLL_MS must be a valid u64");

        let listener_join_timeout_secs: u64 = std::env::var("LISTENER_JOIN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("LISTENER_JOIN_TIMEOUT_SECS must be a valid u64");

        let worker_retry_secs: u64 = std::env::var("WORKER_RETRY_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("WORKER_RETRY_SECS must be a valid u64");

        Self {
            workers,
            isolation,
            worker_bin,
            listener_poll: Duration::from_millis(listener_poll_ms),
            listener_join_timeout: Duration::from_secs(listener_join_timeout_secs),
            worker_retry: Duration::from_secs(worker_retry_secs),
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            workers: self.workers,
            listener_poll: self.listener_poll,
            listener_join_timeout: self.listener_join_timeout,
        }
    }

    /// Worker backend for the configured isolation. `factory` is only used
    /// in-process; worker processes build their own.
    pub fn backend(&self, factory: Arc<dyn RelaxerFactory>) -> WorkerBackend {
        match self.isolation {
            WorkerIsolation::Process => {
                WorkerBackend::Process(ProcessWorkerConfig::new(self.worker_bin.clone()))
            }
            WorkerIsolation::InProcess => WorkerBackend::InProcess {
                factory,
                retry_backoff: self.worker_retry,
            },
        }
    }
}

fn default_worker_bin() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BIN_NAME)))
        .unwrap_or_else(|| PathBuf::from(WORKER_BIN_NAME))
}
