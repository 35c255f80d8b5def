use std::time::Duration;

/// Worker settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause between failed relaxer construction attempts (default: 10s).
    pub retry_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// | Env Var             | Default |
    /// |---------------------|---------|
    /// | `WORKER_RETRY_SECS` | `10`    |
    pub fn from_env() -> Self {
        let retry_secs: u64 = std::env::var("WORKER_RETRY_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("WORKER_RETRY_SECS must be a valid u64");

        Self {
            retry_backoff: Duration::from_secs(retry_secs),
        }
    }
}
