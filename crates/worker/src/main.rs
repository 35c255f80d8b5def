//! `relax-worker` -- one isolated relaxation worker.
//!
//! Reads `run` commands as NDJSON on stdin and writes `ready` and `snapshot`
//! events to stdout. Logs go to stderr. Exits when stdin closes.
//!
//! # Environment variables
//!
//! | Variable            | Default   | Description                               |
//! |---------------------|-----------|-------------------------------------------|
//! | `WORKER_RETRY_SECS` | `10`      | Backoff between relaxer construction tries |
//! | `LJ_EPSILON`        | `0.0104`  | Potential well depth (eV)                 |
//! | `LJ_SIGMA`          | `3.4`     | Potential zero-crossing distance (Å)      |
//! | `LJ_CUTOFF`         | `8.5`     | Interaction cutoff (Å)                    |
//! | `FIRE_MAX_STEP`     | `0.2`     | Max displacement per optimizer step (Å)   |

use relax_compute::PotentialConfig;
use relax_worker::{stdio, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relax_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = WorkerConfig::from_env();
    let potential = PotentialConfig::from_env();

    tracing::info!(
        pid = std::process::id(),
        epsilon = potential.epsilon,
        sigma = potential.sigma,
        cutoff = potential.cutoff,
        "Starting relax-worker",
    );

    let factory = potential.factory();
    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    stdio::serve(&factory, stdin, stdout, config.retry_backoff)?;

    tracing::info!("Task stream closed, exiting");
    Ok(())
}
