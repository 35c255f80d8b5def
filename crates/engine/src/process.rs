//! Pool slot backed by a `relax-worker` child process.
//!
//! The slot speaks the NDJSON worker protocol over the child's stdin and
//! stdout and relays every snapshot onto the progress channel. The child's
//! stderr is inherited so worker logs land in the host's log stream.

use std::process::Stdio;

use relax_core::job::Job;
use relax_worker::protocol::{decode_line, encode_line};
use relax_worker::{WorkerCommand, WorkerError, WorkerEvent};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::channels::{ProgressSender, TaskReceiver};
use crate::pool::{report_abandoned, ProcessWorkerConfig};

/// Failure text recorded on a job whose child process went away.
const WORKER_EXITED: &str = "worker process exited before finishing the job";

/// Why a child's session ended without an error.
enum SessionEnd {
    Cancelled,
    TasksClosed,
}

/// What woke an idle slot.
enum Idle {
    Cancelled,
    TasksClosed,
    Task(Box<Job>),
    Output(Option<String>),
}

/// Supervise one worker process, respawning it whenever it dies.
pub(crate) async fn run_slot(
    index: usize,
    config: ProcessWorkerConfig,
    tasks: TaskReceiver,
    progress: ProgressSender,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match session(index, &config, &tasks, &progress, &cancel).await {
            Ok(SessionEnd::Cancelled) => break,
            Ok(SessionEnd::TasksClosed) => {
                tracing::info!(worker = index, "Task channel closed, worker slot exiting");
                break;
            }
            Err(e) => {
                tracing::error!(
                    worker = index,
                    error = %e,
                    respawn_in_ms = config.respawn_backoff.as_millis() as u64,
                    "Worker process failed, respawning",
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.respawn_backoff) => {}
                }
            }
        }
    }
    tracing::debug!(worker = index, "Worker slot stopped");
}

/// Spawn a child and serve tasks through it until it dies or the slot stops.
async fn session(
    index: usize,
    config: &ProcessWorkerConfig,
    tasks: &TaskReceiver,
    progress: &ProgressSender,
    cancel: &CancellationToken,
) -> Result<SessionEnd, WorkerError> {
    let mut child = Command::new(&config.program)
        .args(&config.args)
        .envs(config.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| WorkerError::Protocol("child stdin not captured".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| WorkerError::Protocol("child stdout not captured".into()))?;

    tracing::info!(worker = index, pid = child.id(), program = %config.program.display(), "Worker process spawned");

    let mut pipe = WorkerPipe {
        index,
        stdin,
        lines: BufReader::new(stdout).lines(),
    };
    let result = pipe.serve(tasks, progress, cancel).await;

    if let Err(e) = child.start_kill() {
        tracing::debug!(worker = index, error = %e, "Worker process already gone");
    }
    match child.wait().await {
        Ok(status) => tracing::debug!(worker = index, %status, "Worker process reaped"),
        Err(e) => tracing::warn!(worker = index, error = %e, "Failed to reap worker process"),
    }

    result
}

struct WorkerPipe {
    index: usize,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl WorkerPipe {
    async fn serve(
        &mut self,
        tasks: &TaskReceiver,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, WorkerError> {
        // Construction may retry for a long time; only take work once ready.
        let first = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            line = self.lines.next_line() => line?,
        };
        match first.as_deref().map(decode_line::<WorkerEvent>) {
            Some(Ok(WorkerEvent::Ready)) => {
                tracing::info!(worker = self.index, "Worker process ready");
            }
            Some(Ok(other)) => {
                return Err(WorkerError::Protocol(format!(
                    "expected ready, got {other:?}"
                )))
            }
            Some(Err(e)) => return Err(e),
            None => return Err(WorkerError::Protocol("exited before ready".into())),
        }

        loop {
            // Watch the child while idle so a dead one is replaced before it
            // is handed any work.
            let woke = tokio::select! {
                biased;
                _ = cancel.cancelled() => Idle::Cancelled,
                line = self.lines.next_line() => Idle::Output(line?),
                job = tasks.recv() => match job {
                    Some(job) => Idle::Task(Box::new(job)),
                    None => Idle::TasksClosed,
                },
            };

            match woke {
                Idle::Cancelled => return Ok(SessionEnd::Cancelled),
                Idle::TasksClosed => return Ok(SessionEnd::TasksClosed),
                Idle::Output(None) => {
                    return Err(WorkerError::Protocol("exited while idle".into()));
                }
                Idle::Output(Some(line)) => {
                    if !line.trim().is_empty() {
                        tracing::warn!(worker = self.index, line = %line, "Unexpected output from idle worker");
                    }
                }
                Idle::Task(job) => {
                    if let Some(end) = self.run_job(*job, progress, cancel).await? {
                        return Ok(end);
                    }
                }
            }
        }
    }

    /// Hand one job to the child and relay its snapshots until a terminal
    /// one arrives. `Some` means the slot was cancelled mid-job.
    ///
    /// If the child cannot take the job or dies before finishing it, the
    /// last snapshot seen is reported as `FAILED` and the session errors out
    /// so the slot respawns.
    async fn run_job(
        &mut self,
        job: Job,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<Option<SessionEnd>, WorkerError> {
        let job_id = job.id;
        tracing::debug!(worker = self.index, job_id = %job_id, "Dispatching job to worker process");

        let line = encode_line(&WorkerCommand::Run {
            job: Box::new(job.clone()),
        })?;
        if let Err(e) = self.send(&line).await {
            tracing::error!(
                worker = self.index,
                job_id = %job_id,
                error = %e,
                "Could not hand job to worker process",
            );
            report_abandoned(self.index, progress, job, WORKER_EXITED);
            return Err(e);
        }

        let mut last = job;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(Some(SessionEnd::Cancelled)),
                line = self.lines.next_line() => line,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    tracing::error!(
                        worker = self.index,
                        job_id = %job_id,
                        status = %last.status,
                        "Worker process died mid-task",
                    );
                    report_abandoned(self.index, progress, last, WORKER_EXITED);
                    return Err(WorkerError::Protocol(format!(
                        "worker exited while running job {job_id}"
                    )));
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match decode_line::<WorkerEvent>(&line) {
                Ok(WorkerEvent::Snapshot { job: snapshot }) => {
                    if snapshot.id != job_id {
                        tracing::error!(
                            worker = self.index,
                            expected = %job_id,
                            job_id = %snapshot.id,
                            "Worker reported a job it was not given",
                        );
                    } else {
                        last = (*snapshot).clone();
                    }
                    let terminal = snapshot.id == job_id && snapshot.status.is_terminal();
                    if !progress.send(*snapshot) {
                        tracing::debug!(worker = self.index, job_id = %job_id, "Listener gone, snapshot discarded");
                    }
                    if terminal {
                        return Ok(None);
                    }
                }
                Ok(WorkerEvent::Ready) => {
                    tracing::warn!(worker = self.index, "Unexpected ready from busy worker");
                }
                Err(e) => {
                    tracing::error!(worker = self.index, job_id = %job_id, error = %e, "Malformed worker event");
                }
            }
        }
    }

    async fn send(&mut self, line: &str) -> Result<(), WorkerError> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }
}
