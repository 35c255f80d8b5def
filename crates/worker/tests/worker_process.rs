//! Drives the real `relax-worker` binary over its stdio protocol.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use relax_core::job::{Job, JobParameters, JobStatus, FAILED_PROGRESS};
use relax_core::structure::Structure;
use relax_worker::protocol::{decode_line, encode_line};
use relax_worker::{WorkerCommand, WorkerEvent};

struct Worker {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Worker {
    fn spawn() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_relax-worker"))
            .env_remove("LJ_EPSILON")
            .env_remove("LJ_SIGMA")
            .env_remove("LJ_CUTOFF")
            .env_remove("FIRE_MAX_STEP")
            .env("RUST_LOG", "relax_worker=debug")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("spawn relax-worker");
        let stdin = child.stdin.take();
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self {
            child,
            stdin,
            stdout,
        }
    }

    fn next_event(&mut self) -> WorkerEvent {
        let mut line = String::new();
        let n = self.stdout.read_line(&mut line).unwrap();
        assert!(n > 0, "worker closed stdout");
        decode_line(&line).unwrap()
    }

    fn run(&mut self, job: &Job) {
        let line = encode_line(&WorkerCommand::Run {
            job: Box::new(job.clone()),
        })
        .unwrap();
        let stdin = self.stdin.as_mut().unwrap();
        stdin.write_all(line.as_bytes()).unwrap();
        stdin.flush().unwrap();
    }

    /// Snapshots for one job, up to and including its terminal state.
    fn snapshots_until_terminal(&mut self) -> Vec<Job> {
        let mut snapshots = Vec::new();
        loop {
            match self.next_event() {
                WorkerEvent::Snapshot { job } => {
                    let done = job.status.is_terminal();
                    snapshots.push(*job);
                    if done {
                        return snapshots;
                    }
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }
}

fn argon_dimer(distance: f64) -> Structure {
    Structure::new(
        vec!["Ar".into(), "Ar".into()],
        vec![[10.0, 10.0, 10.0], [10.0 + distance, 10.0, 10.0]],
        [[30.0, 0.0, 0.0], [0.0, 30.0, 0.0], [0.0, 0.0, 30.0]],
        [false; 3],
    )
}

fn job(slab: Structure, fmax: f64, max_steps: u32) -> Job {
    Job::new(
        uuid::Uuid::new_v4(),
        JobParameters { fmax, max_steps },
        "mp-23",
        slab.clone(),
        slab,
    )
}

#[test]
fn worker_relaxes_jobs_and_survives_failures() {
    let mut worker = Worker::spawn();
    assert_eq!(worker.next_event(), WorkerEvent::Ready);

    // Step ceiling reached long before convergence.
    let capped = job(argon_dimer(3.2), 1e-9, 20);
    worker.run(&capped);
    let snaps = worker.snapshots_until_terminal();

    assert_eq!(snaps.len(), 22);
    assert!(snaps.iter().all(|s| s.id == capped.id));
    assert_eq!(snaps[0].status, JobStatus::Running);
    assert_eq!(snaps[0].progress, 0.0);
    let last = snaps.last().unwrap();
    assert_eq!(last.status, JobStatus::Finished);
    assert_eq!(last.progress, 1.0);
    assert_eq!(last.energies.len(), 20);
    assert!(last.relaxed.is_some());

    // Overlapping atoms cannot be evaluated.
    let broken = job(argon_dimer(0.0), 0.05, 20);
    worker.run(&broken);
    let snaps = worker.snapshots_until_terminal();

    assert_eq!(snaps.len(), 2);
    let failed = snaps.last().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.progress, FAILED_PROGRESS);
    assert!(failed.error.is_some());

    // The same worker still serves the next task.
    let converging = job(argon_dimer(3.6), 0.005, 500);
    worker.run(&converging);
    let snaps = worker.snapshots_until_terminal();
    let done = snaps.last().unwrap();
    assert_eq!(done.status, JobStatus::Finished);
    assert!(*done.forces.last().unwrap() <= 0.005);

    drop(worker.stdin.take());
    let status = worker.child.wait().unwrap();
    assert!(status.success());
}
