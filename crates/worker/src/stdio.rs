//! Serve loop for a worker process talking NDJSON over a byte stream.

use std::io::{BufRead, Write};
use std::time::Duration;

use relax_core::collaborators::RelaxerFactory;
use relax_core::job::Job;

use crate::protocol::{decode_line, encode_line, WorkerCommand, WorkerError, WorkerEvent};
use crate::runner::process_job;
use crate::startup::construct_with_retry;

/// Build a relaxer, announce `ready`, then run every `run` command read
/// from `reader` until it reaches EOF.
///
/// Each event is flushed as soon as it is written so the engine sees
/// progress in real time. A malformed command is logged and skipped; a
/// failed write means the engine is gone and ends the loop with an error.
pub fn serve<R, W>(
    factory: &dyn RelaxerFactory,
    reader: R,
    mut writer: W,
    retry_backoff: Duration,
) -> Result<(), WorkerError>
where
    R: BufRead,
    W: Write,
{
    let Some(mut relaxer) = construct_with_retry(factory, retry_backoff, &|| false) else {
        return Err(WorkerError::Protocol("relaxer construction abandoned".into()));
    };

    write_event(&mut writer, &WorkerEvent::Ready)?;
    tracing::info!("Worker ready");

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match decode_line::<WorkerCommand>(&line) {
            Ok(command) => command,
            Err(e) => {
                tracing::error!(error = %e, "Skipping malformed command");
                continue;
            }
        };

        match command {
            WorkerCommand::Run { job } => {
                let mut write_error: Option<WorkerError> = None;
                process_job(relaxer.as_mut(), *job, &mut |snapshot: &Job| {
                    if write_error.is_some() {
                        return;
                    }
                    let event = WorkerEvent::Snapshot {
                        job: Box::new(snapshot.clone()),
                    };
                    if let Err(e) = write_event(&mut writer, &event) {
                        write_error = Some(e);
                    }
                });
                if let Some(e) = write_error {
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}

fn write_event<W: Write>(writer: &mut W, event: &WorkerEvent) -> Result<(), WorkerError> {
    let line = encode_line(event)?;
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use relax_core::collaborators::{ComputeError, Relaxer, StepReport};
    use relax_core::job::{JobParameters, JobStatus};
    use relax_core::structure::Structure;

    use super::*;

    struct TwoSteps;

    impl Relaxer for TwoSteps {
        fn relax(
            &mut self,
            structure: &Structure,
            _fmax: f64,
            _max_steps: u32,
            on_step: &mut dyn FnMut(StepReport),
        ) -> Result<Structure, ComputeError> {
            on_step(StepReport {
                step: 1,
                energy: -2.0,
                force: 0.3,
            });
            on_step(StepReport {
                step: 2,
                energy: -2.5,
                force: 0.01,
            });
            Ok(structure.clone())
        }
    }

    struct Factory;

    impl RelaxerFactory for Factory {
        fn create(&self) -> Result<Box<dyn Relaxer>, ComputeError> {
            Ok(Box::new(TwoSteps))
        }
    }

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
                max_steps: 10,
            },
            "mp-30",
            s.clone(),
            s,
        )
    }

    fn events(output: &[u8]) -> Vec<WorkerEvent> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| decode_line(l).unwrap())
            .collect()
    }

    #[test]
    fn announces_ready_then_streams_snapshots() {
        let job = job();
        let mut input = encode_line(&WorkerCommand::Run {
            job: Box::new(job.clone()),
        })
        .unwrap();
        input.push_str("this is not json\n\n");
        let mut output = Vec::new();

        serve(&Factory, Cursor::new(input), &mut output, Duration::from_millis(1)).unwrap();

        let events = events(&output);
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], WorkerEvent::Ready);
        let statuses: Vec<JobStatus> = events[1..]
            .iter()
            .map(|e| match e {
                WorkerEvent::Snapshot { job: snap } => {
                    assert_eq!(snap.id, job.id);
                    snap.status
                }
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                JobStatus::Running,
                JobStatus::Running,
                JobStatus::Running,
                JobStatus::Finished
            ]
        );
    }

    #[test]
    fn empty_input_only_announces_ready() {
        let mut output = Vec::new();
        serve(&Factory, Cursor::new(""), &mut output, Duration::from_millis(1)).unwrap();
        assert_eq!(events(&output), vec![WorkerEvent::Ready]);
    }
}
