//! Runs one job to a terminal state on a worker's relaxer.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use relax_core::collaborators::{ComputeError, Relaxer, StepReport};
use relax_core::job::Job;

/// Drive `job` from PENDING to FINISHED or FAILED.
///
/// `emit` receives a full snapshot after every state change: once when the
/// job starts (RUNNING, progress 0), once per completed optimizer step and
/// once at the terminal state. Errors and panics raised by the relaxer are
/// recorded on the job instead of propagating, so the caller can keep
/// serving tasks. Returns the final job.
pub fn process_job(relaxer: &mut dyn Relaxer, mut job: Job, emit: &mut dyn FnMut(&Job)) -> Job {
    if let Err(e) = job.start() {
        tracing::error!(job_id = %job.id, error = %e, "Refusing task that is not pending");
        return job;
    }
    emit(&job);
    tracing::info!(job_id = %job.id, atoms = job.slab.len(), "Relaxation started");

    let structure = job.slab.clone();
    let fmax = job.parameters.fmax;
    let max_steps = job.parameters.max_steps;

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        relaxer.relax(&structure, fmax, max_steps, &mut |report: StepReport| {
            match job.record_step(report.energy, report.force) {
                Ok(()) => emit(&job),
                Err(e) => {
                    tracing::error!(job_id = %job.id, step = report.step, error = %e, "Dropping step report");
                }
            }
        })
    }));

    let result = match outcome {
        Ok(result) => result,
        Err(payload) => Err(ComputeError::Panicked(panic_message(payload.as_ref()))),
    };

    match result {
        Ok(relaxed) => match job.finish(relaxed) {
            Ok(()) => {
                tracing::info!(job_id = %job.id, steps = job.steps_completed(), "Relaxation finished");
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Could not mark job finished");
                return job;
            }
        },
        Err(error) => {
            tracing::error!(job_id = %job.id, error = %error, "Relaxation failed");
            if let Err(e) = job.fail(error.to_string()) {
                tracing::error!(job_id = %job.id, error = %e, "Could not mark job failed");
                return job;
            }
        }
    }

    emit(&job);
    job
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
