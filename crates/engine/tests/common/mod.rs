#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relax_core::collaborators::{
    ComputeError, Relaxer, RelaxerFactory, StepReport, StructureSource,
};
use relax_core::error::CoreError;
use relax_core::job::Job;
use relax_core::slab::SlabBuilder;
use relax_core::structure::Structure;
use relax_core::types::JobId;
use relax_engine::{RelaxationService, ServiceConfig, WorkerBackend};
use relax_store::{InMemoryJobRepo, JobRepository};

pub const API_KEY: &str = "abcdefghijklmnopqrstuvwxyz012345";

// ---------------------------------------------------------------------------
// Structure source
// ---------------------------------------------------------------------------

/// Serves a copper cell for any id except `mp-0`.
pub struct FixedSource;

pub fn copper() -> Structure {
    Structure::new(
        vec!["Cu".into(); 4],
        vec![
            [0.0, 0.0, 0.0],
            [1.8, 1.8, 0.0],
            [1.8, 0.0, 1.8],
            [0.0, 1.8, 1.8],
        ],
        [[3.6, 0.0, 0.0], [0.0, 3.6, 0.0], [0.0, 0.0, 3.6]],
        [true; 3],
    )
}

#[async_trait]
impl StructureSource for FixedSource {
    async fn fetch(&self, material_id: &str, _api_key: &str) -> Result<Structure, CoreError> {
        if material_id == "mp-0" {
            return Err(CoreError::MaterialNotFound(material_id.to_string()));
        }
        Ok(copper())
    }
}

// ---------------------------------------------------------------------------
// Relaxers
// ---------------------------------------------------------------------------

/// Reports the scripted forces in order, stopping at `fmax` or `max_steps`.
/// Once the script runs out the last force repeats.
pub struct Scripted {
    forces: Vec<f64>,
    step_delay: Duration,
}

impl Relaxer for Scripted {
    fn relax(
        &mut self,
        structure: &Structure,
        fmax: f64,
        max_steps: u32,
        on_step: &mut dyn FnMut(StepReport),
    ) -> Result<Structure, ComputeError> {
        for step in 1..=max_steps {
            std::thread::sleep(self.step_delay);
            let index = (step as usize - 1).min(self.forces.len() - 1);
            let force = self.forces[index];
            on_step(StepReport {
                step,
                energy: -10.0 - f64::from(step),
                force,
            });
            if force <= fmax {
                break;
            }
        }
        Ok(structure.clone())
    }
}

pub struct ScriptedFactory {
    pub forces: Vec<f64>,
    pub step_delay: Duration,
}

impl ScriptedFactory {
    pub fn new(forces: Vec<f64>) -> Arc<Self> {
        Arc::new(Self {
            forces,
            step_delay: Duration::ZERO,
        })
    }

    pub fn slow(forces: Vec<f64>, step_delay: Duration) -> Arc<Self> {
        Arc::new(Self { forces, step_delay })
    }
}

impl RelaxerFactory for ScriptedFactory {
    fn create(&self) -> Result<Box<dyn Relaxer>, ComputeError> {
        Ok(Box::new(Scripted {
            forces: self.forces.clone(),
            step_delay: self.step_delay,
        }))
    }
}

/// Raises before completing a step on its first run, then behaves like
/// [`Scripted`].
pub struct FailsFirst {
    runs: Arc<AtomicU32>,
    inner: Scripted,
}

impl Relaxer for FailsFirst {
    fn relax(
        &mut self,
        structure: &Structure,
        fmax: f64,
        max_steps: u32,
        on_step: &mut dyn FnMut(StepReport),
    ) -> Result<Structure, ComputeError> {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ComputeError::Evaluation("NaN in force field".into()));
        }
        self.inner.relax(structure, fmax, max_steps, on_step)
    }
}

pub struct FailsFirstFactory {
    pub runs: Arc<AtomicU32>,
}

impl RelaxerFactory for FailsFirstFactory {
    fn create(&self) -> Result<Box<dyn Relaxer>, ComputeError> {
        Ok(Box::new(FailsFirst {
            runs: Arc::clone(&self.runs),
            inner: Scripted {
                forces: vec![0.01],
                step_delay: Duration::ZERO,
            },
        }))
    }
}

/// Panics inside `create` for the first `panics` calls, then builds a
/// [`Scripted`] relaxer that converges on its first step.
pub struct PanickingFactory {
    pub panics: u32,
    pub calls: Arc<AtomicU32>,
}

impl PanickingFactory {
    pub fn new(panics: u32) -> Arc<Self> {
        Arc::new(Self {
            panics,
            calls: Arc::new(AtomicU32::new(0)),
        })
    }
}

impl RelaxerFactory for PanickingFactory {
    fn create(&self) -> Result<Box<dyn Relaxer>, ComputeError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.panics {
            panic!("relaxer construction blew up");
        }
        Ok(Box::new(Scripted {
            forces: vec![0.01],
            step_delay: Duration::ZERO,
        }))
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// In-memory repository that also records every applied update.
#[derive(Default)]
pub struct RecordingRepo {
    inner: InMemoryJobRepo,
    updates: Mutex<Vec<Job>>,
}

impl RecordingRepo {
    pub fn updates_for(&self, id: JobId) -> Vec<Job> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobRepository for RecordingRepo {
    async fn create(&self, job: Job) -> Result<(), CoreError> {
        self.inner.create(job).await
    }

    async fn get(&self, id: JobId) -> Result<Job, CoreError> {
        self.inner.get(id).await
    }

    /// Records before applying so a reader that sees the new state also
    /// sees the record.
    async fn update(&self, job: Job) -> Result<(), CoreError> {
        self.updates.lock().unwrap().push(job.clone());
        self.inner.update(job).await
    }
}

// ---------------------------------------------------------------------------
// Service helpers
// ---------------------------------------------------------------------------

pub fn test_config(workers: usize) -> ServiceConfig {
    ServiceConfig {
        workers,
        listener_poll: Duration::from_millis(50),
        listener_join_timeout: Duration::from_secs(2),
    }
}

pub fn in_process(factory: Arc<dyn RelaxerFactory>) -> WorkerBackend {
    WorkerBackend::InProcess {
        factory,
        retry_backoff: Duration::from_millis(10),
    }
}

pub fn start_service(
    repo: Arc<RecordingRepo>,
    backend: WorkerBackend,
    workers: usize,
) -> Arc<RelaxationService> {
    RelaxationService::start(
        repo,
        Arc::new(FixedSource),
        Arc::new(SlabBuilder::default()),
        backend,
        test_config(workers),
    )
}

/// Poll until the job is FINISHED or FAILED.
pub async fn wait_for_terminal(service: &RelaxationService, id: JobId) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = service.get_job(id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} stuck in {}",
            job.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
