//! The relaxation job entity and its state machine.
//!
//! ```text
//! PENDING -> RUNNING -> FINISHED
//!               |
//!               +-----> FAILED
//! ```
//!
//! A job is created `PENDING` by the orchestrator, moved to `RUNNING` by the
//! worker that dequeues it, receives one step record per completed optimizer
//! iteration, and ends in exactly one terminal state. No mutation is allowed
//! after a terminal state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::structure::Structure;
use crate::types::{JobId, Timestamp};

/// Progress recorded on a job that ends in `FAILED`.
pub const FAILED_PROGRESS: f64 = 1.0;

/// Upper bound accepted for `max_steps`.
pub const MAX_STEPS_LIMIT: u32 = 10_000;

/// Lifecycle status of a relaxation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
    Failed,
}

impl JobStatus {
    /// Wire name of the status (`"PENDING"`, `"RUNNING"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// `FINISHED` and `FAILED` accept no further changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// Whether a snapshot in `next` may follow a snapshot in `self`.
    ///
    /// `RUNNING -> RUNNING` is the only self-transition; it carries the
    /// per-step snapshots.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Finished)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimizer parameters, immutable once the job exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    /// Convergence threshold on the largest per-atom force (eV/Å).
    pub fmax: f64,
    /// Ceiling on optimizer iterations.
    pub max_steps: u32,
}

impl JobParameters {
    /// Validate the parameters.
    ///
    /// Rules:
    /// - `fmax` must be finite and strictly positive.
    /// - `max_steps` must be in `1..=MAX_STEPS_LIMIT`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.fmax.is_finite() || self.fmax <= 0.0 {
            return Err(CoreError::Validation(
                "fmax must be a positive number".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(CoreError::Validation(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.max_steps > MAX_STEPS_LIMIT {
            return Err(CoreError::Validation(format!(
                "max_steps must not exceed {MAX_STEPS_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// One tracked unit of background relaxation.
///
/// The whole record crosses the worker boundary by value: workers mutate
/// their private copy and emit full snapshots, the orchestrator's listener
/// stores them wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub parameters: JobParameters,
    pub material_id: String,
    pub chemical_formula: String,
    /// Structure as fetched from the structure source.
    pub bulk: Structure,
    /// Derived structure the optimizer runs on.
    pub slab: Structure,
    pub status: JobStatus,
    /// Fraction of `max_steps` completed, in `[0, 1]`.
    pub progress: f64,
    pub energies: Vec<f64>,
    pub forces: Vec<f64>,
    /// Final structure, present once `FINISHED`.
    pub relaxed: Option<Structure>,
    /// Failure description, present once `FAILED`.
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Assemble a new `PENDING` job with empty metric sequences.
    pub fn new(
        id: JobId,
        parameters: JobParameters,
        material_id: impl Into<String>,
        bulk: Structure,
        slab: Structure,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            parameters,
            material_id: material_id.into(),
            chemical_formula: bulk.chemical_formula(),
            bulk,
            slab,
            status: JobStatus::Pending,
            progress: 0.0,
            energies: Vec::new(),
            forces: Vec::new(),
            relaxed: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of optimizer steps recorded so far.
    pub fn steps_completed(&self) -> usize {
        self.energies.len()
    }

    /// `PENDING -> RUNNING`, progress reset to 0.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.status != JobStatus::Pending {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        self.transition(JobStatus::Running)?;
        self.progress = 0.0;
        Ok(())
    }

    /// Append one completed optimizer iteration.
    ///
    /// Only valid while `RUNNING`. Progress becomes
    /// `steps_completed / max_steps`, clamped to 1.
    pub fn record_step(&mut self, energy: f64, force: f64) -> Result<(), CoreError> {
        if self.status != JobStatus::Running {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        self.updated_at = chrono::Utc::now();
        self.energies.push(energy);
        self.forces.push(force);
        let max_steps = f64::from(self.parameters.max_steps.max(1));
        self.progress = (self.steps_completed() as f64 / max_steps).min(1.0);
        Ok(())
    }

    /// `RUNNING -> FINISHED` with the final structure attached.
    pub fn finish(&mut self, relaxed: Structure) -> Result<(), CoreError> {
        self.transition(JobStatus::Finished)?;
        self.progress = 1.0;
        self.relaxed = Some(relaxed);
        Ok(())
    }

    /// `PENDING | RUNNING -> FAILED`, progress forced to [`FAILED_PROGRESS`].
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        self.progress = FAILED_PROGRESS;
        self.error = Some(message.into());
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = chrono::Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
