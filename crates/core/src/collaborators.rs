//! Capabilities the orchestration core consumes but does not implement.
//!
//! - [`StructureSource`] resolves a material identifier to a structure.
//! - [`StructureTransform`] derives the structure that gets relaxed.
//! - [`RelaxerFactory`] / [`Relaxer`] run the iterative optimization.
//!
//! A relaxer is built once per worker and never leaves it, so only the
//! factory has to be shareable.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::structure::Structure;

/// Fetches initial structures by material identifier.
#[async_trait]
pub trait StructureSource: Send + Sync {
    /// Fails with `MaterialNotFound`, `MalformedIdentifier`,
    /// `CredentialMalformed` or `CredentialExpired`; those reach the caller
    /// unchanged.
    async fn fetch(&self, material_id: &str, api_key: &str) -> Result<Structure, CoreError>;
}

/// Builds the structure a job relaxes from the fetched one.
pub trait StructureTransform: Send + Sync {
    fn derive_relaxation_structure(&self, bulk: &Structure) -> Result<Structure, CoreError>;
}

/// Metrics of one completed optimizer iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 1-based iteration index.
    pub step: u32,
    /// Total potential energy after the step (eV).
    pub energy: f64,
    /// Largest per-atom force magnitude after the step (eV/Å).
    pub force: f64,
}

/// Failures raised by the computation collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputeError {
    /// The evaluator could not be built (missing model, bad parameters, ...).
    #[error("Failed to construct relaxer: {0}")]
    Construction(String),

    /// Energy or forces stopped being finite.
    #[error("Optimization diverged at step {step}")]
    Divergence { step: u32 },

    /// Any other failure while evaluating or stepping.
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// The collaborator panicked mid-run.
    #[error("Relaxer panicked: {0}")]
    Panicked(String),
}

/// An iterative structure optimizer bound to one evaluator instance.
pub trait Relaxer: Send {
    /// Relax `structure` until the largest force is at most `fmax` or
    /// `max_steps` iterations have completed, calling `on_step` once per
    /// completed iteration. Returns the final structure.
    fn relax(
        &mut self,
        structure: &Structure,
        fmax: f64,
        max_steps: u32,
        on_step: &mut dyn FnMut(StepReport),
    ) -> Result<Structure, ComputeError>;
}

/// Builds a private [`Relaxer`] inside each worker.
pub trait RelaxerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Relaxer>, ComputeError>;
}
