//! Response envelope and payload types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope.

use relax_core::error::CoreError;
use relax_core::job::{Job, JobStatus};
use relax_core::render::{render, StructureFormat};
use relax_core::structure::Structure;
use relax_core::types::{JobId, Timestamp};
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// A structure rendered as text in some exchange format.
#[derive(Debug, Serialize)]
pub struct StructureData {
    pub format: StructureFormat,
    pub structure: String,
}

impl StructureData {
    pub fn render(structure: &Structure, format: StructureFormat) -> Result<Self, CoreError> {
        let bytes = render(structure, format)?;
        let structure = String::from_utf8(bytes)
            .map_err(|e| CoreError::Internal(format!("rendered structure is not UTF-8: {e}")))?;
        Ok(Self { format, structure })
    }
}

#[derive(Debug, Serialize)]
pub struct OptimizationData {
    pub progress: f64,
    pub fmax: f64,
    pub max_steps: u32,
    pub energies: Vec<f64>,
    pub forces: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct StructuresData {
    pub chemical_formula: String,
    pub bulk: StructureData,
    pub slab: StructureData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relaxed: Option<StructureData>,
}

/// Public view of a relaxation job. Structures are embedded as CIF.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: JobId,
    pub status: JobStatus,
    pub material_id: String,
    pub optimization: OptimizationData,
    pub structures: StructuresData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobResponse {
    pub fn from_job(job: &Job) -> Result<Self, CoreError> {
        let cif = StructureFormat::Cif;
        let relaxed = job
            .relaxed
            .as_ref()
            .map(|s| StructureData::render(s, cif))
            .transpose()?;

        Ok(Self {
            id: job.id,
            status: job.status,
            material_id: job.material_id.clone(),
            optimization: OptimizationData {
                progress: job.progress,
                fmax: job.parameters.fmax,
                max_steps: job.parameters.max_steps,
                energies: job.energies.clone(),
                forces: job.forces.clone(),
            },
            structures: StructuresData {
                chemical_formula: job.chemical_formula.clone(),
                bulk: StructureData::render(&job.bulk, cif)?,
                slab: StructureData::render(&job.slab, cif)?,
                relaxed,
            },
            error: job.error.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        })
    }
}
