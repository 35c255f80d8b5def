//! Handlers for the `/relaxations` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use relax_core::error::CoreError;
use relax_core::job::{Job, JobStatus};
use relax_core::render::StructureFormat;
use relax_core::types::JobId;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::{DataResponse, JobResponse, StructureData};
use crate::state::AppState;

const DEFAULT_FMAX: f64 = 0.05;
const DEFAULT_MAX_STEPS: u32 = 30;

/// Body of `POST /relaxations`.
#[derive(Debug, Deserialize)]
pub struct CreateRelaxation {
    pub material_id: String,
    #[serde(default = "default_fmax")]
    pub fmax: f64,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Falls back to the server's `MP_API_KEY` when absent.
    #[serde(default)]
    pub mp_api_key: Option<String>,
}

fn default_fmax() -> f64 {
    DEFAULT_FMAX
}

fn default_max_steps() -> u32 {
    DEFAULT_MAX_STEPS
}

/// Which stored structure to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureKind {
    Bulk,
    Slab,
    Relaxed,
}

impl std::str::FromStr for StructureKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bulk" => Ok(StructureKind::Bulk),
            "slab" => Ok(StructureKind::Slab),
            "relaxed" => Ok(StructureKind::Relaxed),
            other => Err(AppError::BadRequest(format!(
                "Unknown structure kind '{other}', expected bulk, slab or relaxed"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StructureQuery {
    #[serde(default)]
    pub format: Option<String>,
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/relaxations
///
/// Fetch the material, derive its slab and queue a relaxation. Returns 201
/// with the job still `PENDING`; poll `GET /relaxations/{id}` for progress.
pub async fn create_relaxation(
    State(state): State<AppState>,
    Json(input): Json<CreateRelaxation>,
) -> AppResult<impl IntoResponse> {
    let api_key = input
        .mp_api_key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .or_else(|| state.config.mp_api_key.clone())
        .ok_or(CoreError::CredentialMalformed)?;

    let material_id = input.material_id.trim();
    let job = state
        .service
        .create_job(material_id, input.fmax, input.max_steps, &api_key)
        .await?;

    tracing::info!(job_id = %job.id, material_id, "Relaxation submitted");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobResponse::from_job(&job)?,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/relaxations/{id}
pub async fn get_relaxation(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Json<DataResponse<JobResponse>>> {
    let job = state.service.get_job(id).await?;
    Ok(Json(DataResponse {
        data: JobResponse::from_job(&job)?,
    }))
}

/// GET /api/v1/relaxations/{id}/structures/{kind}?format=cif|xyz
pub async fn get_structure(
    State(state): State<AppState>,
    Path((id, kind)): Path<(JobId, String)>,
    Query(query): Query<StructureQuery>,
) -> AppResult<Json<DataResponse<StructureData>>> {
    let kind: StructureKind = kind.parse()?;
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<StructureFormat>()?,
        None => StructureFormat::default(),
    };

    let job = state.service.get_job(id).await?;
    let structure = select_structure(&job, kind)?;

    Ok(Json(DataResponse {
        data: StructureData::render(structure, format)?,
    }))
}

fn select_structure(job: &Job, kind: StructureKind) -> AppResult<&relax_core::structure::Structure> {
    match kind {
        StructureKind::Bulk => Ok(&job.bulk),
        StructureKind::Slab => Ok(&job.slab),
        StructureKind::Relaxed => match (&job.relaxed, job.status) {
            (Some(relaxed), JobStatus::Finished) => Ok(relaxed),
            _ => Err(AppError::StructureNotAvailable(format!(
                "Relaxed structure of job {} is not available while {}",
                job.id, job.status
            ))),
        },
    }
}
