use crate::job::JobStatus;
use crate::types::JobId;

/// Caller-facing error taxonomy shared by the store, the structure source,
/// the orchestrator and the HTTP layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Material {0} not found")]
    MaterialNotFound(String),

    #[error("Invalid material identifier format: {0}")]
    MalformedIdentifier(String),

    #[error("Invalid API key format")]
    CredentialMalformed,

    #[error("API key has expired")]
    CredentialExpired,

    #[error("Job with id {0} does not exist")]
    JobNotFound(JobId),

    #[error("Job with id {0} already exists")]
    JobAlreadyExists(JobId),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Relaxation service is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}
