//! HTTP client for the Materials Project summary API.
//!
//! Fetches the bulk structure of a material using a caller-supplied API key.
//! Inputs are checked locally first so obviously bad ids and keys never leave
//! the process.

use async_trait::async_trait;
use relax_core::collaborators::StructureSource;
use relax_core::error::CoreError;
use relax_core::structure::Structure;
use reqwest::StatusCode;

use crate::documents::SummaryResponse;
use crate::validation::{validate_api_key, validate_material_id};

/// Public Materials Project API root.
pub const DEFAULT_BASE_URL: &str = "https://api.materialsproject.org";

/// Header carrying the caller's API key.
const API_KEY_HEADER: &str = "X-API-KEY";

/// Errors from the HTTP layer, before they are mapped onto [`CoreError`].
#[derive(Debug, thiserror::Error)]
pub enum MaterialsApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API rejected the key.
    #[error("API key rejected ({0})")]
    Unauthorized(u16),

    /// Any other non-2xx status code.
    #[error("Materials Project API error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

impl From<MaterialsApiError> for CoreError {
    fn from(err: MaterialsApiError) -> Self {
        match err {
            MaterialsApiError::Unauthorized(_) => CoreError::CredentialExpired,
            other => CoreError::Upstream(other.to_string()),
        }
    }
}

/// Client for a single Materials Project deployment.
pub struct MaterialsProjectClient {
    client: reqwest::Client,
    base_url: String,
}

impl MaterialsProjectClient {
    /// * `base_url` - API root without trailing slash, e.g. [`DEFAULT_BASE_URL`].
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /materials/summary/?material_ids=<id>&_fields=structure`.
    async fn fetch_summary(
        &self,
        material_id: &str,
        api_key: &str,
    ) -> Result<SummaryResponse, MaterialsApiError> {
        let response = self
            .client
            .get(format!("{}/materials/summary/", self.base_url))
            .query(&[("material_ids", material_id), ("_fields", "structure")])
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MaterialsApiError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MaterialsApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<SummaryResponse>().await?)
    }
}

#[async_trait]
impl StructureSource for MaterialsProjectClient {
    async fn fetch(&self, material_id: &str, api_key: &str) -> Result<Structure, CoreError> {
        validate_material_id(material_id)?;
        validate_api_key(api_key)?;

        let summary = self
            .fetch_summary(material_id, api_key)
            .await
            .map_err(|e| {
                match &e {
                    MaterialsApiError::Unauthorized(status) => {
                        tracing::warn!(material_id, status, "Materials Project rejected API key");
                    }
                    other => {
                        tracing::error!(material_id, error = %other, "Materials Project request failed");
                    }
                }
                CoreError::from(e)
            })?;

        let doc = summary
            .data
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::MaterialNotFound(material_id.to_string()))?;

        let structure = doc.structure.into_structure()?;
        tracing::debug!(
            material_id,
            atoms = structure.len(),
            formula = %structure.chemical_formula(),
            "Fetched bulk structure",
        );
        Ok(structure)
    }
}
