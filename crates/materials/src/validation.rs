//! Local checks run before any request reaches the Materials Project.

use std::sync::LazyLock;

use regex::Regex;
use relax_core::error::CoreError;

/// Material identifiers look like `mp-149` or `mvc-1234`.
const MATERIAL_ID_PATTERN: &str = r"^[a-z]+-\d+$";

/// Current Materials Project keys are 32 ASCII alphanumerics; legacy
/// 16-character keys are no longer accepted upstream.
const API_KEY_PATTERN: &str = r"^[A-Za-z0-9]{32}$";

static MATERIAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MATERIAL_ID_PATTERN).expect("valid regex"));

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(API_KEY_PATTERN).expect("valid regex"));

/// Reject identifiers the API would refuse as badly formatted.
pub fn validate_material_id(material_id: &str) -> Result<(), CoreError> {
    if MATERIAL_ID_RE.is_match(material_id) {
        Ok(())
    } else {
        Err(CoreError::MalformedIdentifier(material_id.to_string()))
    }
}

/// Reject keys that cannot possibly authenticate.
pub fn validate_api_key(api_key: &str) -> Result<(), CoreError> {
    if API_KEY_RE.is_match(api_key) {
        Ok(())
    } else {
        Err(CoreError::CredentialMalformed)
    }
}
