//! Wire types for the Materials Project summary endpoint.
//!
//! Only the fields needed to rebuild a structure are modelled; everything
//! else in the response is ignored.

use relax_core::error::CoreError;
use relax_core::structure::{lattice_point, Matrix3, Structure};
use serde::Deserialize;

/// `GET /materials/summary/` response envelope.
#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub data: Vec<SummaryDoc>,
}

/// One summary document, fetched with `_fields=structure`.
#[derive(Debug, Deserialize)]
pub struct SummaryDoc {
    pub structure: StructureDoc,
}

/// Serialized pymatgen `Structure`.
#[derive(Debug, Deserialize)]
pub struct StructureDoc {
    pub lattice: LatticeDoc,
    pub sites: Vec<SiteDoc>,
}

#[derive(Debug, Deserialize)]
pub struct LatticeDoc {
    pub matrix: Matrix3,
    #[serde(default = "fully_periodic")]
    pub pbc: [bool; 3],
}

#[derive(Debug, Deserialize)]
pub struct SiteDoc {
    pub species: Vec<SpeciesDoc>,
    /// Cartesian coordinates; derived from `abc` when absent.
    #[serde(default)]
    pub xyz: Option<[f64; 3]>,
    /// Fractional coordinates.
    #[serde(default)]
    pub abc: Option<[f64; 3]>,
}

#[derive(Debug, Deserialize)]
pub struct SpeciesDoc {
    pub element: String,
    #[serde(default = "full_occupancy")]
    pub occu: f64,
}

fn fully_periodic() -> [bool; 3] {
    [true; 3]
}

fn full_occupancy() -> f64 {
    1.0
}

impl StructureDoc {
    /// Convert into the core payload.
    ///
    /// Disordered sites collapse onto their majority species.
    pub fn into_structure(self) -> Result<Structure, CoreError> {
        let cell = self.lattice.matrix;
        let mut symbols = Vec::with_capacity(self.sites.len());
        let mut positions = Vec::with_capacity(self.sites.len());

        for (index, site) in self.sites.into_iter().enumerate() {
            let element = site
                .species
                .into_iter()
                .max_by(|a, b| a.occu.total_cmp(&b.occu))
                .map(|s| s.element)
                .ok_or_else(|| {
                    CoreError::Upstream(format!("site {index} has no species"))
                })?;

            let position = match (site.xyz, site.abc) {
                (Some(xyz), _) => xyz,
                (None, Some(abc)) => lattice_point(&cell, abc),
                (None, None) => {
                    return Err(CoreError::Upstream(format!(
                        "site {index} has no coordinates"
                    )))
                }
            };

            symbols.push(element);
            positions.push(position);
        }

        Ok(Structure::new(symbols, positions, cell, self.lattice.pbc))
    }
}
