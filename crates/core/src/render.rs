//! Structure serialization to exchange formats.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::structure::Structure;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureFormat {
    #[default]
    Cif,
    Xyz,
}

impl StructureFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            StructureFormat::Cif => "cif",
            StructureFormat::Xyz => "xyz",
        }
    }
}

impl FromStr for StructureFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cif" => Ok(StructureFormat::Cif),
            "xyz" | "extxyz" => Ok(StructureFormat::Xyz),
            other => Err(CoreError::Validation(format!(
                "Unsupported structure format: {other}"
            ))),
        }
    }
}

/// Render `structure` in `format`.
pub fn render(structure: &Structure, format: StructureFormat) -> Result<Vec<u8>, CoreError> {
    structure.validate()?;
    let text = match format {
        StructureFormat::Cif => render_cif(structure)?,
        StructureFormat::Xyz => render_xyz(structure),
    };
    Ok(text.into_bytes())
}

/// P1 CIF with fractional coordinates.
fn render_cif(structure: &Structure) -> Result<String, CoreError> {
    let formula = structure.chemical_formula();
    let [a, b, c, alpha, beta, gamma] = structure.cell_parameters();
    let fractional = structure.fractional_positions()?;

    let mut out = String::new();
    // `write!` into a String cannot fail.
    let _ = writeln!(out, "data_{}", if formula.is_empty() { "empty" } else { &formula });
    let _ = writeln!(out, "_chemical_formula_structural       {formula}");
    let _ = writeln!(out, "_chemical_formula_sum              \"{formula}\"");
    let _ = writeln!(out, "_cell_length_a       {a:.5}");
    let _ = writeln!(out, "_cell_length_b       {b:.5}");
    let _ = writeln!(out, "_cell_length_c       {c:.5}");
    let _ = writeln!(out, "_cell_angle_alpha    {alpha:.5}");
    let _ = writeln!(out, "_cell_angle_beta     {beta:.5}");
    let _ = writeln!(out, "_cell_angle_gamma    {gamma:.5}");
    out.push('\n');
    out.push_str("_space_group_name_H-M_alt    \"P 1\"\n");
    out.push_str("_space_group_IT_number       1\n\n");
    out.push_str("loop_\n  _space_group_symop_operation_xyz\n  'x, y, z'\n\n");
    out.push_str("loop_\n");
    for column in [
        "_atom_site_type_symbol",
        "_atom_site_label",
        "_atom_site_symmetry_multiplicity",
        "_atom_site_fract_x",
        "_atom_site_fract_y",
        "_atom_site_fract_z",
        "_atom_site_occupancy",
    ] {
        let _ = writeln!(out, "  {column}");
    }

    let mut seen = std::collections::HashMap::<&str, usize>::new();
    for (symbol, frac) in structure.symbols.iter().zip(&fractional) {
        let index = seen.entry(symbol.as_str()).or_default();
        *index += 1;
        let label = format!("{symbol}{index}");
        let _ = writeln!(
            out,
            "  {symbol:<3} {label:<8} 1.0  {:.5}  {:.5}  {:.5}  1.0000",
            frac[0], frac[1], frac[2]
        );
    }

    Ok(out)
}

/// Extended XYZ with lattice and periodicity in the comment line.
fn render_xyz(structure: &Structure) -> String {
    let lattice = structure
        .cell
        .iter()
        .flatten()
        .map(|v| format!("{v:.8}"))
        .collect::<Vec<_>>()
        .join(" ");
    let pbc = structure
        .pbc
        .iter()
        .map(|p| if *p { "T" } else { "F" })
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = String::new();
    let _ = writeln!(out, "{}", structure.len());
    let _ = writeln!(
        out,
        "Lattice=\"{lattice}\" Properties=species:S:1:pos:R:3 pbc=\"{pbc}\""
    );
    for (symbol, p) in structure.symbols.iter().zip(&structure.positions) {
        let _ = writeln!(out, "{symbol:<2} {:>15.8} {:>15.8} {:>15.8}", p[0], p[1], p[2]);
    }
    out
}
