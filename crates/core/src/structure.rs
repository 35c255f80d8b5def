//! Atomic structure payload.
//!
//! [`Structure`] is the opaque payload handed between the structure source,
//! the slab builder, the optimizer and the renderers. Positions are
//! Cartesian (Å); the cell stores lattice vectors as rows.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 3x3 matrix, row-major.
pub type Matrix3 = [[f64; 3]; 3];

/// Below this determinant a cell is treated as singular.
const SINGULAR_CELL_EPS: f64 = 1e-12;

/// A periodic (or partially periodic) collection of atoms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Chemical symbol per atom.
    pub symbols: Vec<String>,
    /// Cartesian position per atom, in Å.
    pub positions: Vec<[f64; 3]>,
    /// Lattice vectors as rows, in Å.
    pub cell: Matrix3,
    /// Periodicity along each lattice vector.
    pub pbc: [bool; 3],
}

impl Structure {
    pub fn new(
        symbols: Vec<String>,
        positions: Vec<[f64; 3]>,
        cell: Matrix3,
        pbc: [bool; 3],
    ) -> Self {
        Self {
            symbols,
            positions,
            cell,
            pbc,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check that every atom has both a symbol and a position.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbols.len() != self.positions.len() {
            return Err(CoreError::Validation(format!(
                "structure has {} symbols but {} positions",
                self.symbols.len(),
                self.positions.len()
            )));
        }
        Ok(())
    }

    /// Chemical formula in Hill order.
    ///
    /// With carbon present: C first, then H, then the rest alphabetically.
    /// Without carbon every element is alphabetical. A count of one is
    /// omitted (`"SiO2"`, `"CH4"`).
    pub fn chemical_formula(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for symbol in &self.symbols {
            *counts.entry(symbol.as_str()).or_default() += 1;
        }

        let mut ordered: Vec<(&str, usize)> = Vec::with_capacity(counts.len());
        if let Some(c) = counts.remove("C") {
            ordered.push(("C", c));
            if let Some(h) = counts.remove("H") {
                ordered.push(("H", h));
            }
        }
        ordered.extend(counts);

        ordered
            .into_iter()
            .map(|(symbol, count)| {
                if count == 1 {
                    symbol.to_string()
                } else {
                    format!("{symbol}{count}")
                }
            })
            .collect()
    }

    /// Tile the structure `reps[i]` times along lattice vector `i`.
    ///
    /// Copies are appended block by block, the last axis varying fastest,
    /// and the cell vectors are scaled accordingly.
    pub fn repeat(&self, reps: [usize; 3]) -> Structure {
        let copies = reps[0] * reps[1] * reps[2];
        let mut symbols = Vec::with_capacity(self.len() * copies);
        let mut positions = Vec::with_capacity(self.len() * copies);

        for m0 in 0..reps[0] {
            for m1 in 0..reps[1] {
                for m2 in 0..reps[2] {
                    let shift = lattice_point(&self.cell, [m0 as f64, m1 as f64, m2 as f64]);
                    symbols.extend(self.symbols.iter().cloned());
                    positions.extend(self.positions.iter().map(|p| add(*p, shift)));
                }
            }
        }

        let mut cell = self.cell;
        for (axis, row) in cell.iter_mut().enumerate() {
            for value in row.iter_mut() {
                *value *= reps[axis] as f64;
            }
        }

        Structure {
            symbols,
            positions,
            cell,
            pbc: self.pbc,
        }
    }

    /// Fractional coordinates of every atom.
    pub fn fractional_positions(&self) -> Result<Vec<[f64; 3]>, CoreError> {
        let inverse = invert(&self.cell).ok_or_else(|| {
            CoreError::Validation("cell is singular; fractional coordinates undefined".into())
        })?;
        Ok(self
            .positions
            .iter()
            .map(|p| lattice_point(&inverse, *p))
            .collect())
    }

    /// Fold every atom back into the cell along the periodic axes.
    pub fn wrap(&mut self) -> Result<(), CoreError> {
        let fractional = self.fractional_positions()?;
        for (position, mut frac) in self.positions.iter_mut().zip(fractional) {
            for axis in 0..3 {
                if self.pbc[axis] {
                    let folded = frac[axis] - frac[axis].floor();
                    // Rounding can land exactly on 1.0 for tiny negatives.
                    frac[axis] = if folded >= 1.0 { 0.0 } else { folded };
                }
            }
            *position = lattice_point(&self.cell, frac);
        }
        Ok(())
    }

    /// Displace every coordinate by independent Gaussian noise.
    ///
    /// A fresh generator is seeded from `seed` on every call, so the same
    /// input and seed always produce the same perturbation.
    pub fn rattle(&mut self, stdev: f64, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for position in &mut self.positions {
            for value in position.iter_mut() {
                *value += stdev * rng.sample::<f64, _>(StandardNormal);
            }
        }
    }

    /// Cell lengths (Å) and angles (degrees): `[a, b, c, alpha, beta, gamma]`.
    pub fn cell_parameters(&self) -> [f64; 6] {
        let [a_vec, b_vec, c_vec] = self.cell;
        let a = norm(a_vec);
        let b = norm(b_vec);
        let c = norm(c_vec);
        [
            a,
            b,
            c,
            angle_degrees(b_vec, c_vec),
            angle_degrees(a_vec, c_vec),
            angle_degrees(a_vec, b_vec),
        ]
    }
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

pub fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn angle_degrees(a: [f64; 3], b: [f64; 3]) -> f64 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 90.0;
    }
    (dot(a, b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Row vector times matrix: `frac[0] * cell[0] + frac[1] * cell[1] + frac[2] * cell[2]`.
pub fn lattice_point(cell: &Matrix3, frac: [f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (axis, row) in cell.iter().enumerate() {
        for k in 0..3 {
            out[k] += frac[axis] * row[k];
        }
    }
    out
}

fn determinant(m: &Matrix3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Inverse of `m`, or `None` when `m` is singular.
pub fn invert(m: &Matrix3) -> Option<Matrix3> {
    let det = determinant(m);
    if det.abs() < SINGULAR_CELL_EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
