//! Pairwise Lennard-Jones potential under periodic boundary conditions.

use relax_core::collaborators::ComputeError;
use relax_core::structure::{add, dot, lattice_point, norm, Matrix3, Structure};

/// Pairs closer than this are treated as overlapping atoms.
const MIN_PAIR_DISTANCE: f64 = 1e-6;

/// Energy and forces for one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Total potential energy (eV).
    pub energy: f64,
    /// Per-atom forces (eV/Å), same order as the structure's atoms.
    pub forces: Vec<[f64; 3]>,
}

impl Evaluation {
    /// Largest per-atom force magnitude.
    pub fn max_force(&self) -> f64 {
        self.forces.iter().map(|f| norm(*f)).fold(0.0, f64::max)
    }

    pub fn is_finite(&self) -> bool {
        self.energy.is_finite() && self.forces.iter().flatten().all(|c| c.is_finite())
    }
}

/// `E(r) = 4ε[(σ/r)^12 - (σ/r)^6]`, truncated and shifted to zero at the
/// cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: f64,
}

impl LennardJones {
    pub fn validate(&self) -> Result<(), ComputeError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.epsilon) {
            return Err(ComputeError::Construction(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }
        if !positive(self.sigma) {
            return Err(ComputeError::Construction(format!(
                "sigma must be positive and finite, got {}",
                self.sigma
            )));
        }
        if !positive(self.cutoff) || self.cutoff <= self.sigma {
            return Err(ComputeError::Construction(format!(
                "cutoff must be finite and larger than sigma, got {}",
                self.cutoff
            )));
        }
        Ok(())
    }

    /// Pair energy and `dE/dr` at distance `r`.
    fn pair(&self, r: f64) -> (f64, f64) {
        let sr6 = (self.sigma / r).powi(6);
        let sr12 = sr6 * sr6;
        let energy = 4.0 * self.epsilon * (sr12 - sr6);
        let de_dr = 4.0 * self.epsilon * (-12.0 * sr12 + 6.0 * sr6) / r;
        (energy, de_dr)
    }

    fn energy_shift(&self) -> f64 {
        self.pair(self.cutoff).0
    }

    /// Total energy and per-atom forces of `structure`.
    ///
    /// Every periodic image within the cutoff contributes, including images
    /// of an atom interacting with itself.
    pub fn evaluate(&self, structure: &Structure) -> Result<Evaluation, ComputeError> {
        let images = image_shifts(&structure.cell, structure.pbc, self.cutoff)?;
        let shift = self.energy_shift();
        let n = structure.len();

        let mut energy = 0.0;
        let mut forces = vec![[0.0; 3]; n];

        for i in 0..n {
            let pi = structure.positions[i];
            for j in 0..n {
                let pj = structure.positions[j];
                for image in &images {
                    if i == j && *image == [0.0; 3] {
                        continue;
                    }
                    let rij = sub(add(pj, *image), pi);
                    let r = norm(rij);
                    if r >= self.cutoff {
                        continue;
                    }
                    if r < MIN_PAIR_DISTANCE {
                        return Err(ComputeError::Evaluation(format!(
                            "atoms {i} and {j} overlap"
                        )));
                    }
                    let (e, de_dr) = self.pair(r);
                    // Each pair is visited from both ends.
                    energy += 0.5 * (e - shift);
                    for k in 0..3 {
                        forces[i][k] += de_dr * rij[k] / r;
                    }
                }
            }
        }

        Ok(Evaluation { energy, forces })
    }
}

/// Cartesian lattice translations reaching every image within `cutoff`.
fn image_shifts(cell: &Matrix3, pbc: [bool; 3], cutoff: f64) -> Result<Vec<[f64; 3]>, ComputeError> {
    let volume = dot(cell[0], cross(cell[1], cell[2])).abs();
    let mut reach = [0i64; 3];
    for axis in 0..3 {
        if !pbc[axis] {
            continue;
        }
        let face = cross(cell[(axis + 1) % 3], cell[(axis + 2) % 3]);
        let area = norm(face);
        if volume < f64::EPSILON || area < f64::EPSILON {
            return Err(ComputeError::Evaluation(
                "periodic structure has a singular cell".into(),
            ));
        }
        // Distance between opposite lattice planes.
        let spacing = volume / area;
        reach[axis] = (cutoff / spacing).ceil() as i64;
    }

    let mut shifts = Vec::new();
    for a in -reach[0]..=reach[0] {
        for b in -reach[1]..=reach[1] {
            for c in -reach[2]..=reach[2] {
                shifts.push(lattice_point(cell, [a as f64, b as f64, c as f64]));
            }
        }
    }
    Ok(shifts)
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn argon() -> LennardJones {
        LennardJones {
            epsilon: 0.0104,
            sigma: 3.4,
            cutoff: 8.5,
        }
    }

    fn dimer(distance: f64) -> Structure {
        Structure::new(
            vec!["Ar".into(), "Ar".into()],
            vec![[5.0, 5.0, 5.0], [5.0 + distance, 5.0, 5.0]],
            [[30.0, 0.0, 0.0], [0.0, 30.0, 0.0], [0.0, 0.0, 30.0]],
            [false; 3],
        )
    }

    #[test]
    fn dimer_at_minimum_has_no_force() {
        let lj = argon();
        let r_min = 2f64.powf(1.0 / 6.0) * lj.sigma;

        let eval = lj.evaluate(&dimer(r_min)).unwrap();

        assert!(eval.max_force() < 1e-10);
        let expected = -lj.epsilon - lj.energy_shift();
        assert!((eval.energy - expected).abs() < 1e-12);
    }

    #[test]
    fn compressed_dimer_pushes_apart() {
        let eval = argon().evaluate(&dimer(3.0)).unwrap();

        // Atom 0 sits at lower x; repulsion drives it further down.
        assert!(eval.forces[0][0] < 0.0);
        assert!(eval.forces[1][0] > 0.0);
        assert!((eval.forces[0][0] + eval.forces[1][0]).abs() < 1e-12);
    }

    #[test]
    fn forces_match_finite_difference() {
        let lj = argon();
        let structure = dimer(3.6);
        let eval = lj.evaluate(&structure).unwrap();

        let h = 1e-6;
        let mut plus = structure.clone();
        plus.positions[1][0] += h;
        let mut minus = structure.clone();
        minus.positions[1][0] -= h;
        let numeric = -(lj.evaluate(&plus).unwrap().energy - lj.evaluate(&minus).unwrap().energy)
            / (2.0 * h);

        assert!((eval.forces[1][0] - numeric).abs() < 1e-6);
    }

    #[test]
    fn beyond_cutoff_is_zero() {
        let eval = argon().evaluate(&dimer(9.0)).unwrap();
        assert_eq!(eval.energy, 0.0);
        assert_eq!(eval.max_force(), 0.0);
    }

    #[test]
    fn symmetric_crystal_is_force_free() {
        let a = 5.26;
        let fcc = Structure::new(
            vec!["Ar".into(); 4],
            vec![
                [0.0, 0.0, 0.0],
                [a / 2.0, a / 2.0, 0.0],
                [a / 2.0, 0.0, a / 2.0],
                [0.0, a / 2.0, a / 2.0],
            ],
            [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]],
            [true; 3],
        );

        let eval = argon().evaluate(&fcc).unwrap();

        assert!(eval.energy < 0.0);
        assert!(eval.max_force() < 1e-9);
    }

    #[test]
    fn overlapping_atoms_fail() {
        assert_matches!(argon().evaluate(&dimer(0.0)), Err(ComputeError::Evaluation(_)));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut lj = argon();
        lj.epsilon = -1.0;
        assert_matches!(lj.validate(), Err(ComputeError::Construction(_)));

        let mut lj = argon();
        lj.cutoff = 2.0;
        assert_matches!(lj.validate(), Err(ComputeError::Construction(_)));

        assert!(argon().validate().is_ok());
    }
}
