//! FIRE (fast inertial relaxation engine) structure optimizer.
//!
//! Velocity-Verlet-like dynamics with unit masses, mixed toward the force
//! direction while the system moves downhill and reset whenever it starts
//! moving uphill.

use relax_core::collaborators::{ComputeError, Relaxer, StepReport};
use relax_core::structure::{norm, Structure};

use crate::potential::{Evaluation, LennardJones};

/// Integrator constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireParameters {
    pub dt: f64,
    pub dt_max: f64,
    /// Downhill steps before the timestep may grow.
    pub n_min: u32,
    pub f_inc: f64,
    pub f_dec: f64,
    pub alpha_start: f64,
    pub f_alpha: f64,
    /// Largest allowed norm of the whole displacement per step (Å).
    pub max_step: f64,
}

impl Default for FireParameters {
    fn default() -> Self {
        Self {
            dt: 0.1,
            dt_max: 1.0,
            n_min: 5,
            f_inc: 1.1,
            f_dec: 0.5,
            alpha_start: 0.1,
            f_alpha: 0.99,
            max_step: 0.2,
        }
    }
}

impl FireParameters {
    pub fn validate(&self) -> Result<(), ComputeError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.max_step) {
            return Err(ComputeError::Construction(format!(
                "max_step must be positive and finite, got {}",
                self.max_step
            )));
        }
        if !positive(self.dt) || !positive(self.dt_max) || self.dt > self.dt_max {
            return Err(ComputeError::Construction(
                "timesteps must be positive with dt <= dt_max".into(),
            ));
        }
        Ok(())
    }
}

/// Mutable integrator state for one relaxation.
struct FireState {
    velocities: Vec<[f64; 3]>,
    dt: f64,
    alpha: f64,
    downhill_steps: u32,
}

impl FireState {
    fn new(atoms: usize, params: &FireParameters) -> Self {
        Self {
            velocities: vec![[0.0; 3]; atoms],
            dt: params.dt,
            alpha: params.alpha_start,
            downhill_steps: 0,
        }
    }

    /// Advance `positions` one step along `forces`.
    fn step(&mut self, params: &FireParameters, positions: &mut [[f64; 3]], forces: &[[f64; 3]]) {
        let power: f64 = self
            .velocities
            .iter()
            .zip(forces)
            .map(|(v, f)| v[0] * f[0] + v[1] * f[1] + v[2] * f[2])
            .sum();

        if power > 0.0 {
            let v_norm = global_norm(&self.velocities);
            let f_norm = global_norm(forces);
            if f_norm > 0.0 {
                for (v, f) in self.velocities.iter_mut().zip(forces) {
                    for k in 0..3 {
                        v[k] = (1.0 - self.alpha) * v[k] + self.alpha * f[k] / f_norm * v_norm;
                    }
                }
            }
            if self.downhill_steps > params.n_min {
                self.dt = (self.dt * params.f_inc).min(params.dt_max);
                self.alpha *= params.f_alpha;
            }
            self.downhill_steps += 1;
        } else {
            self.velocities.iter_mut().for_each(|v| *v = [0.0; 3]);
            self.alpha = params.alpha_start;
            self.dt *= params.f_dec;
            self.downhill_steps = 0;
        }

        let mut displacement: Vec<[f64; 3]> = Vec::with_capacity(positions.len());
        for (v, f) in self.velocities.iter_mut().zip(forces) {
            for k in 0..3 {
                v[k] += self.dt * f[k];
            }
            displacement.push([self.dt * v[0], self.dt * v[1], self.dt * v[2]]);
        }

        let d_norm = global_norm(&displacement);
        let scale = if d_norm > params.max_step {
            params.max_step / d_norm
        } else {
            1.0
        };
        for (p, d) in positions.iter_mut().zip(&displacement) {
            for k in 0..3 {
                p[k] += scale * d[k];
            }
        }
    }
}

fn global_norm(vectors: &[[f64; 3]]) -> f64 {
    vectors.iter().map(|v| norm(*v).powi(2)).sum::<f64>().sqrt()
}

/// [`Relaxer`] over a [`LennardJones`] evaluator.
#[derive(Debug)]
pub struct FireRelaxer {
    potential: LennardJones,
    params: FireParameters,
}

impl FireRelaxer {
    pub fn new(potential: LennardJones, params: FireParameters) -> Result<Self, ComputeError> {
        potential.validate()?;
        params.validate()?;
        Ok(Self { potential, params })
    }

    fn evaluate(&self, structure: &Structure, step: u32) -> Result<Evaluation, ComputeError> {
        let eval = self.potential.evaluate(structure)?;
        if !eval.is_finite() {
            return Err(ComputeError::Divergence { step });
        }
        Ok(eval)
    }
}

impl Relaxer for FireRelaxer {
    fn relax(
        &mut self,
        structure: &Structure,
        fmax: f64,
        max_steps: u32,
        on_step: &mut dyn FnMut(StepReport),
    ) -> Result<Structure, ComputeError> {
        let mut current = structure.clone();
        let mut eval = self.evaluate(&current, 0)?;
        if eval.max_force() <= fmax {
            tracing::debug!(atoms = current.len(), "Structure already relaxed");
            return Ok(current);
        }

        let mut state = FireState::new(current.len(), &self.params);
        for step in 1..=max_steps {
            state.step(&self.params, &mut current.positions, &eval.forces);
            eval = self.evaluate(&current, step)?;

            let force = eval.max_force();
            on_step(StepReport {
                step,
                energy: eval.energy,
                force,
            });

            if force <= fmax {
                tracing::debug!(step, energy = eval.energy, force, "Relaxation converged");
                break;
            }
        }

        Ok(current)
    }
}
