use relax_core::collaborators::{ComputeError, Relaxer, RelaxerFactory};

use crate::fire::{FireParameters, FireRelaxer};
use crate::potential::LennardJones;

/// Builds a fresh [`FireRelaxer`] for every worker.
#[derive(Debug, Clone, Copy)]
pub struct LennardJonesFactory {
    potential: LennardJones,
    params: FireParameters,
}

impl LennardJonesFactory {
    pub fn new(potential: LennardJones, params: FireParameters) -> Self {
        Self { potential, params }
    }
}

impl RelaxerFactory for LennardJonesFactory {
    fn create(&self) -> Result<Box<dyn Relaxer>, ComputeError> {
        let relaxer = FireRelaxer::new(self.potential, self.params)?;
        tracing::debug!(
            epsilon = self.potential.epsilon,
            sigma = self.potential.sigma,
            cutoff = self.potential.cutoff,
            "Lennard-Jones relaxer constructed",
        );
        Ok(Box::new(relaxer))
    }
}
