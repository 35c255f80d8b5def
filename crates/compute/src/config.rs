use crate::factory::LennardJonesFactory;
use crate::fire::FireParameters;
use crate::potential::LennardJones;

/// Potential and optimizer settings loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PotentialConfig {
    /// Well depth in eV (default: `0.0104`).
    pub epsilon: f64,
    /// Zero-crossing distance in Angstrom (default: `3.4`).
    pub sigma: f64,
    /// Interaction cutoff in Angstrom (default: `8.5`).
    pub cutoff: f64,
    /// Largest allowed displacement norm per optimizer step (default: `0.2`).
    pub max_step: f64,
}

impl Default for PotentialConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.0104,
            sigma: 3.4,
            cutoff: 8.5,
            max_step: 0.2,
        }
    }
}

impl PotentialConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var         | Default  |
    /// |-----------------|----------|
    /// | `LJ_EPSILON`    | `0.0104` |
    /// | `LJ_SIGMA`      | `3.4`    |
    /// | `LJ_CUTOFF`     | `8.5`    |
    /// | `FIRE_MAX_STEP` | `0.2`    |
    ///
    /// Values are only parsed here; physical validity is checked when a
    /// relaxer is built so a bad value surfaces as a construction failure.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            epsilon: env_f64("LJ_EPSILON", defaults.epsilon),
            sigma: env_f64("LJ_SIGMA", defaults.sigma),
            cutoff: env_f64("LJ_CUTOFF", defaults.cutoff),
            max_step: env_f64("FIRE_MAX_STEP", defaults.max_step),
        }
    }

    pub fn factory(&self) -> LennardJonesFactory {
        LennardJonesFactory::new(
            LennardJones {
                epsilon: self.epsilon,
                sigma: self.sigma,
                cutoff: self.cutoff,
            },
            FireParameters {
                max_step: self.max_step,
                ..FireParameters::default()
            },
        )
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number")),
        Err(_) => default,
    }
}
