//! Default computation collaborator.
//!
//! A periodic Lennard-Jones potential driven by a FIRE optimizer. It stands
//! in for a learned interatomic potential so the whole pipeline can run
//! without model weights or a GPU.

pub mod config;
pub mod factory;
pub mod fire;
pub mod potential;

pub use config::PotentialConfig;
pub use factory::LennardJonesFactory;
pub use fire::{FireParameters, FireRelaxer};
pub use potential::{Evaluation, LennardJones};
