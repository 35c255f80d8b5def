//! Materials Project structure source.
//!
//! Resolves material identifiers such as `mp-149` to a
//! [`Structure`](relax_core::structure::Structure) through the Materials
//! Project REST API, mapping every failure onto the caller-facing
//! [`CoreError`](relax_core::error::CoreError) taxonomy.

pub mod client;
pub mod documents;
pub mod validation;

pub use client::MaterialsProjectClient;
