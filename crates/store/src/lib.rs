//! Job storage.
//!
//! [`JobRepository`] is the storage contract the orchestrator writes
//! through; [`InMemoryJobRepo`] is the process-lifetime implementation.

pub mod repositories;

pub use repositories::{InMemoryJobRepo, JobRepository};
