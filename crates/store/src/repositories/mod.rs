//! Repository layer for relaxation jobs.

mod job_repo;

pub use job_repo::{InMemoryJobRepo, JobRepository};
