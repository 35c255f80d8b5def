//! Job orchestration for structure relaxations.
//!
//! [`RelaxationService`] owns the whole pipeline:
//!
//! ```text
//! create_job ──► repository (PENDING)
//!      │
//!      └──► task channel ──► worker pool ──► progress channel ──► listener ──► repository
//! ```
//!
//! The listener is the only writer of job state after creation. Workers own
//! their relaxer for their whole lifetime and only ever emit snapshots.

pub mod channels;
pub mod config;
pub mod listener;
mod local;
pub mod pool;
mod process;
pub mod service;

pub use config::{EngineConfig, WorkerIsolation};
pub use pool::{ProcessWorkerConfig, WorkerBackend, WorkerPool};
pub use service::{RelaxationService, ServiceConfig};
