//! Worker side of the relaxation pipeline.
//!
//! A worker owns one private [`Relaxer`](relax_core::collaborators::Relaxer),
//! pulls one job at a time and reports every state change of that job as a
//! full snapshot. The same logic backs both isolation modes: the
//! `relax-worker` binary speaks the NDJSON [`protocol`] over stdio, and the
//! engine's in-process backend calls [`runner`] and [`startup`] directly.

pub mod config;
pub mod protocol;
pub mod runner;
pub mod startup;
pub mod stdio;

pub use config::WorkerConfig;
pub use protocol::{WorkerCommand, WorkerError, WorkerEvent};
pub use runner::process_job;
pub use startup::construct_with_retry;
