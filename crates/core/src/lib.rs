//! Domain building blocks for background structure relaxation.
//!
//! Holds the [`Job`](job::Job) entity and its state machine, the opaque
//! [`Structure`](structure::Structure) payload, the collaborator traits the
//! orchestrator and workers depend on, and the shared error taxonomy.
//! Zero internal dependencies; every other workspace crate builds on this one.

pub mod collaborators;
pub mod error;
pub mod job;
pub mod render;
pub mod slab;
pub mod structure;
pub mod types;
