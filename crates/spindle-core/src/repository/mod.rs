//! Repository trait definitions (ports).
//!
//! The storage interface for workflow records. `spindle-infra` implements
//! it on the filesystem; `memory::InMemoryStore` serves tests and
//! embedding. The core crate never depends on a storage technology.

pub mod memory;
pub mod workflow;

pub use memory::InMemoryStore;
pub use workflow::{WorkflowStore, validate_key};
