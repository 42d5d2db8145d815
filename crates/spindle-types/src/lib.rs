//! Shared domain types for Spindle.
//!
//! This crate contains the in-memory model of a workflow: the specification
//! graph (`WorkflowSpec` and its `TaskSpec` nodes), the runtime task tree
//! (`Task`), the instance (`Workflow`), the opaque `Value` type that flows
//! through data maps, and the operand expressions used by conditions.
//!
//! No persistence logic lives here -- only serde, uuid, chrono, thiserror
//! and petgraph.

pub mod config;
pub mod error;
pub mod graph;
pub mod operator;
pub mod spec;
pub mod task;
pub mod tree;
pub mod value;
pub mod workflow;
