//! Persistence logic for Spindle workflows.
//!
//! - `codec` -- text-safe capsules for opaque application values
//! - `serializer` -- durable records for specification graphs, task trees
//!   and workflow instances
//! - `repair` -- structural repair of a specification graph against an
//!   expanded task tree
//! - `repository` -- storage port for workflow records
//!
//! Everything here is synchronous; callers serialize access to a single
//! workflow instance.

pub mod codec;
pub mod repair;
pub mod repository;
pub mod serializer;
