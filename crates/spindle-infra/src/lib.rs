//! Infrastructure layer for Spindle.
//!
//! Implements the storage port defined in `spindle-core` on the local
//! filesystem, and loads `spindle.toml` serializer configuration.

pub mod config;
pub mod filesystem;
