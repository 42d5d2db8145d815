//! CLI command definitions for the `spindle` binary.
//!
//! Uses clap derive macros for argument parsing. Every command takes a
//! workflow record file; the format follows the file extension.

pub mod convert;
pub mod inspect;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use spindle_core::serializer::format::from_text;
use spindle_core::serializer::{WorkflowRecord, WorkflowSerializer};
use spindle_types::config::{DurableFormat, SerializerConfig};
use spindle_types::workflow::Workflow;

/// Inspect and convert persisted workflow records.
#[derive(Parser)]
#[command(name = "spindle", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v shows repairs, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Serializer config file (default: $SPINDLE_CONFIG or ./spindle.toml).
    #[arg(long, global = true, env = "SPINDLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a workflow record and check it: repairs, edges, reachability.
    Validate {
        /// Workflow record (.json, .yaml or .yml).
        file: PathBuf,
    },

    /// Print the task tree of a workflow record.
    Show {
        /// Workflow record (.json, .yaml or .yml).
        file: PathBuf,
    },

    /// List the task specs of a workflow record.
    Specs {
        /// Workflow record (.json, .yaml or .yml).
        file: PathBuf,
    },

    /// Re-encode a workflow record between JSON and YAML.
    Convert {
        /// Source record.
        input: PathBuf,
        /// Destination; the extension selects the format.
        output: PathBuf,
    },
}

/// Format for `path`: its extension, else the configured default.
pub fn format_for(path: &Path, config: &SerializerConfig) -> DurableFormat {
    DurableFormat::from_path(path).unwrap_or(config.format)
}

/// Read and parse a record file without rebuilding the workflow.
pub fn read_record(path: &Path, config: &SerializerConfig) -> Result<WorkflowRecord> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let format = format_for(path, config);
    tracing::debug!(path = %path.display(), ?format, "parsing workflow record");
    from_text(&text, format).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read a record file and rebuild the workflow it holds.
pub fn read_workflow(path: &Path, config: &SerializerConfig) -> Result<Workflow> {
    let record = read_record(path, config)?;
    WorkflowSerializer::new(config.clone())
        .deserialize_workflow(&record, None, true)
        .with_context(|| format!("Failed to load workflow from {}", path.display()))
}
