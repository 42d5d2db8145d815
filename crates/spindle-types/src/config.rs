//! Serializer configuration.
//!
//! `SerializerConfig` mirrors `spindle.toml`. All fields have defaults, so
//! an empty file (or no file) yields the default behaviour.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Text encoding of durable records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurableFormat {
    #[default]
    Json,
    Yaml,
}

impl DurableFormat {
    /// Pick a format from a file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Options controlling how workflows are written and read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializerConfig {
    /// Embed the specification graph in workflow records.
    #[serde(default = "default_true")]
    pub include_spec: bool,

    /// Permit serializing tasks bound to SubWorkflow specs.
    #[serde(default)]
    pub allow_subworkflows: bool,

    #[serde(default)]
    pub format: DurableFormat,

    /// Pretty-print JSON output.
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Custom value type tags accepted when decoding. `None` accepts all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_types: Option<Vec<String>>,

    /// Rebuild missing clone specs while loading a task tree.
    #[serde(default = "default_true")]
    pub repair: bool,

    /// Most missing intermediate clones built to resolve one numbered
    /// clone name. `0` only clones from the immediate predecessor.
    #[serde(default = "default_max_clone_gap")]
    pub max_clone_gap: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_clone_gap() -> u64 {
    DEFAULT_MAX_CLONE_GAP
}

/// Default for `SerializerConfig::max_clone_gap`.
pub const DEFAULT_MAX_CLONE_GAP: u64 = 32;

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            include_spec: true,
            allow_subworkflows: false,
            format: DurableFormat::Json,
            pretty: true,
            known_types: None,
            repair: true,
            max_clone_gap: DEFAULT_MAX_CLONE_GAP,
        }
    }
}
