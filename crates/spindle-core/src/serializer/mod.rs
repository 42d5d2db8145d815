//! Workflow serializer: in-memory model to durable records and back.
//!
//! - `record` -- serde shapes of the durable records
//! - `expression` -- operand expressions as `[tag, payload]` pairs
//! - `spec` -- specification nodes and graphs
//! - `task` -- task trees, including clone repair on load
//! - `workflow` -- whole instances, including the parent relink pass
//! - `format` -- JSON / YAML text encoding of records

pub mod error;
pub mod expression;
pub mod format;
pub mod record;
pub mod spec;
pub mod task;
pub mod workflow;

pub use error::SerializerError;
pub use record::{SpecGraphRecord, TaskRecord, TaskSpecRecord, WorkflowRecord};

use spindle_types::config::SerializerConfig;

use crate::codec::{TypeRegistry, ValueCodec};

/// Converts workflows and their parts to and from durable records.
///
/// Holds no per-workflow state: one serializer can be shared across many
/// instances.
#[derive(Debug, Clone)]
pub struct WorkflowSerializer {
    codec: ValueCodec,
    config: SerializerConfig,
}

impl Default for WorkflowSerializer {
    fn default() -> Self {
        Self::new(SerializerConfig::default())
    }
}

impl WorkflowSerializer {
    /// Build a serializer from config. `known_types` selects a strict type
    /// registry; without it every custom value type is accepted.
    pub fn new(config: SerializerConfig) -> Self {
        let registry = match &config.known_types {
            Some(tags) => tags
                .iter()
                .fold(TypeRegistry::strict(), |registry, tag| registry.with_type(tag.clone())),
            None => TypeRegistry::permissive(),
        };
        Self {
            codec: ValueCodec::new(registry),
            config,
        }
    }

    /// Replace the value codec, e.g. to register types programmatically.
    pub fn with_codec(mut self, codec: ValueCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_types::value::Value;

    #[test]
    fn test_default_serializer_accepts_any_custom_type() {
        let serializer = WorkflowSerializer::default();
        let value = Value::Custom {
            type_tag: "x.Anything".to_string(),
            fields: Box::new(Value::Null),
        };
        assert!(serializer.codec().registry().check(&value).is_ok());
    }

    #[test]
    fn test_known_types_build_strict_registry() {
        let config = SerializerConfig {
            known_types: Some(vec!["billing.Invoice".to_string()]),
            ..SerializerConfig::default()
        };
        let serializer = WorkflowSerializer::new(config);
        let registry = serializer.codec().registry();
        assert!(registry.knows("billing.Invoice"));
        assert!(!registry.knows("billing.Refund"));
    }
}
