//! Durable record shapes.
//!
//! These are the serde types written to and read from storage. They hold
//! names where the in-memory model holds handles, and capsules where it
//! holds opaque values. Conversion lives in the sibling modules.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use spindle_types::spec::{DEFAULT_LOOKAHEAD, SpecId};
use spindle_types::task::TaskState;
use spindle_types::value::DataMap;
use uuid::Uuid;

/// Map of key to value capsule.
pub type CapsuleMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// One persisted workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Omitted when the caller supplies the specification separately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wf_spec: Option<SpecGraphRecord>,
    #[serde(default)]
    pub data: CapsuleMap,
    pub success: bool,
    #[serde(default)]
    pub last_task: Option<Uuid>,
    pub task_tree: TaskRecord,
}

// ---------------------------------------------------------------------------
// Specification graph
// ---------------------------------------------------------------------------

/// A persisted specification graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecGraphRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// External source identifier. Older records call it `file`.
    #[serde(default, alias = "file")]
    pub source: Option<String>,
    pub task_specs: SpecRecordMap,
}

/// Name-keyed spec records. Deserialization rejects duplicate keys, so a
/// record with two `Start` entries cannot silently collapse into one.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct SpecRecordMap(pub BTreeMap<String, TaskSpecRecord>);

impl SpecRecordMap {
    pub fn get(&self, name: &str) -> Option<&TaskSpecRecord> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TaskSpecRecord)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SpecRecordMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UniqueKeys;

        impl<'de> Visitor<'de> for UniqueKeys {
            type Value = SpecRecordMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of task spec name to task spec record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = BTreeMap::new();
                while let Some((name, record)) = access.next_entry::<String, TaskSpecRecord>()? {
                    if map.contains_key(&name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate task spec '{name}'"
                        )));
                    }
                    map.insert(name, record);
                }
                Ok(SpecRecordMap(map))
            }
        }

        deserializer.deserialize_map(UniqueKeys)
    }
}

fn default_lookahead() -> u32 {
    DEFAULT_LOOKAHEAD
}

/// A persisted specification node: shared base fields plus the
/// variant-specific fields selected by `class`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpecRecord {
    #[serde(default)]
    pub id: Option<SpecId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub internal: bool,
    #[serde(default = "default_lookahead")]
    pub lookahead: u32,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub data: CapsuleMap,
    #[serde(default)]
    pub defines: CapsuleMap,
    #[serde(default)]
    pub pre_assign: Vec<String>,
    #[serde(default)]
    pub post_assign: Vec<String>,
    #[serde(default)]
    pub locks: Vec<String>,
    #[serde(flatten)]
    pub kind: KindRecord,
}

/// Variant-specific fields, discriminated by `class`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum KindRecord {
    Simple,
    StartTask,
    ThreadStart,
    Cancel {
        #[serde(default)]
        cancel_successfully: bool,
    },
    AcquireMutex {
        mutex: String,
    },
    ReleaseMutex {
        mutex: String,
    },
    Join(JoinRecord),
    ThreadMerge(JoinRecord),
    Merge(JoinRecord),
    MultiChoice(ChoiceRecord),
    ExclusiveChoice(ExclusiveChoiceRecord),
    Choose {
        context: String,
        #[serde(default)]
        choice: Vec<String>,
    },
    Gate {
        context: String,
    },
    MultiInstance {
        times: ExprRecord,
    },
    ThreadSplit {
        times: ExprRecord,
    },
    Trigger(TriggerRecord),
    CancelTask(TriggerRecord),
    Execute {
        #[serde(default)]
        args: Vec<String>,
    },
    Celery {
        call: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        kwargs: CapsuleMap,
        #[serde(default)]
        result_key: Option<String>,
    },
    SubWorkflow {
        file: String,
        #[serde(default)]
        in_assign: Vec<String>,
        #[serde(default)]
        out_assign: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRecord {
    #[serde(default)]
    pub split_task: Option<String>,
    #[serde(default)]
    pub threshold: Option<ExprRecord>,
    #[serde(default)]
    pub cancel_remaining: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    #[serde(default)]
    pub cond_task_specs: Vec<(ExprRecord, String)>,
    #[serde(default)]
    pub choice: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusiveChoiceRecord {
    #[serde(default)]
    pub cond_task_specs: Vec<(ExprRecord, String)>,
    #[serde(default)]
    pub choice: Option<Vec<String>>,
    #[serde(default)]
    pub default_task_spec: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub context: Vec<String>,
    pub times: ExprRecord,
    #[serde(default)]
    pub queued: bool,
}

/// A serialized operand: `[kind tag, payload]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprRecord(pub String, pub serde_json::Value);

// ---------------------------------------------------------------------------
// Task tree
// ---------------------------------------------------------------------------

/// A persisted task node. Children are nested in save order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub parent: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TaskRecord>>,
    pub state: TaskState,
    #[serde(default)]
    pub triggered: bool,
    /// Name of the bound spec; specs are persisted once, at graph level.
    pub task_spec: String,
    pub last_state_change: DateTime<Utc>,
    #[serde(default)]
    pub data: CapsuleMap,
    /// Engine bookkeeping, stored verbatim.
    #[serde(default)]
    pub internal_data: DataMap,
}

impl TaskRecord {
    /// This task alone, without its children.
    pub fn row(&self) -> TaskRecord {
        TaskRecord {
            id: self.id,
            parent: self.parent,
            children: None,
            state: self.state,
            triggered: self.triggered,
            task_spec: self.task_spec.clone(),
            last_state_change: self.last_state_change,
            data: self.data.clone(),
            internal_data: self.internal_data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_record_class_discriminator() {
        let record: TaskSpecRecord = serde_json::from_value(json!({
            "id": 4,
            "name": "lock1",
            "class": "AcquireMutex",
            "mutex": "db",
        }))
        .unwrap();
        assert_eq!(record.kind, KindRecord::AcquireMutex { mutex: "db".to_string() });
        assert_eq!(record.lookahead, DEFAULT_LOOKAHEAD);
        assert!(record.inputs.is_empty());

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["class"], "AcquireMutex");
        assert_eq!(back["mutex"], "db");
    }

    #[test]
    fn test_unit_variant_has_only_class() {
        let record: TaskSpecRecord =
            serde_json::from_value(json!({"name": "A", "class": "Simple"})).unwrap();
        assert_eq!(record.kind, KindRecord::Simple);
        assert_eq!(record.id, None);
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let err = serde_json::from_value::<TaskSpecRecord>(json!({"name": "A", "class": "Teleport"}))
            .unwrap_err();
        assert!(err.to_string().contains("Teleport"));
    }

    #[test]
    fn test_spec_map_rejects_duplicate_keys() {
        let text = r#"{
            "Start": {"name": "Start", "class": "StartTask"},
            "Start": {"name": "Start", "class": "StartTask"}
        }"#;
        let err = serde_json::from_str::<SpecRecordMap>(text).unwrap_err();
        assert!(err.to_string().contains("duplicate task spec 'Start'"));
    }

    #[test]
    fn test_graph_record_accepts_file_alias() {
        let record: SpecGraphRecord = serde_json::from_value(json!({
            "name": "g",
            "file": "orders.bpmn",
            "task_specs": {},
        }))
        .unwrap();
        assert_eq!(record.source.as_deref(), Some("orders.bpmn"));
    }

    #[test]
    fn test_expr_record_is_a_pair() {
        let expr = ExprRecord("Attrib".to_string(), json!("count"));
        assert_eq!(serde_json::to_value(&expr).unwrap(), json!(["Attrib", "count"]));
    }
}
