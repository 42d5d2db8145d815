//! Task specifications: the nodes of a workflow's static control-flow graph.
//!
//! Every node shares the `TaskSpec` base record; the control-flow construct
//! it represents is the closed `SpecKind` enum. Edges (`inputs`/`outputs`)
//! are `SpecRef` handles into the owning `WorkflowSpec` arena.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::SpecRef;
use crate::operator::Operand;
use crate::value::{DataMap, Value};

/// Default lookahead hint for predictive evaluation.
pub const DEFAULT_LOOKAHEAD: u32 = 2;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Specification identifier. Numeric when authored, composite text after
/// a clone has been spliced in at load time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecId {
    Int(i64),
    Text(String),
}

impl SpecId {
    /// Identifier for the `n`-th numbered clone of the spec carrying `self`.
    ///
    /// `7` becomes `7_n`; `7_1` becomes `7_n` (the previous clone number is
    /// replaced); any other text gets `_n` appended.
    pub fn suffixed(&self, n: usize) -> Self {
        match self {
            Self::Int(id) => Self::Text(format!("{id}_{n}")),
            Self::Text(id) => {
                let base = match id.rsplit_once('_') {
                    Some((base, tail)) if is_numeric(tail) => base,
                    _ => id.as_str(),
                };
                Self::Text(format!("{base}_{n}"))
            }
        }
    }

    /// Identifier with `_n` appended verbatim.
    pub fn appended(&self, n: u64) -> Self {
        Self::Text(format!("{self}_{n}"))
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for SpecId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// A single assignment run before or after a task executes.
///
/// Either copies `right_attribute` into `left_attribute`, or stores the
/// literal `right`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub left_attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Value>,
}

impl Assign {
    pub fn from_attribute(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left_attribute: left.into(),
            right_attribute: Some(right.into()),
            right: None,
        }
    }

    pub fn literal(left: impl Into<String>, right: impl Into<Value>) -> Self {
        Self {
            left_attribute: left.into(),
            right_attribute: None,
            right: Some(right.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Variant settings
// ---------------------------------------------------------------------------

/// Settings shared by `Join`, `ThreadMerge` and `Merge`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JoinSettings {
    /// Name of the split this join closes.
    pub split_task: Option<String>,
    /// How many incoming branches must complete; `None` means all of them.
    pub threshold: Option<Operand>,
    pub cancel_remaining: bool,
}

/// Settings shared by `MultiChoice` and `ExclusiveChoice`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChoiceSettings {
    /// `(condition, target spec name)` pairs in evaluation order.
    pub cond_task_specs: Vec<(Operand, String)>,
    /// Forced choice of target names, bypassing the conditions.
    pub choice: Option<Vec<String>>,
}

/// Settings shared by `Trigger` and `CancelTask`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSettings {
    /// Names of the specs to trigger or cancel.
    pub context: Vec<String>,
    pub times: Operand,
    pub queued: bool,
}

// ---------------------------------------------------------------------------
// SpecKind
// ---------------------------------------------------------------------------

/// The control-flow construct a specification node represents.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecKind {
    Simple,
    StartTask,
    ThreadStart,
    Cancel { cancel_successfully: bool },
    AcquireMutex { mutex: String },
    ReleaseMutex { mutex: String },
    Join(JoinSettings),
    ThreadMerge(JoinSettings),
    Merge(JoinSettings),
    MultiChoice(ChoiceSettings),
    ExclusiveChoice {
        choice: ChoiceSettings,
        default_task_spec: Option<String>,
    },
    Choose { context: String, choice: Vec<String> },
    Gate { context: String },
    MultiInstance { times: Operand },
    ThreadSplit { times: Operand },
    Trigger(TriggerSettings),
    CancelTask(TriggerSettings),
    /// External command; arguments are passed through untouched.
    Execute { args: Vec<String> },
    /// Opaque distributed-call metadata. Never dispatched here.
    Celery {
        call: String,
        args: Vec<Value>,
        kwargs: DataMap,
        result_key: Option<String>,
    },
    /// Reference to an external workflow definition by path. Not safely
    /// round-trippable: only the path is stored.
    SubWorkflow {
        file: String,
        in_assign: Vec<Assign>,
        out_assign: Vec<Assign>,
    },
}

impl SpecKind {
    /// Durable discriminator for this variant.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::StartTask => "StartTask",
            Self::ThreadStart => "ThreadStart",
            Self::Cancel { .. } => "Cancel",
            Self::AcquireMutex { .. } => "AcquireMutex",
            Self::ReleaseMutex { .. } => "ReleaseMutex",
            Self::Join(_) => "Join",
            Self::ThreadMerge(_) => "ThreadMerge",
            Self::Merge(_) => "Merge",
            Self::MultiChoice(_) => "MultiChoice",
            Self::ExclusiveChoice { .. } => "ExclusiveChoice",
            Self::Choose { .. } => "Choose",
            Self::Gate { .. } => "Gate",
            Self::MultiInstance { .. } => "MultiInstance",
            Self::ThreadSplit { .. } => "ThreadSplit",
            Self::Trigger(_) => "Trigger",
            Self::CancelTask(_) => "CancelTask",
            Self::Execute { .. } => "Execute",
            Self::Celery { .. } => "Celery",
            Self::SubWorkflow { .. } => "SubWorkflow",
        }
    }

    pub fn is_subworkflow(&self) -> bool {
        matches!(self, Self::SubWorkflow { .. })
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Self::StartTask)
    }
}

// ---------------------------------------------------------------------------
// TaskSpec
// ---------------------------------------------------------------------------

/// A node of the specification graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub id: Option<SpecId>,
    /// Unique key within the owning specification.
    pub name: String,
    pub description: String,
    pub manual: bool,
    pub internal: bool,
    pub lookahead: u32,
    pub inputs: Vec<SpecRef>,
    pub outputs: Vec<SpecRef>,
    /// Seeded into every task instance of this spec.
    pub data: DataMap,
    pub defines: DataMap,
    pub pre_assign: Vec<Assign>,
    pub post_assign: Vec<Assign>,
    /// Named mutexes gating this node's execution.
    pub locks: Vec<String>,
    pub kind: SpecKind,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, kind: SpecKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            manual: false,
            internal: false,
            lookahead: DEFAULT_LOOKAHEAD,
            inputs: Vec::new(),
            outputs: Vec::new(),
            data: DataMap::new(),
            defines: DataMap::new(),
            pre_assign: Vec::new(),
            post_assign: Vec::new(),
            locks: Vec::new(),
            kind,
        }
    }

    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(name, SpecKind::Simple)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_lock(mut self, mutex: impl Into<String>) -> Self {
        self.locks.push(mutex.into());
        self
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixed_numeric_id() {
        assert_eq!(SpecId::Int(7).suffixed(1), SpecId::Text("7_1".to_string()));
    }

    #[test]
    fn test_suffixed_replaces_previous_clone_number() {
        let id = SpecId::Text("7_1".to_string());
        assert_eq!(id.suffixed(2), SpecId::Text("7_2".to_string()));
    }

    #[test]
    fn test_suffixed_plain_text_appends() {
        let id = SpecId::Text("review".to_string());
        assert_eq!(id.suffixed(3), SpecId::Text("review_3".to_string()));
    }

    #[test]
    fn test_appended_keeps_existing_suffix() {
        assert_eq!(SpecId::Int(4).appended(2), SpecId::Text("4_2".to_string()));
        let id = SpecId::Text("4_1".to_string());
        assert_eq!(id.appended(2), SpecId::Text("4_1_2".to_string()));
    }

    #[test]
    fn test_spec_id_serde_untagged() {
        let json = serde_json::to_string(&SpecId::Int(3)).unwrap();
        assert_eq!(json, "3");
        let parsed: SpecId = serde_json::from_str("\"3_1\"").unwrap();
        assert_eq!(parsed, SpecId::Text("3_1".to_string()));
    }

    #[test]
    fn test_new_spec_defaults() {
        let spec = TaskSpec::simple("A");
        assert_eq!(spec.lookahead, DEFAULT_LOOKAHEAD);
        assert!(!spec.manual);
        assert!(spec.inputs.is_empty());
        assert_eq!(spec.class_name(), "Simple");
    }
}
