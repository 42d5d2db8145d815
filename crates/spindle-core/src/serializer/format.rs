//! Text encoding of durable records.
//!
//! Task trees nest one level per task. JSON keeps that nesting and is read
//! without a recursion limit, growing the stack on demand. The YAML parser
//! caps nesting at a fixed depth, so YAML workflow records store the tree
//! as a flat `tasks` list in save order, each row naming its parent, and
//! nest it again on load.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spindle_types::config::DurableFormat;
use spindle_types::tree::TreeBuilder;
use uuid::Uuid;

use super::SerializerError;
use super::record::{CapsuleMap, SpecGraphRecord, TaskRecord, WorkflowRecord};

/// A record with a JSON and a YAML text form.
pub trait DurableRecord: Serialize + DeserializeOwned {
    fn to_yaml(&self) -> Result<String, SerializerError> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    fn from_yaml(text: &str) -> Result<Self, SerializerError> {
        Ok(serde_yaml_ng::from_str(text)?)
    }
}

impl DurableRecord for SpecGraphRecord {}

impl DurableRecord for WorkflowRecord {
    fn to_yaml(&self) -> Result<String, SerializerError> {
        Ok(serde_yaml_ng::to_string(&FlatWorkflowRecord::from(self))?)
    }

    fn from_yaml(text: &str) -> Result<Self, SerializerError> {
        let flat: FlatWorkflowRecord = serde_yaml_ng::from_str(text)?;
        flat.try_into()
    }
}

/// Encode a record as JSON (pretty or compact) or YAML.
pub fn to_text<T: DurableRecord>(record: &T, format: DurableFormat, pretty: bool) -> Result<String, SerializerError> {
    let text = match format {
        DurableFormat::Json if pretty => serde_json::to_string_pretty(record)?,
        DurableFormat::Json => serde_json::to_string(record)?,
        DurableFormat::Yaml => record.to_yaml()?,
    };
    Ok(text)
}

/// Parse a record from JSON or YAML text.
pub fn from_text<T: DurableRecord>(text: &str, format: DurableFormat) -> Result<T, SerializerError> {
    match format {
        DurableFormat::Json => json_from_str(text),
        DurableFormat::Yaml => T::from_yaml(text),
    }
}

fn json_from_str<T: DeserializeOwned>(text: &str) -> Result<T, SerializerError> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let record = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(record)
}

// ---------------------------------------------------------------------------
// Flat YAML layout
// ---------------------------------------------------------------------------

/// `WorkflowRecord` with the task tree as pre-order rows.
#[derive(Debug, Serialize, Deserialize)]
struct FlatWorkflowRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wf_spec: Option<SpecGraphRecord>,
    #[serde(default)]
    data: CapsuleMap,
    success: bool,
    #[serde(default)]
    last_task: Option<Uuid>,
    /// Root first; every other row follows its parent.
    tasks: Vec<TaskRecord>,
}

impl From<&WorkflowRecord> for FlatWorkflowRecord {
    fn from(record: &WorkflowRecord) -> Self {
        let mut tasks = Vec::new();
        let mut stack = vec![&record.task_tree];
        while let Some(task) = stack.pop() {
            tasks.push(task.row());
            if let Some(children) = &task.children {
                stack.extend(children.iter().rev());
            }
        }
        Self {
            wf_spec: record.wf_spec.clone(),
            data: record.data.clone(),
            success: record.success,
            last_task: record.last_task,
            tasks,
        }
    }
}

impl TryFrom<FlatWorkflowRecord> for WorkflowRecord {
    type Error = SerializerError;

    /// Rows must come root first with each parent before its children;
    /// a row whose parent has not been seen yet fails with `MissingTask`.
    fn try_from(flat: FlatWorkflowRecord) -> Result<Self, SerializerError> {
        let mut index_of = HashMap::with_capacity(flat.tasks.len());
        let mut builder = TreeBuilder::new();
        for row in flat.tasks {
            let parent = match (row.parent, builder.is_empty()) {
                (None, true) => None,
                (Some(parent), false) => Some(
                    *index_of
                        .get(&parent)
                        .ok_or(SerializerError::MissingTask(parent))?,
                ),
                (Some(parent), true) => return Err(SerializerError::MissingTask(parent)),
                (None, false) => {
                    return Err(SerializerError::Format(format!(
                        "task {} has no parent but is not the first row",
                        row.id
                    )));
                }
            };
            if index_of.contains_key(&row.id) {
                return Err(SerializerError::DuplicateTask(row.id));
            }
            let id = row.id;
            index_of.insert(id, builder.push(row, parent));
        }
        let task_tree = builder
            .finish(|task, children| task.children = Some(children))
            .ok_or_else(|| SerializerError::Format("workflow record has no tasks".to_string()))?;

        Ok(Self {
            wf_spec: flat.wf_spec,
            data: flat.data,
            success: flat.success,
            last_task: flat.last_task,
            task_tree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::record::SpecRecordMap;
    use chrono::Utc;
    use spindle_types::task::TaskState;

    fn record() -> SpecGraphRecord {
        SpecGraphRecord {
            name: "g".to_string(),
            description: "demo".to_string(),
            source: None,
            task_specs: SpecRecordMap::default(),
        }
    }

    fn task(parent: Option<Uuid>) -> TaskRecord {
        TaskRecord {
            id: Uuid::now_v7(),
            parent,
            children: Some(Vec::new()),
            state: TaskState::READY,
            triggered: false,
            task_spec: "Start".to_string(),
            last_state_change: Utc::now(),
            data: CapsuleMap::new(),
            internal_data: Default::default(),
        }
    }

    /// A chain `depth` tasks deep, each the only child of the one before.
    fn chain(depth: usize) -> WorkflowRecord {
        let mut rows = vec![task(None)];
        for i in 1..depth {
            let parent = rows[i - 1].id;
            rows.push(task(Some(parent)));
        }
        let flat = FlatWorkflowRecord {
            wf_spec: None,
            data: CapsuleMap::new(),
            success: false,
            last_task: None,
            tasks: rows,
        };
        flat.try_into().unwrap()
    }

    fn depth_of(record: &WorkflowRecord) -> usize {
        let mut depth = 1;
        let mut node = &record.task_tree;
        while let Some(child) = node.children.as_ref().and_then(|c| c.first()) {
            depth += 1;
            node = child;
        }
        depth
    }

    #[test]
    fn test_json_pretty_and_compact() {
        let pretty = to_text(&record(), DurableFormat::Json, true).unwrap();
        let compact = to_text(&record(), DurableFormat::Json, false).unwrap();
        assert!(pretty.contains('\n'));
        assert!(!compact.contains('\n'));
        let back: SpecGraphRecord = from_text(&compact, DurableFormat::Json).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn test_yaml_text() {
        let text = to_text(&record(), DurableFormat::Yaml, true).unwrap();
        assert!(text.contains("name: g"));
        let back: SpecGraphRecord = from_text(&text, DurableFormat::Yaml).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn test_parse_failure_is_format_error() {
        let err = from_text::<SpecGraphRecord>("{ not json", DurableFormat::Json).unwrap_err();
        assert!(matches!(err, SerializerError::Format(_)));
    }

    #[test]
    fn test_trailing_json_is_rejected() {
        let text = format!("{} {{}}", to_text(&record(), DurableFormat::Json, false).unwrap());
        let err = from_text::<SpecGraphRecord>(&text, DurableFormat::Json).unwrap_err();
        assert!(matches!(err, SerializerError::Format(_)));
    }

    #[test]
    fn test_deep_task_tree_loads_from_json() {
        let original = chain(300);
        let text = to_text(&original, DurableFormat::Json, false).unwrap();
        let back: WorkflowRecord = from_text(&text, DurableFormat::Json).unwrap();
        assert_eq!(depth_of(&back), 300);
        assert_eq!(back, original);
    }

    #[test]
    fn test_deep_task_tree_loads_from_yaml() {
        let original = chain(300);
        let text = to_text(&original, DurableFormat::Yaml, true).unwrap();
        assert!(text.contains("tasks:"));
        let back: WorkflowRecord = from_text(&text, DurableFormat::Yaml).unwrap();
        assert_eq!(depth_of(&back), 300);
        assert_eq!(back, original);
    }

    #[test]
    fn test_yaml_rows_keep_sibling_order() {
        let mut original = chain(2);
        let root = original.task_tree.id;
        let mut second = task(Some(root));
        second.task_spec = "Second".to_string();
        original.task_tree.children.as_mut().unwrap().push(second);

        let text = to_text(&original, DurableFormat::Yaml, true).unwrap();
        let back: WorkflowRecord = from_text(&text, DurableFormat::Yaml).unwrap();
        let names: Vec<_> = back.task_tree.children.as_ref().unwrap().iter().map(|t| t.task_spec.as_str()).collect();
        assert_eq!(names, vec!["Start", "Second"]);
        assert_eq!(back, original);
    }

    #[test]
    fn test_yaml_row_before_its_parent_is_missing_task() {
        let root = task(None);
        let orphan_parent = Uuid::now_v7();
        let flat = FlatWorkflowRecord {
            wf_spec: None,
            data: CapsuleMap::new(),
            success: false,
            last_task: None,
            tasks: vec![root, task(Some(orphan_parent))],
        };
        let err = WorkflowRecord::try_from(flat).unwrap_err();
        assert!(matches!(err, SerializerError::MissingTask(id) if id == orphan_parent));
    }

    #[test]
    fn test_yaml_without_tasks_is_format_error() {
        let err = from_text::<WorkflowRecord>("success: true\ntasks: []\n", DurableFormat::Yaml).unwrap_err();
        assert!(matches!(err, SerializerError::Format(_)));
    }
}
