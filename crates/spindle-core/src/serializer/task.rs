//! Task trees to and from durable records.
//!
//! Tasks persist the *name* of their spec; specs are written once, at
//! graph level. On load the name is resolved against the graph, which may
//! be repaired to match a tree that expanded further than the graph (see
//! `crate::repair`). Parent ids are restored raw; the workflow composer
//! validates and relinks them once the whole tree exists.

use spindle_types::graph::WorkflowSpec;
use spindle_types::spec::SpecKind;
use spindle_types::task::{Task, runtimes_of};
use spindle_types::tree::TreeBuilder;

use super::record::TaskRecord;
use super::{SerializerError, WorkflowSerializer};
use crate::repair;

impl WorkflowSerializer {
    /// Serialize `task`, and its subtree when `include_children` is set.
    ///
    /// Children are written in tree order. Fails with `TaskNotSupported`
    /// for a task bound to a SubWorkflow spec unless `allow_subworkflows`.
    pub fn serialize_task(
        &self,
        graph: &WorkflowSpec,
        task: &Task,
        include_children: bool,
        allow_subworkflows: bool,
    ) -> Result<TaskRecord, SerializerError> {
        if !include_children {
            return self.task_row(graph, task, allow_subworkflows);
        }

        let mut builder = TreeBuilder::new();
        let mut stack = vec![(task, None)];
        while let Some((current, parent)) = stack.pop() {
            let index = builder.push(self.task_row(graph, current, allow_subworkflows)?, parent);
            stack.extend(current.children.iter().rev().map(|child| (child, Some(index))));
        }
        builder
            .finish(|record, children| record.children = Some(children))
            .ok_or_else(|| SerializerError::MissingTask(task.id))
    }

    /// One task without its children.
    fn task_row(
        &self,
        graph: &WorkflowSpec,
        task: &Task,
        allow_subworkflows: bool,
    ) -> Result<TaskRecord, SerializerError> {
        let spec = graph.get(task.task_spec).ok_or_else(|| {
            SerializerError::MissingSpec(format!("spec handle {} of task {}", task.task_spec.index(), task.id))
        })?;
        if !allow_subworkflows && matches!(spec.kind, SpecKind::SubWorkflow { .. }) {
            return Err(SerializerError::TaskNotSupported(format!(
                "task {} is bound to SubWorkflow spec '{}'",
                task.id, spec.name
            )));
        }

        Ok(TaskRecord {
            id: task.id,
            parent: task.parent,
            children: None,
            state: task.state,
            triggered: task.triggered,
            task_spec: spec.name.clone(),
            last_state_change: task.last_state_change,
            data: self
                .codec
                .encode_map(&task.data)
                .map_err(SerializerError::corrupt(format!("task {} data", task.id)))?,
            internal_data: task.internal_data.clone(),
        })
    }

    /// Rebuild a task and its subtree, repairing `graph` as needed.
    ///
    /// Tasks are visited in save order, so repairs happen in the order the
    /// engine created the tasks. Fails with `MissingSpec` naming the spec
    /// when neither lookup nor repair resolves it. Repairs stay applied to
    /// `graph` even if a later task in the tree fails.
    pub fn deserialize_task(
        &self,
        graph: &mut WorkflowSpec,
        record: &TaskRecord,
    ) -> Result<Task, SerializerError> {
        let mut builder = TreeBuilder::new();
        let mut stack = vec![(record, None)];
        while let Some((current, parent)) = stack.pop() {
            let index = builder.push(self.task_from_row(graph, current)?, parent);
            if let Some(children) = &current.children {
                stack.extend(children.iter().rev().map(|child| (child, Some(index))));
            }
        }
        builder
            .finish(|task, children| task.children = children)
            .ok_or_else(|| SerializerError::MissingTask(record.id))
    }

    /// One task without its children, with its spec resolved.
    fn task_from_row(&self, graph: &mut WorkflowSpec, record: &TaskRecord) -> Result<Task, SerializerError> {
        let handle = if self.config.repair {
            repair::resolve_or_repair(graph, &record.task_spec, self.config.max_clone_gap)?
        } else {
            graph.by_name(&record.task_spec)
        }
        .ok_or_else(|| SerializerError::MissingSpec(record.task_spec.clone()))?;

        let handle = match runtimes_of(&record.internal_data) {
            Some(runtimes) if self.config.repair => {
                repair::extend_runtime_fan_out(graph, handle, runtimes).unwrap_or(handle)
            }
            _ => handle,
        };

        let mut task = Task::new(handle, record.state);
        task.id = record.id;
        task.parent = record.parent;
        task.triggered = record.triggered;
        task.last_state_change = record.last_state_change;
        task.data = self
            .codec
            .decode_map(&record.data)
            .map_err(SerializerError::corrupt(format!("task {} data", record.id)))?;
        task.internal_data = record.internal_data.clone();
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_types::config::SerializerConfig;
    use spindle_types::graph::SpecRepair;
    use spindle_types::spec::TaskSpec;
    use spindle_types::task::{RUNTIMES_KEY, TaskState};
    use spindle_types::value::Value;

    fn graph() -> WorkflowSpec {
        let mut spec = WorkflowSpec::new("orders");
        spec.add(TaskSpec::simple("Review")).unwrap();
        spec.connect_names("Start", "Review").unwrap();
        spec
    }

    fn tree(spec: &WorkflowSpec) -> Task {
        let mut root = Task::new(spec.start(), TaskState::COMPLETED);
        root.data.insert("customer".to_string(), Value::from("acme"));
        let review = root.add_child(Task::new(spec.require("Review").unwrap(), TaskState::READY));
        review.add_child(Task::new(spec.require("Review").unwrap(), TaskState::FUTURE));
        root.add_child(Task::new(spec.require("Review").unwrap(), TaskState::WAITING));
        root
    }

    // -----------------------------------------------------------------------
    // Serialize
    // -----------------------------------------------------------------------

    #[test]
    fn test_serialize_writes_spec_name_and_nested_children() {
        let spec = graph();
        let root = tree(&spec);
        let record = WorkflowSerializer::default()
            .serialize_task(&spec, &root, true, false)
            .unwrap();

        assert_eq!(record.task_spec, "Start");
        assert_eq!(record.parent, None);
        let children = record.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].task_spec, "Review");
        assert_eq!(children[0].parent, Some(root.id));
        assert_eq!(children[0].children.as_ref().unwrap().len(), 1);
        assert_eq!(children[1].state, TaskState::WAITING);
    }

    #[test]
    fn test_serialize_without_children_omits_them() {
        let spec = graph();
        let record = WorkflowSerializer::default()
            .serialize_task(&spec, &tree(&spec), false, false)
            .unwrap();
        assert!(record.children.is_none());
    }

    #[test]
    fn test_subworkflow_task_needs_explicit_allowance() {
        let mut spec = graph();
        let sub = spec
            .add(TaskSpec::new(
                "Nested",
                SpecKind::SubWorkflow {
                    file: "nested.json".to_string(),
                    in_assign: Vec::new(),
                    out_assign: Vec::new(),
                },
            ))
            .unwrap();
        let mut root = Task::new(spec.start(), TaskState::COMPLETED);
        root.add_child(Task::new(sub, TaskState::READY));
        let serializer = WorkflowSerializer::default();

        let err = serializer.serialize_task(&spec, &root, true, false).unwrap_err();
        assert!(matches!(err, SerializerError::TaskNotSupported(_)));

        let record = serializer.serialize_task(&spec, &root, true, true).unwrap();
        assert_eq!(record.children.unwrap()[0].task_spec, "Nested");
    }

    // -----------------------------------------------------------------------
    // Deserialize
    // -----------------------------------------------------------------------

    #[test]
    fn test_tree_shape_survives_round_trip() {
        let spec = graph();
        let root = tree(&spec);
        let serializer = WorkflowSerializer::default();
        let record = serializer.serialize_task(&spec, &root, true, false).unwrap();

        let mut target = graph();
        let back = serializer.deserialize_task(&mut target, &record).unwrap();
        assert_eq!(back.count(), root.count());
        for (original, loaded) in root.iter().zip(back.iter()) {
            assert_eq!(original.id, loaded.id);
            assert_eq!(original.parent, loaded.parent);
            assert_eq!(original.state, loaded.state);
            assert_eq!(original.data, loaded.data);
            assert_eq!(original.last_state_change, loaded.last_state_change);
        }
    }

    #[test]
    fn test_unknown_spec_is_missing_spec() {
        let spec = graph();
        let serializer = WorkflowSerializer::default();
        let mut record = serializer
            .serialize_task(&spec, &tree(&spec), false, false)
            .unwrap();
        record.task_spec = "Ghost".to_string();

        let err = serializer.deserialize_task(&mut graph(), &record).unwrap_err();
        assert!(matches!(err, SerializerError::MissingSpec(ref name) if name == "Ghost"));
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn test_suffixed_spec_is_repaired_on_load() {
        let spec = graph();
        let serializer = WorkflowSerializer::default();
        let mut record = serializer
            .serialize_task(&spec, &tree(&spec), false, false)
            .unwrap();
        record.task_spec = "Review_1".to_string();

        let mut target = graph();
        let task = serializer.deserialize_task(&mut target, &record).unwrap();
        assert_eq!(target[task.task_spec].name, "Review_1");
        assert!(target.by_name("Review_0").is_some());
        assert!(matches!(target.repairs()[0], SpecRepair::SuffixedClone { .. }));
        target.check_edges().unwrap();
    }

    #[test]
    fn test_repair_disabled_fails_on_suffixed_spec() {
        let spec = graph();
        let serializer = WorkflowSerializer::new(SerializerConfig {
            repair: false,
            ..SerializerConfig::default()
        });
        let mut record = serializer
            .serialize_task(&spec, &tree(&spec), false, false)
            .unwrap();
        record.task_spec = "Review_0".to_string();

        let mut target = graph();
        let err = serializer.deserialize_task(&mut target, &record).unwrap_err();
        assert!(matches!(err, SerializerError::MissingSpec(_)));
        assert!(target.repairs().is_empty());
    }

    #[test]
    fn test_runtime_count_extends_fan_out() {
        let mut spec = WorkflowSpec::new("mi");
        let split = spec.add(TaskSpec::simple("Split")).unwrap();
        let item = spec.add(TaskSpec::simple("Item")).unwrap();
        let done = spec.add(TaskSpec::simple("Done")).unwrap();
        spec.connect(spec.start(), split);
        spec.connect(spec.start(), item);
        spec.connect(split, item);
        spec.connect(item, done);

        let mut task = Task::new(item, TaskState::READY);
        task.internal_data.insert(RUNTIMES_KEY.to_string(), Value::Int(2));
        let serializer = WorkflowSerializer::default();
        let record = serializer.serialize_task(&spec, &task, false, false).unwrap();

        let loaded = serializer.deserialize_task(&mut spec, &record).unwrap();
        assert_ne!(loaded.task_spec, item);
        assert_eq!(spec[loaded.task_spec].name, "Item");
        assert_eq!(spec[split].outputs.len(), 2);
        assert_eq!(loaded.runtimes(), Some(2));
        spec.check_edges().unwrap();
    }
}
