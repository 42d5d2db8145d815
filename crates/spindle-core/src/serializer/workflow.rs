//! Whole workflow instances to and from durable records.

use std::collections::HashSet;

use spindle_types::graph::WorkflowSpec;
use spindle_types::task::Task;
use spindle_types::workflow::Workflow;
use uuid::Uuid;

use super::format;
use super::record::WorkflowRecord;
use super::{SerializerError, WorkflowSerializer};

impl WorkflowSerializer {
    /// Serialize an instance. With `include_spec` unset the graph is left
    /// out and must be supplied again on load.
    pub fn serialize_workflow(
        &self,
        workflow: &Workflow,
        include_spec: bool,
    ) -> Result<WorkflowRecord, SerializerError> {
        let wf_spec = if include_spec {
            Some(self.serialize_workflow_spec(&workflow.spec)?)
        } else {
            None
        };
        Ok(WorkflowRecord {
            wf_spec,
            data: self
                .codec
                .encode_map(&workflow.data)
                .map_err(SerializerError::corrupt("workflow data"))?,
            success: workflow.success,
            last_task: workflow.last_task,
            task_tree: self.serialize_task(
                &workflow.spec,
                &workflow.task_tree,
                true,
                self.config.allow_subworkflows,
            )?,
        })
    }

    /// Rebuild an instance.
    ///
    /// `spec` overrides the embedded graph; one of the two must be present.
    /// After the tree is rebuilt every parent id and `last_task` is checked
    /// against the tree.
    pub fn deserialize_workflow(
        &self,
        record: &WorkflowRecord,
        spec: Option<WorkflowSpec>,
        read_only: bool,
    ) -> Result<Workflow, SerializerError> {
        let mut graph = match (spec, &record.wf_spec) {
            (Some(spec), _) => spec,
            (None, Some(embedded)) => self.deserialize_workflow_spec(embedded)?,
            (None, None) => {
                return Err(SerializerError::MalformedGraph(
                    "record has no embedded spec and none was supplied".to_string(),
                ));
            }
        };

        let mut task_tree = self.deserialize_task(&mut graph, &record.task_tree)?;
        relink(&mut task_tree)?;
        if let Some(last) = record.last_task
            && task_tree.find(last).is_none()
        {
            return Err(SerializerError::MissingTask(last));
        }

        if graph.repairs().iter().any(|r| r.is_flagged()) {
            tracing::warn!(
                spec = %graph.name,
                repairs = graph.repairs().len(),
                "workflow loaded with flagged spec repairs"
            );
        }
        tracing::debug!(spec = %graph.name, tasks = task_tree.count(), "deserialized workflow");

        Ok(Workflow {
            spec: graph,
            task_tree,
            data: self
                .codec
                .decode_map(&record.data)
                .map_err(SerializerError::corrupt("workflow data"))?,
            success: record.success,
            last_task: record.last_task,
            read_only,
        })
    }

    // -----------------------------------------------------------------------
    // Text helpers
    // -----------------------------------------------------------------------

    /// Serialize to text, honouring `include_spec`, `format` and `pretty`.
    pub fn dump(&self, workflow: &Workflow) -> Result<String, SerializerError> {
        let record = self.serialize_workflow(workflow, self.config.include_spec)?;
        format::to_text(&record, self.config.format, self.config.pretty)
    }

    /// Load from text that embeds its own spec.
    pub fn load(&self, text: &str) -> Result<Workflow, SerializerError> {
        let record = format::from_text(text, self.config.format)?;
        self.deserialize_workflow(&record, None, false)
    }

    /// Load from text, using `spec` instead of any embedded spec.
    pub fn load_with_spec(&self, text: &str, spec: WorkflowSpec) -> Result<Workflow, SerializerError> {
        let record = format::from_text(text, self.config.format)?;
        self.deserialize_workflow(&record, Some(spec), false)
    }
}

/// Check task ids are unique and every recorded parent exists, then make
/// each parent id agree with the task's position in the tree.
fn relink(root: &mut Task) -> Result<(), SerializerError> {
    let mut ids = HashSet::new();
    for task in root.iter() {
        if !ids.insert(task.id) {
            return Err(SerializerError::DuplicateTask(task.id));
        }
    }
    relink_subtree(root, &ids)
}

fn relink_subtree(root: &mut Task, ids: &HashSet<Uuid>) -> Result<(), SerializerError> {
    let mut stack = vec![(root, None)];
    while let Some((task, parent)) = stack.pop() {
        if let Some(recorded) = task.parent
            && !ids.contains(&recorded)
        {
            return Err(SerializerError::MissingTask(recorded));
        }
        if task.parent != parent {
            tracing::warn!(
                task = %task.id,
                recorded = ?task.parent,
                actual = ?parent,
                "recorded parent disagrees with tree position, using tree position"
            );
            task.parent = parent;
        }
        let id = Some(task.id);
        stack.extend(task.children.iter_mut().map(|child| (child, id)));
    }
    Ok(())
}
