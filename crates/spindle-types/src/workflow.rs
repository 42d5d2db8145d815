//! A workflow instance: one specification graph, one task tree, and the
//! instance-level fields persisted alongside them.

use uuid::Uuid;

use crate::error::SpecError;
use crate::graph::{SpecRef, WorkflowSpec};
use crate::spec::{SpecKind, TaskSpec};
use crate::task::{Task, TaskState};
use crate::value::DataMap;

/// Name of the spec the root task is bound to.
pub const ROOT: &str = "Root";

/// A live workflow instance.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub spec: WorkflowSpec,
    pub task_tree: Task,
    /// Instance-global variables.
    pub data: DataMap,
    pub success: bool,
    /// Id of the most recently acted-upon task.
    pub last_task: Option<Uuid>,
    /// Advisory: consumers should not mutate this instance. Not enforced.
    pub read_only: bool,
}

impl Workflow {
    /// Instantiate `spec`: a `Root` task with a `FUTURE` child bound to
    /// `Start`. A `Root` spec is added to the graph if it has none.
    pub fn new(mut spec: WorkflowSpec) -> Result<Self, SpecError> {
        let root_spec = match spec.by_name(ROOT) {
            Some(handle) => handle,
            None => spec.add(TaskSpec::new(ROOT, SpecKind::Simple))?,
        };
        let mut task_tree = Task::new(root_spec, TaskState::COMPLETED);
        task_tree.add_child(Task::new(spec.start(), TaskState::FUTURE));
        Ok(Self {
            spec,
            task_tree,
            data: DataMap::new(),
            success: true,
            last_task: None,
            read_only: false,
        })
    }

    pub fn get_task(&self, id: Uuid) -> Option<&Task> {
        self.task_tree.find(id)
    }

    pub fn get_task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.task_tree.find_mut(id)
    }

    /// Every task in pre-order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.task_tree.iter()
    }

    /// The spec a task is bound to.
    pub fn spec_of(&self, task: &Task) -> &TaskSpec {
        &self.spec[task.task_spec]
    }

    /// Tasks currently bound to `handle`.
    pub fn tasks_for(&self, handle: SpecRef) -> impl Iterator<Item = &Task> {
        self.tasks().filter(move |task| task.task_spec == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::START;
    use crate::spec::SpecId;

    #[test]
    fn test_new_workflow_has_root_and_start() {
        let workflow = Workflow::new(WorkflowSpec::new("wf")).unwrap();
        assert_eq!(workflow.spec_of(&workflow.task_tree).name, ROOT);
        assert_eq!(workflow.task_tree.children.len(), 1);
        let start = &workflow.task_tree.children[0];
        assert_eq!(workflow.spec_of(start).name, START);
        assert_eq!(start.state, TaskState::FUTURE);
        assert_eq!(start.parent, Some(workflow.task_tree.id));
    }

    #[test]
    fn test_new_workflow_reuses_existing_root_spec() {
        let mut spec = WorkflowSpec::new("wf");
        let root = spec.add(TaskSpec::simple(ROOT)).unwrap();
        let workflow = Workflow::new(spec).unwrap();
        assert_eq!(workflow.task_tree.task_spec, root);
        assert_eq!(workflow.spec.named_len(), 2);
    }

    #[test]
    fn test_root_spec_id_is_unique_in_gappy_graph() {
        let mut spec = WorkflowSpec::new("wf");
        let mut review = TaskSpec::simple("Review");
        review.id = Some(SpecId::Int(3));
        spec.insert(review).unwrap();
        spec.connect_names(START, "Review").unwrap();

        // Two named nodes, but id 3 is already taken.
        let workflow = Workflow::new(spec).unwrap();
        let root = &workflow.spec[workflow.task_tree.task_spec];
        assert_eq!(root.id, Some(SpecId::Int(4)));
    }

    #[test]
    fn test_get_task_and_tasks_for() {
        let workflow = Workflow::new(WorkflowSpec::new("wf")).unwrap();
        let start_task = workflow.task_tree.children[0].id;
        assert!(workflow.get_task(start_task).is_some());
        assert_eq!(workflow.tasks_for(workflow.spec.start()).count(), 1);
        assert_eq!(workflow.tasks().count(), 2);
    }
}
