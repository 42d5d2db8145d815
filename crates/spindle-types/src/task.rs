//! Runtime task tree.
//!
//! A `Task` owns its children; the parent link is the parent's durable id.
//! The spec binding is a `SpecRef` into the owning workflow's graph, shared
//! between all tasks instantiated from the same node.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::SpecRef;
use crate::value::DataMap;

/// Key in `internal_data` under which the engine counts multi-instance
/// repetitions.
pub const RUNTIMES_KEY: &str = "runtimes";

/// Engine-defined task status. Opaque here beyond round-trip; the
/// associated constants name the values the reference engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskState(pub u32);

impl TaskState {
    pub const MAYBE: Self = Self(1);
    pub const LIKELY: Self = Self(2);
    pub const FUTURE: Self = Self(4);
    pub const WAITING: Self = Self(8);
    pub const READY: Self = Self(16);
    pub const COMPLETED: Self = Self(32);
    pub const CANCELLED: Self = Self(64);

    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Self::MAYBE => Some("MAYBE"),
            Self::LIKELY => Some("LIKELY"),
            Self::FUTURE => Some("FUTURE"),
            Self::WAITING => Some("WAITING"),
            Self::READY => Some("READY"),
            Self::COMPLETED => Some("COMPLETED"),
            Self::CANCELLED => Some("CANCELLED"),
            _ => None,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// A node of the runtime task tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: Uuid,
    /// Durable id of the owning task; `None` for the root.
    pub parent: Option<Uuid>,
    pub children: Vec<Task>,
    pub state: TaskState,
    pub triggered: bool,
    pub task_spec: SpecRef,
    pub last_state_change: DateTime<Utc>,
    pub data: DataMap,
    /// Engine-private bookkeeping (repetition counters, split progress).
    pub internal_data: DataMap,
}

impl Task {
    pub fn new(task_spec: SpecRef, state: TaskState) -> Self {
        Self {
            id: Uuid::now_v7(),
            parent: None,
            children: Vec::new(),
            state,
            triggered: false,
            task_spec,
            last_state_change: Utc::now(),
            data: DataMap::new(),
            internal_data: DataMap::new(),
        }
    }

    /// Append `child` and point its parent link at this task.
    pub fn add_child(&mut self, mut child: Task) -> &mut Task {
        child.parent = Some(self.id);
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Pre-order traversal of this task and its descendants.
    pub fn iter(&self) -> TaskIter<'_> {
        TaskIter { stack: vec![self] }
    }

    pub fn find(&self, id: Uuid) -> Option<&Task> {
        self.iter().find(|task| task.id == id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        let mut stack = vec![self];
        while let Some(task) = stack.pop() {
            if task.id == id {
                return Some(task);
            }
            stack.extend(task.children.iter_mut());
        }
        None
    }

    /// Number of tasks in this subtree, including this one.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Multi-instance repetition count recorded by the engine, if any.
    pub fn runtimes(&self) -> Option<u64> {
        runtimes_of(&self.internal_data)
    }
}

/// Read the repetition counter out of an internal-data map.
pub fn runtimes_of(internal_data: &DataMap) -> Option<u64> {
    internal_data
        .get(RUNTIMES_KEY)
        .and_then(|v| v.as_i64())
        .and_then(|n| u64::try_from(n).ok())
}

/// Pre-order iterator over a task subtree.
pub struct TaskIter<'a> {
    stack: Vec<&'a Task>,
}

impl<'a> Iterator for TaskIter<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<&'a Task> {
        let task = self.stack.pop()?;
        self.stack.extend(task.children.iter().rev());
        Some(task)
    }
}
