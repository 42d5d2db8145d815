//! The specification graph: an arena of `TaskSpec` nodes addressed by
//! `SpecRef` handles, with a name index over the named nodes.
//!
//! Edges are stored redundantly on both ends (`outputs` on the source,
//! `inputs` on the target). `connect` keeps the two sides in sync and
//! `check_edges` verifies it. Reachability uses `petgraph`.

use std::collections::{BTreeMap, HashSet};
use std::ops::{Index, IndexMut};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use crate::error::SpecError;
use crate::spec::{SpecId, SpecKind, TaskSpec};

/// Name of the designated root specification.
pub const START: &str = "Start";

/// Handle to a node in a `WorkflowSpec` arena.
///
/// Handles are only meaningful for the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecRef(usize);

impl SpecRef {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A structural repair applied to the graph while loading a task tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecRepair {
    /// A numbered clone spliced in after `template`.
    SuffixedClone { name: String, template: String },
    /// An extra fan-out clone added for a multi-instance runtime count.
    RuntimeFanOut {
        name: String,
        id: Option<SpecId>,
        runtimes: u64,
    },
    /// A gateway start/end clone. Its edges are not rebuilt, so it is
    /// flagged for review.
    GatewayClone { name: String, bare: String },
}

impl SpecRepair {
    /// Repairs whose output should not be trusted without review.
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::GatewayClone { .. })
    }
}

/// A workflow's static specification graph.
#[derive(Debug, Clone)]
pub struct WorkflowSpec {
    pub name: String,
    pub description: String,
    /// Identifier of the external source this graph was built from.
    pub file: Option<String>,
    specs: Vec<TaskSpec>,
    names: BTreeMap<String, SpecRef>,
    start: SpecRef,
    repairs: Vec<SpecRepair>,
}

impl WorkflowSpec {
    /// Create a graph holding only a default `Start` node.
    pub fn new(name: impl Into<String>) -> Self {
        let mut start = TaskSpec::new(START, SpecKind::StartTask);
        start.id = Some(SpecId::Int(1));
        Self::assemble(name.into(), start)
    }

    /// Create a graph around an existing `Start` node.
    pub fn with_start(name: impl Into<String>, start: TaskSpec) -> Result<Self, SpecError> {
        if start.name != START || !start.kind.is_start() {
            return Err(SpecError::NotAStart(start.name));
        }
        Ok(Self::assemble(name.into(), start))
    }

    fn assemble(name: String, start: TaskSpec) -> Self {
        let mut names = BTreeMap::new();
        names.insert(start.name.clone(), SpecRef(0));
        Self {
            name,
            description: String::new(),
            file: None,
            specs: vec![start],
            names,
            start: SpecRef(0),
            repairs: Vec::new(),
        }
    }

    /// Add an authored node, assigning the next numeric id when it has none.
    pub fn add(&mut self, mut spec: TaskSpec) -> Result<SpecRef, SpecError> {
        if spec.id.is_none() {
            spec.id = Some(SpecId::Int(self.max_int_id().saturating_add(1)));
        }
        self.insert(spec)
    }

    /// Largest numeric id in the arena, or 0.
    fn max_int_id(&self) -> i64 {
        self.specs
            .iter()
            .filter_map(|spec| match spec.id {
                Some(SpecId::Int(id)) => Some(id),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Add a node exactly as given, registering it under its name.
    pub fn insert(&mut self, spec: TaskSpec) -> Result<SpecRef, SpecError> {
        if self.names.contains_key(&spec.name) {
            return Err(SpecError::DuplicateName(spec.name));
        }
        let handle = SpecRef(self.specs.len());
        self.names.insert(spec.name.clone(), handle);
        self.specs.push(spec);
        Ok(handle)
    }

    /// Add a node to the arena without registering its name. Used for
    /// runtime fan-out clones that share their template's name.
    pub fn insert_detached(&mut self, spec: TaskSpec) -> SpecRef {
        let handle = SpecRef(self.specs.len());
        self.specs.push(spec);
        handle
    }

    /// Add the edge `from -> to` on both ends.
    pub fn connect(&mut self, from: SpecRef, to: SpecRef) {
        self.specs[from.0].outputs.push(to);
        self.specs[to.0].inputs.push(from);
    }

    /// Add the edge between two named nodes.
    pub fn connect_names(&mut self, from: &str, to: &str) -> Result<(), SpecError> {
        let from = self.require(from)?;
        let to = self.require(to)?;
        self.connect(from, to);
        Ok(())
    }

    pub fn get(&self, handle: SpecRef) -> Option<&TaskSpec> {
        self.specs.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: SpecRef) -> Option<&mut TaskSpec> {
        self.specs.get_mut(handle.0)
    }

    pub fn by_name(&self, name: &str) -> Option<SpecRef> {
        self.names.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<SpecRef, SpecError> {
        self.by_name(name)
            .ok_or_else(|| SpecError::UnknownSpec(name.to_string()))
    }

    pub fn start(&self) -> SpecRef {
        self.start
    }

    /// Named nodes in name order.
    pub fn named(&self) -> impl Iterator<Item = (&str, SpecRef)> {
        self.names.iter().map(|(name, handle)| (name.as_str(), *handle))
    }

    /// Every node in the arena, named or detached, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (SpecRef, &TaskSpec)> {
        self.specs.iter().enumerate().map(|(i, spec)| (SpecRef(i), spec))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Number of nodes registered by name.
    pub fn named_len(&self) -> usize {
        self.names.len()
    }

    pub fn names_of<'a>(&'a self, handles: &'a [SpecRef]) -> impl Iterator<Item = &'a str> + 'a {
        handles.iter().map(|h| self.specs[h.0].name.as_str())
    }

    /// Verify that every edge is recorded on both of its ends.
    pub fn check_edges(&self) -> Result<(), SpecError> {
        for (handle, spec) in self.iter() {
            for out in &spec.outputs {
                if !self.specs[out.0].inputs.contains(&handle) {
                    return Err(SpecError::EdgeMismatch {
                        from: spec.name.clone(),
                        to: self.specs[out.0].name.clone(),
                    });
                }
            }
            for input in &spec.inputs {
                if !self.specs[input.0].outputs.contains(&handle) {
                    return Err(SpecError::EdgeMismatch {
                        from: self.specs[input.0].name.clone(),
                        to: spec.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Names of registered nodes that cannot be reached from `Start` by
    /// following outputs.
    pub fn unreachable(&self) -> Vec<String> {
        let mut graph = DiGraph::<SpecRef, ()>::with_capacity(self.specs.len(), 0);
        let nodes: Vec<NodeIndex> = self.iter().map(|(handle, _)| graph.add_node(handle)).collect();
        for (handle, spec) in self.iter() {
            for out in &spec.outputs {
                graph.add_edge(nodes[handle.0], nodes[out.0], ());
            }
        }

        let mut seen = HashSet::new();
        let mut bfs = Bfs::new(&graph, nodes[self.start.0]);
        while let Some(node) = bfs.next(&graph) {
            seen.insert(graph[node]);
        }

        self.named()
            .filter(|(_, handle)| !seen.contains(handle))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn record_repair(&mut self, repair: SpecRepair) {
        self.repairs.push(repair);
    }

    /// Repairs applied since this graph was built or loaded.
    pub fn repairs(&self) -> &[SpecRepair] {
        &self.repairs
    }
}

impl Index<SpecRef> for WorkflowSpec {
    type Output = TaskSpec;

    fn index(&self, handle: SpecRef) -> &TaskSpec {
        &self.specs[handle.0]
    }
}

impl IndexMut<SpecRef> for WorkflowSpec {
    fn index_mut(&mut self, handle: SpecRef) -> &mut TaskSpec {
        &mut self.specs[handle.0]
    }
}
