//! Bottom-up assembly of owned trees from pre-order node lists.
//!
//! Task trees can be arbitrarily deep (a sequential workflow nests every
//! task under the previous one), so converting between tree shapes walks
//! with an explicit stack and rebuilds with this builder instead of
//! recursing once per level.

/// Collects nodes in pre-order together with their parent's index, then
/// nests them.
#[derive(Debug)]
pub struct TreeBuilder<T> {
    nodes: Vec<Option<T>>,
    children: Vec<Vec<usize>>,
}

impl<T> Default for TreeBuilder<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl<T> TreeBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `node` under the node at `parent` and return its index.
    ///
    /// `parent` must be an index returned by an earlier `push`; a node
    /// pushed with `None` is only kept if it is the first.
    pub fn push(&mut self, node: T, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Some(node));
        self.children.push(Vec::new());
        if let Some(slot) = parent.and_then(|p| self.children.get_mut(p)) {
            slot.push(index);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nest every node under its parent and return the first node pushed.
    ///
    /// `attach` receives each node with its children in push order.
    pub fn finish(mut self, mut attach: impl FnMut(&mut T, Vec<T>)) -> Option<T> {
        for index in (0..self.nodes.len()).rev() {
            let kids = self.children[index]
                .iter()
                .filter_map(|&child| self.nodes[child].take())
                .collect();
            if let Some(node) = self.nodes[index].as_mut() {
                attach(node, kids);
            }
        }
        self.nodes.first_mut().and_then(Option::take)
    }
}
