use std::collections::HashMap;
use std::hash::Hash;

/// A read-only view of a node graph the walker can descend.
///
/// Nodes are small copyable handles; the graph owns the nodes themselves. The same handle may be
/// reachable through several parents (a DAG) or even through itself (a cycle).
pub trait Graph {
    /// Node handle.
    type Node: Copy + Eq + Hash;

    /// Number of child slots of `node`.
    fn child_count(&self, node: Self::Node) -> usize;

    /// Child in slot `index`, or `None` when the slot is empty or stale.
    fn child_at(&self, node: Self::Node, index: usize) -> Option<Self::Node>;
}

/// Callbacks invoked by [`GraphWalker::walk`] at node enter and node exit.
pub trait GraphSink<G: Graph + ?Sized> {
    /// Error that aborts the walk.
    type Error;

    /// Called when `node` is entered. Returning `Ok(false)` skips its children; `post_subgraph`
    /// still runs.
    fn pre_subgraph(&mut self, graph: &G, node: G::Node) -> Result<bool, Self::Error>;

    /// Called after all children of `node` were visited (or descent was declined).
    fn post_subgraph(&mut self, graph: &G, node: G::Node) -> Result<(), Self::Error>;
}

/// Order in which siblings are visited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// First child first.
    #[default]
    LeftToRight,
    /// Last child first.
    RightToLeft,
}

#[derive(Clone, Copy, Debug)]
struct EntryState {
    epoch: u64,
    active: bool,
}

#[derive(Clone, Copy, Debug)]
struct Frame<K> {
    parent: K,
    visited: usize,
    count: usize,
}

impl<K> Frame<K> {
    fn next_index(&mut self, direction: Direction) -> Option<usize> {
        if self.visited >= self.count {
            return None;
        }
        let i = match direction {
            Direction::LeftToRight => self.visited,
            Direction::RightToLeft => self.count - 1 - self.visited,
        };
        self.visited += 1;
        Some(i)
    }
}

/// Iterative, cycle-safe depth-first walker.
///
/// Entry state lives in a side table keyed by node handle and stamped with a per-walk epoch: a
/// node entered once during a walk is not entered again in that walk, whether it is reached a
/// second time through a shared parent or through a cycle. Depth is limited by the heap-allocated
/// frame stack only.
#[derive(Debug)]
pub struct GraphWalker<K> {
    direction: Direction,
    epoch: u64,
    entries: HashMap<K, EntryState>,
    frames: Vec<Frame<K>>,
}

impl<K> Default for GraphWalker<K> {
    fn default() -> Self {
        Self::new(Direction::default())
    }
}

impl<K> GraphWalker<K> {
    /// Create a walker visiting siblings in `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            epoch: 0,
            entries: HashMap::new(),
            frames: Vec::new(),
        }
    }

    /// Sibling order of this walker.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Current frame count. Zero outside of a walk.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl<K: Copy + Eq + Hash> GraphWalker<K> {
    /// `true` while `node` is on the active path of the current walk.
    pub fn is_entered(&self, node: K) -> bool {
        self.entries.get(&node).is_some_and(|e| e.active)
    }

    /// `true` if `node` has not been entered yet during the current walk.
    pub fn can_enter(&self, node: K) -> bool {
        self.entries.get(&node).is_none_or(|e| e.epoch != self.epoch)
    }

    /// Nodes with an entry record. After a walk these are exactly the nodes it reached.
    pub fn tracked_nodes(&self) -> usize {
        self.entries.len()
    }

    fn enter(&mut self, node: K) -> bool {
        let epoch = self.epoch;
        let entry = self.entries.entry(node).or_insert(EntryState {
            epoch: epoch.wrapping_sub(1),
            active: false,
        });
        if entry.epoch == epoch {
            return false;
        }
        entry.epoch = epoch;
        entry.active = true;
        true
    }

    fn leave(&mut self, node: K) {
        if let Some(e) = self.entries.get_mut(&node) {
            e.active = false;
        }
    }

    fn unwind(&mut self, failed: K) {
        self.leave(failed);
        while let Some(frame) = self.frames.pop() {
            self.leave(frame.parent);
        }
    }

    /// Walk the subgraph rooted at `root`, calling `sink` on enter and exit of every node.
    ///
    /// On a sink error the walk stops, every node still on the active path is left, and the error
    /// is returned. Entry records of nodes the walk did not reach are dropped.
    pub fn walk<G, S>(&mut self, graph: &G, root: K, sink: &mut S) -> Result<(), S::Error>
    where
        G: Graph<Node = K> + ?Sized,
        S: GraphSink<G>,
    {
        self.epoch = self.epoch.wrapping_add(1);
        self.frames.clear();

        let result = self.run(graph, root, sink);
        let epoch = self.epoch;
        self.entries.retain(|_, e| e.epoch == epoch);
        result
    }

    fn run<G, S>(&mut self, graph: &G, root: K, sink: &mut S) -> Result<(), S::Error>
    where
        G: Graph<Node = K> + ?Sized,
        S: GraphSink<G>,
    {
        let mut current = Some(root);
        loop {
            if let Some(node) = current.take()
                && self.enter(node)
            {
                let descend = match sink.pre_subgraph(graph, node) {
                    Ok(d) => d,
                    Err(e) => {
                        self.unwind(node);
                        return Err(e);
                    }
                };
                let count = if descend { graph.child_count(node) } else { 0 };
                if count > 0 {
                    self.frames.push(Frame {
                        parent: node,
                        visited: 0,
                        count,
                    });
                } else {
                    if let Err(e) = sink.post_subgraph(graph, node) {
                        self.unwind(node);
                        return Err(e);
                    }
                    self.leave(node);
                }
            }

            loop {
                let direction = self.direction;
                let Some(frame) = self.frames.last_mut() else {
                    return Ok(());
                };
                let parent = frame.parent;
                if let Some(i) = frame.next_index(direction) {
                    if let Some(child) = graph.child_at(parent, i) {
                        current = Some(child);
                        break;
                    }
                    continue;
                }

                self.frames.pop();
                if let Err(e) = sink.post_subgraph(graph, parent) {
                    self.unwind(parent);
                    return Err(e);
                }
                self.leave(parent);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/walker.rs"]
mod tests;
