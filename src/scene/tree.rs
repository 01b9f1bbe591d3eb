use crate::foundation::error::{StrataError, StrataResult};
use crate::graph::walker::Graph;
use crate::scene::node::VisualNode;

/// Generational handle of a node in a [`VisualTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Slot index; stable for the lifetime of the node.
    pub fn index(self) -> u32 {
        self.index
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<VisualNode>,
}

/// Arena (handle table) of visual nodes.
///
/// A node may be the child of several parents; traversal visits it once per walk. Handles of
/// removed nodes never resolve again, and traversal skips any that are still referenced.
#[derive(Debug, Default)]
pub struct VisualTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl VisualTree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add a detached node. New nodes start dirty.
    pub fn insert(&mut self, mut node: VisualNode) -> NodeId {
        node.dirty = true;
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// `true` while `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Shared access to a node.
    pub fn node(&self, id: NodeId) -> Option<&VisualNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    /// Mutable access to a node. The node is marked dirty.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut VisualNode> {
        let node = self.raw_mut(id)?;
        node.dirty = true;
        Some(node)
    }

    pub(crate) fn raw_mut(&mut self, id: NodeId) -> Option<&mut VisualNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn require_mut(&mut self, id: NodeId) -> StrataResult<&mut VisualNode> {
        self.node_mut(id)
            .ok_or_else(|| StrataError::protocol(format!("stale node handle {id:?}")))
    }

    /// Children of a node; empty for stale handles.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Append `child` to `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> StrataResult<()> {
        if !self.contains(child) {
            return Err(StrataError::protocol(format!("stale child handle {child:?}")));
        }
        self.require_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Insert `child` before position `index` of `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> StrataResult<()> {
        if !self.contains(child) {
            return Err(StrataError::protocol(format!("stale child handle {child:?}")));
        }
        let p = self.require_mut(parent)?;
        if index > p.children.len() {
            return Err(StrataError::protocol(format!(
                "child index {index} out of range ({})",
                p.children.len()
            )));
        }
        p.children.insert(index, child);
        Ok(())
    }

    /// Remove the first occurrence of `child` from `parent`. Returns whether it was present.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> StrataResult<bool> {
        let p = self.require_mut(parent)?;
        let Some(pos) = p.children.iter().position(|&c| c == child) else {
            return Ok(false);
        };
        p.children.remove(pos);
        Ok(true)
    }

    /// Remove a node and bump its slot generation. The node is detached from every parent (which
    /// become dirty); its children stay alive.
    pub fn remove(&mut self, id: NodeId) -> Option<VisualNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;

        for parent in self.slots.iter_mut().filter_map(|s| s.node.as_mut()) {
            let before = parent.children.len();
            parent.children.retain(|&c| c != id);
            if parent.children.len() != before {
                parent.dirty = true;
            }
        }
        Some(node)
    }

    /// Flag a node for the next pre-compute pass.
    pub fn mark_dirty(&mut self, id: NodeId) -> bool {
        self.node_mut(id).is_some()
    }
}

impl Graph for VisualTree {
    type Node = NodeId;

    fn child_count(&self, node: NodeId) -> usize {
        self.children(node).len()
    }

    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        let child = *self.children(node).get(index)?;
        self.contains(child).then_some(child)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/tree.rs"]
mod tests;
