use crate::foundation::core::{Affine, Rect, is_empty_rect, transform_rect_bbox};
use crate::graph::walker::{Direction, GraphSink, GraphWalker};
use crate::region::aggregator::RegionAggregator;
use crate::render::cache::BitmapCache;
use crate::scene::tree::{NodeId, VisualTree};
use std::collections::HashMap;
use std::convert::Infallible;

/// Counters of one pre-compute pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreComputeStats {
    /// Nodes entered.
    pub nodes_visited: usize,
    /// Changed nodes without a changed ancestor; each contributes old and new bounds.
    pub dirty_roots: usize,
    /// Cache entries invalidated.
    pub invalidated_caches: usize,
}

/// Bounds pass run before rendering.
///
/// Refreshes subtree and world bounds of every reachable node, reports the old and new device
/// bounds of each changed subtree to a [`RegionAggregator`], and invalidates the bitmap caches of
/// changed nodes and their ancestors.
#[derive(Debug, Default)]
pub struct PreCompute {
    walker: GraphWalker<NodeId>,
}

struct PathEntry {
    parent_world: Affine,
    world: Affine,
    dirty: bool,
    dirty_root: bool,
}

struct BoundsSink<'a, const N: usize> {
    aggregator: &'a mut RegionAggregator<N>,
    path: Vec<PathEntry>,
    dirty_depth: usize,
    computed: HashMap<NodeId, Rect>,
    updates: Vec<(NodeId, Rect, Rect)>,
    invalidate: Vec<NodeId>,
    path_ids: Vec<NodeId>,
    stats: PreComputeStats,
}

impl<const N: usize> GraphSink<VisualTree> for BoundsSink<'_, N> {
    type Error = Infallible;

    fn pre_subgraph(&mut self, tree: &VisualTree, id: NodeId) -> Result<bool, Infallible> {
        let parent_world = self.path.last().map_or(Affine::IDENTITY, |p| p.world);
        let Some(node) = tree.node(id) else {
            self.path.push(PathEntry {
                parent_world,
                world: parent_world,
                dirty: false,
                dirty_root: false,
            });
            self.path_ids.push(id);
            return Ok(false);
        };
        self.stats.nodes_visited += 1;

        let dirty_root = node.dirty && self.dirty_depth == 0;
        if node.dirty {
            self.invalidate.push(id);
            self.invalidate.extend_from_slice(&self.path_ids);
            self.dirty_depth += 1;
        }
        if dirty_root {
            self.stats.dirty_roots += 1;
            if let Some(old) = node.world_bounds {
                self.aggregator.add(old);
            }
        }

        self.path.push(PathEntry {
            parent_world,
            world: parent_world * node.content_transform(),
            dirty: node.dirty,
            dirty_root,
        });
        self.path_ids.push(id);
        Ok(true)
    }

    fn post_subgraph(&mut self, tree: &VisualTree, id: NodeId) -> Result<(), Infallible> {
        self.path_ids.pop();
        let Some(entry) = self.path.pop() else {
            return Ok(());
        };
        let Some(node) = tree.node(id) else {
            return Ok(());
        };

        let mut subtree = node.content_bounds();
        for child in node.children() {
            let (Some(child_node), Some(&child_bounds)) =
                (tree.node(*child), self.computed.get(child))
            else {
                continue;
            };
            subtree = union_nonempty(subtree, child_node.bounds_in_parent(child_bounds));
        }
        self.computed.insert(id, subtree);

        let world = transform_rect_bbox(entry.parent_world, node.bounds_in_parent(subtree));
        self.updates.push((id, subtree, world));

        if entry.dirty_root {
            self.aggregator.add(world);
        }
        if entry.dirty {
            self.dirty_depth -= 1;
        }
        Ok(())
    }
}

fn union_nonempty(a: Rect, b: Rect) -> Rect {
    match (is_empty_rect(a), is_empty_rect(b)) {
        (true, true) => Rect::ZERO,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a.union(b),
    }
}

impl PreCompute {
    /// Pre-compute pass visiting siblings in `direction`.
    pub fn new(direction: Direction) -> Self {
        Self {
            walker: GraphWalker::new(direction),
        }
    }

    /// Refresh bounds below `root`, feed changed areas into `aggregator` and invalidate caches.
    #[tracing::instrument(skip_all, fields(root = ?root))]
    pub fn run<const N: usize>(
        &mut self,
        tree: &mut VisualTree,
        root: NodeId,
        aggregator: &mut RegionAggregator<N>,
        cache: Option<&mut BitmapCache>,
    ) -> PreComputeStats {
        let mut sink = BoundsSink {
            aggregator,
            path: Vec::new(),
            dirty_depth: 0,
            computed: HashMap::new(),
            updates: Vec::new(),
            invalidate: Vec::new(),
            path_ids: Vec::new(),
            stats: PreComputeStats::default(),
        };
        if let Err(never) = self.walker.walk(&*tree, root, &mut sink) {
            match never {}
        }

        let BoundsSink {
            updates,
            mut invalidate,
            mut stats,
            ..
        } = sink;
        for (id, subtree, world) in updates {
            if let Some(node) = tree.raw_mut(id) {
                node.subtree_bounds = subtree;
                node.world_bounds = Some(world);
                node.dirty = false;
            }
        }

        if let Some(cache) = cache {
            invalidate.sort_unstable();
            invalidate.dedup();
            for id in invalidate {
                if cache.invalidate(id) {
                    stats.invalidated_caches += 1;
                }
            }
        }

        tracing::debug!(
            nodes = stats.nodes_visited,
            dirty_roots = stats.dirty_roots,
            "pre-compute done"
        );
        stats
    }

    /// Refresh bounds only, without region tracking or cache invalidation.
    pub fn update_bounds(&mut self, tree: &mut VisualTree, root: NodeId) -> PreComputeStats {
        let mut scratch = RegionAggregator::<2>::new(Rect::ZERO, 0.0);
        scratch.disable();
        self.run(tree, root, &mut scratch, None)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/precompute.rs"]
mod tests;
