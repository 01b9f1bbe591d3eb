use crate::config::CompositorConfig;
use crate::foundation::core::{Affine, PixelRect, Rect, is_empty_rect, is_finite_rect};
use crate::foundation::error::StrataResult;
use crate::graph::walker::{GraphSink, GraphWalker};
use crate::render::bitmap::Bitmap;
use crate::render::cpu::{CpuTarget, CpuTargetOpts};
use crate::render::layer::fit_surface;
use crate::render::target::SurfaceTarget;
use crate::render::walker::RenderWalker;
use crate::scene::tree::{NodeId, VisualTree};
use std::collections::HashMap;
use std::convert::Infallible;

/// Pixels of a cached subtree.
#[derive(Clone, Debug)]
pub struct CachedBitmap {
    bitmap: Bitmap,
    bounds: Rect,
    scale: f64,
}

impl CachedBitmap {
    /// Rendered pixels.
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Content-space rectangle the bitmap covers.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Bitmap pixels per content unit.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Maps bitmap pixels into the node's content space.
    pub fn placement(&self) -> Affine {
        Affine::translate(self.bounds.origin().to_vec2()) * Affine::scale(1.0 / self.scale)
    }
}

/// Read-only view of node pixel caches used by the render walker.
pub trait NodeCache {
    /// `true` when `node` has a cache that reflects its current content.
    fn is_node_cache_valid(&self, node: NodeId) -> bool;

    /// Cached pixels of `node`, valid or not.
    fn cached_bitmap(&self, node: NodeId) -> Option<&CachedBitmap>;
}

#[derive(Debug)]
struct CacheEntry {
    cached: CachedBitmap,
    valid: bool,
}

/// Counters of one [`BitmapCache::refresh`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheRefreshStats {
    /// Caches rendered.
    pub rendered: usize,
    /// Entries dropped because their node is gone or no longer cached.
    pub evicted: usize,
    /// Nodes whose cache could not be rendered.
    pub failed: usize,
}

/// Owner of node pixel caches.
///
/// Nodes with a [`crate::CacheMode`] get their content and children (in content space, without
/// the node's own offset, transform, opacity, clip, mask or effect) rendered into a bitmap by
/// [`BitmapCache::refresh`]. [`crate::PreCompute`] invalidates the caches of changed nodes and of
/// their ancestors.
#[derive(Debug, Default)]
pub struct BitmapCache {
    entries: HashMap<NodeId, CacheEntry>,
    opts: CpuTargetOpts,
}

struct CachedNodes {
    found: Vec<NodeId>,
}

impl GraphSink<VisualTree> for CachedNodes {
    type Error = Infallible;

    fn pre_subgraph(&mut self, _tree: &VisualTree, _node: NodeId) -> Result<bool, Infallible> {
        Ok(true)
    }

    fn post_subgraph(&mut self, tree: &VisualTree, node: NodeId) -> Result<(), Infallible> {
        if tree.node(node).is_some_and(|n| n.cache_mode.is_some()) {
            self.found.push(node);
        }
        Ok(())
    }
}

impl BitmapCache {
    /// Empty cache rendering with default CPU target options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache rendering with `opts`.
    pub fn with_target_opts(opts: CpuTargetOpts) -> Self {
        Self {
            entries: HashMap::new(),
            opts,
        }
    }

    /// Number of entries, valid or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark the cache of `node` stale. Returns whether an entry existed.
    pub fn invalidate(&mut self, node: NodeId) -> bool {
        match self.entries.get_mut(&node) {
            Some(entry) => {
                entry.valid = false;
                true
            }
            None => false,
        }
    }

    /// Drop the cache of `node`.
    pub fn remove(&mut self, node: NodeId) -> Option<CachedBitmap> {
        self.entries.remove(&node).map(|e| e.cached)
    }

    /// Render every cached node below `root` whose cache is missing or stale, deepest first, and
    /// drop entries of nodes that are gone.
    #[tracing::instrument(skip_all, fields(root = ?root))]
    pub fn refresh(
        &mut self,
        tree: &VisualTree,
        root: NodeId,
        config: &CompositorConfig,
    ) -> StrataResult<CacheRefreshStats> {
        let mut stats = CacheRefreshStats::default();
        let before = self.entries.len();
        self.entries
            .retain(|id, _| tree.node(*id).is_some_and(|n| n.cache_mode.is_some()));
        stats.evicted = before - self.entries.len();

        let mut sink = CachedNodes { found: Vec::new() };
        if let Err(never) =
            GraphWalker::new(config.traversal_direction).walk(tree, root, &mut sink)
        {
            match never {}
        }

        for id in sink.found {
            if self.is_node_cache_valid(id) {
                continue;
            }
            match self.render_node(tree, id, config) {
                Ok(Some(cached)) => {
                    self.entries.insert(
                        id,
                        CacheEntry {
                            cached,
                            valid: true,
                        },
                    );
                    stats.rendered += 1;
                }
                Ok(None) => {
                    self.entries.remove(&id);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(node = ?id, error = %e, "node cache not rendered");
                    self.entries.remove(&id);
                    stats.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(stats)
    }

    fn render_node(
        &self,
        tree: &VisualTree,
        id: NodeId,
        config: &CompositorConfig,
    ) -> StrataResult<Option<CachedBitmap>> {
        let Some(node) = tree.node(id) else {
            return Ok(None);
        };
        let mode = node.cache_mode.unwrap_or_default();
        let bounds = node.subtree_bounds();
        if is_empty_rect(bounds) || !is_finite_rect(bounds) {
            return Ok(None);
        }

        let requested = if mode.scale.is_finite() && mode.scale > 0.0 {
            mode.scale
        } else {
            1.0
        };
        let px = PixelRect::round_out(Rect::new(
            0.0,
            0.0,
            bounds.width() * requested,
            bounds.height() * requested,
        ));
        let (fit, w, h) = fit_surface(px, config.max_intermediate_dimension);
        let scale = requested * fit;

        let mut target = Box::new(CpuTarget::new(w, h, self.opts)?);
        let transform = Affine::scale(scale) * Affine::translate(-bounds.origin().to_vec2());
        RenderWalker::new(&mut *target, config).draw_node_contents(tree, id, transform)?;
        let bitmap = target.into_bitmap()?;
        Ok(Some(CachedBitmap {
            bitmap,
            bounds,
            scale,
        }))
    }
}

impl NodeCache for BitmapCache {
    fn is_node_cache_valid(&self, node: NodeId) -> bool {
        self.entries.get(&node).is_some_and(|e| e.valid)
    }

    fn cached_bitmap(&self, node: NodeId) -> Option<&CachedBitmap> {
        self.entries.get(&node).map(|e| &e.cached)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cache.rs"]
mod tests;
