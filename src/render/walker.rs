use crate::config::CompositorConfig;
use crate::foundation::core::{
    Affine, Color, INFINITE_RECT, PixelRect, Rect, Shape, intersect_or_empty, is_axis_aligned,
    is_empty_rect, is_finite_rect, is_invertible, is_number_rect, is_well_ordered,
    transform_rect_bbox,
};
use crate::foundation::error::{StrataError, StrataResult};
use crate::graph::walker::{GraphSink, GraphWalker};
use crate::render::cache::{CachedBitmap, NodeCache};
use crate::render::layer::LayerBlend;
use crate::render::state::{StackCounts, StateStack};
use crate::render::target::{DrawState, EffectSupport, RenderTarget, SurfaceUsage};
use crate::scene::node::{Antialias, Clip, DrawCommand, NodeKind, Viewport3D, VisualNode};
use crate::scene::scene3d::Scene3D;
use crate::scene::tree::{NodeId, VisualTree};

/// Counters of one or more [`RenderWalker::draw_visual_tree`] calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Nodes entered.
    pub nodes_visited: usize,
    /// Subtrees skipped for empty bounds, zero opacity, bad numbers or degenerate transforms.
    pub nodes_skipped: usize,
    /// Draw calls issued for node content.
    pub draws: usize,
    /// Layers opened with `begin_layer`.
    pub native_layers: usize,
    /// Layers backed by an intermediate surface.
    pub intermediate_layers: usize,
    /// Software surfaces pushed so an effect could run.
    pub dummy_layers: usize,
    /// Effects dropped because the target cannot run them.
    pub effects_skipped: usize,
    /// Subtrees drawn from a node cache.
    pub cache_hits: usize,
    /// Node caches used directly as effect input.
    pub cache_inputs: usize,
    /// 3D scenes drawn.
    pub scenes_3d: usize,
}

enum LayerPush {
    Continue,
    CacheInput,
    Empty,
}

/// Traversal sink that draws a [`VisualTree`] onto a [`RenderTarget`].
///
/// Per node, `pre_subgraph` pushes render options, transform, a layer and a guideline frame as
/// needed and draws the node's own content; `post_subgraph` pops back to the depth the node found.
/// Layers with effects, opacity masks or path clips draw into intermediate surfaces that are
/// composited onto their parent when popped.
///
/// Culling uses the subtree bounds stored on each node, so run [`crate::PreCompute`] over the tree
/// before drawing it.
pub struct RenderWalker<'a> {
    root: &'a mut dyn RenderTarget,
    cache: Option<&'a dyn NodeCache>,
    config: &'a CompositorConfig,
    stack: StateStack,
    frames: Vec<usize>,
    walker: GraphWalker<NodeId>,
    contents_root: Option<NodeId>,
    stats: RenderStats,
}

impl<'a> RenderWalker<'a> {
    /// Walker drawing onto `root`.
    pub fn new(root: &'a mut dyn RenderTarget, config: &'a CompositorConfig) -> Self {
        Self {
            root,
            cache: None,
            config,
            stack: StateStack::default(),
            frames: Vec::new(),
            walker: GraphWalker::new(config.traversal_direction),
            contents_root: None,
            stats: RenderStats::default(),
        }
    }

    /// Draw cached subtrees from `cache`.
    pub fn with_cache(mut self, cache: &'a dyn NodeCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Current state stack depth per kind. Empty between calls.
    pub fn stack_counts(&self) -> StackCounts {
        self.stack.counts()
    }

    /// Draw the subtree at `root_id`, optionally clearing first, clipped to `rect` (target
    /// pixels). `None` leaves the clip unbounded; a NaN or inverted `rect` means the whole target.
    ///
    /// On failure the state stack is torn down completely before the error is returned.
    #[tracing::instrument(skip_all, fields(root = ?root_id))]
    pub fn draw_visual_tree(
        &mut self,
        tree: &VisualTree,
        root_id: NodeId,
        clear: Option<Color>,
        rect: Option<Rect>,
    ) -> StrataResult<()> {
        let clip = match rect {
            None => INFINITE_RECT,
            Some(r) if is_well_ordered(r) => r,
            Some(r) => {
                tracing::debug!(rect = ?r, "unusable draw rect; using the whole target");
                self.root.bounds().to_rect()
            }
        };
        let result = self.draw_from(tree, root_id, clear.map(|c| (c, rect.map(|_| clip))), clip);
        self.finish(result)
    }

    /// Draw the content and children of `id`, ignoring the node's own offset, transform, opacity,
    /// clip, mask and effect, with content space mapped by `transform`.
    pub(crate) fn draw_node_contents(
        &mut self,
        tree: &VisualTree,
        id: NodeId,
        transform: Affine,
    ) -> StrataResult<()> {
        self.contents_root = Some(id);
        let bounds = self.root.bounds().to_rect();
        self.stack.push_transform(transform);
        let result = self.draw_from(tree, id, None, bounds);
        self.contents_root = None;
        self.finish(result)
    }

    fn draw_from(
        &mut self,
        tree: &VisualTree,
        root_id: NodeId,
        clear: Option<(Color, Option<Rect>)>,
        clip: Rect,
    ) -> StrataResult<()> {
        if let Some((color, area)) = clear {
            self.root.clear(color, area)?;
        }
        self.stack.push_clip(clip);

        let mut walker = std::mem::take(&mut self.walker);
        let walked = walker.walk(tree, root_id, self);
        self.walker = walker;
        walked?;

        self.stack.pop_to(0, &mut *self.root)
    }

    fn finish(&mut self, result: StrataResult<()>) -> StrataResult<()> {
        if self.stack.depth() > 0
            && let Err(e) = self.stack.unwind_to(0, &mut *self.root)
        {
            tracing::warn!(error = %e, "forced unwind was incomplete");
        }
        self.frames.clear();
        result
    }

    fn valid_cache(&self, id: NodeId) -> Option<CachedBitmap> {
        let cache = self.cache?;
        if !cache.is_node_cache_valid(id) {
            return None;
        }
        cache.cached_bitmap(id).cloned()
    }

    fn skip(&mut self, id: NodeId, why: &str) -> StrataResult<bool> {
        tracing::trace!(node = ?id, why, "subtree skipped");
        self.stats.nodes_skipped += 1;
        Ok(false)
    }

    fn enter(&mut self, id: NodeId, node: &VisualNode) -> StrataResult<bool> {
        // render options
        if node.render_options.is_empty() {
            self.stack.push_noop();
        } else {
            let options = node.render_options.apply_to(self.stack.options());
            self.stack.push_options(options);
        }

        if self.contents_root == Some(id) {
            self.draw_content(node)?;
            return Ok(true);
        }

        // bounds
        let parent = self.stack.transform();
        let world_outer = parent * node.local_transform();
        let footprint = node.local_footprint(node.subtree_bounds());
        let mut bounds = transform_rect_bbox(world_outer, footprint);
        if !is_number_rect(bounds) {
            tracing::debug!(node = ?id, ?bounds, "bad-number bounds; skipping draw");
            return self.skip(id, "bad number");
        }
        bounds = intersect_or_empty(bounds, self.stack.clip());
        let antialias = self.stack.options().antialias == Antialias::AntiAliased;
        if antialias && !is_empty_rect(bounds) {
            bounds = bounds.inflate(1.0, 1.0);
        }

        // visibility
        if is_empty_rect(bounds) || !(node.alpha > 0.0) {
            return self.skip(id, "invisible");
        }

        // transform
        let content = node.content_transform();
        if !is_invertible(parent * content) {
            return self.skip(id, "degenerate transform");
        }
        if content != Affine::IDENTITY {
            self.stack.push_transform(content);
        }

        // layer
        if node.has_layer_effects() {
            match self.push_layer(id, node)? {
                LayerPush::Continue => {}
                LayerPush::CacheInput => return Ok(false),
                LayerPush::Empty => return self.skip(id, "empty layer"),
            }
        }

        // guidelines
        if self.config.pixel_snapping
            && let Some(g) = node.guidelines
        {
            self.stack.push_guidelines(g);
        }

        // cache or content
        if let Some(cached) = self.valid_cache(id) {
            let mut state = self.stack.draw_state();
            state.transform = state.transform * cached.placement();
            self.stack
                .active_target(&mut *self.root)
                .draw_bitmap(&state, cached.bitmap(), None, &[])?;
            self.stats.cache_hits += 1;
            self.stats.draws += 1;
            return Ok(false);
        }
        self.draw_content(node)?;
        Ok(true)
    }

    /// Transform from the node's local space (before scrolling) to the active target.
    fn world_outer(&self, node: &VisualNode) -> Affine {
        self.stack.transform() * node.scroll_transform().inverse()
    }

    fn push_layer(&mut self, id: NodeId, node: &VisualNode) -> StrataResult<LayerPush> {
        let mut effect = node.effect.clone().filter(|e| !e.is_identity());
        let mut dummy = false;
        if effect.is_some() {
            match self.stack.active_target(&mut *self.root).caps().effects {
                EffectSupport::Direct => {}
                EffectSupport::SoftwareOnly => dummy = true,
                EffectSupport::Unsupported => {
                    tracing::warn!(node = ?id, "target cannot run effects; effect skipped");
                    self.stats.effects_skipped += 1;
                    effect = None;
                }
            }
        }
        let clip_bounds = node.clip_bounds();
        let needs_layer = effect.is_some()
            || node.alpha < 1.0
            || clip_bounds.is_some()
            || node.opacity_mask.is_some();
        if !needs_layer {
            return Ok(LayerPush::Continue);
        }

        let aa = self.stack.options().antialias;
        let pad = effect.as_ref().map_or(0.0, |e| e.padding());

        if dummy {
            let world = self.world_outer(node);
            let Some(px) = self.surface_bounds(node, world, pad)? else {
                return Ok(LayerPush::Empty);
            };
            tracing::debug!(node = ?id, "software surface pushed for effect");
            self.stack.push_intermediate_layer(
                &mut *self.root,
                px,
                self.config.max_intermediate_dimension,
                SurfaceUsage::SoftwareFallback,
                LayerBlend::plain(),
            )?;
            self.stats.dummy_layers += 1;
        }

        let world = self.world_outer(node);
        let world_scale = world.determinant().abs().sqrt();

        // cache as input
        if let Some(e) = &effect
            && node.alpha >= 1.0
            && clip_bounds.is_none()
            && node.opacity_mask.is_none()
            && e.padding() == 0.0
            && let Some(cached) = self.valid_cache(id)
        {
            tracing::debug!(node = ?id, "node cache used as effect input");
            let placement = self.stack.transform() * cached.placement();
            let blend = LayerBlend {
                effect: Some(e.clone()),
                effect_scale: cached.scale(),
                ..LayerBlend::plain()
            };
            self.stack
                .push_cache_input_layer(cached.bitmap().clone(), placement, blend);
            self.stats.cache_inputs += 1;
            return Ok(LayerPush::CacheInput);
        }

        // native
        let rect_clip = !matches!(node.clip, Some(Clip::Path(_)));
        let target_caps = self.stack.active_target(&mut *self.root).caps();
        if effect.is_none()
            && node.opacity_mask.is_none()
            && rect_clip
            && is_axis_aligned(world)
            && target_caps.native_layer_clip
            && self.config.use_native_layers
        {
            let bounds = match clip_bounds {
                Some(c) => intersect_or_empty(transform_rect_bbox(world, c), self.stack.clip()),
                None => {
                    let b = transform_rect_bbox(world, node.local_footprint(node.subtree_bounds()));
                    intersect_or_empty(b, self.stack.clip())
                }
            };
            if is_empty_rect(bounds) {
                return Ok(LayerPush::Empty);
            }
            tracing::debug!(node = ?id, ?bounds, "native layer");
            self.stack
                .push_native_layer(&mut *self.root, bounds, aa, node.alpha)?;
            self.stats.native_layers += 1;
            return Ok(LayerPush::Continue);
        }

        // intermediate
        let Some(px) = self.surface_bounds(node, world, pad)? else {
            return Ok(LayerPush::Empty);
        };
        let mask_shape = node.clip.as_ref().map(|c| {
            let mut shape = c.to_path();
            shape.apply_affine(world);
            shape
        });
        let blend = LayerBlend {
            alpha: node.alpha,
            mask_shape,
            opacity_mask: node.opacity_mask.clone().map(|b| (b, world)),
            effect,
            effect_scale: world_scale,
        };
        self.stack.push_intermediate_layer(
            &mut *self.root,
            px,
            self.config.max_intermediate_dimension,
            SurfaceUsage::Intermediate,
            blend,
        )?;
        self.stats.intermediate_layers += 1;
        Ok(LayerPush::Continue)
    }

    /// Active-target pixels an intermediate surface for `node` must cover: the effect extent,
    /// limited by the clip grown by the effect reach.
    fn surface_bounds(
        &mut self,
        node: &VisualNode,
        world: Affine,
        pad: f64,
    ) -> StrataResult<Option<PixelRect>> {
        let mut local = node.effect_extent(node.subtree_bounds());
        if let Some(c) = node.clip_bounds() {
            local = intersect_or_empty(local, c.inflate(pad, pad));
        }
        let device = transform_rect_bbox(world, local);
        if !is_number_rect(device) {
            return Ok(None);
        }

        let reach = pad * world.determinant().abs().sqrt();
        let clip = self.stack.clip().inflate(reach, reach);
        let mut device = intersect_or_empty(device, clip);
        if is_empty_rect(device) {
            return Ok(None);
        }
        if !is_finite_rect(device) {
            return Err(StrataError::unbounded_clip(format!(
                "layer bounds {device:?} need a finite surface"
            )));
        }

        let target = self.stack.active_target(&mut *self.root).bounds().to_rect();
        device = intersect_or_empty(device, target.inflate(reach, reach));
        if self.stack.options().antialias == Antialias::AntiAliased {
            device = device.inflate(1.0, 1.0);
        }
        let px = PixelRect::round_out(device);
        Ok((!px.is_empty()).then_some(px))
    }

    fn draw_content(&mut self, node: &VisualNode) -> StrataResult<()> {
        match &node.kind {
            NodeKind::Content(commands) => {
                let state = self.stack.draw_state();
                let target = self.stack.active_target(&mut *self.root);
                for cmd in commands {
                    if draw_command(target, &state, cmd)? {
                        self.stats.draws += 1;
                    }
                }
                Ok(())
            }
            NodeKind::Group => Ok(()),
            NodeKind::Viewport3D(vp) => self.draw_3d(vp),
        }
    }

    fn draw_3d(&mut self, vp: &Viewport3D) -> StrataResult<()> {
        let transform = self.stack.transform();
        let viewport = intersect_or_empty(
            transform_rect_bbox(transform, vp.viewport),
            self.stack.clip(),
        );
        if is_empty_rect(viewport) || !is_finite_rect(viewport) {
            return Ok(());
        }

        let base = self.stack.depth();
        let model_space = transform * Affine::translate(vp.viewport.origin().to_vec2());
        self.stack
            .push_scene_3d(&mut *self.root, viewport, model_space)?;
        self.stats.scenes_3d += 1;

        let state = self.stack.draw_state();
        let target = self.stack.active_target(&mut *self.root);
        let mut sink = ModelSink {
            target,
            base: state,
            transforms: Vec::new(),
            draws: 0,
        };
        let walked = GraphWalker::new(self.config.traversal_direction).walk(
            &*vp.scene,
            vp.scene.root(),
            &mut sink,
        );
        self.stats.draws += sink.draws;
        walked?;

        self.stack.pop_to(base, &mut *self.root)
    }
}

impl GraphSink<VisualTree> for RenderWalker<'_> {
    type Error = StrataError;

    fn pre_subgraph(&mut self, tree: &VisualTree, id: NodeId) -> StrataResult<bool> {
        let base = self.stack.depth();
        self.frames.push(base);
        let Some(node) = tree.node(id) else {
            return Ok(false);
        };
        self.stats.nodes_visited += 1;

        match self.enter(id, node) {
            Ok(descend) => Ok(descend),
            Err(e) => {
                if let Err(u) = self.stack.unwind_to(base, &mut *self.root) {
                    tracing::warn!(node = ?id, error = %u, "rollback after failed push was incomplete");
                }
                self.frames.pop();
                Err(e)
            }
        }
    }

    fn post_subgraph(&mut self, _tree: &VisualTree, id: NodeId) -> StrataResult<()> {
        let Some(base) = self.frames.pop() else {
            return Err(StrataError::protocol(format!(
                "post_subgraph for {id:?} without a frame"
            )));
        };
        self.stack.pop_to(base, &mut *self.root)
    }
}

/// Draws the models of a 3D scene, accumulating model transforms.
struct ModelSink<'t> {
    target: &'t mut dyn RenderTarget,
    base: DrawState,
    transforms: Vec<Affine>,
    draws: usize,
}

impl GraphSink<Scene3D> for ModelSink<'_> {
    type Error = StrataError;

    fn pre_subgraph(&mut self, scene: &Scene3D, index: usize) -> StrataResult<bool> {
        let parent = self.transforms.last().copied().unwrap_or(self.base.transform);
        let Some(model) = scene.model(index) else {
            self.transforms.push(parent);
            return Ok(false);
        };
        let transform = parent * model.transform;
        self.transforms.push(transform);

        let state = DrawState {
            transform,
            depth: Some(model.depth),
            ..self.base
        };
        for cmd in &model.content {
            if draw_command(self.target, &state, cmd)? {
                self.draws += 1;
            }
        }
        Ok(true)
    }

    fn post_subgraph(&mut self, _scene: &Scene3D, _index: usize) -> StrataResult<()> {
        self.transforms.pop();
        Ok(())
    }
}

/// Issue one command. Returns `false` when the command was skipped for unusable geometry.
fn draw_command(
    target: &mut dyn RenderTarget,
    state: &DrawState,
    cmd: &DrawCommand,
) -> StrataResult<bool> {
    match cmd {
        DrawCommand::Rect { rect, fill, pen } => {
            if !is_finite_rect(*rect) {
                return Ok(false);
            }
            let path = rect.to_path(0.1);
            target.draw_path(state, &path, pen.as_ref(), fill.as_ref())?;
        }
        DrawCommand::Path { path, fill, pen } => {
            if !is_finite_rect(path.bounding_box()) {
                return Ok(false);
            }
            target.draw_path(state, path, pen.as_ref(), fill.as_ref())?;
        }
        DrawCommand::Bitmap { bitmap, dest } => {
            let dest = dest.abs();
            if !is_finite_rect(dest) || is_empty_rect(dest) {
                return Ok(false);
            }
            let mut placed = *state;
            placed.transform = state.transform
                * Affine::translate(dest.origin().to_vec2())
                * Affine::scale_non_uniform(
                    dest.width() / f64::from(bitmap.width()),
                    dest.height() / f64::from(bitmap.height()),
                );
            target.draw_bitmap(&placed, bitmap, None, &[])?;
        }
    }
    Ok(true)
}

#[cfg(test)]
#[path = "../../tests/unit/render/walker.rs"]
mod tests;
