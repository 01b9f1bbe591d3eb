use crate::effects::effect::Effect;
use crate::foundation::core::{
    Affine, BezPath, Rect, Shape, Size, Stroke, Vec2, intersect_or_empty, is_empty_rect,
    transform_rect_bbox,
};
use crate::render::bitmap::Bitmap;
use crate::scene::brush::Brush;
use crate::scene::scene3d::Scene3D;
use crate::scene::tree::NodeId;
use std::sync::Arc;

/// Edge anti-aliasing mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Antialias {
    /// Hard edges: a pixel is either covered or not.
    Aliased,
    /// Fractional edge coverage.
    #[default]
    AntiAliased,
}

/// Text rendering mode. Glyph rendering is external; the mode is carried in the draw state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    /// Target default.
    #[default]
    Default,
    /// Grayscale anti-aliasing.
    Grayscale,
    /// No anti-aliasing.
    Aliased,
}

/// Sampling used when a bitmap is scaled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Nearest texel.
    NearestNeighbor,
    /// Bilinear filtering.
    #[default]
    Linear,
}

/// Effective render options for a draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Edge anti-aliasing.
    pub antialias: Antialias,
    /// Text mode.
    pub text_mode: TextMode,
    /// Bitmap sampling.
    pub interpolation: Interpolation,
}

/// Per-node overrides; `None` inherits from the parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptionOverrides {
    /// Anti-aliasing override.
    pub antialias: Option<Antialias>,
    /// Text mode override.
    pub text_mode: Option<TextMode>,
    /// Interpolation override.
    pub interpolation: Option<Interpolation>,
}

impl RenderOptionOverrides {
    /// `true` when nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self.antialias.is_none() && self.text_mode.is_none() && self.interpolation.is_none()
    }

    /// Options in effect below a node with these overrides.
    pub fn apply_to(&self, base: RenderOptions) -> RenderOptions {
        RenderOptions {
            antialias: self.antialias.unwrap_or(base.antialias),
            text_mode: self.text_mode.unwrap_or(base.text_mode),
            interpolation: self.interpolation.unwrap_or(base.interpolation),
        }
    }
}

/// Stroke paint and geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct Pen {
    /// Paint of the stroke.
    pub brush: Brush,
    /// Width, joins, caps and dashes.
    pub stroke: Stroke,
}

impl Pen {
    /// Solid pen with default joins and caps.
    pub fn new(brush: Brush, width: f64) -> Self {
        Self {
            brush,
            stroke: Stroke::new(width),
        }
    }

    /// How far the stroke can reach outside the stroked geometry.
    pub fn outset(&self) -> f64 {
        let half = self.stroke.width.abs() * 0.5;
        match self.stroke.join {
            kurbo::Join::Miter => half * self.stroke.miter_limit.max(1.0),
            _ => half,
        }
    }
}

/// A drawing primitive in a node's content space.
#[derive(Clone, Debug)]
pub enum DrawCommand {
    /// Axis-aligned rectangle.
    Rect {
        /// Geometry.
        rect: Rect,
        /// Interior paint.
        fill: Option<Brush>,
        /// Outline.
        pen: Option<Pen>,
    },
    /// Arbitrary path, non-zero fill rule.
    Path {
        /// Geometry.
        path: BezPath,
        /// Interior paint.
        fill: Option<Brush>,
        /// Outline.
        pen: Option<Pen>,
    },
    /// Bitmap stretched over `dest`.
    Bitmap {
        /// Pixels.
        bitmap: Bitmap,
        /// Destination rectangle.
        dest: Rect,
    },
}

impl DrawCommand {
    /// Filled rectangle.
    pub fn fill_rect(rect: Rect, brush: Brush) -> Self {
        Self::Rect {
            rect,
            fill: Some(brush),
            pen: None,
        }
    }

    /// Filled path.
    pub fn fill_path(path: BezPath, brush: Brush) -> Self {
        Self::Path {
            path,
            fill: Some(brush),
            pen: None,
        }
    }

    /// Conservative bounds including stroke outset. NaN geometry yields NaN bounds.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Rect { rect, pen, .. } => {
                let o = pen.as_ref().map_or(0.0, Pen::outset);
                rect.abs().inflate(o, o)
            }
            Self::Path { path, pen, .. } => {
                let o = pen.as_ref().map_or(0.0, Pen::outset);
                path.bounding_box().inflate(o, o)
            }
            Self::Bitmap { dest, .. } => dest.abs(),
        }
    }
}

/// Clip geometry in a node's local space (after offset and transform, before scrolling).
#[derive(Clone, Debug, PartialEq)]
pub enum Clip {
    /// Rectangular clip.
    Rect(Rect),
    /// Arbitrary clip path.
    Path(BezPath),
}

impl Clip {
    /// Bounding box of the clip.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Rect(r) => *r,
            Self::Path(p) => p.bounding_box(),
        }
    }

    /// Clip as a path.
    pub fn to_path(&self) -> BezPath {
        match self {
            Self::Rect(r) => r.to_path(0.1),
            Self::Path(p) => p.clone(),
        }
    }

    /// The rectangle of a rectangular clip.
    pub fn as_rect(&self) -> Option<Rect> {
        match self {
            Self::Rect(r) => Some(*r),
            Self::Path(_) => None,
        }
    }
}

/// Scroll metadata. Content and children are shifted by `-offset`; `viewport` clips them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollInfo {
    /// Scroll position.
    pub offset: Vec2,
    /// Visible area at the local origin.
    pub viewport: Option<Size>,
}

/// Guideline frame: snaps the node's device translation to whole pixels on the flagged axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Guidelines {
    /// Snap horizontally.
    pub snap_x: bool,
    /// Snap vertically.
    pub snap_y: bool,
}

impl Default for Guidelines {
    fn default() -> Self {
        Self {
            snap_x: true,
            snap_y: true,
        }
    }
}

/// Request to keep the node's subtree as a pixel cache.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheMode {
    /// Cache pixels per local unit.
    pub scale: f64,
}

impl Default for CacheMode {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

/// A 3D sub-scene presented through a 2D viewport.
#[derive(Clone, Debug)]
pub struct Viewport3D {
    /// Viewport rectangle in the node's content space.
    pub viewport: Rect,
    /// Scene drawn into the viewport.
    pub scene: Arc<Scene3D>,
}

/// What a node draws itself, before its children.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Drawing primitives.
    Content(Vec<DrawCommand>),
    /// No content of its own.
    Group,
    /// A 3D sub-scene.
    Viewport3D(Viewport3D),
}

/// A node of the visual tree.
#[derive(Clone, Debug)]
pub struct VisualNode {
    /// Own content.
    pub kind: NodeKind,
    /// Opacity of the whole subtree, `0..=1`.
    pub alpha: f32,
    /// Translation applied after `transform`.
    pub offset: Vec2,
    /// Local transform.
    pub transform: Option<Affine>,
    /// Clip in local space.
    pub clip: Option<Clip>,
    /// Brush whose alpha multiplies the subtree, in local space.
    pub opacity_mask: Option<Brush>,
    /// Bitmap effect.
    pub effect: Option<Effect>,
    /// Render-option overrides for the subtree.
    pub render_options: RenderOptionOverrides,
    /// Scroll metadata.
    pub scroll: Option<ScrollInfo>,
    /// Pixel snapping frame.
    pub guidelines: Option<Guidelines>,
    /// Pixel cache request.
    pub cache_mode: Option<CacheMode>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) subtree_bounds: Rect,
    pub(crate) world_bounds: Option<Rect>,
    pub(crate) dirty: bool,
}

impl VisualNode {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            alpha: 1.0,
            offset: Vec2::ZERO,
            transform: None,
            clip: None,
            opacity_mask: None,
            effect: None,
            render_options: RenderOptionOverrides::default(),
            scroll: None,
            guidelines: None,
            cache_mode: None,
            children: Vec::new(),
            subtree_bounds: Rect::ZERO,
            world_bounds: None,
            dirty: true,
        }
    }

    /// Node without content of its own.
    pub fn group() -> Self {
        Self::with_kind(NodeKind::Group)
    }

    /// Node drawing `commands`.
    pub fn content(commands: Vec<DrawCommand>) -> Self {
        Self::with_kind(NodeKind::Content(commands))
    }

    /// Node presenting a 3D scene in `viewport`.
    pub fn viewport_3d(viewport: Rect, scene: Arc<Scene3D>) -> Self {
        Self::with_kind(NodeKind::Viewport3D(Viewport3D { viewport, scene }))
    }

    /// Set the subtree opacity.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Set the local transform.
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Set the clip.
    pub fn with_clip(mut self, clip: Clip) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Set the opacity mask.
    pub fn with_opacity_mask(mut self, brush: Brush) -> Self {
        self.opacity_mask = Some(brush);
        self
    }

    /// Set the effect.
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Set the render-option overrides.
    pub fn with_render_options(mut self, overrides: RenderOptionOverrides) -> Self {
        self.render_options = overrides;
        self
    }

    /// Set scroll metadata.
    pub fn with_scroll(mut self, scroll: ScrollInfo) -> Self {
        self.scroll = Some(scroll);
        self
    }

    /// Set the guideline frame.
    pub fn with_guidelines(mut self, guidelines: Guidelines) -> Self {
        self.guidelines = Some(guidelines);
        self
    }

    /// Request a pixel cache.
    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = Some(mode);
        self
    }

    /// Child handles in order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Bounds of content and children in content space, as of the last pre-compute pass.
    pub fn subtree_bounds(&self) -> Rect {
        self.subtree_bounds
    }

    /// Device bounds recorded by the last pre-compute pass.
    pub fn world_bounds(&self) -> Option<Rect> {
        self.world_bounds
    }

    /// `true` when the node changed since the last pre-compute pass.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drawing commands of a content node.
    pub fn commands(&self) -> &[DrawCommand] {
        match &self.kind {
            NodeKind::Content(c) => c,
            NodeKind::Group | NodeKind::Viewport3D(_) => &[],
        }
    }

    /// Bounds of the node's own content in content space.
    pub fn content_bounds(&self) -> Rect {
        match &self.kind {
            NodeKind::Content(cmds) => cmds
                .iter()
                .map(DrawCommand::bounds)
                .reduce(|a, b| a.union(b))
                .unwrap_or(Rect::ZERO),
            NodeKind::Group => Rect::ZERO,
            NodeKind::Viewport3D(v) => v.viewport.abs(),
        }
    }

    /// `translate(offset) * transform`.
    pub fn local_transform(&self) -> Affine {
        Affine::translate(self.offset) * self.transform.unwrap_or(Affine::IDENTITY)
    }

    /// Translation by the negated scroll offset.
    pub fn scroll_transform(&self) -> Affine {
        match self.scroll {
            Some(s) if s.offset != Vec2::ZERO => Affine::translate(-s.offset),
            _ => Affine::IDENTITY,
        }
    }

    /// Maps content space into the parent's content space.
    pub fn content_transform(&self) -> Affine {
        self.local_transform() * self.scroll_transform()
    }

    /// Intersection of the clip bounds and the scroll viewport, in local space.
    pub fn clip_bounds(&self) -> Option<Rect> {
        let viewport = self
            .scroll
            .and_then(|s| s.viewport)
            .map(|size| size.to_rect());
        match (self.clip.as_ref().map(Clip::bounds), viewport) {
            (Some(a), Some(b)) => Some(intersect_or_empty(a, b)),
            (a, b) => a.or(b),
        }
    }

    /// `true` when the node needs a layer: opacity, clip, viewport, opacity mask or effect.
    pub fn has_layer_effects(&self) -> bool {
        self.alpha < 1.0
            || self.clip.is_some()
            || self.scroll.is_some_and(|s| s.viewport.is_some())
            || self.opacity_mask.is_some()
            || self.effect.as_ref().is_some_and(|e| !e.is_identity())
    }

    /// Local-space footprint of a subtree with `subtree` content-space bounds: scrolled, padded
    /// for the effect, then clipped. The clip applies to the effect output.
    pub fn local_footprint(&self, subtree: Rect) -> Rect {
        let r = self.effect_extent(subtree);
        match self.clip_bounds() {
            Some(c) => intersect_or_empty(r, c),
            None => r,
        }
    }

    /// Scrolled subtree bounds padded for the effect, without the clip.
    pub(crate) fn effect_extent(&self, subtree: Rect) -> Rect {
        let r = transform_rect_bbox(self.scroll_transform(), subtree);
        let pad = self.effect_padding();
        if pad > 0.0 && !is_empty_rect(r) {
            r.inflate(pad, pad)
        } else {
            r
        }
    }

    /// Padding of a non-identity effect in local units.
    pub(crate) fn effect_padding(&self) -> f64 {
        self.effect
            .as_ref()
            .filter(|e| !e.is_identity())
            .map_or(0.0, Effect::padding)
    }

    /// Footprint of a subtree with `subtree` content-space bounds in the parent's content space.
    pub fn bounds_in_parent(&self, subtree: Rect) -> Rect {
        transform_rect_bbox(self.local_transform(), self.local_footprint(subtree))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/node.rs"]
mod tests;
