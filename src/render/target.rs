use crate::effects::effect::Effect;
use crate::foundation::core::{Affine, BezPath, Color, INFINITE_RECT, PixelRect, Rect};
use crate::foundation::error::StrataResult;
use crate::render::bitmap::Bitmap;
use crate::scene::brush::Brush;
use crate::scene::node::{Antialias, Pen, RenderOptions};

/// How a target executes bitmap effects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSupport {
    /// `compose_effect` works on this target.
    #[default]
    Direct,
    /// Only software surfaces created with [`SurfaceUsage::SoftwareFallback`] run effects.
    SoftwareOnly,
    /// Effects cannot run at all.
    Unsupported,
}

/// Capabilities the render walker plans around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TargetCaps {
    /// `begin_layer` can clip to a rectangle without an intermediate surface.
    pub native_layer_clip: bool,
    /// Effect execution.
    pub effects: EffectSupport,
    /// Largest width or height of a surface from `create_render_target_bitmap`.
    pub max_surface_dim: u32,
}

impl Default for TargetCaps {
    fn default() -> Self {
        Self {
            native_layer_clip: true,
            effects: EffectSupport::Direct,
            max_surface_dim: 4096,
        }
    }
}

/// Purpose of an off-screen surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceUsage {
    /// Layer content composited back onto the parent.
    Intermediate,
    /// Software surface that must run effects itself.
    SoftwareFallback,
    /// Node pixel cache.
    Cache,
}

/// Initial contents of a new surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceInit {
    /// Fully transparent.
    Transparent,
    /// Unspecified; the caller overwrites every pixel.
    Uninitialized,
}

/// State snapshot accompanying every draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawState {
    /// Geometry-to-target transform.
    pub transform: Affine,
    /// Clip in target pixels.
    pub clip: Rect,
    /// Effective render options.
    pub options: RenderOptions,
    /// Depth of the draw while a 3D scene is open.
    pub depth: Option<f32>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            clip: INFINITE_RECT,
            options: RenderOptions::default(),
            depth: None,
        }
    }
}

/// Per-pixel operation applied while blending a bitmap.
#[derive(Clone, Debug, PartialEq)]
pub enum PostOp {
    /// Multiply by a constant opacity.
    Opacity(f32),
    /// Multiply by the alpha of `brush`, whose space maps to target pixels by `transform`.
    OpacityMask {
        /// Mask paint.
        brush: Brush,
        /// Brush-to-target transform.
        transform: Affine,
    },
}

/// A drawing surface driven by the render walker.
///
/// Every operation may fail; the walker propagates failures and tears its state down.
pub trait RenderTarget {
    /// Capabilities of this target.
    fn caps(&self) -> TargetCaps;

    /// Pixel extent of the target.
    fn bounds(&self) -> PixelRect;

    /// Replace pixels inside `clip` (the whole target when `None`) with `color`.
    fn clear(&mut self, color: Color, clip: Option<Rect>) -> StrataResult<()>;

    /// Open a native layer clipped to `bounds` (target pixels) and optionally to `mask`, blended
    /// back with `alpha` on [`RenderTarget::end_layer`].
    fn begin_layer(
        &mut self,
        bounds: Rect,
        antialias: Antialias,
        mask: Option<&BezPath>,
        alpha: f32,
    ) -> StrataResult<()>;

    /// Close the innermost native layer.
    fn end_layer(&mut self) -> StrataResult<()>;

    /// Allocate an off-screen surface.
    fn create_render_target_bitmap(
        &mut self,
        width: u32,
        height: u32,
        usage: SurfaceUsage,
        init: SurfaceInit,
    ) -> StrataResult<Box<dyn SurfaceTarget>>;

    /// Fill and/or stroke `shape`.
    fn draw_path(
        &mut self,
        state: &DrawState,
        shape: &BezPath,
        pen: Option<&Pen>,
        fill: Option<&Brush>,
    ) -> StrataResult<()>;

    /// Blend `bitmap`, placed by `state.transform`, limited to `fill_shape` (target pixels; the
    /// bitmap bounds when `None`), applying `post` in the same pass.
    fn draw_bitmap(
        &mut self,
        state: &DrawState,
        bitmap: &Bitmap,
        fill_shape: Option<&BezPath>,
        post: &[PostOp],
    ) -> StrataResult<()>;

    /// Run `effect` on `input` (`width x height`, rendered at `scale` pixels per local unit).
    fn compose_effect(
        &mut self,
        state: &DrawState,
        scale: f64,
        effect: &Effect,
        width: u32,
        height: u32,
        input: &Bitmap,
    ) -> StrataResult<Bitmap>;

    /// Hand a bitmap back for reuse.
    fn release_bitmap(&mut self, bitmap: Bitmap);

    /// Enter 3D mode for `viewport` (target pixels) and clear the depth buffer.
    fn begin_3d(&mut self, viewport: Rect) -> StrataResult<()>;

    /// Leave 3D mode.
    fn end_3d(&mut self) -> StrataResult<()>;

    /// Start a composition pass.
    fn begin_frame(&mut self) -> StrataResult<()>;

    /// Finish a composition pass.
    fn end_frame(&mut self) -> StrataResult<()>;
}

/// An off-screen target whose pixels become a [`Bitmap`] once drawing is done.
pub trait SurfaceTarget: RenderTarget {
    /// Finish drawing and take the pixels.
    fn into_bitmap(self: Box<Self>) -> StrataResult<Bitmap>;
}
