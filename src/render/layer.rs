use crate::effects::effect::Effect;
use crate::foundation::core::{Affine, BezPath, PixelRect, Rect, intersect_or_empty};
use crate::foundation::error::StrataResult;
use crate::render::bitmap::Bitmap;
use crate::render::state::{StateStack, Teardown};
use crate::render::target::{PostOp, RenderTarget, SurfaceInit, SurfaceTarget, SurfaceUsage};
use crate::scene::brush::Brush;
use crate::scene::node::{Antialias, Interpolation};

/// Where a layer's content lives until it is popped.
pub(crate) enum LayerSurface {
    /// Target-managed layer opened with `begin_layer`.
    Native,
    /// Off-screen surface owned by the layer.
    Intermediate(Box<dyn SurfaceTarget>),
    /// A node cache standing in for the layer content, placed by the given transform.
    CacheInput { bitmap: Bitmap, placement: Affine },
}

/// How a layer's content is blended back onto its parent.
#[derive(Clone, Debug, Default)]
pub(crate) struct LayerBlend {
    pub(crate) alpha: f32,
    /// Exact output shape in parent target pixels.
    pub(crate) mask_shape: Option<BezPath>,
    /// Opacity mask with its brush-to-parent transform.
    pub(crate) opacity_mask: Option<(Brush, Affine)>,
    pub(crate) effect: Option<Effect>,
    /// Surface pixels per local unit of the node, for effect parameters.
    pub(crate) effect_scale: f64,
}

impl LayerBlend {
    pub(crate) fn plain() -> Self {
        Self {
            alpha: 1.0,
            effect_scale: 1.0,
            ..Self::default()
        }
    }

    fn post_ops(&self) -> Vec<PostOp> {
        let mut post = Vec::new();
        if self.alpha < 1.0 {
            post.push(PostOp::Opacity(self.alpha));
        }
        if let Some((brush, transform)) = &self.opacity_mask {
            post.push(PostOp::OpacityMask {
                brush: brush.clone(),
                transform: *transform,
            });
        }
        post
    }
}

pub(crate) struct Layer {
    pub(crate) blend: LayerBlend,
    pub(crate) surface: LayerSurface,
    /// Parent-target pixels covered by an intermediate surface.
    pub(crate) bounds: PixelRect,
    /// Surface pixels per parent pixel.
    pub(crate) scale: f64,
    pub(crate) saved_transform: Affine,
    pub(crate) saved_clip: Rect,
}

/// Largest scale (at most 1) that fits `bounds` into `max_dim` on both axes, and the resulting
/// surface size.
pub(crate) fn fit_surface(bounds: PixelRect, max_dim: u32) -> (f64, u32, u32) {
    let max_dim = max_dim.max(1);
    let (w, h) = (bounds.width().max(1), bounds.height().max(1));
    let scale = (f64::from(max_dim) / f64::from(w))
        .min(f64::from(max_dim) / f64::from(h))
        .min(1.0);
    let fit = |v: u32| ((f64::from(v) * scale).ceil() as u32).clamp(1, max_dim);
    (scale, fit(w), fit(h))
}

impl StateStack {
    /// Open a native layer on the active target, clipped to `bounds` (target pixels).
    pub(crate) fn push_native_layer(
        &mut self,
        root: &mut dyn RenderTarget,
        bounds: Rect,
        antialias: Antialias,
        alpha: f32,
    ) -> StrataResult<()> {
        self.active_target(root)
            .begin_layer(bounds, antialias, None, alpha)?;
        let layer = Layer {
            blend: LayerBlend {
                alpha,
                ..LayerBlend::plain()
            },
            surface: LayerSurface::Native,
            bounds: PixelRect::round_out(bounds),
            scale: 1.0,
            saved_transform: self.transform,
            saved_clip: self.clip,
        };
        self.push_layer_entry(layer);
        self.clip = intersect_or_empty(self.clip, bounds);
        Ok(())
    }

    /// Redirect drawing into a new off-screen surface covering `bounds` of the active target,
    /// scaled down to fit `max_dim`. Transform and clip are re-based onto the surface.
    pub(crate) fn push_intermediate_layer(
        &mut self,
        root: &mut dyn RenderTarget,
        bounds: PixelRect,
        max_dim: u32,
        usage: SurfaceUsage,
        mut blend: LayerBlend,
    ) -> StrataResult<()> {
        let target = self.active_target(root);
        let max_dim = max_dim.min(target.caps().max_surface_dim);
        let (scale, w, h) = fit_surface(bounds, max_dim);
        let surface = target.create_render_target_bitmap(w, h, usage, SurfaceInit::Transparent)?;
        blend.effect_scale *= scale;

        let rebase = Affine::scale(scale)
            * Affine::translate((-f64::from(bounds.x0), -f64::from(bounds.y0)));
        self.push_layer_entry(Layer {
            blend,
            surface: LayerSurface::Intermediate(surface),
            bounds,
            scale,
            saved_transform: self.transform,
            saved_clip: self.clip,
        });
        self.transform = rebase * self.transform;
        self.clip = Rect::new(0.0, 0.0, f64::from(w), f64::from(h));
        Ok(())
    }

    /// Use a node cache as layer content; nothing is drawn until the pop.
    pub(crate) fn push_cache_input_layer(
        &mut self,
        bitmap: Bitmap,
        placement: Affine,
        blend: LayerBlend,
    ) {
        self.push_layer_entry(Layer {
            blend,
            surface: LayerSurface::CacheInput { bitmap, placement },
            bounds: PixelRect::default(),
            scale: 1.0,
            saved_transform: self.transform,
            saved_clip: self.clip,
        });
    }

    pub(super) fn pop_layer(
        &mut self,
        root: &mut dyn RenderTarget,
        layer: Layer,
        teardown: Teardown,
    ) -> StrataResult<()> {
        self.transform = layer.saved_transform;
        self.clip = layer.saved_clip;

        let (bitmap, placement, owned) = match layer.surface {
            LayerSurface::Native => return self.active_target(root).end_layer(),
            LayerSurface::Intermediate(surface) => {
                if teardown == Teardown::Discard {
                    return Ok(());
                }
                let placement = Affine::translate((
                    f64::from(layer.bounds.x0),
                    f64::from(layer.bounds.y0),
                )) * Affine::scale(1.0 / layer.scale);
                (surface.into_bitmap()?, placement, true)
            }
            LayerSurface::CacheInput { bitmap, placement } => {
                if teardown == Teardown::Discard {
                    return Ok(());
                }
                (bitmap, placement, false)
            }
        };

        let mut state = self.draw_state();
        state.transform = placement;
        state.options.interpolation = Interpolation::NearestNeighbor;
        let target = self.active_target(root);

        let (input, input_owned) = match &layer.blend.effect {
            Some(effect) => {
                let out = target.compose_effect(
                    &state,
                    layer.blend.effect_scale,
                    effect,
                    bitmap.width(),
                    bitmap.height(),
                    &bitmap,
                );
                if owned {
                    target.release_bitmap(bitmap);
                }
                (out?, true)
            }
            None => (bitmap, owned),
        };

        let post = layer.blend.post_ops();
        let drawn = target.draw_bitmap(&state, &input, layer.blend.mask_shape.as_ref(), &post);
        if input_owned {
            target.release_bitmap(input);
        }
        drawn
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/layer.rs"]
mod tests;
