use crate::effects::effect::Effect;
use crate::foundation::core::{Affine, BezPath, Color, PixelRect, Rect};
use crate::foundation::error::{StrataError, StrataResult};
use crate::render::bitmap::Bitmap;
use crate::render::target::{
    DrawState, EffectSupport, PostOp, RenderTarget, SurfaceInit, SurfaceTarget, SurfaceUsage,
    TargetCaps,
};
use crate::scene::brush::Brush;
use crate::scene::node::{Antialias, Pen};
use std::cell::RefCell;
use std::rc::Rc;

/// A call observed by a [`RecordingTarget`]. `surface` is 0 for the root and the creation index
/// for off-screen surfaces.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub enum TargetCall {
    Clear {
        surface: usize,
        color: Color,
        clip: Option<Rect>,
    },
    BeginLayer {
        surface: usize,
        bounds: Rect,
        masked: bool,
        alpha: f32,
    },
    EndLayer {
        surface: usize,
    },
    CreateSurface {
        surface: usize,
        created: usize,
        width: u32,
        height: u32,
        usage: SurfaceUsage,
    },
    DrawPath {
        surface: usize,
        transform: Affine,
        clip: Rect,
        filled: bool,
        stroked: bool,
    },
    DrawBitmap {
        surface: usize,
        transform: Affine,
        width: u32,
        height: u32,
        shaped: bool,
        post: Vec<PostOp>,
    },
    ComposeEffect {
        surface: usize,
        scale: f64,
        width: u32,
        height: u32,
    },
    ReleaseBitmap {
        surface: usize,
    },
    Begin3D {
        surface: usize,
        viewport: Rect,
    },
    End3D {
        surface: usize,
    },
    BeginFrame,
    EndFrame,
    IntoBitmap {
        surface: usize,
    },
}

impl TargetCall {
    /// `true` for calls that put pixels on a surface.
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawPath { .. } | Self::DrawBitmap { .. })
    }
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<TargetCall>,
    fallible: usize,
    fail_at: Option<usize>,
    fail_allocations: bool,
    next_surface: usize,
    live_surfaces: usize,
    open_layers: usize,
    open_3d: usize,
    in_frame: bool,
}

impl Journal {
    fn attempt(&mut self, call: TargetCall) -> StrataResult<()> {
        let n = self.fallible;
        self.fallible += 1;
        self.calls.push(call);
        if self.fail_at == Some(n) {
            return Err(StrataError::target(format!("injected failure at call {n}")));
        }
        Ok(())
    }
}

/// Render target that records every call instead of drawing.
///
/// Off-screen surfaces share the journal with their creator, so one handle observes the whole
/// pass. Fallible calls are numbered from 0; [`RecordingTarget::fail_at`] makes one of them fail,
/// which is how tests drive every error path of the walker. Balance counters (open layers, open 3D
/// scenes, live surfaces, frame) are kept so tests can assert that teardown is complete.
#[derive(Debug)]
pub struct RecordingTarget {
    journal: Rc<RefCell<Journal>>,
    surface: usize,
    width: u32,
    height: u32,
    caps: TargetCaps,
}

impl RecordingTarget {
    /// Root target of `width x height` pixels with default capabilities.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            journal: Rc::new(RefCell::new(Journal {
                next_surface: 1,
                ..Journal::default()
            })),
            surface: 0,
            width,
            height,
            caps: TargetCaps::default(),
        }
    }

    /// Replace the reported capabilities.
    pub fn with_caps(mut self, caps: TargetCaps) -> Self {
        self.caps = caps;
        self
    }

    /// Fail fallible call number `n` (counted across all surfaces); `None` disables injection.
    pub fn fail_at(&self, n: Option<usize>) {
        self.journal.borrow_mut().fail_at = n;
    }

    /// Make every surface allocation fail.
    pub fn fail_allocations(&self, fail: bool) {
        self.journal.borrow_mut().fail_allocations = fail;
    }

    /// Recorded calls.
    pub fn calls(&self) -> Vec<TargetCall> {
        self.journal.borrow().calls.clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&TargetCall) -> bool) -> usize {
        self.journal.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    /// Number of draw calls.
    pub fn draw_count(&self) -> usize {
        self.count(TargetCall::is_draw)
    }

    /// Forget recorded calls and restart call numbering.
    pub fn clear_calls(&self) {
        let mut j = self.journal.borrow_mut();
        j.calls.clear();
        j.fallible = 0;
    }

    /// Fallible calls made since the last [`RecordingTarget::clear_calls`].
    pub fn fallible_calls(&self) -> usize {
        self.journal.borrow().fallible
    }

    /// Layers begun and not yet ended.
    pub fn open_layers(&self) -> usize {
        self.journal.borrow().open_layers
    }

    /// 3D scenes begun and not yet ended.
    pub fn open_3d(&self) -> usize {
        self.journal.borrow().open_3d
    }

    /// Off-screen surfaces not yet finished or dropped.
    pub fn live_surfaces(&self) -> usize {
        self.journal.borrow().live_surfaces
    }

    /// `true` between `begin_frame` and `end_frame`.
    pub fn in_frame(&self) -> bool {
        self.journal.borrow().in_frame
    }

    fn attempt(&self, call: TargetCall) -> StrataResult<()> {
        self.journal.borrow_mut().attempt(call)
    }
}

impl Drop for RecordingTarget {
    fn drop(&mut self) {
        if self.surface != 0 {
            let mut j = self.journal.borrow_mut();
            j.live_surfaces = j.live_surfaces.saturating_sub(1);
        }
    }
}

impl RenderTarget for RecordingTarget {
    fn caps(&self) -> TargetCaps {
        self.caps
    }

    fn bounds(&self) -> PixelRect {
        PixelRect::of_size(self.width, self.height)
    }

    fn clear(&mut self, color: Color, clip: Option<Rect>) -> StrataResult<()> {
        self.attempt(TargetCall::Clear {
            surface: self.surface,
            color,
            clip,
        })
    }

    fn begin_layer(
        &mut self,
        bounds: Rect,
        _antialias: Antialias,
        mask: Option<&BezPath>,
        alpha: f32,
    ) -> StrataResult<()> {
        self.attempt(TargetCall::BeginLayer {
            surface: self.surface,
            bounds,
            masked: mask.is_some(),
            alpha,
        })?;
        self.journal.borrow_mut().open_layers += 1;
        Ok(())
    }

    fn end_layer(&mut self) -> StrataResult<()> {
        let mut j = self.journal.borrow_mut();
        if j.open_layers == 0 {
            return Err(StrataError::protocol("end_layer without begin_layer"));
        }
        j.open_layers -= 1;
        j.attempt(TargetCall::EndLayer {
            surface: self.surface,
        })
    }

    fn create_render_target_bitmap(
        &mut self,
        width: u32,
        height: u32,
        usage: SurfaceUsage,
        _init: SurfaceInit,
    ) -> StrataResult<Box<dyn SurfaceTarget>> {
        let created = {
            let mut j = self.journal.borrow_mut();
            let created = j.next_surface;
            j.attempt(TargetCall::CreateSurface {
                surface: self.surface,
                created,
                width,
                height,
                usage,
            })?;
            if j.fail_allocations {
                return Err(StrataError::allocation("injected allocation failure"));
            }
            if width == 0 || height == 0 || width.max(height) > self.caps.max_surface_dim {
                return Err(StrataError::allocation(format!(
                    "surface {width}x{height} out of range"
                )));
            }
            j.next_surface += 1;
            j.live_surfaces += 1;
            created
        };

        let mut caps = self.caps;
        if usage == SurfaceUsage::SoftwareFallback {
            caps.effects = EffectSupport::Direct;
        }
        Ok(Box::new(RecordingTarget {
            journal: Rc::clone(&self.journal),
            surface: created,
            width,
            height,
            caps,
        }))
    }

    fn draw_path(
        &mut self,
        state: &DrawState,
        _shape: &BezPath,
        pen: Option<&Pen>,
        fill: Option<&Brush>,
    ) -> StrataResult<()> {
        self.attempt(TargetCall::DrawPath {
            surface: self.surface,
            transform: state.transform,
            clip: state.clip,
            filled: fill.is_some(),
            stroked: pen.is_some(),
        })
    }

    fn draw_bitmap(
        &mut self,
        state: &DrawState,
        bitmap: &Bitmap,
        fill_shape: Option<&BezPath>,
        post: &[PostOp],
    ) -> StrataResult<()> {
        self.attempt(TargetCall::DrawBitmap {
            surface: self.surface,
            transform: state.transform,
            width: bitmap.width(),
            height: bitmap.height(),
            shaped: fill_shape.is_some(),
            post: post.to_vec(),
        })
    }

    fn compose_effect(
        &mut self,
        _state: &DrawState,
        scale: f64,
        _effect: &Effect,
        width: u32,
        height: u32,
        _input: &Bitmap,
    ) -> StrataResult<Bitmap> {
        if self.caps.effects != EffectSupport::Direct {
            return Err(StrataError::unsupported("effects need a software surface"));
        }
        self.attempt(TargetCall::ComposeEffect {
            surface: self.surface,
            scale,
            width,
            height,
        })?;
        Bitmap::new(width, height)
    }

    fn release_bitmap(&mut self, _bitmap: Bitmap) {
        self.journal
            .borrow_mut()
            .calls
            .push(TargetCall::ReleaseBitmap {
                surface: self.surface,
            });
    }

    fn begin_3d(&mut self, viewport: Rect) -> StrataResult<()> {
        self.attempt(TargetCall::Begin3D {
            surface: self.surface,
            viewport,
        })?;
        self.journal.borrow_mut().open_3d += 1;
        Ok(())
    }

    fn end_3d(&mut self) -> StrataResult<()> {
        let mut j = self.journal.borrow_mut();
        if j.open_3d == 0 {
            return Err(StrataError::protocol("end_3d without begin_3d"));
        }
        j.open_3d -= 1;
        j.attempt(TargetCall::End3D {
            surface: self.surface,
        })
    }

    fn begin_frame(&mut self) -> StrataResult<()> {
        let mut j = self.journal.borrow_mut();
        if j.in_frame {
            return Err(StrataError::protocol("begin_frame inside a frame"));
        }
        j.attempt(TargetCall::BeginFrame)?;
        j.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) -> StrataResult<()> {
        let mut j = self.journal.borrow_mut();
        if !j.in_frame {
            return Err(StrataError::protocol("end_frame without begin_frame"));
        }
        j.in_frame = false;
        j.attempt(TargetCall::EndFrame)
    }
}

impl SurfaceTarget for RecordingTarget {
    fn into_bitmap(self: Box<Self>) -> StrataResult<Bitmap> {
        self.attempt(TargetCall::IntoBitmap {
            surface: self.surface,
        })?;
        Bitmap::new(self.width, self.height)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/recording.rs"]
mod tests;
