use crate::effects::composite::{over_coverage, over_window};
use crate::effects::effect::Effect;
use crate::foundation::core::{
    Affine, BezPath, Color, PixelRect, Point, Rect, Shape, is_finite_rect, is_invertible,
    is_number_rect, is_well_ordered, transform_rect_bbox,
};
use crate::foundation::error::{StrataError, StrataResult};
use crate::foundation::math::{mul_div255_u8, unit_to_u8};
use crate::render::bitmap::{Bitmap, checked_dims};
use crate::render::surface_pool::{SurfacePool, SurfacePoolOpts, SurfacePoolStats};
use crate::render::target::{
    DrawState, EffectSupport, PostOp, RenderTarget, SurfaceInit, SurfaceTarget, SurfaceUsage,
    TargetCaps,
};
use crate::scene::brush::Brush;
use crate::scene::node::{Antialias, Interpolation, Pen};
use std::fmt;

/// Options of a [`CpuTarget`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuTargetOpts {
    /// Reported capabilities. Surfaces created for software fallback always report direct effect
    /// support.
    pub caps: TargetCaps,
    /// Scratch and intermediate pixmap recycling.
    pub pool: SurfacePoolOpts,
}

impl CpuTargetOpts {
    /// Replace the capabilities.
    pub fn with_caps(mut self, caps: TargetCaps) -> Self {
        self.caps = caps;
        self
    }
}

struct Coverage {
    area: PixelRect,
    alpha: Vec<u8>,
}

impl Coverage {
    fn at(&self, x: i32, y: i32) -> u8 {
        let a = self.area;
        if x < a.x0 || y < a.y0 || x >= a.x1 || y >= a.y1 {
            return 0;
        }
        let w = a.width() as usize;
        self.alpha[(y - a.y0) as usize * w + (x - a.x0) as usize]
    }

    fn window(&self, area: PixelRect) -> Vec<u8> {
        let mut out = Vec::with_capacity(area.width() as usize * area.height() as usize);
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                out.push(self.at(x, y));
            }
        }
        out
    }
}

struct NativeLayer {
    bounds: PixelRect,
    saved_clip: PixelRect,
    alpha: u8,
    mask: Option<Coverage>,
    parent: Option<vello_cpu::Pixmap>,
}

/// Software render target over a premultiplied RGBA8 pixmap.
///
/// Geometry is turned into coverage by `vello_cpu`; paint, clipping, layers, depth testing and
/// effects run in software on premultiplied pixels.
pub struct CpuTarget {
    pixmap: vello_cpu::Pixmap,
    opts: CpuTargetOpts,
    ctx: Option<vello_cpu::RenderContext>,
    pool: SurfacePool,
    layers: Vec<NativeLayer>,
    layer_clip: PixelRect,
    depth: Vec<f32>,
    in_3d: bool,
    in_frame: bool,
}

impl fmt::Debug for CpuTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuTarget")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("caps", &self.opts.caps)
            .field("layers", &self.layers.len())
            .field("in_3d", &self.in_3d)
            .field("in_frame", &self.in_frame)
            .finish()
    }
}

impl CpuTarget {
    /// Transparent `width x height` target.
    pub fn new(width: u32, height: u32, opts: CpuTargetOpts) -> StrataResult<Self> {
        let (w, h) = checked_dims(width, height)?;
        Ok(Self::from_pixmap(vello_cpu::Pixmap::new(w, h), opts))
    }

    fn from_pixmap(pixmap: vello_cpu::Pixmap, opts: CpuTargetOpts) -> Self {
        let layer_clip = PixelRect::of_size(u32::from(pixmap.width()), u32::from(pixmap.height()));
        Self {
            pixmap,
            opts,
            ctx: None,
            pool: SurfacePool::new(opts.pool),
            layers: Vec::new(),
            layer_clip,
            depth: Vec::new(),
            in_3d: false,
            in_frame: false,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        u32::from(self.pixmap.width())
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        u32::from(self.pixmap.height())
    }

    /// Premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data_as_u8_slice()
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let i = ((y as usize) * (self.width() as usize) + x as usize) * 4;
        let d = self.data();
        Some([d[i], d[i + 1], d[i + 2], d[i + 3]])
    }

    /// Copy of the current pixels.
    pub fn snapshot(&self) -> StrataResult<Bitmap> {
        Bitmap::from_premul_rgba8(self.data(), self.width(), self.height())
    }

    /// Counters of the scratch pool.
    pub fn pool_stats(&self) -> SurfacePoolStats {
        self.pool.stats()
    }

    /// Open native layers.
    pub fn layer_depth(&self) -> usize {
        self.layers.len()
    }

    fn clip_pixels(&self, clip: Rect) -> PixelRect {
        if !is_number_rect(clip) || !is_well_ordered(clip) {
            return PixelRect::default();
        }
        let (w, h) = (f64::from(self.width()), f64::from(self.height()));
        let r = PixelRect {
            x0: clip.x0.clamp(0.0, w).round() as i32,
            y0: clip.y0.clamp(0.0, h).round() as i32,
            x1: clip.x1.clamp(0.0, w).round() as i32,
            y1: clip.y1.clamp(0.0, h).round() as i32,
        };
        r.intersect(self.layer_clip)
    }

    fn rasterize(
        &mut self,
        path: &BezPath,
        transform: Affine,
        limit: PixelRect,
        antialias: Antialias,
    ) -> StrataResult<Option<Coverage>> {
        let bbox = transform_rect_bbox(transform, path.bounding_box());
        if !is_finite_rect(bbox) {
            tracing::debug!(?bbox, "skipping non-finite geometry");
            return Ok(None);
        }
        let area = PixelRect::round_out(bbox).intersect(limit);
        if area.is_empty() {
            return Ok(None);
        }

        let mut tmp = self.pool.borrow(area.width(), area.height(), true)?;
        let shifted =
            Affine::translate((-f64::from(area.x0), -f64::from(area.y0))) * transform;
        render_coverage(&mut self.ctx, &mut tmp, path, shifted);
        let alpha = tmp
            .data_as_u8_slice()
            .chunks_exact(4)
            .map(|px| match antialias {
                Antialias::AntiAliased => px[3],
                Antialias::Aliased if px[3] >= 128 => 255,
                Antialias::Aliased => 0,
            })
            .collect();
        self.pool.release(tmp);
        Ok(Some(Coverage { area, alpha }))
    }

    fn paint(&mut self, coverage: &Coverage, brush: &Brush, state: &DrawState) {
        let solid = brush.as_solid().map(|c| c.premultiply().to_array());
        let inverse = state.transform.inverse();
        let depth = if self.in_3d { state.depth } else { None };
        let width = self.width() as usize;
        let area = coverage.area;

        let data = self.pixmap.data_as_u8_slice_mut();
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let c = coverage.at(x, y);
                if c == 0 {
                    continue;
                }
                let idx = y as usize * width + x as usize;
                if let Some(z) = depth
                    && z > self.depth[idx]
                {
                    continue;
                }
                let src = solid.unwrap_or_else(|| {
                    let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                    brush.sample(p).to_array()
                });
                let i = idx * 4;
                let dst = [data[i], data[i + 1], data[i + 2], data[i + 3]];
                data[i..i + 4].copy_from_slice(&over_coverage(dst, src, c));
                if let Some(z) = depth
                    && c >= 128
                {
                    self.depth[idx] = z;
                }
            }
        }
    }

    fn discard_layers(&mut self) {
        while let Some(layer) = self.layers.pop() {
            self.layer_clip = layer.saved_clip;
            if let Some(parent) = layer.parent {
                let content = std::mem::replace(&mut self.pixmap, parent);
                self.pool.release(content);
            }
        }
    }
}

impl RenderTarget for CpuTarget {
    fn caps(&self) -> TargetCaps {
        self.opts.caps
    }

    fn bounds(&self) -> PixelRect {
        PixelRect::of_size(self.width(), self.height())
    }

    fn clear(&mut self, color: Color, clip: Option<Rect>) -> StrataResult<()> {
        let area = match clip {
            Some(c) => self.clip_pixels(c),
            None => self.layer_clip,
        };
        let px = color.premultiply().to_array();
        let width = self.width() as usize;
        let data = self.pixmap.data_as_u8_slice_mut();
        for y in area.y0..area.y1 {
            let row = y as usize * width;
            for x in area.x0..area.x1 {
                let i = (row + x as usize) * 4;
                data[i..i + 4].copy_from_slice(&px);
            }
        }
        Ok(())
    }

    fn begin_layer(
        &mut self,
        bounds: Rect,
        antialias: Antialias,
        mask: Option<&BezPath>,
        alpha: f32,
    ) -> StrataResult<()> {
        let mut area = self.clip_pixels(bounds);
        let mask = match mask {
            Some(m) => {
                let cov = self.rasterize(m, Affine::IDENTITY, area, antialias)?;
                area = cov.as_ref().map_or(PixelRect::default(), |c| c.area);
                cov
            }
            None => None,
        };
        let alpha = unit_to_u8(alpha);

        let parent = if alpha < 255 || mask.is_some() {
            let fresh = self.pool.borrow(self.width(), self.height(), true)?;
            Some(std::mem::replace(&mut self.pixmap, fresh))
        } else {
            None
        };
        self.layers.push(NativeLayer {
            bounds: area,
            saved_clip: self.layer_clip,
            alpha,
            mask,
            parent,
        });
        self.layer_clip = area;
        Ok(())
    }

    fn end_layer(&mut self) -> StrataResult<()> {
        let Some(layer) = self.layers.pop() else {
            return Err(StrataError::protocol("end_layer without begin_layer"));
        };
        self.layer_clip = layer.saved_clip;
        let Some(parent) = layer.parent else {
            return Ok(());
        };

        let content = std::mem::replace(&mut self.pixmap, parent);
        let b = layer.bounds;
        let width = self.width() as usize;
        if !b.is_empty() {
            let window = layer.mask.as_ref().map(|m| m.window(b));
            over_window(
                self.pixmap.data_as_u8_slice_mut(),
                content.data_as_u8_slice(),
                width,
                b.x0 as usize,
                b.y0 as usize,
                b.x1 as usize,
                b.y1 as usize,
                window.as_deref(),
                layer.alpha,
            );
        }
        self.pool.release(content);
        Ok(())
    }

    fn create_render_target_bitmap(
        &mut self,
        width: u32,
        height: u32,
        usage: SurfaceUsage,
        init: SurfaceInit,
    ) -> StrataResult<Box<dyn SurfaceTarget>> {
        let max = self.opts.caps.max_surface_dim;
        if width > max || height > max {
            return Err(StrataError::allocation(format!(
                "surface {width}x{height} exceeds {max}"
            )));
        }
        let pixmap = self
            .pool
            .borrow(width, height, init == SurfaceInit::Transparent)?;
        let mut opts = self.opts;
        if usage == SurfaceUsage::SoftwareFallback {
            opts.caps.effects = EffectSupport::Direct;
        }
        Ok(Box::new(CpuTarget::from_pixmap(pixmap, opts)))
    }

    fn draw_path(
        &mut self,
        state: &DrawState,
        shape: &BezPath,
        pen: Option<&Pen>,
        fill: Option<&Brush>,
    ) -> StrataResult<()> {
        let limit = self.clip_pixels(state.clip);
        if limit.is_empty() || !is_invertible(state.transform) {
            return Ok(());
        }
        let aa = state.options.antialias;

        if let Some(brush) = fill
            && let Some(cov) = self.rasterize(shape, state.transform, limit, aa)?
        {
            self.paint(&cov, brush, state);
        }
        if let Some(pen) = pen
            && pen.stroke.width.is_finite()
            && pen.stroke.width > 0.0
        {
            let outline = kurbo::stroke(
                shape.iter(),
                &pen.stroke,
                &kurbo::StrokeOpts::default(),
                0.1,
            );
            if let Some(cov) = self.rasterize(&outline, state.transform, limit, aa)? {
                self.paint(&cov, &pen.brush, state);
            }
        }
        Ok(())
    }

    fn draw_bitmap(
        &mut self,
        state: &DrawState,
        bitmap: &Bitmap,
        fill_shape: Option<&BezPath>,
        post: &[PostOp],
    ) -> StrataResult<()> {
        let limit = self.clip_pixels(state.clip);
        if limit.is_empty() || !is_invertible(state.transform) {
            return Ok(());
        }
        let inverse = state.transform.inverse();
        let dest = transform_rect_bbox(state.transform, bitmap.bounds());
        let mut area = PixelRect::round_out(dest).intersect(limit);

        let shape = match fill_shape {
            Some(s) => {
                let Some(cov) =
                    self.rasterize(s, Affine::IDENTITY, area, state.options.antialias)?
                else {
                    return Ok(());
                };
                area = cov.area;
                Some(cov)
            }
            None => None,
        };

        let mut opacity = 255u8;
        let mut masks = Vec::new();
        for op in post {
            match op {
                PostOp::Opacity(a) => {
                    opacity = mul_div255_u8(u16::from(opacity), u16::from(unit_to_u8(*a)));
                }
                PostOp::OpacityMask { brush, transform } => {
                    if !is_invertible(*transform) {
                        return Ok(());
                    }
                    masks.push((brush, transform.inverse()));
                }
            }
        }
        if opacity == 0 {
            return Ok(());
        }

        let nearest = state.options.interpolation == Interpolation::NearestNeighbor;
        let depth = if self.in_3d { state.depth } else { None };
        let width = self.width() as usize;
        let (bw, bh) = (f64::from(bitmap.width()), f64::from(bitmap.height()));

        let data = self.pixmap.data_as_u8_slice_mut();
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let mut k = shape.as_ref().map_or(255, |c| c.at(x, y));
                if k == 0 {
                    continue;
                }
                let center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                let p = inverse * center;
                if !(p.x >= 0.0 && p.y >= 0.0 && p.x < bw && p.y < bh) {
                    continue;
                }
                let idx = y as usize * width + x as usize;
                if let Some(z) = depth
                    && z > self.depth[idx]
                {
                    continue;
                }

                let src = if nearest {
                    sample_nearest(bitmap, p)
                } else {
                    sample_bilinear(bitmap, p)
                };
                k = mul_div255_u8(u16::from(k), u16::from(opacity));
                for (brush, inv) in &masks {
                    let m = brush.sample(*inv * center).a;
                    k = mul_div255_u8(u16::from(k), u16::from(m));
                }

                let i = idx * 4;
                let dst = [data[i], data[i + 1], data[i + 2], data[i + 3]];
                data[i..i + 4].copy_from_slice(&over_coverage(dst, src, k));
                if let Some(z) = depth
                    && k >= 128
                {
                    self.depth[idx] = z;
                }
            }
        }
        Ok(())
    }

    fn compose_effect(
        &mut self,
        _state: &DrawState,
        scale: f64,
        effect: &Effect,
        width: u32,
        height: u32,
        input: &Bitmap,
    ) -> StrataResult<Bitmap> {
        match self.opts.caps.effects {
            EffectSupport::Direct => {}
            EffectSupport::SoftwareOnly => {
                return Err(StrataError::unsupported(
                    "effects need a software fallback surface",
                ));
            }
            EffectSupport::Unsupported => {
                return Err(StrataError::unsupported("effects are not supported"));
            }
        }
        if input.width() != width || input.height() != height {
            return Err(StrataError::geometry(format!(
                "effect input is {}x{}, expected {width}x{height}",
                input.width(),
                input.height()
            )));
        }
        let out = effect.apply(input.data(), width, height, scale)?;
        Bitmap::from_premul_rgba8(&out, width, height)
    }

    fn release_bitmap(&mut self, bitmap: Bitmap) {
        if let Ok(pixmap) = bitmap.try_into_pixmap() {
            self.pool.release(pixmap);
        }
    }

    fn begin_3d(&mut self, _viewport: Rect) -> StrataResult<()> {
        if self.in_3d {
            return Err(StrataError::protocol("begin_3d while a 3D scene is open"));
        }
        let n = self.width() as usize * self.height() as usize;
        self.depth.clear();
        self.depth.resize(n, f32::INFINITY);
        self.in_3d = true;
        Ok(())
    }

    fn end_3d(&mut self) -> StrataResult<()> {
        if !self.in_3d {
            return Err(StrataError::protocol("end_3d without begin_3d"));
        }
        self.in_3d = false;
        Ok(())
    }

    fn begin_frame(&mut self) -> StrataResult<()> {
        if self.in_frame {
            return Err(StrataError::protocol("begin_frame inside a frame"));
        }
        self.in_frame = true;
        Ok(())
    }

    fn end_frame(&mut self) -> StrataResult<()> {
        if !self.in_frame {
            return Err(StrataError::protocol("end_frame without begin_frame"));
        }
        self.in_frame = false;
        self.in_3d = false;
        if !self.layers.is_empty() {
            let open = self.layers.len();
            self.discard_layers();
            return Err(StrataError::protocol(format!(
                "frame ended with {open} open layer(s)"
            )));
        }
        Ok(())
    }
}

impl SurfaceTarget for CpuTarget {
    fn into_bitmap(self: Box<Self>) -> StrataResult<Bitmap> {
        let mut this = *self;
        if !this.layers.is_empty() {
            this.discard_layers();
            return Err(StrataError::protocol("surface finished with open layers"));
        }
        Ok(Bitmap::from_pixmap(this.pixmap))
    }
}

fn render_coverage(
    slot: &mut Option<vello_cpu::RenderContext>,
    dst: &mut vello_cpu::Pixmap,
    path: &BezPath,
    transform: Affine,
) {
    let (w, h) = (dst.width(), dst.height());
    let mut ctx = match slot.take() {
        Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
        _ => vello_cpu::RenderContext::new(w, h),
    };
    ctx.reset();
    ctx.set_transform(affine_to_cpu(transform));
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
    ctx.fill_path(&bezpath_to_cpu(path));
    ctx.flush();
    ctx.render_to_pixmap(dst);
    *slot = Some(ctx);
}

fn sample_nearest(bitmap: &Bitmap, p: Point) -> [u8; 4] {
    let x = (p.x.floor().max(0.0) as u32).min(bitmap.width() - 1);
    let y = (p.y.floor().max(0.0) as u32).min(bitmap.height() - 1);
    bitmap.pixel(x, y).unwrap_or([0; 4])
}

fn sample_bilinear(bitmap: &Bitmap, p: Point) -> [u8; 4] {
    let (w, h) = (i64::from(bitmap.width()), i64::from(bitmap.height()));
    let fx = p.x - 0.5;
    let fy = p.y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let at = |x: i64, y: i64| {
        let x = x.clamp(0, w - 1) as u32;
        let y = y.clamp(0, h - 1) as u32;
        bitmap.pixel(x, y).unwrap_or([0; 4])
    };
    let (x0, y0) = (x0 as i64, y0 as i64);
    let (a, b, c, d) = (at(x0, y0), at(x0 + 1, y0), at(x0, y0 + 1), at(x0 + 1, y0 + 1));
    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = f64::from(a[i]) * (1.0 - tx) + f64::from(b[i]) * tx;
        let bottom = f64::from(c[i]) * (1.0 - tx) + f64::from(d[i]) * tx;
        out[i] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;
    use vello_cpu::kurbo::Point as P;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => out.move_to(P::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(P::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(P::new(p1.x, p1.y), P::new(p2.x, p2.y)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(P::new(p1.x, p1.y), P::new(p2.x, p2.y), P::new(p3.x, p3.y))
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
