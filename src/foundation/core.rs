pub use kurbo::{Affine, BezPath, Point, Rect, Shape, Size, Stroke, Vec2};

/// Rectangle covering the whole plane; the identity for clip intersection.
pub const INFINITE_RECT: Rect = Rect::new(
    f64::NEG_INFINITY,
    f64::NEG_INFINITY,
    f64::INFINITY,
    f64::INFINITY,
);

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    /// Construct a straight-alpha color.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Construct an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Convert into premultiplied form.
    pub fn premultiply(self) -> Rgba8Premul {
        Rgba8Premul::from_straight_rgba(self.r, self.g, self.b, self.a)
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Channels as a `[r, g, b, a]` array.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// `true` when `x0 <= x1` and `y0 <= y1`. NaN coordinates are never well-ordered.
pub fn is_well_ordered(r: Rect) -> bool {
    r.x0 <= r.x1 && r.y0 <= r.y1
}

/// `true` when all four coordinates are finite.
pub fn is_finite_rect(r: Rect) -> bool {
    r.x0.is_finite() && r.x1.is_finite() && r.y0.is_finite() && r.y1.is_finite()
}

/// `true` when no coordinate is NaN (infinite extents are allowed).
pub fn is_number_rect(r: Rect) -> bool {
    !(r.x0.is_nan() || r.x1.is_nan() || r.y0.is_nan() || r.y1.is_nan())
}

/// `true` when the rect covers no area (including inverted rects).
pub fn is_empty_rect(r: Rect) -> bool {
    !(r.x0 < r.x1 && r.y0 < r.y1)
}

/// Area of a well-ordered rect, `0` for empty rects.
pub fn rect_area(r: Rect) -> f64 {
    if is_empty_rect(r) {
        return 0.0;
    }
    (r.x1 - r.x0) * (r.y1 - r.y0)
}

/// Intersection that yields [`Rect::ZERO`] instead of an inverted rect.
pub fn intersect_or_empty(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if is_empty_rect(r) { Rect::ZERO } else { r }
}

/// `true` when `outer` fully contains `inner`.
pub fn rect_contains(outer: Rect, inner: Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && outer.x1 >= inner.x1 && outer.y1 >= inner.y1
}

/// Bounding box of `r` under `t`. Infinite inputs stay infinite instead of producing NaN.
pub fn transform_rect_bbox(t: Affine, r: Rect) -> Rect {
    if r == INFINITE_RECT {
        return INFINITE_RECT;
    }
    t.transform_rect_bbox(r)
}

/// `true` when `t` maps axis-aligned rects onto axis-aligned rects.
pub fn is_axis_aligned(t: Affine) -> bool {
    let [a, b, c, d, _, _] = t.as_coeffs();
    (b == 0.0 && c == 0.0) || (a == 0.0 && d == 0.0)
}

/// `true` when `t` is finite and invertible.
pub fn is_invertible(t: Affine) -> bool {
    let det = t.determinant();
    det.is_finite() && det != 0.0 && t.as_coeffs().iter().all(|c| c.is_finite())
}

/// Integer device-pixel rectangle, half-open `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    /// Left edge (inclusive).
    pub x0: i32,
    /// Top edge (inclusive).
    pub y0: i32,
    /// Right edge (exclusive).
    pub x1: i32,
    /// Bottom edge (exclusive).
    pub y1: i32,
}

impl PixelRect {
    /// Smallest pixel rect covering `r`. Non-finite rects collapse to empty.
    pub fn round_out(r: Rect) -> Self {
        if !is_finite_rect(r) || is_empty_rect(r) {
            return Self::default();
        }
        let clamp = |v: f64| v.clamp(f64::from(i32::MIN / 2), f64::from(i32::MAX / 2)) as i32;
        Self {
            x0: clamp(r.x0.floor()),
            y0: clamp(r.y0.floor()),
            x1: clamp(r.x1.ceil()),
            y1: clamp(r.y1.ceil()),
        }
    }

    /// Pixel rect of a `width x height` surface.
    pub fn of_size(width: u32, height: u32) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: width.min(i32::MAX as u32) as i32,
            y1: height.min(i32::MAX as u32) as i32,
        }
    }

    /// `true` when the rect covers no pixels.
    pub fn is_empty(self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Width in pixels (0 when empty).
    pub fn width(self) -> u32 {
        if self.is_empty() {
            0
        } else {
            (self.x1 - self.x0) as u32
        }
    }

    /// Height in pixels (0 when empty).
    pub fn height(self) -> u32 {
        if self.is_empty() {
            0
        } else {
            (self.y1 - self.y0) as u32
        }
    }

    /// Intersection of two pixel rects.
    pub fn intersect(self, other: Self) -> Self {
        let r = Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if r.is_empty() { Self::default() } else { r }
    }

    /// Float rect with the same extents.
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
