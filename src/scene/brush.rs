use crate::foundation::core::{Color, Point, Rgba8Premul, Vec2};
use smallvec::SmallVec;

/// One color stop of a gradient.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GradientStop {
    /// Position along the gradient axis, `0..=1`.
    pub offset: f32,
    /// Color at `offset`.
    pub color: Color,
}

/// Paint source for fills, strokes and opacity masks.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Brush {
    /// Uniform color.
    Solid {
        /// The color.
        color: Color,
    },
    /// Linear gradient between two points, padded beyond the ends.
    LinearGradient {
        /// Point where `offset == 0`.
        start: Point,
        /// Point where `offset == 1`.
        end: Point,
        /// Stops sorted by offset.
        stops: SmallVec<[GradientStop; 4]>,
    },
}

impl Brush {
    /// Solid color brush.
    pub fn solid(color: Color) -> Self {
        Self::Solid { color }
    }

    /// Linear gradient from `start` to `end`. Stops are sorted by offset.
    pub fn linear(start: Point, end: Point, stops: impl IntoIterator<Item = GradientStop>) -> Self {
        let mut stops: SmallVec<[GradientStop; 4]> = stops.into_iter().collect();
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self::LinearGradient { start, end, stops }
    }

    /// `true` when every sample is fully opaque.
    pub fn is_opaque(&self) -> bool {
        match self {
            Self::Solid { color } => color.a == 255,
            Self::LinearGradient { stops, .. } => {
                !stops.is_empty() && stops.iter().all(|s| s.color.a == 255)
            }
        }
    }

    /// Color of the solid brush, `None` for gradients.
    pub fn as_solid(&self) -> Option<Color> {
        match self {
            Self::Solid { color } => Some(*color),
            Self::LinearGradient { .. } => None,
        }
    }

    /// Premultiplied sample at `p` in brush space.
    pub fn sample(&self, p: Point) -> Rgba8Premul {
        match self {
            Self::Solid { color } => color.premultiply(),
            Self::LinearGradient { start, end, stops } => {
                let axis: Vec2 = *end - *start;
                let len2 = axis.hypot2();
                let t = if len2 > 0.0 && len2.is_finite() {
                    ((p - *start).dot(axis) / len2).clamp(0.0, 1.0) as f32
                } else {
                    0.0
                };
                sample_stops(stops, t).premultiply()
            }
        }
    }
}

fn sample_stops(stops: &[GradientStop], t: f32) -> Color {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Color::TRANSPARENT;
    };
    if t <= first.offset {
        return first.color;
    }
    if t >= last.offset {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let u = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
            let lerp = |x: u8, y: u8| {
                (f32::from(x) + (f32::from(y) - f32::from(x)) * u)
                    .round()
                    .clamp(0.0, 255.0) as u8
            };
            return Color::rgba(
                lerp(a.color.r, b.color.r),
                lerp(a.color.g, b.color.g),
                lerp(a.color.b, b.color.b),
                lerp(a.color.a, b.color.a),
            );
        }
    }
    last.color
}

#[cfg(test)]
#[path = "../../tests/unit/scene/brush.rs"]
mod tests;
