use crate::foundation::math::{mul_div255_u8, scale_px};

/// Premultiplied RGBA8 pixel.
pub(crate) type PremulPx = [u8; 4];

/// Source-over of premultiplied pixels.
pub(crate) fn over(dst: PremulPx, src: PremulPx) -> PremulPx {
    let sa = u16::from(src[3]);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }
    let inv = 255 - sa;
    [
        src[0].saturating_add(mul_div255_u8(u16::from(dst[0]), inv)),
        src[1].saturating_add(mul_div255_u8(u16::from(dst[1]), inv)),
        src[2].saturating_add(mul_div255_u8(u16::from(dst[2]), inv)),
        src[3].saturating_add(mul_div255_u8(u16::from(dst[3]), inv)),
    ]
}

/// Source-over after scaling `src` by `coverage / 255`.
pub(crate) fn over_coverage(dst: PremulPx, src: PremulPx, coverage: u8) -> PremulPx {
    if coverage == 0 {
        return dst;
    }
    over(dst, scale_px(src, coverage))
}

/// Blend `src` over the `[x0, x1) x [y0, y1)` window of `dst`, both `width` pixels wide, with a
/// per-pixel coverage laid out row-major over the window.
#[allow(clippy::too_many_arguments)]
pub(crate) fn over_window(
    dst: &mut [u8],
    src: &[u8],
    width: usize,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
    coverage: Option<&[u8]>,
    opacity: u8,
) {
    let ww = x1.saturating_sub(x0);
    for y in y0..y1 {
        for x in x0..x1 {
            let mut k = opacity;
            if let Some(cov) = coverage {
                k = mul_div255_u8(u16::from(k), u16::from(cov[(y - y0) * ww + (x - x0)]));
            }
            if k == 0 {
                continue;
            }
            let i = (y * width + x) * 4;
            let s = [src[i], src[i + 1], src[i + 2], src[i + 3]];
            let d = [dst[i], dst[i + 1], dst[i + 2], dst[i + 3]];
            dst[i..i + 4].copy_from_slice(&over_coverage(d, s, k));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
