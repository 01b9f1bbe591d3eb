use crate::foundation::math::unit_to_u8;

/// Identity 4x5 color matrix (row-major, straight alpha, last column is the offset).
pub const IDENTITY_COLOR_MATRIX: [f32; 20] = [
    1.0, 0.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, 0.0,
];

/// Apply `m` to one premultiplied pixel. The matrix operates on straight (unpremultiplied) color.
pub(crate) fn apply_px(px: [u8; 4], m: &[f32; 20]) -> [u8; 4] {
    let a = f32::from(px[3]) / 255.0;
    let unpremul = |c: u8| {
        if a > 0.0 {
            (f32::from(c) / 255.0 / a).min(1.0)
        } else {
            0.0
        }
    };
    let v = [unpremul(px[0]), unpremul(px[1]), unpremul(px[2]), a];

    let row = |r: usize| {
        let o = r * 5;
        (m[o] * v[0] + m[o + 1] * v[1] + m[o + 2] * v[2] + m[o + 3] * v[3] + m[o + 4])
            .clamp(0.0, 1.0)
    };
    let out_a = row(3);
    [
        unit_to_u8(row(0) * out_a),
        unit_to_u8(row(1) * out_a),
        unit_to_u8(row(2) * out_a),
        unit_to_u8(out_a),
    ]
}

/// Apply `m` to a premultiplied RGBA8 buffer in place.
pub(crate) fn apply_in_place(buf: &mut [u8], m: &[f32; 20]) {
    if *m == IDENTITY_COLOR_MATRIX {
        return;
    }
    for px in buf.chunks_exact_mut(4) {
        let out = apply_px([px[0], px[1], px[2], px[3]], m);
        px.copy_from_slice(&out);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/color_matrix.rs"]
mod tests;
