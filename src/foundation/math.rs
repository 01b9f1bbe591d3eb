pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Quantize a unit float to `0..=255`, clamping out-of-range and NaN to the nearest end.
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    ((v.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u8
}

/// Scale every channel of a premultiplied pixel by `k / 255`.
pub(crate) fn scale_px(px: [u8; 4], k: u8) -> [u8; 4] {
    if k == 255 {
        return px;
    }
    let k = u16::from(k);
    [
        mul_div255_u8(u16::from(px[0]), k),
        mul_div255_u8(u16::from(px[1]), k),
        mul_div255_u8(u16::from(px[2]), k),
        mul_div255_u8(u16::from(px[3]), k),
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
