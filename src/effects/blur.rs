use crate::foundation::error::{StrataError, StrataResult};

/// Separable Gaussian kernel with Q16 fixed-point weights summing to exactly `1 << 16`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GaussianKernel {
    weights: Vec<u32>,
}

impl GaussianKernel {
    /// Kernel spanning `2 * radius + 1` taps. `sigma` defaults to `radius / 2` when `None`.
    pub(crate) fn new(radius: u32, sigma: Option<f32>) -> StrataResult<Self> {
        if radius == 0 {
            return Ok(Self {
                weights: vec![1 << 16],
            });
        }
        let sigma = f64::from(sigma.unwrap_or(radius as f32 / 2.0));
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(StrataError::geometry("blur sigma must be finite and > 0"));
        }

        let r = radius as i64;
        let denom = 2.0 * sigma * sigma;
        let raw: Vec<f64> = (-r..=r)
            .map(|i| {
                let x = i as f64;
                (-x * x / denom).exp()
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        if sum <= 0.0 {
            return Err(StrataError::geometry("gaussian kernel sum is zero"));
        }

        let mut weights: Vec<u32> = raw
            .iter()
            .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
            .collect();
        let total: i64 = weights.iter().map(|&w| i64::from(w)).sum();
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + (65536 - total)).clamp(0, 65536) as u32;
        Ok(Self { weights })
    }

    pub(crate) fn radius(&self) -> usize {
        self.weights.len() / 2
    }

    pub(crate) fn weights(&self) -> &[u32] {
        &self.weights
    }
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Blur a premultiplied RGBA8 buffer. Pixels outside the buffer count as transparent, so content
/// near the edges fades out instead of smearing.
pub(crate) fn blur_premul(
    src: &[u8],
    width: u32,
    height: u32,
    kernel: &GaussianKernel,
) -> StrataResult<Vec<u8>> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| StrataError::allocation("blur buffer size overflow"))?;
    if src.len() != len {
        return Err(StrataError::geometry(format!(
            "blur expects {len} bytes for {width}x{height}, got {}",
            src.len()
        )));
    }
    if kernel.radius() == 0 {
        return Ok(src.to_vec());
    }

    let mut tmp = vec![0u8; len];
    let mut out = vec![0u8; len];
    convolve(src, &mut tmp, width, height, kernel.weights(), Axis::X);
    convolve(&tmp, &mut out, width, height, kernel.weights(), Axis::Y);
    Ok(out)
}

fn convolve(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as i64;
    let (w, h) = (i64::from(width), i64::from(height));
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i64 - radius;
                let (sx, sy) = match axis {
                    Axis::X => (x + d, y),
                    Axis::Y => (x, y + d),
                };
                if sx < 0 || sy < 0 || sx >= w || sy >= h {
                    continue;
                }
                let idx = ((sy * w + sx) as usize) * 4;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for (c, a) in acc.iter().enumerate() {
                dst[out + c] = (((a + 32768) >> 16).min(255)) as u8;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/blur.rs"]
mod tests;
