use crate::foundation::core::{Color, Rect};
use crate::foundation::error::{StrataError, StrataResult};
use std::fmt;
use std::sync::Arc;

/// Reference-counted premultiplied RGBA8 pixels.
///
/// Cloning is cheap; the pixels are shared. A bitmap handed back to its target with
/// [`crate::RenderTarget::release_bitmap`] is recycled only when no clone is alive.
#[derive(Clone)]
pub struct Bitmap {
    pixmap: Arc<vello_cpu::Pixmap>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("refs", &Arc::strong_count(&self.pixmap))
            .finish()
    }
}

impl Bitmap {
    /// Transparent bitmap.
    pub fn new(width: u32, height: u32) -> StrataResult<Self> {
        let (w, h) = checked_dims(width, height)?;
        Ok(Self::from_pixmap(vello_cpu::Pixmap::new(w, h)))
    }

    /// Bitmap filled with `color`.
    pub fn solid(width: u32, height: u32, color: Color) -> StrataResult<Self> {
        let px = color.premultiply().to_array();
        let bytes = px.repeat((width as usize).saturating_mul(height as usize));
        Self::from_premul_rgba8(&bytes, width, height)
    }

    /// Bitmap from premultiplied RGBA8 bytes.
    pub fn from_premul_rgba8(bytes: &[u8], width: u32, height: u32) -> StrataResult<Self> {
        Ok(Self::from_pixmap(pixmap_from_premul(bytes, width, height)?))
    }

    /// Bitmap from straight-alpha RGBA8 bytes.
    pub fn from_straight_rgba8(bytes: &[u8], width: u32, height: u32) -> StrataResult<Self> {
        let mut tmp = bytes.to_vec();
        for px in tmp.chunks_exact_mut(4) {
            let p = Color::rgba(px[0], px[1], px[2], px[3]).premultiply();
            px.copy_from_slice(&p.to_array());
        }
        Self::from_premul_rgba8(&tmp, width, height)
    }

    pub(crate) fn from_pixmap(pixmap: vello_cpu::Pixmap) -> Self {
        Self {
            pixmap: Arc::new(pixmap),
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

    /// `(0, 0, width, height)`.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width()), f64::from(self.height()))
    }

    /// Premultiplied RGBA8 bytes, row-major.
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

    /// `true` when both handles share the same pixels.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixmap, &other.pixmap)
    }

    /// Take the pixels back if this is the last handle.
    pub(crate) fn try_into_pixmap(self) -> Result<vello_cpu::Pixmap, Self> {
        Arc::try_unwrap(self.pixmap).map_err(|pixmap| Self { pixmap })
    }
}

pub(crate) fn checked_dims(width: u32, height: u32) -> StrataResult<(u16, u16)> {
    let w: u16 = width
        .try_into()
        .map_err(|_| StrataError::allocation(format!("bitmap width {width} exceeds u16")))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| StrataError::allocation(format!("bitmap height {height} exceeds u16")))?;
    if w == 0 || h == 0 {
        return Err(StrataError::allocation(format!(
            "bitmap size {width}x{height} is empty"
        )));
    }
    Ok((w, h))
}

pub(crate) fn pixmap_from_premul(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> StrataResult<vello_cpu::Pixmap> {
    let (w, h) = checked_dims(width, height)?;
    let expected = (width as usize) * (height as usize) * 4;
    if bytes.len() != expected {
        return Err(StrataError::geometry(format!(
            "expected {expected} bytes for {width}x{height}, got {}",
            bytes.len()
        )));
    }
    let pixels: Vec<_> = bytes
        .chunks_exact(4)
        .map(|px| {
            vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]])
        })
        .collect();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/bitmap.rs"]
mod tests;
