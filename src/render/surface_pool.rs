use crate::foundation::error::StrataResult;
use crate::render::bitmap::checked_dims;
use std::collections::HashMap;

/// Limits of a [`SurfacePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePoolOpts {
    /// Maximum bytes retained across all sizes.
    pub max_pool_bytes: usize,
    /// Maximum retained pixmaps per size.
    pub max_surfaces_per_size: usize,
}

impl Default for SurfacePoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 64 * 1024 * 1024,
            max_surfaces_per_size: 4,
        }
    }
}

/// Counters of a [`SurfacePool`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePoolStats {
    /// Pixmaps currently retained.
    pub retained_surfaces: usize,
    /// Bytes currently retained.
    pub retained_bytes: usize,
    /// Fresh allocations.
    pub allocations: u64,
    /// Borrows served from the pool.
    pub reuses: u64,
    /// Releases dropped because a limit was reached.
    pub dropped_on_release: u64,
}

fn byte_len(w: u16, h: u16) -> usize {
    usize::from(w) * usize::from(h) * 4
}

/// Bounded recycler of scratch and intermediate pixmaps, keyed by size.
#[derive(Default)]
pub(crate) struct SurfacePool {
    opts: SurfacePoolOpts,
    stats: SurfacePoolStats,
    by_size: HashMap<(u16, u16), Vec<vello_cpu::Pixmap>>,
}

impl SurfacePool {
    pub(crate) fn new(opts: SurfacePoolOpts) -> Self {
        Self {
            opts,
            stats: SurfacePoolStats::default(),
            by_size: HashMap::new(),
        }
    }

    pub(crate) fn stats(&self) -> SurfacePoolStats {
        self.stats
    }

    /// Borrow a `width x height` pixmap. Recycled pixmaps keep their old contents unless `clear`.
    pub(crate) fn borrow(
        &mut self,
        width: u32,
        height: u32,
        clear: bool,
    ) -> StrataResult<vello_cpu::Pixmap> {
        let (w, h) = checked_dims(width, height)?;
        if let Some(mut p) = self.by_size.get_mut(&(w, h)).and_then(Vec::pop) {
            self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(byte_len(w, h));
            self.stats.reuses = self.stats.reuses.saturating_add(1);
            if clear {
                p.data_as_u8_slice_mut().fill(0);
            }
            return Ok(p);
        }
        self.stats.allocations = self.stats.allocations.saturating_add(1);
        Ok(vello_cpu::Pixmap::new(w, h))
    }

    pub(crate) fn release(&mut self, pixmap: vello_cpu::Pixmap) {
        let key = (pixmap.width(), pixmap.height());
        let bytes = byte_len(key.0, key.1);
        let bucket = self.by_size.entry(key).or_default();
        if bucket.len() >= self.opts.max_surfaces_per_size
            || self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }
        bucket.push(pixmap);
        self.stats.retained_surfaces += 1;
        self.stats.retained_bytes += bytes;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface_pool.rs"]
mod tests;
