use crate::foundation::core::{
    Rect, intersect_or_empty, is_empty_rect, is_well_ordered, rect_area, rect_contains,
};

/// Default number of merged-region slots.
pub const DEFAULT_REGION_SLOTS: usize = 8;

/// Merges a stream of invalidated rectangles into at most `N` rectangles covering their union.
///
/// Merging is greedy: a new rectangle joins the first tracked region whose merge overhead is below
/// the threshold, otherwise it takes a free slot. When every slot is taken, the cheapest pairing
/// overall is merged, so eviction never drops area. Overhead is the area a merge adds beyond the
/// union of its inputs:
///
/// `area(bbox(a, b)) - (area(a) + area(b) - area(a ∩ b))`
///
/// A rectangle that is not well-ordered (inverted or NaN) cannot be intersected safely; it
/// switches the aggregator into a fail-safe where the whole surface is reported dirty until
/// [`RegionAggregator::reset`].
#[derive(Debug, Clone)]
pub struct RegionAggregator<const N: usize = DEFAULT_REGION_SLOTS> {
    surface: Rect,
    threshold: f64,
    slots: [Option<Rect>; N],
    overhead: [[f64; N]; N],
    fail_safe: bool,
    disable_depth: u32,
    coalesced: bool,
    output: Vec<Rect>,
}

impl<const N: usize> RegionAggregator<N> {
    /// Create an aggregator for a surface. `threshold` is the merge overhead (in square device
    /// pixels) below which two regions are considered cheap enough to merge.
    pub fn new(surface: Rect, threshold: f64) -> Self {
        const { assert!(N >= 2, "region aggregator needs at least two slots") };
        Self {
            surface,
            threshold: if threshold.is_finite() {
                threshold.max(0.0)
            } else {
                0.0
            },
            slots: [None; N],
            overhead: [[0.0; N]; N],
            fail_safe: false,
            disable_depth: 0,
            coalesced: true,
            output: Vec::new(),
        }
    }

    /// Surface bounds every added rectangle is clipped to.
    pub fn surface_bounds(&self) -> Rect {
        self.surface
    }

    /// Merge threshold in square device pixels.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `true` after a not-well-ordered rectangle forced whole-surface invalidation.
    pub fn is_fail_safe(&self) -> bool {
        self.fail_safe
    }

    /// `true` while at least one [`RegionAggregator::disable`] is outstanding.
    pub fn is_disabled(&self) -> bool {
        self.disable_depth > 0
    }

    /// `true` when nothing has been invalidated since the last reset.
    pub fn is_empty(&self) -> bool {
        !self.fail_safe && self.slots.iter().all(Option::is_none)
    }

    /// Suppress [`RegionAggregator::add`]. Calls nest.
    pub fn disable(&mut self) {
        self.disable_depth = self.disable_depth.saturating_add(1);
    }

    /// Undo one [`RegionAggregator::disable`].
    pub fn enable(&mut self) {
        debug_assert!(self.disable_depth > 0, "enable without matching disable");
        self.disable_depth = self.disable_depth.saturating_sub(1);
    }

    /// Drop all tracked regions and leave the fail-safe. The disable depth is kept.
    pub fn reset(&mut self) {
        self.slots = [None; N];
        self.overhead = [[0.0; N]; N];
        self.fail_safe = false;
        self.coalesced = true;
        self.output.clear();
    }

    /// Replace the surface bounds. Tracked regions are discarded.
    pub fn set_surface_bounds(&mut self, surface: Rect) {
        self.surface = surface;
        self.reset();
    }

    /// Record `rect` as changed.
    pub fn add(&mut self, rect: Rect) {
        if self.disable_depth > 0 || self.fail_safe {
            return;
        }
        if !is_well_ordered(rect) {
            tracing::warn!(?rect, "not well-ordered dirty rect; invalidating whole surface");
            self.reset();
            self.fail_safe = true;
            self.coalesced = false;
            return;
        }

        let rect = intersect_or_empty(rect, self.surface);
        if is_empty_rect(rect) {
            return;
        }

        if self.slots.iter().flatten().any(|&r| rect_contains(r, rect)) {
            return;
        }

        let mut free = None;
        for i in 0..N {
            let Some(existing) = self.slots[i] else {
                if free.is_none() {
                    free = Some(i);
                }
                continue;
            };
            if merge_overhead(existing, rect) < self.threshold {
                self.set_slot(i, Some(existing.union(rect)));
                return;
            }
        }

        if let Some(i) = free {
            self.set_slot(i, Some(rect));
            return;
        }

        self.evict_and_insert(rect);
    }

    /// Merged dirty regions after a final coalescing pass.
    ///
    /// Returns exactly the surface bounds when the fail-safe is active. Calling this twice without
    /// an intervening mutation returns the same rectangles.
    pub fn uninflated_dirty_regions(&mut self) -> &[Rect] {
        if !self.coalesced {
            self.output.clear();
            if self.fail_safe {
                self.output.push(self.surface);
            } else {
                self.coalesce();
                self.output.extend(self.slots.iter().flatten().copied());
            }
            self.coalesced = true;
        }
        &self.output
    }

    /// Number of regions [`RegionAggregator::uninflated_dirty_regions`] returns.
    pub fn dirty_region_count(&mut self) -> usize {
        self.uninflated_dirty_regions().len()
    }

    fn evict_and_insert(&mut self, rect: Rect) {
        // (cost, a, b) where b == N stands for the incoming rect.
        let mut best: Option<(f64, usize, usize)> = None;
        for i in 0..N {
            let Some(existing) = self.slots[i] else {
                continue;
            };
            let cost = merge_overhead(existing, rect);
            if best.is_none_or(|(c, _, _)| cost < c) {
                best = Some((cost, i, N));
            }
            for j in (i + 1)..N {
                if self.slots[j].is_none() {
                    continue;
                }
                let cost = self.overhead[i][j];
                if best.is_none_or(|(c, _, _)| cost < c) {
                    best = Some((cost, i, j));
                }
            }
        }

        let Some((_, a, b)) = best else {
            self.set_slot(0, Some(rect));
            return;
        };
        let Some(ra) = self.slots[a] else {
            return;
        };
        if b == N {
            self.set_slot(a, Some(ra.union(rect)));
        } else if let Some(rb) = self.slots[b] {
            self.set_slot(a, Some(ra.union(rb)));
            self.set_slot(b, Some(rect));
        }
    }

    fn coalesce(&mut self) {
        loop {
            let mut best: Option<(f64, usize, usize)> = None;
            for i in 0..N {
                if self.slots[i].is_none() {
                    continue;
                }
                for j in (i + 1)..N {
                    if self.slots[j].is_none() {
                        continue;
                    }
                    let cost = self.overhead[i][j];
                    if cost < self.threshold && best.is_none_or(|(c, _, _)| cost < c) {
                        best = Some((cost, i, j));
                    }
                }
            }
            let Some((_, i, j)) = best else {
                return;
            };
            if let (Some(a), Some(b)) = (self.slots[i], self.slots[j]) {
                self.set_slot(i, Some(a.union(b)));
                self.set_slot(j, None);
            }
        }
    }

    fn set_slot(&mut self, i: usize, rect: Option<Rect>) {
        self.slots[i] = rect;
        self.coalesced = false;
        for j in 0..N {
            let cost = match (rect, self.slots[j]) {
                (Some(a), Some(b)) if i != j => merge_overhead(a, b),
                _ => 0.0,
            };
            self.overhead[i][j] = cost;
            self.overhead[j][i] = cost;
        }
    }
}

/// Extra area introduced by replacing `a` and `b` with their bounding box. Never negative.
pub fn merge_overhead(a: Rect, b: Rect) -> f64 {
    let covered = rect_area(a) + rect_area(b) - rect_area(intersect_or_empty(a, b));
    (rect_area(a.union(b)) - covered).max(0.0)
}

#[cfg(test)]
#[path = "../../tests/unit/region/aggregator.rs"]
mod tests;
