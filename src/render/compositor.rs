use crate::config::CompositorConfig;
use crate::foundation::core::{Color, PixelRect, Rect, Shape, is_empty_rect};
use crate::foundation::error::{StrataError, StrataResult};
use crate::region::aggregator::RegionAggregator;
use crate::render::cache::{BitmapCache, CacheRefreshStats};
use crate::render::target::{DrawState, RenderTarget};
use crate::render::walker::{RenderStats, RenderWalker};
use crate::scene::brush::Brush;
use crate::scene::node::Pen;
use crate::scene::precompute::{PreCompute, PreComputeStats};
use crate::scene::tree::{NodeId, VisualTree};

/// Result of one [`Compositor::render`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderOutcome {
    /// The whole surface changed; present it entirely instead of the dirty regions.
    pub full_present_needed: bool,
    /// Re-rendered regions in target pixels.
    pub regions: Vec<Rect>,
    /// Render walker counters, summed over regions.
    pub stats: RenderStats,
    /// Pre-compute counters.
    pub precompute: PreComputeStats,
    /// Cache refresh counters.
    pub cache: CacheRefreshStats,
}

/// Drives composition passes of one visual tree onto one target.
///
/// Each pass refreshes bounds, collects dirty regions, refreshes node caches and redraws only the
/// dirty regions. After a failed pass the next one redraws everything.
#[derive(Debug)]
pub struct Compositor {
    config: CompositorConfig,
    aggregator: RegionAggregator,
    precompute: PreCompute,
    cache: BitmapCache,
    surface: Option<PixelRect>,
    force_full: bool,
}

impl Compositor {
    /// Compositor with a validated `config`.
    pub fn new(config: CompositorConfig) -> StrataResult<Self> {
        config.validate()?;
        Ok(Self {
            aggregator: RegionAggregator::new(Rect::ZERO, config.merge_threshold),
            precompute: PreCompute::new(config.traversal_direction),
            cache: BitmapCache::new(),
            surface: None,
            force_full: true,
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Node caches.
    pub fn cache(&self) -> &BitmapCache {
        &self.cache
    }

    /// Mutable access to node caches.
    pub fn cache_mut(&mut self) -> &mut BitmapCache {
        &mut self.cache
    }

    /// Run one pass. `invalid_regions` (target pixels) are redrawn in addition to what changed in
    /// the tree; `full_render` redraws everything. `begin_frame` and `end_frame` are balanced even
    /// when the pass fails.
    #[tracing::instrument(skip_all, fields(full_render = full_render, invalid = invalid_regions.len()))]
    pub fn render(
        &mut self,
        tree: &mut VisualTree,
        root: NodeId,
        target: &mut dyn RenderTarget,
        clear: Option<Color>,
        full_render: bool,
        invalid_regions: &[Rect],
    ) -> StrataResult<RenderOutcome> {
        if let Err(e) = target.begin_frame() {
            self.force_full = true;
            return Err(e);
        }
        let result = self.render_frame(tree, root, target, clear, full_render, invalid_regions);
        let ended = target.end_frame();

        let result = match (result, ended) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(end)) => {
                tracing::warn!(error = %end, "end_frame failed after a failed pass");
                Err(e)
            }
        };
        if result.is_err() {
            self.force_full = true;
        }
        result
    }

    fn render_frame(
        &mut self,
        tree: &mut VisualTree,
        root: NodeId,
        target: &mut dyn RenderTarget,
        clear: Option<Color>,
        full_render: bool,
        invalid_regions: &[Rect],
    ) -> StrataResult<RenderOutcome> {
        let surface = target.bounds();
        if surface.is_empty() {
            return Err(StrataError::geometry("target has no pixels"));
        }
        let surface_rect = surface.to_rect();
        if self.surface != Some(surface) {
            self.aggregator.set_surface_bounds(surface_rect);
            self.surface = Some(surface);
            self.force_full = true;
        }
        let full = full_render || self.force_full;

        self.aggregator.reset();
        for r in invalid_regions {
            self.aggregator.add(*r);
        }
        if full {
            self.aggregator.disable();
        }
        let precompute =
            self.precompute
                .run(tree, root, &mut self.aggregator, Some(&mut self.cache));
        if full {
            self.aggregator.enable();
        }

        let regions: Vec<Rect> = if full {
            vec![surface_rect]
        } else {
            self.aggregator
                .uninflated_dirty_regions()
                .iter()
                .map(|r| PixelRect::round_out(*r).intersect(surface).to_rect())
                .filter(|r| !is_empty_rect(*r))
                .collect()
        };
        let full_present_needed = full || (regions.len() == 1 && regions[0] == surface_rect);
        tracing::debug!(regions = regions.len(), full_present_needed, "dirty regions");

        let tree = &*tree;
        let cache = self.cache.refresh(tree, root, &self.config)?;

        let stats = {
            let mut walker = RenderWalker::new(&mut *target, &self.config).with_cache(&self.cache);
            for region in &regions {
                walker.draw_visual_tree(tree, root, clear, Some(*region))?;
            }
            walker.stats()
        };

        if self.config.debug.show_dirty_regions {
            let pen = Pen::new(Brush::solid(self.config.debug.dirty_region_color), 1.0);
            for region in &regions {
                let outline =
                    Rect::new(region.x0 + 0.5, region.y0 + 0.5, region.x1 - 0.5, region.y1 - 0.5)
                        .to_path(0.1);
                target.draw_path(&DrawState::default(), &outline, Some(&pen), None)?;
            }
        }

        self.force_full = false;
        Ok(RenderOutcome {
            full_present_needed,
            regions,
            stats,
            precompute,
            cache,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
