use crate::foundation::core::{Affine, INFINITE_RECT, Rect, intersect_or_empty};
use crate::foundation::error::StrataResult;
use crate::render::layer::{Layer, LayerSurface};
use crate::render::target::{DrawState, RenderTarget};
use crate::scene::node::{Guidelines, RenderOptions};

/// One undoable change of the drawing state. Each entry keeps what it replaced.
pub(crate) enum StateEntry {
    Transform { saved: Affine },
    Clip { saved: Rect },
    Layer(Box<Layer>),
    RenderOptions { saved: RenderOptions },
    Guidelines { saved: Affine },
    Scene3D { saved_transform: Affine, saved_clip: Rect },
    NoOp,
}

/// Per-kind depth of the state stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StackCounts {
    /// Transform entries.
    pub transforms: usize,
    /// Clip entries.
    pub clips: usize,
    /// Layer entries of any surface kind.
    pub layers: usize,
    /// Render-option entries.
    pub render_options: usize,
    /// Guideline frames.
    pub guidelines: usize,
    /// Open 3D scenes.
    pub scenes_3d: usize,
    /// Placeholders.
    pub no_ops: usize,
}

impl StackCounts {
    /// Sum over all kinds.
    pub fn total(&self) -> usize {
        self.transforms
            + self.clips
            + self.layers
            + self.render_options
            + self.guidelines
            + self.scenes_3d
            + self.no_ops
    }
}

/// How popped layers are finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Teardown {
    /// Composite layer content onto the parent.
    Compose,
    /// Drop off-screen content; native layers and 3D scenes are still closed on the target.
    Discard,
}

/// Single stack of drawing state. The current transform, clip and options are kept flat and
/// restored from the saved values on pop, so a push and its pop cannot get out of step.
pub(crate) struct StateStack {
    pub(super) entries: Vec<StateEntry>,
    pub(super) transform: Affine,
    pub(super) clip: Rect,
    pub(super) options: RenderOptions,
}

impl Default for StateStack {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            transform: Affine::IDENTITY,
            clip: INFINITE_RECT,
            options: RenderOptions::default(),
        }
    }
}

impl StateStack {
    pub(crate) fn depth(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn transform(&self) -> Affine {
        self.transform
    }

    pub(crate) fn clip(&self) -> Rect {
        self.clip
    }

    pub(crate) fn options(&self) -> RenderOptions {
        self.options
    }

    pub(crate) fn draw_state(&self) -> DrawState {
        DrawState {
            transform: self.transform,
            clip: self.clip,
            options: self.options,
            depth: None,
        }
    }

    pub(crate) fn counts(&self) -> StackCounts {
        let mut c = StackCounts::default();
        for e in &self.entries {
            match e {
                StateEntry::Transform { .. } => c.transforms += 1,
                StateEntry::Clip { .. } => c.clips += 1,
                StateEntry::Layer(_) => c.layers += 1,
                StateEntry::RenderOptions { .. } => c.render_options += 1,
                StateEntry::Guidelines { .. } => c.guidelines += 1,
                StateEntry::Scene3D { .. } => c.scenes_3d += 1,
                StateEntry::NoOp => c.no_ops += 1,
            }
        }
        c
    }

    /// Target receiving draws: the innermost intermediate surface, or `root`.
    pub(crate) fn active_target<'t>(
        &'t mut self,
        root: &'t mut dyn RenderTarget,
    ) -> &'t mut dyn RenderTarget {
        for entry in self.entries.iter_mut().rev() {
            if let StateEntry::Layer(layer) = entry
                && let LayerSurface::Intermediate(surface) = &mut layer.surface
            {
                return &mut **surface;
            }
        }
        root
    }

    /// Concatenate `t` onto the current transform.
    pub(crate) fn push_transform(&mut self, t: Affine) {
        self.entries.push(StateEntry::Transform {
            saved: self.transform,
        });
        self.transform *= t;
    }

    /// Intersect the clip with `rect` (target pixels).
    pub(crate) fn push_clip(&mut self, rect: Rect) {
        self.entries.push(StateEntry::Clip { saved: self.clip });
        self.clip = intersect_or_empty(self.clip, rect);
    }

    pub(crate) fn push_options(&mut self, options: RenderOptions) {
        self.entries.push(StateEntry::RenderOptions {
            saved: self.options,
        });
        self.options = options;
    }

    pub(crate) fn push_noop(&mut self) {
        self.entries.push(StateEntry::NoOp);
    }

    /// Snap the device translation to whole pixels on the flagged axes.
    pub(crate) fn push_guidelines(&mut self, g: Guidelines) {
        self.entries.push(StateEntry::Guidelines {
            saved: self.transform,
        });
        let [a, b, c, d, mut e, mut f] = self.transform.as_coeffs();
        if g.snap_x {
            e = e.round();
        }
        if g.snap_y {
            f = f.round();
        }
        self.transform = Affine::new([a, b, c, d, e, f]);
    }

    /// Open a 3D scene on the active target, clipped to `viewport` (target pixels), with model
    /// space mapped by `model_transform`.
    pub(crate) fn push_scene_3d(
        &mut self,
        root: &mut dyn RenderTarget,
        viewport: Rect,
        model_transform: Affine,
    ) -> StrataResult<()> {
        self.active_target(root).begin_3d(viewport)?;
        self.entries.push(StateEntry::Scene3D {
            saved_transform: self.transform,
            saved_clip: self.clip,
        });
        self.transform = model_transform;
        self.clip = intersect_or_empty(self.clip, viewport);
        Ok(())
    }

    pub(super) fn push_layer_entry(&mut self, layer: Layer) {
        self.entries.push(StateEntry::Layer(Box::new(layer)));
    }

    /// Pop down to `depth`, stopping at the first failure.
    pub(crate) fn pop_to(&mut self, depth: usize, root: &mut dyn RenderTarget) -> StrataResult<()> {
        while self.entries.len() > depth {
            self.pop(root, Teardown::Compose)?;
        }
        Ok(())
    }

    /// Pop down to `depth` no matter what; returns the first failure seen.
    pub(crate) fn unwind_to(&mut self, depth: usize, root: &mut dyn RenderTarget) -> StrataResult<()> {
        let mut first = None;
        while self.entries.len() > depth {
            if let Err(e) = self.pop(root, Teardown::Discard) {
                tracing::warn!(error = %e, "state unwind step failed");
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn pop(&mut self, root: &mut dyn RenderTarget, teardown: Teardown) -> StrataResult<()> {
        let Some(entry) = self.entries.pop() else {
            return Ok(());
        };
        match entry {
            StateEntry::Transform { saved } | StateEntry::Guidelines { saved } => {
                self.transform = saved;
                Ok(())
            }
            StateEntry::Clip { saved } => {
                self.clip = saved;
                Ok(())
            }
            StateEntry::RenderOptions { saved } => {
                self.options = saved;
                Ok(())
            }
            StateEntry::NoOp => Ok(()),
            StateEntry::Scene3D {
                saved_transform,
                saved_clip,
            } => {
                self.transform = saved_transform;
                self.clip = saved_clip;
                self.active_target(root).end_3d()
            }
            StateEntry::Layer(layer) => self.pop_layer(root, *layer, teardown),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/state.rs"]
mod tests;
