//! Strata is a retained-mode scene composition engine.
//!
//! A [`VisualTree`] of drawing primitives is turned into pixels on a [`RenderTarget`], redrawing
//! only what changed since the previous pass:
//!
//! - Build and mutate a [`VisualTree`] (mutations mark nodes dirty)
//! - Run a [`Compositor`] pass: [`PreCompute`] refreshes bounds and feeds changed areas into a
//!   [`RegionAggregator`], node caches are refreshed, and a [`RenderWalker`] draws each merged
//!   dirty region
//! - Draw onto the software [`CpuTarget`], or any other [`RenderTarget`] implementation
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod config;
pub(crate) mod effects;
pub(crate) mod graph;
pub(crate) mod region;
pub(crate) mod render;
pub(crate) mod scene;

pub use crate::foundation::core::{
    Affine, BezPath, Color, INFINITE_RECT, PixelRect, Point, Rect, Rgba8Premul, Shape, Size,
    Stroke, Vec2,
};
pub use crate::foundation::error::{StrataError, StrataResult};

pub use crate::config::{CompositorConfig, DebugConfig};
pub use crate::effects::effect::Effect;
pub use crate::graph::walker::{Direction, Graph, GraphSink, GraphWalker};
pub use crate::region::aggregator::{DEFAULT_REGION_SLOTS, RegionAggregator, merge_overhead};
pub use crate::render::bitmap::Bitmap;
pub use crate::render::cache::{BitmapCache, CacheRefreshStats, CachedBitmap, NodeCache};
pub use crate::render::compositor::{Compositor, RenderOutcome};
pub use crate::render::cpu::{CpuTarget, CpuTargetOpts};
pub use crate::render::recording::{RecordingTarget, TargetCall};
pub use crate::render::state::StackCounts;
pub use crate::render::surface_pool::{SurfacePoolOpts, SurfacePoolStats};
pub use crate::render::target::{
    DrawState, EffectSupport, PostOp, RenderTarget, SurfaceInit, SurfaceTarget, SurfaceUsage,
    TargetCaps,
};
pub use crate::render::walker::{RenderStats, RenderWalker};
pub use crate::scene::brush::{Brush, GradientStop};
pub use crate::scene::node::{
    Antialias, CacheMode, Clip, DrawCommand, Guidelines, Interpolation, NodeKind, Pen,
    RenderOptionOverrides, RenderOptions, ScrollInfo, TextMode, Viewport3D, VisualNode,
};
pub use crate::scene::precompute::{PreCompute, PreComputeStats};
pub use crate::scene::scene3d::{Model3D, Scene3D};
pub use crate::scene::tree::{NodeId, VisualTree};
