pub(crate) mod bitmap;
pub(crate) mod cache;
pub(crate) mod compositor;
pub(crate) mod cpu;
pub(crate) mod layer;
pub(crate) mod recording;
pub(crate) mod state;
pub(crate) mod surface_pool;
pub(crate) mod target;
pub(crate) mod walker;
