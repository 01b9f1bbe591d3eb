pub(crate) mod brush;
pub(crate) mod node;
pub(crate) mod precompute;
pub(crate) mod scene3d;
pub(crate) mod tree;
