pub(crate) mod blur;
pub(crate) mod color_matrix;
pub(crate) mod composite;
pub(crate) mod effect;
