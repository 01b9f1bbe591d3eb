use crate::foundation::core::Affine;
use crate::foundation::error::{StrataError, StrataResult};
use crate::graph::walker::Graph;
use crate::scene::node::DrawCommand;

/// A model of a 3D scene, already projected to viewport space by the caller's camera pass.
#[derive(Clone, Debug)]
pub struct Model3D {
    /// Model-to-parent transform in projected 2D space.
    pub transform: Affine,
    /// Depth of the model's content; smaller is nearer.
    pub depth: f32,
    /// Projected content.
    pub content: Vec<DrawCommand>,
    children: Vec<usize>,
}

impl Model3D {
    /// Model with `content` at `depth`.
    pub fn new(depth: f32, content: Vec<DrawCommand>) -> Self {
        Self {
            transform: Affine::IDENTITY,
            depth,
            content,
            children: Vec::new(),
        }
    }

    /// Set the model transform.
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }
}

/// Model graph of a 3D viewport. Model `0` is the root.
#[derive(Clone, Debug)]
pub struct Scene3D {
    models: Vec<Model3D>,
}

impl Scene3D {
    /// Scene with `root` as model `0`.
    pub fn new(root: Model3D) -> Self {
        Self { models: vec![root] }
    }

    /// Root model index.
    pub fn root(&self) -> usize {
        0
    }

    /// Add `model` under `parent` and return its index.
    pub fn add_model(&mut self, parent: usize, model: Model3D) -> StrataResult<usize> {
        if parent >= self.models.len() {
            return Err(StrataError::protocol(format!("no 3D model {parent}")));
        }
        let index = self.models.len();
        self.models.push(model);
        self.models[parent].children.push(index);
        Ok(index)
    }

    /// Make an existing model a child of `parent` as well.
    pub fn link(&mut self, parent: usize, child: usize) -> StrataResult<()> {
        if parent >= self.models.len() || child >= self.models.len() {
            return Err(StrataError::protocol(format!(
                "cannot link 3D model {child} under {parent}"
            )));
        }
        self.models[parent].children.push(child);
        Ok(())
    }

    /// Model at `index`.
    pub fn model(&self, index: usize) -> Option<&Model3D> {
        self.models.get(index)
    }

    /// Number of models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Always `false`; a scene has at least its root.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Graph for Scene3D {
    type Node = usize;

    fn child_count(&self, node: usize) -> usize {
        self.models.get(node).map_or(0, |m| m.children.len())
    }

    fn child_at(&self, node: usize, index: usize) -> Option<usize> {
        self.models.get(node)?.children.get(index).copied()
    }
}
