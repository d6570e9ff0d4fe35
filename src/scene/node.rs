use glam::Affine3A;

use super::transform::Transform;
use super::{CameraKey, MeshKey, NodeKey};

/// A scene node: hierarchy links, a transform, visibility, and optional
/// component handles.
///
/// Nodes keep only the data traversed every frame; meshes and cameras live in
/// the [`super::Scene`]'s component maps and are referenced by key.
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Parent node handle (`None` for root nodes).
    pub(crate) parent: Option<NodeKey>,
    /// Child node handles.
    pub(crate) children: Vec<NodeKey>,

    pub name: String,
    pub transform: Transform,

    /// Invisible nodes are pruned from render-list collection together with
    /// their subtree, but still propagate matrices when reachable.
    pub visible: bool,

    pub mesh: Option<MeshKey>,
    pub camera: Option<CameraKey>,
}

impl Node {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            name: name.to_owned(),
            transform: Transform::new(),
            visible: true,
            mesh: None,
            camera: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// The node's world transformation matrix, valid after the last
    /// hierarchy update.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }
}
