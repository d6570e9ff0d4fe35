//! Scene graph: nodes, transforms, cameras and the arena that owns them.

pub mod camera;
pub mod node;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod transform;

pub use camera::{Camera, Frustum, Projection};
pub use node::Node;
pub use scene::Scene;
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a [`Node`] in a [`Scene`].
    pub struct NodeKey;
    /// Handle to a mesh component in a [`Scene`].
    pub struct MeshKey;
    /// Handle to a [`Camera`] component in a [`Scene`].
    pub struct CameraKey;
}
