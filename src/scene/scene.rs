//! The scene arena.
//!
//! `Scene` is the data layer: it owns the node arena, the root list and the
//! component maps, and runs the per-frame matrix hierarchy update. It issues
//! no GPU work - the renderer walks it read-only when collecting drawables.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::Affine3A;
use slotmap::SlotMap;

use crate::resources::Mesh;

use super::camera::Camera;
use super::node::Node;
use super::{CameraKey, MeshKey, NodeKey};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

pub struct Scene {
    pub id: u32,

    pub(crate) nodes: SlotMap<NodeKey, Node>,
    pub(crate) root_nodes: Vec<NodeKey>,

    // ==== component pools ====
    pub meshes: SlotMap<MeshKey, Mesh>,
    pub cameras: SlotMap<CameraKey, Camera>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            nodes: SlotMap::with_key(),
            root_nodes: Vec::new(),
            meshes: SlotMap::with_key(),
            cameras: SlotMap::with_key(),
        }
    }

    // ========================================================================
    // Node management
    // ========================================================================

    /// Adds a node as a root.
    pub fn add_node(&mut self, node: Node) -> NodeKey {
        let key = self.nodes.insert(node);
        self.root_nodes.push(key);
        key
    }

    /// Adds a node as a child of `parent`.
    pub fn add_child(&mut self, node: Node, parent: NodeKey) -> NodeKey {
        let key = self.nodes.insert(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(key);
        }
        if let Some(c) = self.nodes.get_mut(key) {
            c.parent = Some(parent);
        }
        key
    }

    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeKey] {
        &self.root_nodes
    }

    /// Re-parents `child` under `parent`, detaching it from its previous
    /// parent (or the root list) first. Both sides of the link are updated
    /// and the child's transform is marked dirty so the next hierarchy
    /// update refreshes its world matrix.
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) {
        if child == parent {
            log::warn!("cannot attach a node to itself");
            return;
        }

        self.unlink(child);

        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        } else {
            log::error!("attach: parent node not found; keeping child as root");
            self.root_nodes.push(child);
            return;
        }

        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.transform.mark_dirty();
        }
    }

    /// Links `child` under `parent` without detaching or dirty bookkeeping.
    ///
    /// For bulk hierarchy construction where the caller guarantees the child
    /// is not linked anywhere else and will run a forced matrix update after
    /// the rebuild. [`Scene::attach`] is the safe variant.
    pub fn attach_raw(&mut self, child: NodeKey, parent: NodeKey) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Detaches `child` from its parent and promotes it to a root.
    pub fn detach(&mut self, child: NodeKey) {
        self.unlink(child);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
            c.transform.mark_dirty();
        }
        self.root_nodes.push(child);
    }

    /// Removes a node and its whole subtree, dropping attached components.
    pub fn remove_node(&mut self, key: NodeKey) {
        let children = match self.nodes.get(key) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.remove_node(child);
        }

        self.unlink(key);

        if let Some(node) = self.nodes.get(key) {
            if let Some(mesh) = node.mesh {
                self.meshes.remove(mesh);
            }
            if let Some(camera) = node.camera {
                self.cameras.remove(camera);
            }
        }

        self.nodes.remove(key);
    }

    /// Removes `child` from its parent's child list or from the roots.
    fn unlink(&mut self, child: NodeKey) {
        let parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(p) = parent {
            if let Some(parent_node) = self.nodes.get_mut(p)
                && let Some(i) = parent_node.children.iter().position(|&k| k == child)
            {
                parent_node.children.remove(i);
            }
        } else if let Some(i) = self.root_nodes.iter().position(|&k| k == child) {
            self.root_nodes.remove(i);
        }
    }

    // ========================================================================
    // Component helpers
    // ========================================================================

    /// Inserts a mesh component and a node carrying it.
    pub fn add_mesh(&mut self, name: &str, mesh: Mesh) -> NodeKey {
        let mut node = Node::new(name);
        node.mesh = Some(self.meshes.insert(mesh));
        self.add_node(node)
    }

    pub fn add_mesh_to_parent(&mut self, name: &str, mesh: Mesh, parent: NodeKey) -> NodeKey {
        let mut node = Node::new(name);
        node.mesh = Some(self.meshes.insert(mesh));
        self.add_child(node, parent)
    }

    /// Inserts a camera component and a node carrying it.
    pub fn add_camera(&mut self, camera: Camera) -> NodeKey {
        let mut node = Node::new("Camera");
        node.camera = Some(self.cameras.insert(camera));
        self.add_node(node)
    }

    /// The camera component attached to `node`, if any.
    #[must_use]
    pub fn camera_of(&self, node: NodeKey) -> Option<&Camera> {
        let key = self.nodes.get(node)?.camera?;
        self.cameras.get(key)
    }

    pub fn camera_of_mut(&mut self, node: NodeKey) -> Option<&mut Camera> {
        let key = self.nodes.get(node)?.camera?;
        self.cameras.get_mut(key)
    }

    // ========================================================================
    // Matrix hierarchy update
    // ========================================================================

    /// Updates every reachable node's world matrix, parents before children.
    ///
    /// Camera components are synchronized from their node's world matrix in
    /// the same pass. `force` refreshes every world matrix regardless of
    /// dirty state.
    pub fn update_matrix_world(&mut self, force: bool) {
        // Iterative walk: explicit stack avoids both deep-recursion overflow
        // and double borrows of the arena.
        let mut stack: Vec<(NodeKey, Affine3A, bool)> = Vec::with_capacity(64);

        for &root in self.root_nodes.iter().rev() {
            stack.push((root, Affine3A::IDENTITY, force));
        }

        while let Some((key, parent_world, parent_changed)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };

            let local_changed = node.transform.update_local_matrix();
            let world_needs_update = local_changed || parent_changed;

            if world_needs_update {
                let world = parent_world * node.transform.local_matrix;
                node.transform.set_world_matrix(world);

                if let Some(camera_key) = node.camera {
                    let world = node.transform.world_matrix;
                    if let Some(camera) = self.cameras.get_mut(camera_key) {
                        camera.update_from_world(&world);
                    }
                }
            }

            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            let current_world = node.transform.world_matrix;
            for i in (0..node.children.len()).rev() {
                if let Some(&child) = self.nodes.get(key).and_then(|n| n.children.get(i)) {
                    stack.push((child, current_world, world_needs_update));
                }
            }
        }
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Pre-order traversal over every root. The visitor returns `true` to
    /// prune the current node's children; the node itself has already been
    /// visited at that point.
    pub fn traverse(&self, mut visitor: impl FnMut(NodeKey, &Node) -> bool) {
        for &root in &self.root_nodes {
            self.traverse_inner(root, &mut visitor);
        }
    }

    /// Pre-order traversal of one subtree.
    pub fn traverse_from(&self, root: NodeKey, mut visitor: impl FnMut(NodeKey, &Node) -> bool) {
        self.traverse_inner(root, &mut visitor);
    }

    fn traverse_inner(&self, key: NodeKey, visitor: &mut impl FnMut(NodeKey, &Node) -> bool) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        if visitor(key, node) {
            return;
        }
        for &child in &node.children {
            self.traverse_inner(child, visitor);
        }
    }
}
