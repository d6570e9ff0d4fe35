//! Render tasks: one configured render pass and its ordered draw list.
//!
//! A task walks its scene pre-order, prunes invisible subtrees, culls
//! against the camera frustum, then partitions the surviving drawables into
//! three buckets - opaque, transparent-depth-tested, UI/overlay - each with
//! its own sort keys. The concatenated result is the frame's draw order.

use std::cmp::Ordering;

use glam::Vec3;

use crate::resources::geometry::Geometry;
use crate::resources::{Mesh, Resources};
use crate::resources::RenderTargetKey;
use crate::scene::{Camera, MeshKey, Node, NodeKey, Scene};
use crate::utils::diagnostics::render_warn;

/// Parameters for one render pass. `set` on a task overwrites all fields.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Node carrying the camera component. `None` skips culling and
    /// z-depth ordering.
    pub camera: Option<NodeKey>,
    /// Offscreen target; `None` renders to the drawable surface.
    pub target: Option<RenderTargetKey>,
    /// Restricts the pass to a subtree; `None` walks every root.
    pub root: Option<NodeKey>,
    /// Update world matrices before collecting.
    pub update: bool,
    pub sort: bool,
    pub frustum_cull: bool,
    /// Tri-state: `Some` overrides the renderer's auto-clear.
    pub clear: Option<bool>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            camera: None,
            target: None,
            root: None,
            update: true,
            sort: true,
            frustum_cull: true,
            clear: None,
        }
    }
}

/// A re-settable render pass.
///
/// Stateless across frames apart from its parameters; `sort` and
/// `frustum_cull` are independent flags.
#[derive(Debug, Clone, Copy)]
pub struct RenderTask {
    pub camera: Option<NodeKey>,
    pub target: Option<RenderTargetKey>,
    pub root: Option<NodeKey>,
    pub update: bool,
    pub sort: bool,
    pub frustum_cull: bool,
    pub clear: Option<bool>,
}

impl RenderTask {
    #[must_use]
    pub fn new(options: RenderOptions) -> Self {
        let mut task = Self {
            camera: None,
            target: None,
            root: None,
            update: true,
            sort: true,
            frustum_cull: true,
            clear: None,
        };
        task.set(options);
        task
    }

    /// Reinitializes every field from the options.
    pub fn set(&mut self, options: RenderOptions) -> &mut Self {
        self.camera = options.camera;
        self.target = options.target;
        self.root = options.root;
        self.update = options.update;
        self.sort = options.sort;
        self.frustum_cull = options.frustum_cull;
        self.clear = options.clear;
        self
    }

    /// Begin phase: world matrices propagate parent-before-child, the
    /// camera is synchronized separately (it may sit outside the rendered
    /// subtree), and the frustum refreshes when culling is on.
    pub fn begin(&self, scene: &mut Scene) {
        if self.update {
            scene.update_matrix_world(false);
        }

        if let Some(camera_node) = self.camera {
            let world = scene.node(camera_node).map(|n| *n.world_matrix());
            if let Some(world) = world
                && let Some(camera) = scene.camera_of_mut(camera_node)
            {
                camera.update_from_world(&world);
                if self.frustum_cull {
                    camera.update_frustum();
                }
            }
        }
    }

    /// Collects, culls, partitions and sorts the visible drawables.
    pub fn build_render_list(
        &self,
        scene: &Scene,
        resources: &Resources,
    ) -> Vec<DrawItem> {
        let camera = self
            .camera
            .and_then(|key| scene.node(key))
            .and_then(|node| node.camera)
            .and_then(|key| scene.cameras.get(key));

        let mut items: Vec<DrawItem> = Vec::new();

        let collect = |key: NodeKey, node: &Node| -> bool {
            // An invisible node prunes its whole subtree.
            if !node.visible {
                return true;
            }
            let Some(mesh_key) = node.mesh else {
                return false;
            };
            let Some(mesh) = scene.meshes.get(mesh_key) else {
                return false;
            };
            let Some(program) = resources.programs.get(mesh.program) else {
                render_warn!("mesh {} references a destroyed program; skipped", mesh.id);
                return false;
            };

            if self.frustum_cull
                && mesh.frustum_culled
                && let Some(camera) = camera
                && !frustum_intersects_mesh(camera, node, mesh, resources)
            {
                return false;
            }

            items.push(DrawItem {
                node: key,
                mesh: mesh_key,
                mesh_id: mesh.id,
                program_id: program.id,
                render_order: mesh.render_order,
                transparent: program.transparent,
                depth_test: program.depth_test,
                z_depth: 0.0,
            });
            false
        };

        match self.root {
            Some(root) => scene.traverse_from(root, collect),
            None => scene.traverse(collect),
        }

        if !self.sort {
            return items;
        }

        // z-depth only matters when the render order is unset, the program
        // depth-tests, and a camera exists to project through.
        if let Some(camera) = camera {
            let projection_view = *camera.projection_view_matrix();
            for item in &mut items {
                if item.render_order != 0 || !item.depth_test {
                    continue;
                }
                let Some(node) = scene.node(item.node) else {
                    continue;
                };
                let translation = Vec3::from(node.world_matrix().translation);
                let clip = projection_view * translation.extend(1.0);
                item.z_depth = if clip.w.abs() > f32::EPSILON {
                    clip.z / clip.w
                } else {
                    clip.z
                };
            }
        }

        let mut opaque = Vec::new();
        let mut transparent = Vec::new(); // depth-tested
        let mut ui = Vec::new(); // no depth test

        for item in items {
            if !item.transparent {
                opaque.push(item);
            } else if item.depth_test {
                transparent.push(item);
            } else {
                ui.push(item);
            }
        }

        opaque.sort_by(sort_opaque);
        transparent.sort_by(sort_transparent);
        ui.sort_by(sort_ui);

        opaque.extend(transparent);
        opaque.extend(ui);
        opaque
    }
}

/// An ordered group of render tasks executed back to back.
#[derive(Debug, Default, Clone)]
pub struct RenderTaskGroup {
    tasks: Vec<RenderTask>,
}

impl RenderTaskGroup {
    #[must_use]
    pub fn new(tasks: Vec<RenderTask>) -> Self {
        Self { tasks }
    }

    #[must_use]
    pub fn tasks(&self) -> &[RenderTask] {
        &self.tasks
    }

    /// Replaces the whole task list.
    pub fn set_tasks(&mut self, tasks: Vec<RenderTask>) {
        self.tasks = tasks;
    }
}

/// One entry of the ordered draw list.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub node: NodeKey,
    pub mesh: MeshKey,
    pub mesh_id: u32,
    pub program_id: u32,
    pub render_order: i32,
    pub transparent: bool,
    pub depth_test: bool,
    pub z_depth: f32,
}

/// Opaque: render order, then program identity (batching state changes),
/// then front-to-back depth, then descending id for determinism.
fn sort_opaque(a: &DrawItem, b: &DrawItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then_with(|| a.program_id.cmp(&b.program_id))
        .then_with(|| a.z_depth.partial_cmp(&b.z_depth).unwrap_or(Ordering::Equal))
        .then_with(|| b.mesh_id.cmp(&a.mesh_id))
}

/// Transparent depth-tested: render order, then back-to-front depth for
/// correct blending, then descending id.
fn sort_transparent(a: &DrawItem, b: &DrawItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then_with(|| b.z_depth.partial_cmp(&a.z_depth).unwrap_or(Ordering::Equal))
        .then_with(|| b.mesh_id.cmp(&a.mesh_id))
}

/// UI/overlay: render order, then program identity, then descending id.
fn sort_ui(a: &DrawItem, b: &DrawItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then_with(|| a.program_id.cmp(&b.program_id))
        .then_with(|| b.mesh_id.cmp(&a.mesh_id))
}

/// Sphere-vs-frustum test of a mesh's geometry bounds under its node's
/// world transform.
fn frustum_intersects_mesh(
    camera: &Camera,
    node: &Node,
    mesh: &Mesh,
    resources: &Resources,
) -> bool {
    let Some(geometry) = resources.geometries.get(mesh.geometry) else {
        return true;
    };
    intersects_geometry(camera, node, geometry)
}

fn intersects_geometry(camera: &Camera, node: &Node, geometry: &Geometry) -> bool {
    let bounds = geometry.bounds();
    if !bounds.radius.is_finite() {
        // No positional data to cull against.
        return true;
    }

    let world = node.world_matrix();
    let center = world.transform_point3(bounds.center);
    let max_scale = world
        .matrix3
        .x_axis
        .length()
        .max(world.matrix3.y_axis.length())
        .max(world.matrix3.z_axis.length());

    camera
        .frustum()
        .intersects_sphere(center, bounds.radius * max_scale)
}
