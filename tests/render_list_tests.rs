//! Render List Construction Tests
//!
//! Tests for:
//! - Three-bucket partition (opaque / transparent depth-tested / UI)
//! - Opaque sort keys: render order, program identity, ascending depth
//! - Transparent back-to-front ordering
//! - Camera-less tasks (no culling, no z-depth)
//! - Frustum culling and the per-mesh opt-out
//! - Independence of the `sort` and `frustum_cull` flags

use glam::Vec3;

use opal::gl::BlendFactor;
use opal::renderer::task::DrawItem;
use opal::{
    AttributeDesc, Camera, Geometry, Mesh, NodeKey, Program, RenderOptions, RenderTask, Resources,
    Scene,
};

const VS: &str = "attribute vec3 position;\nvoid main() {}";
const FS: &str = "void main() {}";

fn positions(count: usize) -> Vec<f32> {
    let tri = [[-0.5f32, -0.5, 0.0], [0.5, -0.5, 0.0], [0.0, 0.5, 0.0]];
    let mut data = Vec::with_capacity(count * 3);
    for i in 0..count {
        data.extend_from_slice(&tri[i % 3]);
    }
    data
}

fn triangle_geometry() -> Geometry {
    let mut geometry = Geometry::new();
    geometry.add_attribute("position", AttributeDesc::f32(positions(3)).size(3));
    geometry
}

struct Fixture {
    scene: Scene,
    resources: Resources,
    camera: NodeKey,
}

impl Fixture {
    fn new() -> Self {
        let mut scene = Scene::new();
        let camera = scene.add_camera(Camera::new_perspective(60.0, 1.0, 0.1, 100.0));
        Self {
            scene,
            resources: Resources::new(),
            camera,
        }
    }

    fn opaque_program(&mut self) -> opal::ProgramKey {
        self.resources.add_program(Program::new(VS, FS))
    }

    fn transparent_program(&mut self) -> opal::ProgramKey {
        let mut program = Program::new(VS, FS);
        program.set_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        self.resources.add_program(program)
    }

    fn ui_program(&mut self) -> opal::ProgramKey {
        let mut program = Program::new(VS, FS);
        program.set_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        program.depth_test = false;
        self.resources.add_program(program)
    }

    /// Adds a drawable node at `position` and returns (node, mesh id).
    fn add_drawable(
        &mut self,
        program: opal::ProgramKey,
        position: Vec3,
        render_order: i32,
    ) -> (NodeKey, u32) {
        let geometry = self.resources.add_geometry(triangle_geometry());
        let mesh = Mesh::new(geometry, program).with_render_order(render_order);
        let node = self.scene.add_mesh("drawable", mesh);
        self.scene.node_mut(node).unwrap().transform.position = position;
        let mesh_id = self
            .scene
            .node(node)
            .and_then(|n| n.mesh)
            .and_then(|k| self.scene.meshes.get(k))
            .unwrap()
            .id;
        (node, mesh_id)
    }

    fn build(&mut self, options: RenderOptions) -> Vec<DrawItem> {
        let mut task = RenderTask::new(options);
        task.camera = Some(self.camera);
        task.begin(&mut self.scene);
        task.build_render_list(&self.scene, &self.resources)
    }

    fn default_options(&self) -> RenderOptions {
        RenderOptions {
            camera: Some(self.camera),
            ..RenderOptions::default()
        }
    }

    fn ids(items: &[DrawItem]) -> Vec<u32> {
        items.iter().map(|item| item.mesh_id).collect()
    }
}

// ============================================================================
// Partition
// ============================================================================

#[test]
fn buckets_concatenate_opaque_transparent_ui() {
    let mut fx = Fixture::new();
    let ui = fx.ui_program();
    let transparent = fx.transparent_program();
    let opaque = fx.opaque_program();

    // Inserted in reverse bucket order on purpose.
    let (_, ui_id) = fx.add_drawable(ui, Vec3::new(0.0, 0.0, -5.0), 0);
    let (_, transparent_id) = fx.add_drawable(transparent, Vec3::new(0.0, 0.0, -5.0), 0);
    let (_, opaque_id) = fx.add_drawable(opaque, Vec3::new(0.0, 0.0, -5.0), 0);

    let items = fx.build(fx.default_options());
    assert_eq!(Fixture::ids(&items), [opaque_id, transparent_id, ui_id]);
}

// ============================================================================
// Opaque ordering
// ============================================================================

#[test]
fn opaque_sorts_by_render_order_program_then_depth() {
    let mut fx = Fixture::new();
    let program = fx.opaque_program();

    // Render orders [0, 0, 1]; the two order-0 items share a program and
    // differ only in view depth.
    let (_, far_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -5.0), 0);
    let (_, near_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -2.0), 0);
    let (_, forced_last_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -1.0), 1);

    let items = fx.build(fx.default_options());

    // Order-1 item is last; order-0 items sort front-to-back.
    assert_eq!(Fixture::ids(&items), [near_id, far_id, forced_last_id]);
}

#[test]
fn opaque_groups_by_program_identity() {
    let mut fx = Fixture::new();
    let first_program = fx.opaque_program();
    let second_program = fx.opaque_program();

    // Alternate programs across creation order; same depth for all.
    let (_, a) = fx.add_drawable(second_program, Vec3::new(0.0, 0.0, -3.0), 0);
    let (_, b) = fx.add_drawable(first_program, Vec3::new(0.0, 0.0, -3.0), 0);
    let (_, c) = fx.add_drawable(second_program, Vec3::new(0.0, 0.0, -3.0), 0);

    let items = fx.build(fx.default_options());
    let programs: Vec<u32> = items.iter().map(|item| item.program_id).collect();

    assert!(programs.windows(2).all(|w| w[0] <= w[1]), "{programs:?}");
    // Equal program + depth falls back to descending mesh id.
    assert_eq!(Fixture::ids(&items), [b, c, a]);
}

// ============================================================================
// Transparent ordering
// ============================================================================

#[test]
fn transparent_sorts_back_to_front() {
    let mut fx = Fixture::new();
    let program = fx.transparent_program();

    let (_, near_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -1.0), 0);
    let (_, far_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -4.0), 0);

    let items = fx.build(fx.default_options());

    // Farthest first for correct blending.
    assert_eq!(Fixture::ids(&items), [far_id, near_id]);
    assert!(items[0].z_depth > items[1].z_depth);
}

#[test]
fn render_order_beats_depth_for_transparent() {
    let mut fx = Fixture::new();
    let program = fx.transparent_program();

    let (_, far_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -9.0), 1);
    let (_, near_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -1.0), 0);

    let items = fx.build(fx.default_options());
    assert_eq!(Fixture::ids(&items), [near_id, far_id]);
}

// ============================================================================
// Camera-less tasks
// ============================================================================

#[test]
fn camera_less_task_skips_culling_and_depth() {
    let mut fx = Fixture::new();
    let program = fx.opaque_program();

    // Far outside any frustum; still collected without a camera.
    let (_, behind_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, 500.0), 0);
    let (_, front_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -5.0), 0);

    let mut task = RenderTask::new(RenderOptions::default());
    task.camera = None;
    task.begin(&mut fx.scene);
    let items = task.build_render_list(&fx.scene, &fx.resources);

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item.z_depth == 0.0));
    // Depth-independent: program then descending id.
    assert_eq!(Fixture::ids(&items), [front_id, behind_id]);
}

// ============================================================================
// Frustum culling
// ============================================================================

#[test]
fn frustum_cull_excludes_offscreen_nodes() {
    let mut fx = Fixture::new();
    let program = fx.opaque_program();

    let (_, visible_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, -5.0), 0);
    let (_, behind_id) = fx.add_drawable(program, Vec3::new(0.0, 0.0, 20.0), 0);

    let items = fx.build(fx.default_options());
    assert_eq!(Fixture::ids(&items), [visible_id]);

    let options = RenderOptions {
        frustum_cull: false,
        ..fx.default_options()
    };
    let items = fx.build(options);
    assert!(Fixture::ids(&items).contains(&behind_id));
}

#[test]
fn frustum_culled_opt_out_is_respected() {
    let mut fx = Fixture::new();
    let program = fx.opaque_program();

    let geometry = fx.resources.add_geometry(triangle_geometry());
    let mesh = Mesh::new(geometry, program).without_frustum_culling();
    let node = fx.scene.add_mesh("skybox", mesh);
    fx.scene.node_mut(node).unwrap().transform.position = Vec3::new(0.0, 0.0, 50.0);

    let items = fx.build(fx.default_options());
    assert_eq!(items.len(), 1);
}

// ============================================================================
// Flags
// ============================================================================

#[test]
fn sort_false_preserves_traversal_order() {
    let mut fx = Fixture::new();
    let transparent = fx.transparent_program();
    let opaque = fx.opaque_program();

    let (_, first) = fx.add_drawable(transparent, Vec3::new(0.0, 0.0, -5.0), 0);
    let (_, second) = fx.add_drawable(opaque, Vec3::new(0.0, 0.0, -5.0), 0);

    let options = RenderOptions {
        sort: false,
        ..fx.default_options()
    };
    let items = fx.build(options);
    assert_eq!(Fixture::ids(&items), [first, second]);
}

#[test]
fn set_keeps_sort_and_frustum_cull_independent() {
    let mut task = RenderTask::new(RenderOptions::default());

    task.set(RenderOptions {
        sort: false,
        frustum_cull: true,
        ..RenderOptions::default()
    });
    assert!(!task.sort);
    assert!(task.frustum_cull);

    task.set(RenderOptions {
        sort: true,
        frustum_cull: false,
        ..RenderOptions::default()
    });
    assert!(task.sort);
    assert!(!task.frustum_cull);
}
