//! Frame orchestration.
//!
//! The [`Renderer`] owns the [`Context`] and executes render tasks: bind the
//! task's target, clear it, update the scene's matrices, collect and sort
//! the visible drawables, then run the two-phase schedule - *prepare every
//! item, then draw every item*. The phases are never interleaved per node:
//! drawing may depend on GPU state a sibling prepared (a shared compiled
//! program, a shared texture), which must be resident before any draw call
//! of the task is issued.

pub mod task;

pub use task::{RenderOptions, RenderTask, RenderTaskGroup};

use glam::{Mat3, Mat4, Vec3};

use crate::gl::{Capability, ClearMask, Context, GlApi};
use crate::resources::Resources;
use crate::scene::Scene;
use crate::utils::diagnostics::render_warn;

use task::DrawItem;

/// Snapshot of the camera matrices used for one task's draw phase.
#[derive(Debug, Clone, Copy)]
struct CameraState {
    projection: Mat4,
    view: Mat4,
    world_position: Vec3,
}

/// Top-level per-frame orchestrator.
pub struct Renderer {
    context: Context,

    /// Logical drawable size; multiplied by `dpr` for the physical
    /// viewport.
    pub width: u32,
    pub height: u32,
    pub dpr: f32,

    /// Clear policy for tasks that don't override it.
    pub auto_clear: bool,
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,

    // Pool of one task for parameter-only render calls; `render` re-`set`s
    // it instead of allocating. Reentrancy is unrepresentable: rendering
    // borrows the renderer mutably.
    base_task: RenderTask,
}

impl Renderer {
    /// Wraps a backend and sets the initial drawable size.
    pub fn new(api: Box<dyn GlApi>, width: u32, height: u32) -> Self {
        let mut renderer = Self {
            context: Context::new(api),
            width,
            height,
            dpr: 1.0,
            auto_clear: true,
            color: true,
            depth: true,
            stencil: false,
            base_task: RenderTask::new(RenderOptions::default()),
        };
        renderer.set_size(width, height);
        renderer
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Updates the logical size; the physical drawable size feeds viewport
    /// and render-target resolution.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        let physical_w = (width as f32 * self.dpr) as u32;
        let physical_h = (height as f32 * self.dpr) as u32;
        self.context.set_drawable_size(physical_w, physical_h);
    }

    pub fn set_dpr(&mut self, dpr: f32) {
        self.dpr = dpr;
        self.set_size(self.width, self.height);
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// One-shot render call through the pooled base task.
    pub fn render(&mut self, scene: &mut Scene, resources: &mut Resources, options: RenderOptions) {
        let task = *self.base_task.set(options);
        self.execute_task(scene, resources, &task);
    }

    /// Executes a list of pre-configured tasks in order.
    pub fn render_tasks(
        &mut self,
        scene: &mut Scene,
        resources: &mut Resources,
        tasks: &[RenderTask],
    ) {
        for task in tasks {
            self.execute_task(scene, resources, task);
        }
    }

    /// Executes task groups in order.
    pub fn render_groups(
        &mut self,
        scene: &mut Scene,
        resources: &mut Resources,
        groups: &[RenderTaskGroup],
    ) {
        for group in groups {
            for task in group.tasks() {
                self.execute_task(scene, resources, task);
            }
        }
    }

    // ========================================================================
    // Task execution
    // ========================================================================

    fn execute_task(&mut self, scene: &mut Scene, resources: &mut Resources, task: &RenderTask) {
        // Begin: matrix propagation completes before collection.
        task.begin(scene);

        // List-built: collection and ordering complete before any GPU work
        // on the drawables.
        let items = task.build_render_list(scene, resources);

        // Bind the task's target and clear it.
        match task.target {
            Some(target_key) => {
                let Resources {
                    render_targets,
                    textures,
                    ..
                } = resources;
                let Some(target) = render_targets.get_mut(target_key) else {
                    render_warn!("render task targets a destroyed render target; skipped");
                    return;
                };
                target.prepare(&mut self.context, textures);
                self.context.bind_framebuffer(target.framebuffer());
                let (w, h) = (target.width, target.height);
                self.context.set_viewport(w, h);
            }
            None => {
                self.context.bind_framebuffer(None);
                let (w, h) = self.context.drawable_size();
                self.context.set_viewport(w, h);
            }
        }

        if task.clear.unwrap_or(self.auto_clear) {
            self.clear_pass(resources, task);
        }

        let camera = task
            .camera
            .and_then(|key| scene.camera_of(key))
            .map(|camera| CameraState {
                projection: *camera.projection_matrix(),
                view: *camera.view_matrix(),
                world_position: camera.world_position(),
            });

        // Executing: prepare every item, then draw every item.
        for item in &items {
            prepare_item(&mut self.context, scene, resources, item);
        }
        for item in &items {
            draw_item(&mut self.context, scene, resources, item, camera.as_ref());
        }
    }

    /// Clears the bound target, honoring its attachment configuration and
    /// making sure depth writes are on so the depth buffer actually clears.
    fn clear_pass(&mut self, resources: &Resources, task: &RenderTask) {
        let target = task.target.and_then(|key| resources.render_targets.get(key));

        let color = self.color || target.is_some_and(|t| t.desc().color > 0);
        let depth = self.depth || target.is_some_and(|t| t.desc().depth);
        let stencil = self.stencil || target.is_some_and(|t| t.desc().stencil);

        let mut mask = ClearMask::empty();
        if color {
            mask |= ClearMask::COLOR;
        }
        if depth {
            mask |= ClearMask::DEPTH;
            self.context.enable(Capability::DepthTest);
            self.context.set_depth_mask(true);
        }
        if stencil {
            mask |= ClearMask::STENCIL;
        }
        self.context.clear(mask);
    }
}

/// Prepare phase for one draw item: program (compile/link/texture uploads)
/// first, then geometry (buffers + layout) against that program.
fn prepare_item(ctx: &mut Context, scene: &Scene, resources: &mut Resources, item: &DrawItem) {
    let Some(mesh) = scene.meshes.get(item.mesh) else {
        return;
    };
    let Resources {
        geometries,
        programs,
        textures,
        ..
    } = resources;

    let Some(program) = programs.get_mut(mesh.program) else {
        return;
    };
    if let Err(err) = program.prepare(ctx, textures) {
        log::debug!("program {} degraded: {err}", program.id);
        return;
    }

    let Some(geometry) = geometries.get_mut(mesh.geometry) else {
        render_warn!("mesh {} references a destroyed geometry; skipped", mesh.id);
        return;
    };
    geometry.prepare(ctx, program);
}

/// Draw phase for one item: write the built-in camera uniforms, apply the
/// program (uniforms + render state), then issue the geometry's draw call.
fn draw_item(
    ctx: &mut Context,
    scene: &Scene,
    resources: &mut Resources,
    item: &DrawItem,
    camera: Option<&CameraState>,
) {
    let Some(mesh) = scene.meshes.get(item.mesh) else {
        return;
    };
    let Some(node) = scene.node(item.node) else {
        return;
    };
    let world = *node.world_matrix();

    let Resources {
        geometries,
        programs,
        textures,
        ..
    } = resources;

    {
        let Some(program) = programs.get_mut(mesh.program) else {
            return;
        };
        if let Some(camera) = camera {
            let model = Mat4::from(world);
            let model_view = camera.view * model;
            let normal_matrix = Mat3::from_mat4(model_view).inverse().transpose();

            program.set_uniform("modelMatrix", model);
            program.set_uniform("viewMatrix", camera.view);
            program.set_uniform("modelViewMatrix", model_view);
            program.set_uniform("normalMatrix", normal_matrix);
            program.set_uniform("projectionMatrix", camera.projection);
            program.set_uniform("cameraPosition", camera.world_position);
        }
    }

    let Some(program) = programs.get(mesh.program) else {
        return;
    };

    // A mirrored world transform turns the winding inside out for this draw.
    let flip_faces = program.cull_face.is_some() && world.matrix3.determinant() < 0.0;

    program.use_program(ctx, textures, flip_faces);

    let Some(geometry) = geometries.get_mut(mesh.geometry) else {
        return;
    };
    geometry.draw(ctx, program, mesh.mode);
}
