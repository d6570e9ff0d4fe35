//! Mesh component: the drawable pairing of a geometry with a program.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::gl::DrawMode;

use super::{GeometryKey, ProgramKey};

static NEXT_MESH_ID: AtomicU32 = AtomicU32::new(1);

/// A drawable scene component.
///
/// The id is monotonic and participates in draw-order sorting as the final
/// deterministic tie-break.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub id: u32,
    pub geometry: GeometryKey,
    pub program: ProgramKey,
    pub mode: DrawMode,
    /// Opt-out for frustum culling (skyboxes, full-screen quads).
    pub frustum_culled: bool,
    /// Overrides sorting to force an explicit order; 0 means unset.
    pub render_order: i32,
}

impl Mesh {
    #[must_use]
    pub fn new(geometry: GeometryKey, program: ProgramKey) -> Self {
        Self {
            id: NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed),
            geometry,
            program,
            mode: DrawMode::Triangles,
            frustum_culled: true,
            render_order: 0,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DrawMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }

    #[must_use]
    pub fn without_frustum_culling(mut self) -> Self {
        self.frustum_culled = false;
        self
    }
}
