//! Context wrapper.
//!
//! [`Context`] owns the boxed backend, the binding-state mirror, the detected
//! capabilities, the drawable size, and the process-wide program-data
//! registry. Every component that issues state-changing calls receives a
//! `&mut Context` and goes through the setters here; nothing else is allowed
//! to mutate backend state, which keeps the mirror and the actual state in
//! sync transactionally.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::resources::program_data::ProgramRegistry;

use super::state::GlState;
use super::{
    BlendEquationState, BlendFuncState, BufferId, BufferTarget, Capabilities, Capability,
    ClearMask, CullFace, DepthFunc, FramebufferId, FrontFace, GlApi, PixelStore, TextureId,
    TextureTarget, VertexArrayId, Viewport,
};

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Top-level wrapper around one rendering context.
pub struct Context {
    id: u32,
    api: Box<dyn GlApi>,
    /// The binding-state mirror. Readable by anyone; written only by the
    /// setters below.
    pub state: GlState,
    capabilities: Capabilities,
    width: u32,
    height: u32,
    pub(crate) programs: ProgramRegistry,
}

impl Context {
    /// Wraps a backend, querying its capabilities once.
    pub fn new(api: Box<dyn GlApi>) -> Self {
        let capabilities = api.capabilities();
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            api,
            state: GlState::new(),
            capabilities,
            width: 0,
            height: 0,
            programs: ProgramRegistry::new(),
        }
    }

    /// Identity of this context; resources remember it to detect first use
    /// against a different context.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Current drawable size in physical pixels. Render targets with
    /// unspecified dimensions resolve against this.
    #[must_use]
    pub fn drawable_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_drawable_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Raw backend access for non-state calls (uploads, draws, reflection).
    pub fn api_mut(&mut self) -> &mut dyn GlApi {
        self.api.as_mut()
    }

    #[must_use]
    pub fn api(&self) -> &dyn GlApi {
        self.api.as_ref()
    }

    /// Split borrow: backend and mirror at the same time.
    pub(crate) fn api_and_state(&mut self) -> (&mut dyn GlApi, &mut GlState) {
        (self.api.as_mut(), &mut self.state)
    }

    // ========================================================================
    // Capability toggles
    // ========================================================================

    pub fn enable(&mut self, cap: Capability) {
        if self.state.enabled.get(&cap) == Some(&true) {
            return;
        }
        self.api.enable(cap);
        self.state.enabled.insert(cap, true);
    }

    pub fn disable(&mut self, cap: Capability) {
        if self.state.enabled.get(&cap) == Some(&false) {
            return;
        }
        self.api.disable(cap);
        self.state.enabled.insert(cap, false);
    }

    // ========================================================================
    // Blend / cull / depth state
    // ========================================================================

    pub fn set_blend_func(&mut self, func: BlendFuncState) {
        if self.state.blend_func == func {
            return;
        }
        self.state.blend_func = func;
        match (func.src_alpha, func.dst_alpha) {
            (Some(sa), Some(da)) => self.api.blend_func_separate(func.src, func.dst, sa, da),
            _ => self.api.blend_func(func.src, func.dst),
        }
    }

    pub fn set_blend_equation(&mut self, eq: BlendEquationState) {
        if self.state.blend_equation == eq {
            return;
        }
        self.state.blend_equation = eq;
        match eq.alpha {
            Some(alpha) => self.api.blend_equation_separate(eq.rgb, alpha),
            None => self.api.blend_equation(eq.rgb),
        }
    }

    pub fn set_cull_face(&mut self, face: CullFace) {
        if self.state.cull_face == Some(face) {
            return;
        }
        self.state.cull_face = Some(face);
        self.api.cull_face(face);
    }

    pub fn set_front_face(&mut self, dir: FrontFace) {
        if self.state.front_face == dir {
            return;
        }
        self.state.front_face = dir;
        self.api.front_face(dir);
    }

    pub fn set_depth_mask(&mut self, enabled: bool) {
        if self.state.depth_mask == enabled {
            return;
        }
        self.state.depth_mask = enabled;
        self.api.depth_mask(enabled);
    }

    pub fn set_depth_func(&mut self, func: DepthFunc) {
        if self.state.depth_func == func {
            return;
        }
        self.state.depth_func = func;
        self.api.depth_func(func);
    }

    // ========================================================================
    // Viewport & clear
    // ========================================================================

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.set_viewport_at(0, 0, width, height);
    }

    pub fn set_viewport_at(&mut self, x: i32, y: i32, width: u32, height: u32) {
        let viewport = Viewport {
            x,
            y,
            width,
            height,
        };
        if self.state.viewport == viewport {
            return;
        }
        self.state.viewport = viewport;
        self.api.viewport(x, y, width, height);
    }

    pub fn clear(&mut self, mask: ClearMask) {
        if !mask.is_empty() {
            self.api.clear(mask);
        }
    }

    // ========================================================================
    // Pixel-store state
    // ========================================================================

    pub fn set_flip_y(&mut self, value: bool) {
        if self.state.flip_y == value {
            return;
        }
        self.state.flip_y = value;
        self.api.pixel_store(PixelStore::FlipY(value));
    }

    pub fn set_premultiply_alpha(&mut self, value: bool) {
        if self.state.premultiply_alpha == value {
            return;
        }
        self.state.premultiply_alpha = value;
        self.api.pixel_store(PixelStore::PremultiplyAlpha(value));
    }

    pub fn set_unpack_alignment(&mut self, value: u32) {
        if self.state.unpack_alignment == value {
            return;
        }
        self.state.unpack_alignment = value;
        self.api.pixel_store(PixelStore::UnpackAlignment(value));
    }

    // ========================================================================
    // Texture units
    // ========================================================================

    pub fn active_texture(&mut self, unit: u32) {
        if self.state.active_texture_unit == unit {
            return;
        }
        self.state.active_texture_unit = unit;
        self.api.active_texture(unit);
    }

    pub fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) {
        let unit = self.state.active_texture_unit;
        if self.state.texture_units.get(&unit).copied() == texture {
            return;
        }
        match texture {
            Some(id) => {
                self.state.texture_units.insert(unit, id);
            }
            None => {
                self.state.texture_units.remove(&unit);
            }
        }
        self.api.bind_texture(target, texture);
    }

    pub fn delete_texture(&mut self, texture: TextureId) {
        self.state.texture_units.retain(|_, bound| *bound != texture);
        self.api.delete_texture(texture);
    }

    // ========================================================================
    // Buffers & vertex arrays
    // ========================================================================

    pub fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        if self.state.bound_buffer == buffer {
            return;
        }
        self.state.bound_buffer = buffer;
        self.api.bind_buffer(target, buffer);
    }

    pub fn delete_buffer(&mut self, buffer: BufferId) {
        if self.state.bound_buffer == Some(buffer) {
            self.state.bound_buffer = None;
        }
        self.api.delete_buffer(buffer);
    }

    pub fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>) {
        // Binding a VAO rebinds its element buffer underneath the cache.
        if vao.is_some() {
            self.state.bound_buffer = None;
        }
        if self.state.current_vao == vao {
            return;
        }
        self.state.current_vao = vao;
        self.api.bind_vertex_array(vao);
    }

    pub fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        // Some devices dislike deleting the active vertex array.
        if self.state.current_vao == Some(vao) {
            self.bind_vertex_array(None);
        }
        self.api.delete_vertex_array(vao);
    }

    // ========================================================================
    // Framebuffers
    // ========================================================================

    pub fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        if self.state.framebuffer == framebuffer {
            return;
        }
        self.state.framebuffer = framebuffer;
        self.api.bind_framebuffer(framebuffer);
    }

    pub fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.state.framebuffer == Some(framebuffer) {
            self.bind_framebuffer(None);
        }
        self.api.delete_framebuffer(framebuffer);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("size", &(self.width, self.height))
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
