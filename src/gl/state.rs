//! Binding-state mirror.
//!
//! The underlying graphics API holds implicit global state; re-submitting a
//! value that is already current costs a driver call for nothing. [`GlState`]
//! mirrors every piece of state the core touches so that [`super::Context`]
//! setters can elide redundant calls. Setters update the mirror and the
//! backend in the same step - the two are never allowed to drift apart.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{
    BlendEquation, BlendFactor, BufferId, Capability, CullFace, DepthFunc, FramebufferId,
    FrontFace, TextureId, UniformLocation, VertexArrayId,
};

/// Blend factors currently configured, with optional separate alpha factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendFuncState {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub src_alpha: Option<BlendFactor>,
    pub dst_alpha: Option<BlendFactor>,
}

impl Default for BlendFuncState {
    fn default() -> Self {
        Self {
            src: BlendFactor::One,
            dst: BlendFactor::Zero,
            src_alpha: None,
            dst_alpha: None,
        }
    }
}

/// Blend equation currently configured, with optional separate alpha mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlendEquationState {
    pub rgb: BlendEquation,
    pub alpha: Option<BlendEquation>,
}

/// Current viewport rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Cached value last submitted to a uniform location, for call elision.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CachedUniform {
    Floats(SmallVec<[f32; 16]>),
    Ints(SmallVec<[i32; 4]>),
}

/// Mirror of the backend's mutable global state.
#[derive(Debug)]
pub struct GlState {
    pub blend_func: BlendFuncState,
    pub blend_equation: BlendEquationState,

    /// `None` until the first explicit cull-face call.
    pub cull_face: Option<CullFace>,
    pub front_face: FrontFace,

    pub depth_mask: bool,
    pub depth_func: DepthFunc,

    /// Capability toggles; absent entries have never been set.
    pub(crate) enabled: FxHashMap<Capability, bool>,

    // Pixel-store values are upload-time settings, not GPU object state,
    // so they are tracked here and re-applied defensively.
    pub flip_y: bool,
    pub premultiply_alpha: bool,
    pub unpack_alignment: u32,

    pub framebuffer: Option<FramebufferId>,
    pub viewport: Viewport,

    /// Texture bound per unit.
    pub(crate) texture_units: FxHashMap<u32, TextureId>,
    pub active_texture_unit: u32,

    pub bound_buffer: Option<BufferId>,
    pub current_vao: Option<VertexArrayId>,

    /// Id of the program-data entry whose program object is active.
    pub current_program: Option<u32>,

    /// Last value submitted per (program-data id, location).
    pub(crate) uniform_values: FxHashMap<(u32, UniformLocation), CachedUniform>,
}

impl Default for GlState {
    fn default() -> Self {
        Self::new()
    }
}

impl GlState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blend_func: BlendFuncState::default(),
            blend_equation: BlendEquationState::default(),
            cull_face: None,
            front_face: FrontFace::Ccw,
            depth_mask: true,
            depth_func: DepthFunc::Less,
            enabled: FxHashMap::default(),
            flip_y: false,
            premultiply_alpha: false,
            unpack_alignment: 4,
            framebuffer: None,
            viewport: Viewport::default(),
            texture_units: FxHashMap::default(),
            active_texture_unit: 0,
            bound_buffer: None,
            current_vao: None,
            current_program: None,
            uniform_values: FxHashMap::default(),
        }
    }

    /// Whether a capability is known to be enabled.
    #[must_use]
    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.enabled.get(&cap).copied().unwrap_or(false)
    }
}
