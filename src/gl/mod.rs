//! Graphics-API boundary.
//!
//! The render core never talks to a concrete graphics library. Everything it
//! needs from the GPU - buffer and texture lifecycle, shader compilation and
//! reflection, framebuffer plumbing, draw calls - is enumerated by the
//! [`GlApi`] trait and driven through a [`Context`] wrapper that owns the
//! binding-state mirror. A backend implements `GlApi` by forwarding to a real
//! GL-style API; [`headless::HeadlessApi`] implements it with plain
//! bookkeeping so the whole pipeline runs on CI without a device.
//!
//! Errors at this boundary surface as queryable log strings (compile and link
//! logs), never as panics.

pub mod context;
pub mod headless;
pub mod state;

pub use context::Context;
pub use state::{BlendEquationState, BlendFuncState, GlState, Viewport};

use bitflags::bitflags;

// ============================================================================
// Object handles
// ============================================================================

macro_rules! gl_handle {
    ($(#[$doc:meta] $name:ident),* $(,)?) => {
        $(
            #[$doc]
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u32);
        )*
    };
}

gl_handle! {
    /// Backend handle for a vertex or index buffer object.
    BufferId,
    /// Backend handle for a vertex-array object.
    VertexArrayId,
    /// Backend handle for a shader object (pre-link).
    ShaderId,
    /// Backend handle for a linked program object.
    ProgramId,
    /// Backend handle for a texture object.
    TextureId,
    /// Backend handle for a framebuffer object.
    FramebufferId,
    /// Backend handle for a renderbuffer object.
    RenderbufferId,
    /// Backend handle for one active uniform location within a program.
    UniformLocation,
}

// ============================================================================
// Typed enums replacing raw GLenums
// ============================================================================

/// Numeric element type of an attribute or index stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    U16,
    U32,
    F32,
}

impl DataType {
    /// Size of one element in bytes.
    #[must_use]
    pub fn byte_size(self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }
}

/// Buffer binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data.
    ElementArray,
}

/// Upload frequency hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
    Stream,
}

/// Primitive assembly mode for draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Shader stage selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

/// Toggleable pipeline capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    CullFace,
    DepthTest,
}

/// Blend factor for source or destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend equation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Which faces get culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    Front,
    #[default]
    Back,
    FrontAndBack,
}

/// Winding order that counts as front-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}

impl FrontFace {
    /// The opposite winding, used when a negative-determinant world transform
    /// mirrors the geometry.
    #[must_use]
    pub fn inverted(self) -> Self {
        match self {
            Self::Ccw => Self::Cw,
            Self::Cw => Self::Ccw,
        }
    }
}

/// Depth comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Texture binding target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureTarget {
    #[default]
    D2,
    Cube,
}

/// Upload destination: the 2D target or one cube face (0..6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFace {
    D2,
    Cube(u8),
}

/// Texel layout of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba,
    Rgb,
    Luminance,
    Alpha,
    DepthComponent,
    DepthComponent16,
    DepthStencil,
}

/// Component type of a texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexelType {
    #[default]
    UnsignedByte,
    UnsignedInt,
    HalfFloat,
    Float,
}

/// Texture minification / magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

/// Texture coordinate wrap mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Pixel-store parameter applied before uploads.
///
/// These are upload-time settings, not persistent GPU object state, which is
/// why the context re-applies them defensively through its mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelStore {
    FlipY(bool),
    PremultiplyAlpha(bool),
    UnpackAlignment(u32),
}

/// Framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    Depth,
    Stencil,
    DepthStencil,
}

/// Renderbuffer storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderbufferFormat {
    DepthComponent16,
    StencilIndex8,
    DepthStencil,
}

bitflags! {
    /// Buffers selected by a clear call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearMask: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// GLSL type of an active uniform or attribute, as reported by reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslType {
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    Bool,
    BoolVec2,
    BoolVec3,
    BoolVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl GlslType {
    /// Number of scalar components of one element of this type.
    #[must_use]
    pub fn components(self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Bool | Self::Sampler2D | Self::SamplerCube => 1,
            Self::FloatVec2 | Self::IntVec2 | Self::BoolVec2 => 2,
            Self::FloatVec3 | Self::IntVec3 | Self::BoolVec3 => 3,
            Self::FloatVec4 | Self::IntVec4 | Self::BoolVec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    /// Number of consecutive attribute locations this type occupies.
    ///
    /// Matrix-typed vertex inputs are bound one column per location.
    #[must_use]
    pub fn attribute_locations(self) -> u32 {
        match self {
            Self::Mat2 => 2,
            Self::Mat3 => 3,
            Self::Mat4 => 4,
            _ => 1,
        }
    }

    /// Whether the uniform consumes a texture unit.
    #[must_use]
    pub fn is_sampler(self) -> bool {
        matches!(self, Self::Sampler2D | Self::SamplerCube)
    }

    /// Whether values of this type are submitted as integers.
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int
                | Self::IntVec2
                | Self::IntVec3
                | Self::IntVec4
                | Self::Bool
                | Self::BoolVec2
                | Self::BoolVec3
                | Self::BoolVec4
                | Self::Sampler2D
                | Self::SamplerCube
        )
    }
}

/// One active uniform or attribute discovered by program reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderInput {
    /// Name as reported by the backend (arrays end in `[0]`).
    pub name: String,
    /// GLSL type.
    pub ty: GlslType,
    /// Array length (1 for non-arrays).
    pub size: u32,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Device capabilities detected once at context construction.
///
/// A missing capability never fails the frame: the core substitutes a
/// polyfill code path (re-binding attributes per draw when vertex arrays are
/// unavailable) or a graceful downgrade (non-instanced draws, a single color
/// attachment, no mipmaps on NPOT textures) with a throttled diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub vertex_arrays: bool,
    pub instancing: bool,
    pub draw_buffers: bool,
    pub depth_texture: bool,
    /// Whether mipmaps can be generated for non-power-of-two textures.
    pub npot_mipmaps: bool,
    pub max_texture_units: u32,
    pub max_color_attachments: u32,
    /// 0.0 when anisotropic filtering is unsupported.
    pub max_anisotropy: f32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            vertex_arrays: true,
            instancing: true,
            draw_buffers: true,
            depth_texture: true,
            npot_mipmaps: true,
            max_texture_units: 16,
            max_color_attachments: 8,
            max_anisotropy: 16.0,
        }
    }
}

// ============================================================================
// The backend trait
// ============================================================================

/// The full set of primitives the render core calls on a graphics backend.
///
/// Semantics follow the GL model: objects are created, bound, then operated
/// on through the binding point; state is global and sticky. Implementations
/// must be synchronous and must surface shader errors through the returned
/// log strings rather than panicking.
///
/// State-changing entry points (`bind_*`, `enable`, blend/depth/cull setters,
/// `use_program`, `active_texture`, `pixel_store`, `viewport`) are only ever
/// invoked through [`Context`], which consults its state mirror first; a
/// backend does not need its own redundancy filtering.
pub trait GlApi {
    /// Queried once when the [`Context`] is constructed.
    fn capabilities(&self) -> Capabilities;

    // --- buffers ---
    fn create_buffer(&mut self) -> BufferId;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>);
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: u32, data: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);

    // --- vertex arrays ---
    fn create_vertex_array(&mut self) -> VertexArrayId;
    fn bind_vertex_array(&mut self, vao: Option<VertexArrayId>);
    fn delete_vertex_array(&mut self, vao: VertexArrayId);
    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        size: u32,
        ty: DataType,
        normalized: bool,
        stride: u32,
        offset: u32,
    );
    fn enable_vertex_attrib(&mut self, location: u32);
    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32);

    // --- shaders & programs ---
    /// Compiles a shader, returning the object plus the compile log
    /// (empty on clean compiles).
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> (ShaderId, String);
    /// Links a program from compiled stages. `None` with a log on failure.
    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId)
    -> (Option<ProgramId>, String);
    fn delete_shader(&mut self, shader: ShaderId);
    fn delete_program(&mut self, program: ProgramId);
    /// Whether a previously linked program object is still valid for this
    /// context (context loss invalidates programs).
    fn is_program(&self, program: ProgramId) -> bool;
    fn use_program(&mut self, program: Option<ProgramId>);

    // --- reflection ---
    fn active_uniforms(&self, program: ProgramId) -> Vec<ShaderInput>;
    fn active_attributes(&self, program: ProgramId) -> Vec<ShaderInput>;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32>;

    // --- uniforms ---
    fn uniform1f(&mut self, location: UniformLocation, v: f32);
    fn uniform1fv(&mut self, location: UniformLocation, v: &[f32]);
    fn uniform2fv(&mut self, location: UniformLocation, v: &[f32]);
    fn uniform3fv(&mut self, location: UniformLocation, v: &[f32]);
    fn uniform4fv(&mut self, location: UniformLocation, v: &[f32]);
    fn uniform1i(&mut self, location: UniformLocation, v: i32);
    fn uniform1iv(&mut self, location: UniformLocation, v: &[i32]);
    fn uniform2iv(&mut self, location: UniformLocation, v: &[i32]);
    fn uniform3iv(&mut self, location: UniformLocation, v: &[i32]);
    fn uniform4iv(&mut self, location: UniformLocation, v: &[i32]);
    fn uniform_matrix2fv(&mut self, location: UniformLocation, v: &[f32]);
    fn uniform_matrix3fv(&mut self, location: UniformLocation, v: &[f32]);
    fn uniform_matrix4fv(&mut self, location: UniformLocation, v: &[f32]);

    // --- global state ---
    fn enable(&mut self, cap: Capability);
    fn disable(&mut self, cap: Capability);
    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);
    fn blend_func_separate(
        &mut self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn blend_equation(&mut self, mode: BlendEquation);
    fn blend_equation_separate(&mut self, rgb: BlendEquation, alpha: BlendEquation);
    fn cull_face(&mut self, face: CullFace);
    fn front_face(&mut self, dir: FrontFace);
    fn depth_mask(&mut self, enabled: bool);
    fn depth_func(&mut self, func: DepthFunc);
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn clear(&mut self, mask: ClearMask);
    fn pixel_store(&mut self, param: PixelStore);

    // --- textures ---
    fn create_texture(&mut self) -> TextureId;
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>);
    fn delete_texture(&mut self, texture: TextureId);
    fn tex_min_filter(&mut self, target: TextureTarget, filter: TextureFilter);
    fn tex_mag_filter(&mut self, target: TextureTarget, filter: TextureFilter);
    fn tex_wrap_s(&mut self, target: TextureTarget, wrap: TextureWrap);
    fn tex_wrap_t(&mut self, target: TextureTarget, wrap: TextureWrap);
    fn tex_anisotropy(&mut self, target: TextureTarget, value: f32);
    /// Uploads one level of texel data; `None` allocates empty storage.
    fn tex_image_2d(
        &mut self,
        face: TextureFace,
        level: u32,
        internal_format: TextureFormat,
        width: u32,
        height: u32,
        format: TextureFormat,
        ty: TexelType,
        data: Option<&[u8]>,
    );
    fn compressed_tex_image_2d(
        &mut self,
        face: TextureFace,
        level: u32,
        internal_format: TextureFormat,
        width: u32,
        height: u32,
        data: &[u8],
    );
    fn generate_mipmap(&mut self, target: TextureTarget);

    // --- framebuffers & renderbuffers ---
    fn create_framebuffer(&mut self) -> FramebufferId;
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    fn framebuffer_texture(
        &mut self,
        attachment: Attachment,
        target: TextureTarget,
        texture: TextureId,
    );
    fn create_renderbuffer(&mut self) -> RenderbufferId;
    fn bind_renderbuffer(&mut self, renderbuffer: Option<RenderbufferId>);
    fn renderbuffer_storage(&mut self, format: RenderbufferFormat, width: u32, height: u32);
    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: RenderbufferId);
    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId);
    /// Declares which color attachments fragment outputs map to.
    fn draw_buffers(&mut self, attachments: &[Attachment]);

    // --- draw calls ---
    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32);
    fn draw_elements(&mut self, mode: DrawMode, count: u32, ty: DataType, byte_offset: u32);
    fn draw_arrays_instanced(&mut self, mode: DrawMode, first: u32, count: u32, instances: u32);
    fn draw_elements_instanced(
        &mut self,
        mode: DrawMode,
        count: u32,
        ty: DataType,
        byte_offset: u32,
        instances: u32,
    );

    // --- downcasting (test/backend inspection) ---
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
