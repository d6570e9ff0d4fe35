//! Headless backend.
//!
//! [`HeadlessApi`] implements [`GlApi`] with plain bookkeeping: handles come
//! from a counter, object state lives in hash maps, draw calls append to a
//! log. It exists so the whole render pipeline - resource lifecycle, state
//! elision, sorting, the prepare/draw two-phase - can run and be asserted on
//! a machine with no GPU, and it doubles as a null renderer.
//!
//! Shader "reflection" is a naive declaration scan: lines of the form
//! `uniform <type> <name>;` and `attribute`/`in` declarations are collected
//! verbatim, with `name[N]` reported as `name[0]` of size N the way real
//! drivers do. Struct members must be declared pre-expanded
//! (`uniform vec3 lights[0].color;`), which is all the addressing layer
//! needs. A `#error` directive anywhere in a source fails its compile with a
//! log, and linking with a failed stage fails the link.

use rustc_hash::FxHashMap;

use super::{
    Attachment, BlendEquation, BlendFactor, BufferId, BufferTarget, BufferUsage, Capabilities,
    Capability, ClearMask, CullFace, DataType, DepthFunc, DrawMode, FramebufferId, FrontFace,
    GlApi, GlslType, PixelStore, ProgramId, RenderbufferFormat, RenderbufferId, ShaderId,
    ShaderInput, ShaderStage, TexelType, TextureFace, TextureFilter, TextureFormat, TextureId,
    TextureTarget, TextureWrap, UniformLocation, VertexArrayId,
};

/// Recorded state of a buffer object.
#[derive(Debug, Default, Clone)]
pub struct BufferRecord {
    pub size: usize,
    pub uploads: u32,
    pub sub_uploads: u32,
}

/// Recorded state of a texture object.
#[derive(Debug, Default, Clone)]
pub struct TextureRecord {
    pub width: u32,
    pub height: u32,
    /// Number of `tex_image_2d` / compressed uploads received.
    pub uploads: u32,
    /// Whether the last upload carried texel data (as opposed to empty
    /// storage allocation).
    pub has_data: bool,
    pub mipmapped: bool,
    pub compressed_levels: u32,
    pub min_filter: Option<TextureFilter>,
    pub mag_filter: Option<TextureFilter>,
    pub wrap_s: Option<TextureWrap>,
    pub wrap_t: Option<TextureWrap>,
    pub anisotropy: f32,
}

/// Recorded attachments of a framebuffer object.
#[derive(Debug, Default, Clone)]
pub struct FramebufferRecord {
    pub color: FxHashMap<u32, TextureId>,
    pub depth_texture: Option<TextureId>,
    pub depth_renderbuffer: Option<RenderbufferId>,
    pub stencil_renderbuffer: Option<RenderbufferId>,
    pub depth_stencil_renderbuffer: Option<RenderbufferId>,
    pub draw_buffers: Vec<Attachment>,
}

/// Recorded state of a renderbuffer object.
#[derive(Debug, Clone)]
pub struct RenderbufferRecord {
    pub format: RenderbufferFormat,
    pub width: u32,
    pub height: u32,
}

/// One recorded draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRecord {
    pub mode: DrawMode,
    pub count: u32,
    /// `first` for array draws, byte offset for indexed draws.
    pub first_or_offset: u32,
    pub indexed: bool,
    pub instances: Option<u32>,
    /// Program-data object active when the draw was issued.
    pub program: Option<ProgramId>,
}

/// Counters for state-changing calls, used to assert call elision.
#[derive(Debug, Default, Clone)]
pub struct CallCounts {
    pub enable: u32,
    pub disable: u32,
    pub blend_func: u32,
    pub blend_equation: u32,
    pub cull_face: u32,
    pub front_face: u32,
    pub depth_mask: u32,
    pub depth_func: u32,
    pub use_program: u32,
    pub bind_buffer: u32,
    pub bind_vertex_array: u32,
    pub bind_framebuffer: u32,
    pub bind_texture: u32,
    pub active_texture: u32,
    pub pixel_store: u32,
    pub uniform: u32,
    pub viewport: u32,
    pub clear: u32,
}

#[derive(Debug)]
struct ShaderRecord {
    source: String,
    stage: ShaderStage,
    failed: bool,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    uniforms: Vec<ShaderInput>,
    attributes: Vec<ShaderInput>,
    uniform_locations: FxHashMap<String, UniformLocation>,
    attribute_locations: FxHashMap<String, u32>,
}

/// A [`GlApi`] backend that tracks object state instead of driving a GPU.
#[derive(Debug, Default)]
pub struct HeadlessApi {
    caps: Capabilities,
    next_id: u32,

    buffers: FxHashMap<BufferId, BufferRecord>,
    vaos: FxHashMap<VertexArrayId, ()>,
    shaders: FxHashMap<ShaderId, ShaderRecord>,
    programs: FxHashMap<ProgramId, ProgramRecord>,
    textures: FxHashMap<TextureId, TextureRecord>,
    framebuffers: FxHashMap<FramebufferId, FramebufferRecord>,
    renderbuffers: FxHashMap<RenderbufferId, RenderbufferRecord>,

    bound_buffers: FxHashMap<BufferTarget, BufferId>,
    bound_textures: FxHashMap<(u32, TextureTarget), TextureId>,
    active_unit: u32,
    bound_framebuffer: Option<FramebufferId>,
    bound_renderbuffer: Option<RenderbufferId>,
    current_program: Option<ProgramId>,

    draws: Vec<DrawRecord>,
    counts: CallCounts,
    events: Vec<&'static str>,
}

impl HeadlessApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend reporting the given capability set, for exercising
    /// downgrade paths.
    #[must_use]
    pub fn with_capabilities(caps: Capabilities) -> Self {
        Self {
            caps,
            ..Self::default()
        }
    }

    fn alloc(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    // ------------------------------------------------------------------
    // Inspection (for tests and tooling)
    // ------------------------------------------------------------------

    #[must_use]
    pub fn buffer(&self, id: BufferId) -> Option<&BufferRecord> {
        self.buffers.get(&id)
    }

    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&TextureRecord> {
        self.textures.get(&id)
    }

    #[must_use]
    pub fn framebuffer(&self, id: FramebufferId) -> Option<&FramebufferRecord> {
        self.framebuffers.get(&id)
    }

    #[must_use]
    pub fn renderbuffer(&self, id: RenderbufferId) -> Option<&RenderbufferRecord> {
        self.renderbuffers.get(&id)
    }

    #[must_use]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
        self.events.clear();
    }

    /// Coarse ordered log of upload/link/draw events, for asserting
    /// scheduling invariants (uploads complete before draws).
    #[must_use]
    pub fn events(&self) -> &[&'static str] {
        &self.events
    }

    #[must_use]
    pub fn counts(&self) -> &CallCounts {
        &self.counts
    }

    #[must_use]
    pub fn alive_programs(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn alive_buffers(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn alive_textures(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn alive_renderbuffers(&self) -> usize {
        self.renderbuffers.len()
    }

    #[must_use]
    pub fn alive_vertex_arrays(&self) -> usize {
        self.vaos.len()
    }

    /// Simulates context loss: every linked program object becomes invalid.
    pub fn invalidate_programs(&mut self) {
        self.programs.clear();
    }

    fn link_reflection(&self, vertex: ShaderId, fragment: ShaderId) -> ProgramRecord {
        let mut record = ProgramRecord::default();
        let mut next_location = 0u32;

        for id in [vertex, fragment] {
            let Some(shader) = self.shaders.get(&id) else {
                continue;
            };
            let (uniforms, attributes) = scan_declarations(&shader.source, shader.stage);
            for input in uniforms {
                if record.uniform_locations.contains_key(&input.name) {
                    continue;
                }
                record
                    .uniform_locations
                    .insert(input.name.clone(), UniformLocation(next_location));
                next_location += 1;
                record.uniforms.push(input);
            }
            for input in attributes {
                if record.attribute_locations.contains_key(&input.name) {
                    continue;
                }
                let location = record.attribute_locations.len() as u32;
                record
                    .attribute_locations
                    .insert(input.name.clone(), location);
                record.attributes.push(input);
            }
        }
        record
    }
}

impl GlApi for HeadlessApi {
    fn capabilities(&self) -> Capabilities {
        self.caps.clone()
    }

    // --- buffers ---

    fn create_buffer(&mut self) -> BufferId {
        let id = BufferId(self.alloc());
        self.buffers.insert(id, BufferRecord::default());
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.counts.bind_buffer += 1;
        match buffer {
            Some(id) => {
                self.bound_buffers.insert(target, id);
            }
            None => {
                self.bound_buffers.remove(&target);
            }
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], _usage: BufferUsage) {
        self.events.push("buffer_data");
        if let Some(record) = self
            .bound_buffers
            .get(&target)
            .and_then(|id| self.buffers.get_mut(id))
        {
            record.size = data.len();
            record.uploads += 1;
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, _offset: u32, _data: &[u8]) {
        self.events.push("buffer_sub_data");
        if let Some(record) = self
            .bound_buffers
            .get(&target)
            .and_then(|id| self.buffers.get_mut(id))
        {
            record.sub_uploads += 1;
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
        self.bound_buffers.retain(|_, bound| *bound != buffer);
    }

    // --- vertex arrays ---

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = VertexArrayId(self.alloc());
        self.vaos.insert(id, ());
        id
    }

    fn bind_vertex_array(&mut self, _vao: Option<VertexArrayId>) {
        self.counts.bind_vertex_array += 1;
    }

    fn delete_vertex_array(&mut self, vao: VertexArrayId) {
        self.vaos.remove(&vao);
    }

    fn vertex_attrib_pointer(
        &mut self,
        _location: u32,
        _size: u32,
        _ty: DataType,
        _normalized: bool,
        _stride: u32,
        _offset: u32,
    ) {
    }

    fn enable_vertex_attrib(&mut self, _location: u32) {}

    fn vertex_attrib_divisor(&mut self, _location: u32, _divisor: u32) {}

    // --- shaders & programs ---

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> (ShaderId, String) {
        let id = ShaderId(self.alloc());
        let failed = source.contains("#error");
        let log = if failed {
            format!("ERROR: 0:1: '#error' directive in {} shader", stage.label())
        } else {
            String::new()
        };
        self.shaders.insert(
            id,
            ShaderRecord {
                source: source.to_owned(),
                stage,
                failed,
            },
        );
        (id, log)
    }

    fn link_program(
        &mut self,
        vertex: ShaderId,
        fragment: ShaderId,
    ) -> (Option<ProgramId>, String) {
        self.events.push("link_program");
        let any_failed = [vertex, fragment]
            .iter()
            .any(|id| self.shaders.get(id).is_none_or(|s| s.failed));
        if any_failed {
            return (None, "link failed: attached shader did not compile".into());
        }
        let record = self.link_reflection(vertex, fragment);
        let id = ProgramId(self.alloc());
        self.programs.insert(id, record);
        (Some(id), String::new())
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn is_program(&self, program: ProgramId) -> bool {
        self.programs.contains_key(&program)
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.counts.use_program += 1;
        self.current_program = program;
    }

    // --- reflection ---

    fn active_uniforms(&self, program: ProgramId) -> Vec<ShaderInput> {
        self.programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<ShaderInput> {
        self.programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs
            .get(&program)
            .and_then(|p| p.uniform_locations.get(name).copied())
    }

    fn attribute_location(&self, program: ProgramId, name: &str) -> Option<u32> {
        self.programs
            .get(&program)
            .and_then(|p| p.attribute_locations.get(name).copied())
    }

    // --- uniforms ---

    fn uniform1f(&mut self, _location: UniformLocation, _v: f32) {
        self.counts.uniform += 1;
    }
    fn uniform1fv(&mut self, _location: UniformLocation, _v: &[f32]) {
        self.counts.uniform += 1;
    }
    fn uniform2fv(&mut self, _location: UniformLocation, _v: &[f32]) {
        self.counts.uniform += 1;
    }
    fn uniform3fv(&mut self, _location: UniformLocation, _v: &[f32]) {
        self.counts.uniform += 1;
    }
    fn uniform4fv(&mut self, _location: UniformLocation, _v: &[f32]) {
        self.counts.uniform += 1;
    }
    fn uniform1i(&mut self, _location: UniformLocation, _v: i32) {
        self.counts.uniform += 1;
    }
    fn uniform1iv(&mut self, _location: UniformLocation, _v: &[i32]) {
        self.counts.uniform += 1;
    }
    fn uniform2iv(&mut self, _location: UniformLocation, _v: &[i32]) {
        self.counts.uniform += 1;
    }
    fn uniform3iv(&mut self, _location: UniformLocation, _v: &[i32]) {
        self.counts.uniform += 1;
    }
    fn uniform4iv(&mut self, _location: UniformLocation, _v: &[i32]) {
        self.counts.uniform += 1;
    }
    fn uniform_matrix2fv(&mut self, _location: UniformLocation, _v: &[f32]) {
        self.counts.uniform += 1;
    }
    fn uniform_matrix3fv(&mut self, _location: UniformLocation, _v: &[f32]) {
        self.counts.uniform += 1;
    }
    fn uniform_matrix4fv(&mut self, _location: UniformLocation, _v: &[f32]) {
        self.counts.uniform += 1;
    }

    // --- global state ---

    fn enable(&mut self, _cap: Capability) {
        self.counts.enable += 1;
    }
    fn disable(&mut self, _cap: Capability) {
        self.counts.disable += 1;
    }
    fn blend_func(&mut self, _src: BlendFactor, _dst: BlendFactor) {
        self.counts.blend_func += 1;
    }
    fn blend_func_separate(
        &mut self,
        _src: BlendFactor,
        _dst: BlendFactor,
        _src_alpha: BlendFactor,
        _dst_alpha: BlendFactor,
    ) {
        self.counts.blend_func += 1;
    }
    fn blend_equation(&mut self, _mode: BlendEquation) {
        self.counts.blend_equation += 1;
    }
    fn blend_equation_separate(&mut self, _rgb: BlendEquation, _alpha: BlendEquation) {
        self.counts.blend_equation += 1;
    }
    fn cull_face(&mut self, _face: CullFace) {
        self.counts.cull_face += 1;
    }
    fn front_face(&mut self, _dir: FrontFace) {
        self.counts.front_face += 1;
    }
    fn depth_mask(&mut self, _enabled: bool) {
        self.counts.depth_mask += 1;
    }
    fn depth_func(&mut self, _func: DepthFunc) {
        self.counts.depth_func += 1;
    }
    fn viewport(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {
        self.counts.viewport += 1;
    }
    fn clear(&mut self, _mask: ClearMask) {
        self.counts.clear += 1;
    }
    fn pixel_store(&mut self, _param: PixelStore) {
        self.counts.pixel_store += 1;
    }

    // --- textures ---

    fn create_texture(&mut self) -> TextureId {
        let id = TextureId(self.alloc());
        self.textures.insert(id, TextureRecord::default());
        id
    }

    fn active_texture(&mut self, unit: u32) {
        self.counts.active_texture += 1;
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) {
        self.counts.bind_texture += 1;
        let slot = (self.active_unit, target);
        match texture {
            Some(id) => {
                self.bound_textures.insert(slot, id);
            }
            None => {
                self.bound_textures.remove(&slot);
            }
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.bound_textures.retain(|_, bound| *bound != texture);
        for fb in self.framebuffers.values_mut() {
            fb.color.retain(|_, attached| *attached != texture);
            if fb.depth_texture == Some(texture) {
                fb.depth_texture = None;
            }
        }
    }

    fn tex_min_filter(&mut self, target: TextureTarget, filter: TextureFilter) {
        if let Some(record) = self.bound_texture_record(target) {
            record.min_filter = Some(filter);
        }
    }

    fn tex_mag_filter(&mut self, target: TextureTarget, filter: TextureFilter) {
        if let Some(record) = self.bound_texture_record(target) {
            record.mag_filter = Some(filter);
        }
    }

    fn tex_wrap_s(&mut self, target: TextureTarget, wrap: TextureWrap) {
        if let Some(record) = self.bound_texture_record(target) {
            record.wrap_s = Some(wrap);
        }
    }

    fn tex_wrap_t(&mut self, target: TextureTarget, wrap: TextureWrap) {
        if let Some(record) = self.bound_texture_record(target) {
            record.wrap_t = Some(wrap);
        }
    }

    fn tex_anisotropy(&mut self, target: TextureTarget, value: f32) {
        if let Some(record) = self.bound_texture_record(target) {
            record.anisotropy = value;
        }
    }

    fn tex_image_2d(
        &mut self,
        face: TextureFace,
        _level: u32,
        _internal_format: TextureFormat,
        width: u32,
        height: u32,
        _format: TextureFormat,
        _ty: TexelType,
        data: Option<&[u8]>,
    ) {
        let target = face_target(face);
        self.events.push("tex_image");
        if let Some(record) = self.bound_texture_record(target) {
            record.width = width;
            record.height = height;
            record.uploads += 1;
            record.has_data = data.is_some();
        }
    }

    fn compressed_tex_image_2d(
        &mut self,
        face: TextureFace,
        level: u32,
        _internal_format: TextureFormat,
        width: u32,
        height: u32,
        _data: &[u8],
    ) {
        let target = face_target(face);
        if let Some(record) = self.bound_texture_record(target) {
            if level == 0 {
                record.width = width;
                record.height = height;
            }
            record.uploads += 1;
            record.has_data = true;
            record.compressed_levels = record.compressed_levels.max(level + 1);
        }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        if let Some(record) = self.bound_texture_record(target) {
            record.mipmapped = true;
        }
    }

    // --- framebuffers & renderbuffers ---

    fn create_framebuffer(&mut self) -> FramebufferId {
        let id = FramebufferId(self.alloc());
        self.framebuffers.insert(id, FramebufferRecord::default());
        id
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.counts.bind_framebuffer += 1;
        self.bound_framebuffer = framebuffer;
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn framebuffer_texture(
        &mut self,
        attachment: Attachment,
        _target: TextureTarget,
        texture: TextureId,
    ) {
        if let Some(fb) = self
            .bound_framebuffer
            .and_then(|id| self.framebuffers.get_mut(&id))
        {
            match attachment {
                Attachment::Color(i) => {
                    fb.color.insert(i, texture);
                }
                Attachment::Depth => fb.depth_texture = Some(texture),
                Attachment::Stencil | Attachment::DepthStencil => {}
            }
        }
    }

    fn create_renderbuffer(&mut self) -> RenderbufferId {
        let id = RenderbufferId(self.alloc());
        self.renderbuffers.insert(
            id,
            RenderbufferRecord {
                format: RenderbufferFormat::DepthComponent16,
                width: 0,
                height: 0,
            },
        );
        id
    }

    fn bind_renderbuffer(&mut self, renderbuffer: Option<RenderbufferId>) {
        self.bound_renderbuffer = renderbuffer;
    }

    fn renderbuffer_storage(&mut self, format: RenderbufferFormat, width: u32, height: u32) {
        if let Some(record) = self
            .bound_renderbuffer
            .and_then(|id| self.renderbuffers.get_mut(&id))
        {
            record.format = format;
            record.width = width;
            record.height = height;
        }
    }

    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: RenderbufferId) {
        if let Some(fb) = self
            .bound_framebuffer
            .and_then(|id| self.framebuffers.get_mut(&id))
        {
            match attachment {
                Attachment::Depth => fb.depth_renderbuffer = Some(renderbuffer),
                Attachment::Stencil => fb.stencil_renderbuffer = Some(renderbuffer),
                Attachment::DepthStencil => fb.depth_stencil_renderbuffer = Some(renderbuffer),
                Attachment::Color(_) => {}
            }
        }
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.renderbuffers.remove(&renderbuffer);
        if self.bound_renderbuffer == Some(renderbuffer) {
            self.bound_renderbuffer = None;
        }
        // A deleted renderbuffer is detached wherever it was attached.
        for fb in self.framebuffers.values_mut() {
            if fb.depth_renderbuffer == Some(renderbuffer) {
                fb.depth_renderbuffer = None;
            }
            if fb.stencil_renderbuffer == Some(renderbuffer) {
                fb.stencil_renderbuffer = None;
            }
            if fb.depth_stencil_renderbuffer == Some(renderbuffer) {
                fb.depth_stencil_renderbuffer = None;
            }
        }
    }

    fn draw_buffers(&mut self, attachments: &[Attachment]) {
        if let Some(fb) = self
            .bound_framebuffer
            .and_then(|id| self.framebuffers.get_mut(&id))
        {
            fb.draw_buffers = attachments.to_vec();
        }
    }

    // --- draw calls ---

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.events.push("draw");
        self.draws.push(DrawRecord {
            mode,
            count,
            first_or_offset: first,
            indexed: false,
            instances: None,
            program: self.current_program,
        });
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, _ty: DataType, byte_offset: u32) {
        self.events.push("draw");
        self.draws.push(DrawRecord {
            mode,
            count,
            first_or_offset: byte_offset,
            indexed: true,
            instances: None,
            program: self.current_program,
        });
    }

    fn draw_arrays_instanced(&mut self, mode: DrawMode, first: u32, count: u32, instances: u32) {
        self.events.push("draw");
        self.draws.push(DrawRecord {
            mode,
            count,
            first_or_offset: first,
            indexed: false,
            instances: Some(instances),
            program: self.current_program,
        });
    }

    fn draw_elements_instanced(
        &mut self,
        mode: DrawMode,
        count: u32,
        _ty: DataType,
        byte_offset: u32,
        instances: u32,
    ) {
        self.events.push("draw");
        self.draws.push(DrawRecord {
            mode,
            count,
            first_or_offset: byte_offset,
            indexed: true,
            instances: Some(instances),
            program: self.current_program,
        });
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl HeadlessApi {
    fn bound_texture_record(&mut self, target: TextureTarget) -> Option<&mut TextureRecord> {
        let id = self.bound_textures.get(&(self.active_unit, target))?;
        self.textures.get_mut(id)
    }
}

fn face_target(face: TextureFace) -> TextureTarget {
    match face {
        TextureFace::D2 => TextureTarget::D2,
        TextureFace::Cube(_) => TextureTarget::Cube,
    }
}

// ============================================================================
// Naive GLSL declaration scan
// ============================================================================

fn glsl_type(token: &str) -> Option<GlslType> {
    Some(match token {
        "float" => GlslType::Float,
        "vec2" => GlslType::FloatVec2,
        "vec3" => GlslType::FloatVec3,
        "vec4" => GlslType::FloatVec4,
        "int" => GlslType::Int,
        "ivec2" => GlslType::IntVec2,
        "ivec3" => GlslType::IntVec3,
        "ivec4" => GlslType::IntVec4,
        "bool" => GlslType::Bool,
        "bvec2" => GlslType::BoolVec2,
        "bvec3" => GlslType::BoolVec3,
        "bvec4" => GlslType::BoolVec4,
        "mat2" => GlslType::Mat2,
        "mat3" => GlslType::Mat3,
        "mat4" => GlslType::Mat4,
        "sampler2D" => GlslType::Sampler2D,
        "samplerCube" => GlslType::SamplerCube,
        _ => return None,
    })
}

fn scan_declarations(source: &str, stage: ShaderStage) -> (Vec<ShaderInput>, Vec<ShaderInput>) {
    let mut uniforms = Vec::new();
    let mut attributes = Vec::new();

    for raw in source.lines() {
        let line = raw.trim().trim_end_matches(';');
        let mut tokens = line.split_whitespace();
        let Some(qualifier) = tokens.next() else {
            continue;
        };
        let is_uniform = qualifier == "uniform";
        let is_attribute =
            qualifier == "attribute" || (qualifier == "in" && stage == ShaderStage::Vertex);
        if !is_uniform && !is_attribute {
            continue;
        }
        let Some(ty) = tokens.next().and_then(glsl_type) else {
            continue;
        };
        let Some(raw_name) = tokens.next() else {
            continue;
        };

        // `name[N]` -> reported as `name[0]` with size N, the way drivers
        // report array uniforms. Pre-expanded struct-member names pass
        // through untouched.
        let (name, size) = match raw_name.find('[') {
            Some(open) if raw_name.ends_with(']') && !raw_name.contains('.') => {
                let base = &raw_name[..open];
                let n: u32 = raw_name[open + 1..raw_name.len() - 1].parse().unwrap_or(1);
                (format!("{base}[0]"), n.max(1))
            }
            _ => (raw_name.to_owned(), 1),
        };

        let input = ShaderInput { name, ty, size };
        if is_uniform {
            uniforms.push(input);
        } else {
            attributes.push(input);
        }
    }

    (uniforms, attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_uniforms_and_attributes() {
        let src = "attribute vec3 position;\nattribute vec2 uv;\nuniform mat4 modelMatrix;\nuniform vec3 lightColors[4];\nvoid main() {}";
        let (uniforms, attributes) = scan_declarations(src, ShaderStage::Vertex);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].name, "position");
        assert_eq!(uniforms.len(), 2);
        assert_eq!(uniforms[1].name, "lightColors[0]");
        assert_eq!(uniforms[1].size, 4);
    }

    #[test]
    fn in_qualifier_only_counts_in_vertex_stage() {
        let src = "in vec3 color;";
        let (_, attrs_vs) = scan_declarations(src, ShaderStage::Vertex);
        let (_, attrs_fs) = scan_declarations(src, ShaderStage::Fragment);
        assert_eq!(attrs_vs.len(), 1);
        assert!(attrs_fs.is_empty());
    }
}
