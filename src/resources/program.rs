//! Material-level programs.
//!
//! A [`Program`] owns uniform *values* and render state (blend, cull,
//! depth); the compiled GPU object behind it is shared
//! [`super::ProgramData`], resolved by source identity from the context's
//! registry. Uniform submission goes through a per-location value cache so
//! identical values are never re-sent to the backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::errors::{OpalError, Result};
use crate::gl::state::CachedUniform;
use crate::gl::{
    BlendEquation, BlendEquationState, BlendFactor, BlendFuncState, Capability, Context, CullFace,
    DepthFunc, FrontFace, GlApi, GlslType,
};
use crate::utils::diagnostics::render_warn;

use super::program_data::{ActiveUniform, ProgramReflection, UniformAddress};
use super::texture::Texture;
use super::{ProgramDataKey, TextureKey};

static NEXT_PROGRAM_ID: AtomicU32 = AtomicU32::new(1);

/// An application-supplied uniform value.
///
/// Struct and struct-array values mirror GLSL structs: reflection addresses
/// individual fields through [`UniformAddress`] without re-parsing names.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    Vec2Array(Vec<Vec2>),
    Vec3Array(Vec<Vec3>),
    Vec4Array(Vec<Vec4>),
    Mat4Array(Vec<Mat4>),
    Texture(TextureKey),
    TextureArray(Vec<TextureKey>),
    Struct(FxHashMap<String, UniformValue>),
    StructArray(Vec<FxHashMap<String, UniformValue>>),
}

impl UniformValue {
    /// Flattens the value into `out` as floats. Returns false for values
    /// that are not float-shaped.
    fn write_floats(&self, out: &mut SmallVec<[f32; 16]>) -> bool {
        match self {
            Self::Float(v) => out.push(*v),
            Self::Vec2(v) => out.extend_from_slice(&v.to_array()),
            Self::Vec3(v) => out.extend_from_slice(&v.to_array()),
            Self::Vec4(v) => out.extend_from_slice(&v.to_array()),
            Self::Mat2(m) => out.extend_from_slice(&m.to_cols_array()),
            Self::Mat3(m) => out.extend_from_slice(&m.to_cols_array()),
            Self::Mat4(m) => out.extend_from_slice(&m.to_cols_array()),
            Self::FloatArray(v) => out.extend_from_slice(v),
            Self::Vec2Array(v) => {
                for e in v {
                    out.extend_from_slice(&e.to_array());
                }
            }
            Self::Vec3Array(v) => {
                for e in v {
                    out.extend_from_slice(&e.to_array());
                }
            }
            Self::Vec4Array(v) => {
                for e in v {
                    out.extend_from_slice(&e.to_array());
                }
            }
            Self::Mat4Array(v) => {
                for e in v {
                    out.extend_from_slice(&e.to_cols_array());
                }
            }
            _ => return false,
        }
        true
    }

    /// Flattens the value into `out` as integers. Returns false for values
    /// that are not integer-shaped.
    fn write_ints(&self, out: &mut SmallVec<[i32; 4]>) -> bool {
        match self {
            Self::Int(v) => out.push(*v),
            Self::Bool(v) => out.push(i32::from(*v)),
            Self::IntArray(v) => out.extend_from_slice(v),
            _ => return false,
        }
        true
    }
}

macro_rules! uniform_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

uniform_from! {
    f32 => Float,
    i32 => Int,
    bool => Bool,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat2 => Mat2,
    Mat3 => Mat3,
    Mat4 => Mat4,
    Vec<f32> => FloatArray,
    Vec<i32> => IntArray,
    Vec<Mat4> => Mat4Array,
    TextureKey => Texture,
}

/// Material-level object: uniform values plus render state, backed by shared
/// program data.
#[derive(Debug)]
pub struct Program {
    pub id: u32,

    vertex: String,
    fragment: String,
    uniforms: FxHashMap<String, UniformValue>,

    /// Transparent programs sort into the blended buckets. Setting a blend
    /// function forces this on.
    pub transparent: bool,
    /// `None` disables face culling entirely.
    pub cull_face: Option<CullFace>,
    pub front_face: FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: DepthFunc,

    blend_func: Option<BlendFuncState>,
    blend_equation: BlendEquationState,

    program_data: Option<ProgramDataKey>,
    reflection: Option<Arc<ProgramReflection>>,
    active_context: Option<u32>,
}

impl Program {
    #[must_use]
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        let vertex = vertex.into();
        let fragment = fragment.into();
        if vertex.is_empty() {
            render_warn!("vertex shader source not supplied");
        }
        if fragment.is_empty() {
            render_warn!("fragment shader source not supplied");
        }

        Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            vertex,
            fragment,
            uniforms: FxHashMap::default(),
            transparent: false,
            cull_face: Some(CullFace::Back),
            front_face: FrontFace::Ccw,
            depth_test: true,
            depth_write: true,
            depth_func: DepthFunc::Less,
            blend_func: None,
            blend_equation: BlendEquationState::default(),
            program_data: None,
            reflection: None,
            active_context: None,
        }
    }

    #[must_use]
    pub fn vertex_source(&self) -> &str {
        &self.vertex
    }

    #[must_use]
    pub fn fragment_source(&self) -> &str {
        &self.fragment
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        self.uniforms.insert(name.to_owned(), value.into());
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    #[must_use]
    pub fn uniforms(&self) -> &FxHashMap<String, UniformValue> {
        &self.uniforms
    }

    /// Sets the blend factors. A program with a blend source factor is
    /// transparent by definition.
    pub fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend_func = Some(BlendFuncState {
            src,
            dst,
            src_alpha: None,
            dst_alpha: None,
        });
        self.transparent = true;
    }

    /// Blend factors with separate alpha factors; also marks the program
    /// transparent.
    pub fn set_blend_func_separate(
        &mut self,
        src: BlendFactor,
        dst: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.blend_func = Some(BlendFuncState {
            src,
            dst,
            src_alpha: Some(src_alpha),
            dst_alpha: Some(dst_alpha),
        });
        self.transparent = true;
    }

    pub fn set_blend_equation(&mut self, rgb: BlendEquation, alpha: Option<BlendEquation>) {
        self.blend_equation = BlendEquationState { rgb, alpha };
    }

    #[must_use]
    pub fn blend_func(&self) -> Option<&BlendFuncState> {
        self.blend_func.as_ref()
    }

    /// Reflection of the shared compiled program, available after
    /// [`Program::prepare`] succeeds.
    #[must_use]
    pub fn reflection(&self) -> Option<Arc<ProgramReflection>> {
        self.reflection.clone()
    }

    #[must_use]
    pub fn program_data_key(&self) -> Option<ProgramDataKey> {
        self.program_data
    }

    // ========================================================================
    // GPU preparation & use
    // ========================================================================

    /// Resolves (creating or reusing) the shared program data for this
    /// context and source pair, then prepares every texture referenced by a
    /// supplied uniform the shader actively uses.
    pub fn prepare(
        &mut self,
        ctx: &mut Context,
        textures: &mut SlotMap<TextureKey, Texture>,
    ) -> Result<()> {
        if self.program_data.is_none() || self.active_context != Some(ctx.id()) {
            if let Some(old) = self.program_data.take() {
                ctx.release_program_data(old);
            }
            self.program_data = Some(ctx.acquire_program_data(&self.vertex, &self.fragment));
            self.active_context = Some(ctx.id());
        }
        let Some(key) = self.program_data else {
            return Err(OpalError::ProgramUnavailable);
        };

        let reflection = ctx.prepare_program_data(key)?;
        self.reflection = Some(reflection.clone());

        let mut texture_keys: SmallVec<[TextureKey; 8]> = SmallVec::new();
        for active in &reflection.uniforms {
            match resolve_value(&self.uniforms, active) {
                Some(UniformValue::Texture(key)) => texture_keys.push(*key),
                Some(UniformValue::TextureArray(keys)) => {
                    texture_keys.extend(keys.iter().copied());
                }
                _ => {}
            }
        }
        for key in texture_keys {
            if let Some(texture) = textures.get_mut(key) {
                texture.prepare(ctx);
            } else {
                render_warn!("uniform references a destroyed texture");
            }
        }

        Ok(())
    }

    /// Makes this program current and submits its uniforms and render state.
    ///
    /// Texture-valued uniforms consume sequential texture units. Active
    /// uniforms with no supplied value are skipped with a diagnostic. A
    /// program whose link failed degrades to a silent no-op here.
    /// `flip_faces` temporarily inverts the winding for this draw, used for
    /// negative-determinant world transforms.
    pub fn use_program(
        &self,
        ctx: &mut Context,
        textures: &SlotMap<TextureKey, Texture>,
        flip_faces: bool,
    ) {
        let Some(key) = self.program_data else {
            render_warn!("program {} used before prepare", self.id);
            return;
        };
        let Some(data_id) = ctx.bind_program(key) else {
            // Link failed earlier; the failure was reported once.
            return;
        };
        let Some(reflection) = self.reflection.as_ref() else {
            return;
        };

        let mut texture_unit: u32 = 0;
        for active in &reflection.uniforms {
            let Some(value) = resolve_value(&self.uniforms, active) else {
                render_warn!("active uniform {} has not been supplied", active.name);
                continue;
            };

            match value {
                UniformValue::Texture(texture_key) => {
                    if let Some(texture) = textures.get(*texture_key) {
                        texture.bind(ctx, texture_unit);
                    } else {
                        render_warn!("uniform {} references a destroyed texture", active.name);
                    }
                    let units = [texture_unit as i32];
                    submit_ints(ctx, data_id, active, &units);
                    texture_unit += 1;
                }
                UniformValue::TextureArray(texture_keys) => {
                    let mut units: SmallVec<[i32; 4]> = SmallVec::new();
                    for texture_key in texture_keys {
                        if let Some(texture) = textures.get(*texture_key) {
                            texture.bind(ctx, texture_unit);
                        }
                        units.push(texture_unit as i32);
                        texture_unit += 1;
                    }
                    submit_ints(ctx, data_id, active, &units);
                }
                _ => submit_value(ctx, data_id, active, value),
            }
        }

        self.apply_state(ctx);

        if flip_faces {
            ctx.set_front_face(self.front_face.inverted());
        }
    }

    /// Applies this program's render state through the context's mirror.
    fn apply_state(&self, ctx: &mut Context) {
        if self.depth_test {
            ctx.enable(Capability::DepthTest);
        } else {
            ctx.disable(Capability::DepthTest);
        }

        if self.cull_face.is_some() {
            ctx.enable(Capability::CullFace);
        } else {
            ctx.disable(Capability::CullFace);
        }

        if self.blend_func.is_some() {
            ctx.enable(Capability::Blend);
        } else {
            ctx.disable(Capability::Blend);
        }

        if let Some(face) = self.cull_face {
            ctx.set_cull_face(face);
        }
        ctx.set_front_face(self.front_face);
        ctx.set_depth_mask(self.depth_write);
        ctx.set_depth_func(self.depth_func);

        if let Some(func) = self.blend_func {
            ctx.set_blend_func(func);
        }
        ctx.set_blend_equation(self.blend_equation);
    }

    /// Clone sharing the same compiled program data; the shared usage count
    /// is incremented.
    #[must_use]
    pub fn duplicate(&self, ctx: &mut Context) -> Self {
        if let Some(key) = self.program_data {
            ctx.retain_program_data(key);
        }
        Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            vertex: self.vertex.clone(),
            fragment: self.fragment.clone(),
            uniforms: self.uniforms.clone(),
            transparent: self.transparent,
            cull_face: self.cull_face,
            front_face: self.front_face,
            depth_test: self.depth_test,
            depth_write: self.depth_write,
            depth_func: self.depth_func,
            blend_func: self.blend_func,
            blend_equation: self.blend_equation,
            program_data: self.program_data,
            reflection: self.reflection.clone(),
            active_context: self.active_context,
        }
    }

    /// Releases this program's reference on the shared program data.
    pub fn destroy(&mut self, ctx: &mut Context) {
        if let Some(key) = self.program_data.take() {
            ctx.release_program_data(key);
        }
        self.reflection = None;
        self.active_context = None;
    }
}

/// Resolves the application value addressed by an active uniform.
fn resolve_value<'a>(
    uniforms: &'a FxHashMap<String, UniformValue>,
    active: &ActiveUniform,
) -> Option<&'a UniformValue> {
    let root = uniforms.get(&active.base)?;
    match &active.address {
        UniformAddress::Plain => Some(root),
        UniformAddress::StructField(field) => match root {
            UniformValue::Struct(fields) => fields.get(field),
            _ => None,
        },
        UniformAddress::StructArrayField { index, field } => match root {
            UniformValue::StructArray(elements) => elements.get(*index)?.get(field),
            _ => None,
        },
    }
}

/// Submits a non-texture uniform value, eliding the call when the cached
/// value for this location already matches.
fn submit_value(ctx: &mut Context, data_id: u32, active: &ActiveUniform, value: &UniformValue) {
    if active.ty.is_integer() {
        let mut ints: SmallVec<[i32; 4]> = SmallVec::new();
        if !value.write_ints(&mut ints) {
            render_warn!("uniform {} value does not match its declared type", active.name);
            return;
        }
        submit_ints(ctx, data_id, active, &ints);
    } else {
        let mut floats: SmallVec<[f32; 16]> = SmallVec::new();
        if !value.write_floats(&mut floats) {
            render_warn!("uniform {} value does not match its declared type", active.name);
            return;
        }
        submit_floats(ctx, data_id, active, &floats);
    }
}

fn submit_floats(ctx: &mut Context, data_id: u32, active: &ActiveUniform, floats: &[f32]) {
    let (api, state) = ctx.api_and_state();
    let cache_key = (data_id, active.location);
    if let Some(CachedUniform::Floats(cached)) = state.uniform_values.get(&cache_key) {
        if cached.as_slice() == floats {
            return;
        }
    }
    state
        .uniform_values
        .insert(cache_key, CachedUniform::Floats(SmallVec::from_slice(floats)));

    let location = active.location;
    match active.ty {
        GlslType::Float => {
            if floats.len() > 1 {
                api.uniform1fv(location, floats);
            } else if let Some(&v) = floats.first() {
                api.uniform1f(location, v);
            }
        }
        GlslType::FloatVec2 => api.uniform2fv(location, floats),
        GlslType::FloatVec3 => api.uniform3fv(location, floats),
        GlslType::FloatVec4 => api.uniform4fv(location, floats),
        GlslType::Mat2 => api.uniform_matrix2fv(location, floats),
        GlslType::Mat3 => api.uniform_matrix3fv(location, floats),
        GlslType::Mat4 => api.uniform_matrix4fv(location, floats),
        _ => {}
    }
}

fn submit_ints(ctx: &mut Context, data_id: u32, active: &ActiveUniform, ints: &[i32]) {
    let (api, state) = ctx.api_and_state();
    let cache_key = (data_id, active.location);
    if let Some(CachedUniform::Ints(cached)) = state.uniform_values.get(&cache_key) {
        if cached.as_slice() == ints {
            return;
        }
    }
    state
        .uniform_values
        .insert(cache_key, CachedUniform::Ints(SmallVec::from_slice(ints)));

    let location = active.location;
    match active.ty {
        GlslType::Int | GlslType::Bool | GlslType::Sampler2D | GlslType::SamplerCube => {
            if ints.len() > 1 {
                api.uniform1iv(location, ints);
            } else if let Some(&v) = ints.first() {
                api.uniform1i(location, v);
            }
        }
        GlslType::IntVec2 | GlslType::BoolVec2 => api.uniform2iv(location, ints),
        GlslType::IntVec3 | GlslType::BoolVec3 => api.uniform3iv(location, ints),
        GlslType::IntVec4 | GlslType::BoolVec4 => api.uniform4iv(location, ints),
        _ => {}
    }
}
