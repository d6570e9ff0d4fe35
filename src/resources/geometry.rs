//! Geometry: named vertex/index data streams and their GPU buffers.
//!
//! An [`Attribute`] describes one data stream. A [`Geometry`] owns a set of
//! attributes keyed by name - the key `"index"` is special and binds as the
//! element buffer - plus derived draw metadata and a per-program-layout cache
//! of vertex-array objects. Attribute binding slots depend on which shader
//! consumes the geometry, so the VAO cache is keyed by the program's
//! attribute-order signature.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::gl::{BufferTarget, BufferUsage, Context, DataType, DrawMode, GlApi, VertexArrayId};
use crate::resources::program::Program;
use crate::resources::program_data::ProgramReflection;
use crate::utils::diagnostics::render_warn;

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ATTRIBUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Owned payload of one attribute, typed by numeric kind.
#[derive(Debug, Clone)]
pub enum AttributeData {
    F32(Vec<f32>),
    U32(Vec<u32>),
    U16(Vec<u16>),
    U8(Vec<u8>),
}

impl AttributeData {
    /// The GL element type inferred from the payload's numeric kind.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::F32(_) => DataType::F32,
            Self::U32(_) => DataType::U32,
            Self::U16(_) => DataType::U16,
            Self::U8(_) => DataType::U8,
        }
    }

    /// Number of scalar elements.
    #[must_use]
    pub fn len(&self) -> u32 {
        match self {
            Self::F32(v) => v.len() as u32,
            Self::U32(v) => v.len() as u32,
            Self::U16(v) => v.len() as u32,
            Self::U8(v) => v.len() as u32,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn byte_len(&self) -> u32 {
        self.len() * self.data_type().byte_size()
    }

    /// Raw byte view for buffer uploads.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::F32(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U8(v) => v,
        }
    }

    #[must_use]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }
}

/// Builder for an attribute; unset fields take the defaults described on
/// [`Geometry::add_attribute`].
#[derive(Debug, Clone)]
pub struct AttributeDesc {
    pub data: AttributeData,
    /// Components per vertex (1–4, or 4/9/16 for matrix attributes).
    pub size: u32,
    pub normalized: bool,
    /// Byte stride; 0 means tightly packed.
    pub stride: u32,
    /// Byte offset into the buffer.
    pub offset: u32,
    /// Explicit element count; derived from the data when `None`.
    pub count: Option<u32>,
    pub usage: BufferUsage,
    /// Instancing divisor: 0 steps per vertex, N steps once per N instances.
    pub instanced: u32,
}

impl AttributeDesc {
    #[must_use]
    pub fn f32(data: Vec<f32>) -> Self {
        Self::new(AttributeData::F32(data))
    }

    #[must_use]
    pub fn u32(data: Vec<u32>) -> Self {
        Self::new(AttributeData::U32(data))
    }

    #[must_use]
    pub fn u16(data: Vec<u16>) -> Self {
        Self::new(AttributeData::U16(data))
    }

    #[must_use]
    pub fn u8(data: Vec<u8>) -> Self {
        Self::new(AttributeData::U8(data))
    }

    #[must_use]
    pub fn new(data: AttributeData) -> Self {
        Self {
            data,
            size: 1,
            normalized: false,
            stride: 0,
            offset: 0,
            count: None,
            usage: BufferUsage::Static,
            instanced: 0,
        }
    }

    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    #[must_use]
    pub fn stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn instanced(mut self, divisor: u32) -> Self {
        self.instanced = divisor;
        self
    }
}

/// One finalized vertex or index data stream and its GPU buffer binding.
#[derive(Debug)]
pub struct Attribute {
    pub id: u64,
    data: AttributeData,
    pub size: u32,
    pub data_type: DataType,
    pub target: BufferTarget,
    pub normalized: bool,
    pub stride: u32,
    pub offset: u32,
    pub count: u32,
    pub divisor: u32,
    pub usage: BufferUsage,

    needs_update: bool,
    buffer: Option<crate::gl::BufferId>,
}

impl Attribute {
    #[inline]
    #[must_use]
    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> Option<crate::gl::BufferId> {
        self.buffer
    }

    #[inline]
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Re-supplies the payload and flags the stream for re-upload.
    pub fn set_data(&mut self, data: AttributeData) {
        self.data = data;
        self.needs_update = true;
    }

    /// Flags the stream for re-upload after in-place mutation.
    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    /// Lazily allocates the GPU buffer and uploads the payload: a full
    /// upload on allocation, a sub-range refresh on later dirty updates.
    pub(crate) fn update(&mut self, ctx: &mut Context) {
        let is_new = self.buffer.is_none();
        if is_new {
            self.buffer = Some(ctx.api_mut().create_buffer());
        }

        if !(is_new || self.needs_update) {
            return;
        }

        ctx.bind_buffer(self.target, self.buffer);
        if is_new {
            ctx.api_mut()
                .buffer_data(self.target, self.data.bytes(), self.usage);
        } else {
            ctx.api_mut().buffer_sub_data(self.target, 0, self.data.bytes());
        }

        self.needs_update = false;
    }
}

/// Range of vertices (or indices, when indexed) covered by a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawRange {
    pub start: u32,
    pub count: u32,
}

/// Axis-aligned bounds plus the enclosing sphere, in local space.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

/// A named set of attributes with derived draw metadata and a per-layout
/// vertex-array-object cache.
#[derive(Debug)]
pub struct Geometry {
    pub id: u64,

    attributes: FxHashMap<String, Attribute>,
    vaos: FxHashMap<String, VertexArrayId>,

    pub draw_range: DrawRange,
    pub instanced_count: u32,
    is_instanced: bool,

    bounds: RefCell<Option<GeometryBounds>>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Geometry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed),
            attributes: FxHashMap::default(),
            vaos: FxHashMap::default(),
            draw_range: DrawRange::default(),
            instanced_count: 0,
            is_instanced: false,
            bounds: RefCell::new(None),
        }
    }

    /// Finalizes a descriptor into an attribute.
    ///
    /// Defaults: size 1, element type inferred from the payload, element
    /// buffer iff the name is `"index"`, static usage, divisor taken from
    /// the `instanced` hint, count derived from byte length / stride (or
    /// length / size when unstrided). The new stream starts dirty.
    ///
    /// Draw metadata is re-derived: an index attribute dictates
    /// `draw_range.count`; otherwise the longest non-instanced attribute
    /// does. Instanced attributes contribute `count x divisor` instances -
    /// when streams disagree the count clamps to the minimum (under-draw
    /// rather than read out of bounds) and a diagnostic is raised.
    pub fn add_attribute(&mut self, name: &str, desc: AttributeDesc) {
        let data_type = desc.data.data_type();
        let count = desc.count.unwrap_or_else(|| {
            if desc.stride != 0 {
                desc.data.byte_len() / desc.stride
            } else {
                desc.data.len() / desc.size.max(1)
            }
        });

        let attribute = Attribute {
            id: NEXT_ATTRIBUTE_ID.fetch_add(1, Ordering::Relaxed),
            data: desc.data,
            size: desc.size,
            data_type,
            target: if name == "index" {
                BufferTarget::ElementArray
            } else {
                BufferTarget::Array
            },
            normalized: desc.normalized,
            stride: desc.stride,
            offset: desc.offset,
            count,
            divisor: desc.instanced,
            usage: desc.usage,
            needs_update: true,
            buffer: None,
        };

        if attribute.divisor > 0 {
            self.is_instanced = true;
            let instances = attribute.count * attribute.divisor;
            if self.instanced_count != 0 && self.instanced_count != instances {
                render_warn!(
                    "geometry {} has instanced attributes of different lengths; clamping to {}",
                    self.id,
                    self.instanced_count.min(instances)
                );
                self.instanced_count = self.instanced_count.min(instances);
            } else {
                self.instanced_count = instances;
            }
        } else if name == "index" {
            self.draw_range.count = attribute.count;
        } else if !self.attributes.contains_key("index") {
            self.draw_range.count = self.draw_range.count.max(attribute.count);
        }

        if name == "position" {
            self.bounds.replace(None);
        }

        self.attributes.insert(name.to_owned(), attribute);
    }

    /// Shorthand for adding the `"index"` attribute.
    pub fn set_index(&mut self, desc: AttributeDesc) {
        self.add_attribute("index", desc);
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.get_mut(name)
    }

    #[must_use]
    pub fn index_attribute(&self) -> Option<&Attribute> {
        self.attributes.get("index")
    }

    #[must_use]
    pub fn is_instanced(&self) -> bool {
        self.is_instanced
    }

    /// Overrides the derived draw range.
    pub fn set_draw_range(&mut self, start: u32, count: u32) {
        self.draw_range = DrawRange { start, count };
    }

    /// Overrides the derived instance count.
    pub fn set_instanced_count(&mut self, count: u32) {
        self.instanced_count = count;
    }

    // ========================================================================
    // GPU preparation & drawing
    // ========================================================================

    /// Ensures a vertex-array object exists for this geometry x the
    /// program's attribute layout, and re-uploads any dirty attribute.
    pub fn prepare(&mut self, ctx: &mut Context, program: &Program) {
        let Some(reflection) = program.reflection() else {
            return;
        };

        if ctx.capabilities().vertex_arrays && !self.vaos.contains_key(&reflection.attribute_order)
        {
            let vao = ctx.api_mut().create_vertex_array();
            self.vaos.insert(reflection.attribute_order.clone(), vao);
            ctx.bind_vertex_array(Some(vao));
            self.bind_attributes(ctx, &reflection);
        }

        for attribute in self.attributes.values_mut() {
            if attribute.needs_update {
                attribute.update(ctx);
            }
        }
    }

    /// Links every active shader attribute to its data stream.
    ///
    /// Matrix-typed shader inputs occupy one location per column, each
    /// column reading its slice of the stride. A required attribute with no
    /// matching stream is skipped with a diagnostic - the draw proceeds
    /// visually degraded rather than failing.
    fn bind_attributes(&mut self, ctx: &mut Context, reflection: &ProgramReflection) {
        let instancing = ctx.capabilities().instancing;

        for active in &reflection.attributes {
            let Some(attribute) = self.attributes.get_mut(&active.name) else {
                render_warn!("active attribute {} is not being supplied", active.name);
                continue;
            };

            attribute.update(ctx);
            // `update` early-outs when clean; the pointer setup below still
            // needs this stream's buffer bound.
            let buffer = attribute.buffer();
            ctx.bind_buffer(attribute.target, buffer);

            let locations = active.ty.attribute_locations();
            let type_size = attribute.data_type.byte_size();
            // Per-column layout for matrix attributes; a single location
            // otherwise.
            let column_size = attribute.size / locations;
            let stride = if locations == 1 || attribute.stride != 0 {
                attribute.stride
            } else {
                attribute.size * type_size
            };
            let column_bytes = column_size * type_size;

            for i in 0..locations {
                let location = active.location + i;
                let api = ctx.api_mut();
                api.vertex_attrib_pointer(
                    location,
                    column_size,
                    attribute.data_type,
                    attribute.normalized,
                    stride,
                    attribute.offset + i * column_bytes,
                );
                api.enable_vertex_attrib(location);

                if instancing {
                    // Also reset to 0 for non-instanced streams: some
                    // drivers keep the previous divisor otherwise.
                    api.vertex_attrib_divisor(location, attribute.divisor);
                } else if attribute.divisor > 0 {
                    render_warn!(
                        "instanced attribute {} ignored: device lacks instancing",
                        active.name
                    );
                }
            }
        }

        if let Some(index) = self.attributes.get_mut("index") {
            index.update(ctx);
            let buffer = index.buffer;
            ctx.bind_buffer(BufferTarget::ElementArray, buffer);
        }
    }

    /// Issues the draw call for this geometry under the given program's
    /// layout. [`Geometry::prepare`] must have run for the same program
    /// earlier in the frame.
    pub fn draw(&mut self, ctx: &mut Context, program: &Program, mode: DrawMode) {
        let Some(reflection) = program.reflection() else {
            return;
        };

        if ctx.capabilities().vertex_arrays {
            match self.vaos.get(&reflection.attribute_order) {
                Some(&vao) => ctx.bind_vertex_array(Some(vao)),
                None => {
                    render_warn!(
                        "geometry {} drawn before prepare for this program layout",
                        self.id
                    );
                    return;
                }
            }
        } else {
            // No VAO support: replay the attribute bindings for every draw.
            self.bind_attributes(ctx, &reflection);
        }

        let index = self.attributes.get("index");
        let instanced = self.is_instanced && ctx.capabilities().instancing;
        if self.is_instanced && !instanced {
            render_warn!(
                "geometry {} requests instancing without device support; drawing one instance",
                self.id
            );
        }

        match (instanced, index) {
            (true, Some(index)) => ctx.api_mut().draw_elements_instanced(
                mode,
                self.draw_range.count,
                index.data_type,
                index.offset + self.draw_range.start * 2,
                self.instanced_count,
            ),
            (true, None) => ctx.api_mut().draw_arrays_instanced(
                mode,
                self.draw_range.start,
                self.draw_range.count,
                self.instanced_count,
            ),
            (false, Some(index)) => ctx.api_mut().draw_elements(
                mode,
                self.draw_range.count,
                index.data_type,
                index.offset + self.draw_range.start * 2,
            ),
            (false, None) => {
                ctx.api_mut()
                    .draw_arrays(mode, self.draw_range.start, self.draw_range.count);
            }
        }
    }

    // ========================================================================
    // Bounds
    // ========================================================================

    /// Local-space bounds derived from the `"position"` attribute, computed
    /// lazily and cached until positions are replaced.
    #[must_use]
    pub fn bounds(&self) -> GeometryBounds {
        if let Some(bounds) = *self.bounds.borrow() {
            return bounds;
        }
        let bounds = self.compute_bounds();
        *self.bounds.borrow_mut() = Some(bounds);
        bounds
    }

    fn compute_bounds(&self) -> GeometryBounds {
        let Some(position) = self.attributes.get("position") else {
            render_warn!("no position data found to compute geometry bounds");
            return GeometryBounds {
                radius: f32::INFINITY,
                ..GeometryBounds::default()
            };
        };
        let Some(data) = position.data.as_f32() else {
            render_warn!("position attribute is not float data; bounds unavailable");
            return GeometryBounds {
                radius: f32::INFINITY,
                ..GeometryBounds::default()
            };
        };

        let stride = if position.stride != 0 {
            (position.stride / DataType::F32.byte_size()) as usize
        } else {
            position.size as usize
        };

        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);

        let mut i = (position.offset / DataType::F32.byte_size()) as usize;
        while i + 2 < data.len() {
            let p = Vec3::new(data[i], data[i + 1], data[i + 2]);
            min = min.min(p);
            max = max.max(p);
            i += stride.max(1);
        }

        if min.x > max.x {
            return GeometryBounds::default();
        }

        let center = (min + max) * 0.5;
        let mut radius_sq = 0.0f32;
        let mut i = (position.offset / DataType::F32.byte_size()) as usize;
        while i + 2 < data.len() {
            let p = Vec3::new(data[i], data[i + 1], data[i + 2]);
            radius_sq = radius_sq.max(center.distance_squared(p));
            i += stride.max(1);
        }

        GeometryBounds {
            min,
            max,
            center,
            radius: radius_sq.sqrt(),
        }
    }

    // ========================================================================
    // Destruction
    // ========================================================================

    /// Releases every GPU buffer and vertex-array object owned by this
    /// geometry.
    pub fn destroy(&mut self, ctx: &mut Context) {
        for (_, vao) in self.vaos.drain() {
            ctx.delete_vertex_array(vao);
        }
        for attribute in self.attributes.values_mut() {
            if let Some(buffer) = attribute.buffer.take() {
                ctx.delete_buffer(buffer);
            }
        }
        self.attributes.clear();
    }
}
