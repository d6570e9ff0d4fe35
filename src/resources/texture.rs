//! Textures.
//!
//! A [`Texture`] owns CPU-side image data (or just dimensions, for render
//! targets), sampler/style parameters, and a lazily created GPU handle.
//! Uploads follow a staleness protocol: the GPU copy refreshes only when the
//! image reference changed, the dirty flag is set, or the texture meets a
//! context for the first time. Producers (video streams, bone-matrix
//! writers) keep the texture current by swapping data in and marking it
//! dirty.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::gl::{
    Context, GlApi, TexelType, TextureFace, TextureFilter, TextureFormat, TextureTarget,
    TextureWrap,
};
use crate::utils::diagnostics::render_warn;

static NEXT_TEXTURE_ID: AtomicU32 = AtomicU32::new(1);

/// Single opaque pixel uploaded when no image data exists yet, so the
/// texture unit is always bindable without backend errors.
const PLACEHOLDER_PIXEL: [u8; 4] = [255, 255, 255, 255];

/// A decoded image: dimensions are carried by the source.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// One pre-computed mip level of a compressed texture.
#[derive(Debug, Clone)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// The kinds of image source a texture can upload from.
#[derive(Debug, Clone, Default)]
pub enum ImageSource {
    /// No data (yet): a placeholder pixel is uploaded, or empty storage when
    /// explicit dimensions are set (render-target attachments).
    #[default]
    None,
    /// Raw texel bytes; dimensions come from the texture's own
    /// width/height, never inferred.
    Raw(Vec<u8>),
    /// A decoded image carrying its own dimensions.
    Image(Image),
    /// Six decoded faces of a cube map, +X −X +Y −Y +Z −Z.
    Cube(Box<[Image; 6]>),
    /// Pre-mipped compressed data, one entry per level. Mipmap generation
    /// is disabled for these.
    Compressed(Vec<MipLevel>),
}

/// Sampler parameters last applied to the GPU object, kept per texture so
/// unchanged parameters are not re-sent. Defaults match the backend's
/// initial object state.
#[derive(Debug, Clone)]
struct SamplerState {
    min_filter: TextureFilter,
    mag_filter: TextureFilter,
    wrap_s: TextureWrap,
    wrap_t: TextureWrap,
    anisotropy: f32,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            min_filter: TextureFilter::NearestMipmapLinear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
            anisotropy: 0.0,
        }
    }
}

/// GPU texture resource with upload/staleness tracking.
#[derive(Debug)]
pub struct Texture {
    pub id: u32,

    image: ImageSource,
    image_version: u64,
    uploaded_version: Option<u64>,

    pub target: TextureTarget,
    pub format: TextureFormat,
    pub internal_format: TextureFormat,
    pub texel_type: TexelType,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub generate_mipmaps: bool,
    pub premultiply_alpha: bool,
    pub flip_y: bool,
    pub unpack_alignment: u32,
    pub anisotropy: f32,
    pub level: u32,

    /// Explicit dimensions; 0 means "from the image source".
    pub width: u32,
    pub height: u32,

    needs_update: bool,
    sampler_state: SamplerState,
    handle: Option<crate::gl::TextureId>,
    active_context: Option<u32>,
}

impl Texture {
    #[must_use]
    pub fn new(image: ImageSource) -> Self {
        let target = match image {
            ImageSource::Cube(_) => TextureTarget::Cube,
            _ => TextureTarget::D2,
        };
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            image,
            image_version: 1,
            uploaded_version: None,
            target,
            format: TextureFormat::Rgba,
            internal_format: TextureFormat::Rgba,
            texel_type: TexelType::UnsignedByte,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            min_filter: TextureFilter::NearestMipmapLinear,
            mag_filter: TextureFilter::Linear,
            generate_mipmaps: true,
            premultiply_alpha: false,
            flip_y: target == TextureTarget::D2,
            unpack_alignment: 4,
            anisotropy: 0.0,
            level: 0,
            width: 0,
            height: 0,
            needs_update: false,
            sampler_state: SamplerState::default(),
            handle: None,
            active_context: None,
        }
    }

    /// An empty texture with pre-specified storage dimensions, as used for
    /// render-target attachments and data textures.
    #[must_use]
    pub fn with_size(width: u32, height: u32) -> Self {
        let mut texture = Self::new(ImageSource::None);
        texture.width = width;
        texture.height = height;
        texture.generate_mipmaps = false;
        texture.flip_y = false;
        texture.min_filter = TextureFilter::Linear;
        texture
    }

    #[must_use]
    pub fn image(&self) -> &ImageSource {
        &self.image
    }

    /// Swaps the image source; the GPU copy refreshes on the next prepare.
    pub fn set_image(&mut self, image: ImageSource) {
        self.image = image;
        self.image_version += 1;
    }

    /// Flags the current image data as changed in place (streaming
    /// uploads).
    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    /// Invalidates the storage dimensions (render-target resize). No GPU
    /// work happens until the next prepare.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.needs_update = true;
    }

    #[must_use]
    pub fn handle(&self) -> Option<crate::gl::TextureId> {
        self.handle
    }

    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    // ========================================================================
    // GPU preparation
    // ========================================================================

    /// Lazily creates the GPU handle and uploads when stale. Staleness is:
    /// image replaced, dirty flag set, or first use against this context.
    pub fn prepare(&mut self, ctx: &mut Context) {
        if self.handle.is_none() {
            self.handle = Some(ctx.api_mut().create_texture());
        }

        ctx.bind_texture(self.target, self.handle);

        let stale = self.uploaded_version != Some(self.image_version)
            || self.needs_update
            || self.active_context != Some(ctx.id());

        if stale {
            self.upload(ctx);
        }

        self.needs_update = false;
        self.uploaded_version = Some(self.image_version);
        self.active_context = Some(ctx.id());
    }

    /// Binds to a texture unit. Binding before any prepare is a loud no-op:
    /// there is no handle to bind.
    pub fn bind(&self, ctx: &mut Context, unit: u32) {
        if self.active_context.is_none() {
            render_warn!(
                "texture {} bound before prepare; attach it to a context first",
                self.id
            );
            return;
        }
        ctx.active_texture(unit);
        ctx.bind_texture(self.target, self.handle);
    }

    fn upload(&mut self, ctx: &mut Context) {
        // Pixel-store state is not part of the texture object; apply it
        // through the shared per-context cache.
        ctx.set_flip_y(self.flip_y);
        ctx.set_premultiply_alpha(self.premultiply_alpha);
        ctx.set_unpack_alignment(self.unpack_alignment);

        // Mipmaps on non-power-of-two dimensions without device support:
        // downgrade to no mips + clamp + linear instead of failing.
        if self.generate_mipmaps && !ctx.capabilities().npot_mipmaps {
            let (w, h) = self.source_size();
            if w != 0 && (!w.is_power_of_two() || !h.is_power_of_two()) {
                render_warn!(
                    "texture {}: non-power-of-two mipmaps unsupported; disabling mipmaps",
                    self.id
                );
                self.generate_mipmaps = false;
                self.wrap_s = TextureWrap::ClampToEdge;
                self.wrap_t = TextureWrap::ClampToEdge;
                self.min_filter = TextureFilter::Linear;
            }
        }

        self.apply_sampler_state(ctx);

        // Decodable sources carry their own dimensions.
        match &self.image {
            ImageSource::Image(_) | ImageSource::Cube(_) | ImageSource::Compressed(_) => {
                let (w, h) = self.source_size();
                self.width = w;
                self.height = h;
            }
            ImageSource::Raw(_) | ImageSource::None => {}
        }

        match &self.image {
            ImageSource::Image(image) => {
                ctx.api_mut().tex_image_2d(
                    TextureFace::D2,
                    self.level,
                    self.internal_format,
                    image.width,
                    image.height,
                    self.format,
                    self.texel_type,
                    Some(&image.pixels),
                );
                if self.generate_mipmaps {
                    ctx.api_mut().generate_mipmap(self.target);
                }
            }
            ImageSource::Cube(faces) => {
                for (i, face) in faces.iter().enumerate() {
                    ctx.api_mut().tex_image_2d(
                        TextureFace::Cube(i as u8),
                        self.level,
                        self.internal_format,
                        face.width,
                        face.height,
                        self.format,
                        self.texel_type,
                        Some(&face.pixels),
                    );
                }
                if self.generate_mipmaps {
                    ctx.api_mut().generate_mipmap(self.target);
                }
            }
            ImageSource::Raw(data) => {
                // Raw data never infers dimensions.
                ctx.api_mut().tex_image_2d(
                    TextureFace::D2,
                    self.level,
                    self.internal_format,
                    self.width,
                    self.height,
                    self.format,
                    self.texel_type,
                    Some(data),
                );
                if self.generate_mipmaps {
                    ctx.api_mut().generate_mipmap(self.target);
                }
            }
            ImageSource::Compressed(levels) => {
                // Pre-mipped: upload each level, never generate.
                for (level, mip) in levels.iter().enumerate() {
                    ctx.api_mut().compressed_tex_image_2d(
                        TextureFace::D2,
                        level as u32,
                        self.internal_format,
                        mip.width,
                        mip.height,
                        &mip.data,
                    );
                }
            }
            ImageSource::None => {
                if self.target == TextureTarget::Cube {
                    // Placeholder for each face while real data loads.
                    for i in 0..6u8 {
                        ctx.api_mut().tex_image_2d(
                            TextureFace::Cube(i),
                            0,
                            TextureFormat::Rgba,
                            1,
                            1,
                            TextureFormat::Rgba,
                            TexelType::UnsignedByte,
                            Some(&PLACEHOLDER_PIXEL),
                        );
                    }
                } else if self.width > 0 {
                    // Empty storage for render-target use.
                    ctx.api_mut().tex_image_2d(
                        TextureFace::D2,
                        self.level,
                        self.internal_format,
                        self.width,
                        self.height,
                        self.format,
                        self.texel_type,
                        None,
                    );
                } else {
                    // Single placeholder pixel: keeps the unit bindable
                    // while an image or video is still loading.
                    ctx.api_mut().tex_image_2d(
                        TextureFace::D2,
                        0,
                        TextureFormat::Rgba,
                        1,
                        1,
                        TextureFormat::Rgba,
                        TexelType::UnsignedByte,
                        Some(&PLACEHOLDER_PIXEL),
                    );
                }
            }
        }
    }

    /// Applies sampler parameters that differ from this texture's cached
    /// state.
    fn apply_sampler_state(&mut self, ctx: &mut Context) {
        let max_anisotropy = ctx.capabilities().max_anisotropy;
        let api = ctx.api_mut();

        if self.min_filter != self.sampler_state.min_filter {
            api.tex_min_filter(self.target, self.min_filter);
            self.sampler_state.min_filter = self.min_filter;
        }
        if self.mag_filter != self.sampler_state.mag_filter {
            api.tex_mag_filter(self.target, self.mag_filter);
            self.sampler_state.mag_filter = self.mag_filter;
        }
        if self.wrap_s != self.sampler_state.wrap_s {
            api.tex_wrap_s(self.target, self.wrap_s);
            self.sampler_state.wrap_s = self.wrap_s;
        }
        if self.wrap_t != self.sampler_state.wrap_t {
            api.tex_wrap_t(self.target, self.wrap_t);
            self.sampler_state.wrap_t = self.wrap_t;
        }

        let anisotropy = self.anisotropy.min(max_anisotropy);
        if anisotropy > 0.0 && (anisotropy - self.sampler_state.anisotropy).abs() > f32::EPSILON {
            api.tex_anisotropy(self.target, anisotropy);
            self.sampler_state.anisotropy = anisotropy;
        }
    }

    fn source_size(&self) -> (u32, u32) {
        match &self.image {
            ImageSource::Image(image) => (image.width, image.height),
            ImageSource::Cube(faces) => (faces[0].width, faces[0].height),
            ImageSource::Compressed(levels) => levels
                .first()
                .map_or((0, 0), |level| (level.width, level.height)),
            _ => (self.width, self.height),
        }
    }

    /// Releases the GPU handle. The CPU-side image is kept, so the texture
    /// can be prepared again later.
    pub fn destroy(&mut self, ctx: &mut Context) {
        if let Some(handle) = self.handle.take() {
            ctx.delete_texture(handle);
        }
        self.uploaded_version = None;
        self.active_context = None;
    }
}

impl Default for Texture {
    fn default() -> Self {
        Self::new(ImageSource::None)
    }
}
