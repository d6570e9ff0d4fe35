//! Offscreen render targets.
//!
//! A [`RenderTarget`] wraps a framebuffer with N color textures, an optional
//! depth texture, and at most one depth/stencil renderbuffer. Attachment
//! textures are allocated into the shared texture map so a pass's output can
//! be sampled by key in a later pass. Resizing is a pure invalidation: real
//! GPU reallocation is deferred to the next prepare.

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::gl::{
    Attachment, Context, FramebufferId, GlApi, RenderbufferFormat, RenderbufferId, TexelType,
    TextureFilter, TextureFormat, TextureTarget, TextureWrap,
};
use crate::utils::diagnostics::render_warn;

use super::TextureKey;
use super::texture::Texture;

/// Construction parameters for a render target.
#[derive(Debug, Clone)]
pub struct RenderTargetDesc {
    /// 0 resolves to the drawable surface's current size at prepare time.
    pub width: u32,
    pub height: u32,
    /// Number of color attachments.
    pub color: u32,
    pub depth: bool,
    pub stencil: bool,
    /// Attach depth as a sampleable texture instead of a renderbuffer.
    /// Mutually exclusive with stencil.
    pub depth_texture: bool,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub format: TextureFormat,
    pub internal_format: TextureFormat,
    pub texel_type: TexelType,
}

impl Default for RenderTargetDesc {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            color: 1,
            depth: true,
            stencil: false,
            depth_texture: false,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            format: TextureFormat::Rgba,
            internal_format: TextureFormat::Rgba,
            texel_type: TexelType::UnsignedByte,
        }
    }
}

/// The one renderbuffer configuration a target may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderbufferKind {
    Depth,
    Stencil,
    DepthStencil,
}

impl RenderbufferKind {
    fn format(self) -> RenderbufferFormat {
        match self {
            Self::Depth => RenderbufferFormat::DepthComponent16,
            Self::Stencil => RenderbufferFormat::StencilIndex8,
            Self::DepthStencil => RenderbufferFormat::DepthStencil,
        }
    }

    fn attachment(self) -> Attachment {
        match self {
            Self::Depth => Attachment::Depth,
            Self::Stencil => Attachment::Stencil,
            Self::DepthStencil => Attachment::DepthStencil,
        }
    }
}

/// Offscreen framebuffer with managed attachment lifecycle.
#[derive(Debug)]
pub struct RenderTarget {
    desc: RenderTargetDesc,
    pub width: u32,
    pub height: u32,

    framebuffer: Option<FramebufferId>,
    color_textures: SmallVec<[TextureKey; 4]>,
    depth_texture: Option<TextureKey>,
    renderbuffer: Option<(RenderbufferKind, RenderbufferId)>,

    invalid: bool,
    active_context: Option<u32>,
}

impl RenderTarget {
    #[must_use]
    pub fn new(desc: RenderTargetDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            desc,
            framebuffer: None,
            color_textures: SmallVec::new(),
            depth_texture: None,
            renderbuffer: None,
            invalid: true,
            active_context: None,
        }
    }

    #[must_use]
    pub fn desc(&self) -> &RenderTargetDesc {
        &self.desc
    }

    #[must_use]
    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    /// The first color attachment, present after prepare.
    #[must_use]
    pub fn texture(&self) -> Option<TextureKey> {
        self.color_textures.first().copied()
    }

    #[must_use]
    pub fn textures(&self) -> &[TextureKey] {
        &self.color_textures
    }

    #[must_use]
    pub fn depth_texture(&self) -> Option<TextureKey> {
        self.depth_texture
    }

    #[must_use]
    pub fn has_renderbuffer(&self) -> bool {
        self.renderbuffer.is_some()
    }

    /// Pure invalidation; GPU reallocation happens at the next prepare.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.desc.width = width;
        self.desc.height = height;
        self.invalid = true;
    }

    /// Builds or rebuilds the framebuffer and its attachments.
    ///
    /// No-op unless invalid (fresh, resized, or first use against this
    /// context). Unset dimensions resolve to the drawable surface size.
    /// Exactly one depth path ends up active: a depth texture when requested
    /// and supported, else at most one renderbuffer configuration chosen
    /// from the depth/stencil flags. Attachments from a previous
    /// configuration that are no longer referenced are destroyed.
    pub fn prepare(&mut self, ctx: &mut Context, textures: &mut SlotMap<TextureKey, Texture>) {
        if self.active_context != Some(ctx.id()) {
            self.invalid = true;
        }
        if !self.invalid {
            return;
        }
        self.invalid = false;

        let (drawable_w, drawable_h) = ctx.drawable_size();
        self.width = if self.desc.width > 0 {
            self.desc.width
        } else {
            drawable_w
        };
        self.height = if self.desc.height > 0 {
            self.desc.height
        } else {
            drawable_h
        };

        let framebuffer = *self
            .framebuffer
            .get_or_insert_with(|| ctx.api_mut().create_framebuffer());
        ctx.bind_framebuffer(Some(framebuffer));

        self.prepare_color(ctx, textures);
        self.prepare_depth(ctx, textures);

        self.active_context = Some(ctx.id());
    }

    fn prepare_color(&mut self, ctx: &mut Context, textures: &mut SlotMap<TextureKey, Texture>) {
        let caps = ctx.capabilities();
        let mut color_count = self.desc.color.max(1);
        if color_count > 1 && !caps.draw_buffers {
            render_warn!(
                "render target requests {} color attachments without draw-buffer support; using 1",
                color_count
            );
            color_count = 1;
        } else if color_count > caps.max_color_attachments {
            render_warn!(
                "render target requests {} color attachments; device supports {}",
                color_count,
                caps.max_color_attachments
            );
            color_count = caps.max_color_attachments;
        }

        // Drop attachments beyond the current configuration.
        while self.color_textures.len() > color_count as usize {
            if let Some(key) = self.color_textures.pop() {
                if let Some(mut texture) = textures.remove(key) {
                    texture.destroy(ctx);
                }
            }
        }

        let mut draw_buffers: SmallVec<[Attachment; 4]> = SmallVec::new();
        for i in 0..color_count {
            let key = match self.color_textures.get(i as usize) {
                Some(&key) => key,
                None => {
                    let mut texture = Texture::with_size(self.width, self.height);
                    texture.min_filter = self.desc.min_filter;
                    texture.mag_filter = self.desc.mag_filter;
                    texture.wrap_s = self.desc.wrap_s;
                    texture.wrap_t = self.desc.wrap_t;
                    texture.format = self.desc.format;
                    texture.internal_format = self.desc.internal_format;
                    texture.texel_type = self.desc.texel_type;
                    let key = textures.insert(texture);
                    self.color_textures.push(key);
                    key
                }
            };

            if let Some(texture) = textures.get_mut(key) {
                texture.set_size(self.width, self.height);
                texture.prepare(ctx);
                if let Some(handle) = texture.handle() {
                    ctx.api_mut().framebuffer_texture(
                        Attachment::Color(i),
                        TextureTarget::D2,
                        handle,
                    );
                }
            }
            draw_buffers.push(Attachment::Color(i));
        }

        // Multi-render-target shader access needs the mapping declared.
        if draw_buffers.len() > 1 {
            ctx.api_mut().draw_buffers(&draw_buffers);
        }
    }

    fn prepare_depth(&mut self, ctx: &mut Context, textures: &mut SlotMap<TextureKey, Texture>) {
        let depth_texture_supported = ctx.capabilities().depth_texture;

        if self.desc.depth_texture && depth_texture_supported {
            // Depth as texture; stencil cannot coexist with this path.
            let key = match self.depth_texture {
                Some(key) => key,
                None => {
                    let mut texture = Texture::with_size(self.width, self.height);
                    texture.min_filter = TextureFilter::Nearest;
                    texture.mag_filter = TextureFilter::Nearest;
                    texture.format = TextureFormat::DepthComponent;
                    texture.internal_format = TextureFormat::DepthComponent16;
                    texture.texel_type = TexelType::UnsignedInt;
                    let key = textures.insert(texture);
                    self.depth_texture = Some(key);
                    key
                }
            };

            if let Some(texture) = textures.get_mut(key) {
                texture.set_size(self.width, self.height);
                texture.prepare(ctx);
                if let Some(handle) = texture.handle() {
                    ctx.api_mut()
                        .framebuffer_texture(Attachment::Depth, TextureTarget::D2, handle);
                }
            }

            if let Some((_, renderbuffer)) = self.renderbuffer.take() {
                ctx.api_mut().delete_renderbuffer(renderbuffer);
            }
            return;
        }

        if self.desc.depth_texture {
            render_warn!("depth textures unsupported; falling back to a depth renderbuffer");
        }

        // Renderbuffer path: a previously attached depth texture is stale.
        if let Some(key) = self.depth_texture.take() {
            if let Some(mut texture) = textures.remove(key) {
                texture.destroy(ctx);
            }
        }

        let wants_depth = self.desc.depth || self.desc.depth_texture;
        let kind = match (wants_depth, self.desc.stencil) {
            (true, true) => Some(RenderbufferKind::DepthStencil),
            (true, false) => Some(RenderbufferKind::Depth),
            (false, true) => Some(RenderbufferKind::Stencil),
            (false, false) => None,
        };

        // A configuration change destroys the old renderbuffer.
        if let Some((current, renderbuffer)) = self.renderbuffer {
            if Some(current) != kind {
                ctx.api_mut().delete_renderbuffer(renderbuffer);
                self.renderbuffer = None;
            }
        }

        let Some(kind) = kind else {
            return;
        };

        let renderbuffer = match self.renderbuffer {
            Some((_, renderbuffer)) => renderbuffer,
            None => {
                let renderbuffer = ctx.api_mut().create_renderbuffer();
                self.renderbuffer = Some((kind, renderbuffer));
                renderbuffer
            }
        };

        let api = ctx.api_mut();
        api.bind_renderbuffer(Some(renderbuffer));
        api.renderbuffer_storage(kind.format(), self.width, self.height);
        api.framebuffer_renderbuffer(kind.attachment(), renderbuffer);
        api.bind_renderbuffer(None);
    }

    /// Releases the framebuffer, the renderbuffer, and every attachment
    /// texture this target owns.
    pub fn destroy(&mut self, ctx: &mut Context, textures: &mut SlotMap<TextureKey, Texture>) {
        for key in self.color_textures.drain(..) {
            if let Some(mut texture) = textures.remove(key) {
                texture.destroy(ctx);
            }
        }
        if let Some(key) = self.depth_texture.take() {
            if let Some(mut texture) = textures.remove(key) {
                texture.destroy(ctx);
            }
        }
        if let Some((_, renderbuffer)) = self.renderbuffer.take() {
            ctx.api_mut().delete_renderbuffer(renderbuffer);
        }
        if let Some(framebuffer) = self.framebuffer.take() {
            ctx.delete_framebuffer(framebuffer);
        }
        self.invalid = true;
        self.active_context = None;
    }
}
