//! Texture and Render-Target Tests
//!
//! Tests for:
//! - Placeholder-pixel invariant for imageless textures
//! - Upload staleness (image version, dirty flag, first context use)
//! - Non-power-of-two mipmap downgrade
//! - Render-target attachment exclusivity (depth texture vs renderbuffer)
//! - Resize as pure invalidation
//! - Attachment cleanup on destroy

use opal::gl::headless::HeadlessApi;
use opal::gl::{Capabilities, Context, GlApi, TextureFilter, TextureTarget, TextureWrap};
use opal::resources::{Image, ImageSource};
use opal::utils::warning_count;
use opal::{RenderTarget, RenderTargetDesc, Resources, Texture};

fn context() -> Context {
    let mut ctx = Context::new(Box::new(HeadlessApi::new()));
    ctx.set_drawable_size(800, 600);
    ctx
}

fn context_with(caps: Capabilities) -> Context {
    let mut ctx = Context::new(Box::new(HeadlessApi::with_capabilities(caps)));
    ctx.set_drawable_size(800, 600);
    ctx
}

fn api(ctx: &Context) -> &HeadlessApi {
    ctx.api().as_any().downcast_ref().unwrap()
}

fn checker(width: u32, height: u32) -> Image {
    Image {
        width,
        height,
        pixels: vec![128; (width * height * 4) as usize],
    }
}

// ============================================================================
// Texture upload protocol
// ============================================================================

#[test]
fn imageless_texture_uploads_an_opaque_placeholder() {
    let mut ctx = context();
    let mut texture = Texture::new(ImageSource::None);

    texture.prepare(&mut ctx);

    let handle = texture.handle().expect("handle must exist after prepare");
    let record = api(&ctx).texture(handle).unwrap();
    assert_eq!((record.width, record.height), (1, 1));
    assert!(record.has_data, "placeholder pixel must carry data");
    assert_eq!(record.uploads, 1);
}

#[test]
fn imageless_cube_uploads_six_placeholders() {
    let mut ctx = context();
    let mut texture = Texture::new(ImageSource::None);
    texture.target = TextureTarget::Cube;
    texture.flip_y = false;

    texture.prepare(&mut ctx);

    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert_eq!(record.uploads, 6);
}

#[test]
fn sized_texture_allocates_empty_storage() {
    let mut ctx = context();
    let mut texture = Texture::with_size(256, 128);

    texture.prepare(&mut ctx);

    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert_eq!((record.width, record.height), (256, 128));
    assert!(!record.has_data, "render-target storage carries no texels");
}

#[test]
fn upload_happens_only_when_stale() {
    let mut ctx = context();
    let mut texture = Texture::new(ImageSource::Image(checker(4, 4)));

    texture.prepare(&mut ctx);
    texture.prepare(&mut ctx);
    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert_eq!(record.uploads, 1, "clean texture must not re-upload");

    texture.mark_dirty();
    texture.prepare(&mut ctx);
    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert_eq!(record.uploads, 2);

    texture.set_image(ImageSource::Image(checker(8, 8)));
    texture.prepare(&mut ctx);
    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert_eq!(record.uploads, 3);
    assert_eq!((record.width, record.height), (8, 8));
}

#[test]
fn image_dimensions_are_inferred_and_mipmapped() {
    let mut ctx = context();
    let mut texture = Texture::new(ImageSource::Image(checker(64, 32)));

    texture.prepare(&mut ctx);

    assert_eq!((texture.width, texture.height), (64, 32));
    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert!(record.mipmapped);
}

#[test]
fn compressed_levels_upload_without_mipmap_generation() {
    let mut ctx = context();
    let levels = vec![
        opal::resources::MipLevel {
            width: 8,
            height: 8,
            data: vec![0; 64],
        },
        opal::resources::MipLevel {
            width: 4,
            height: 4,
            data: vec![0; 16],
        },
    ];
    let mut texture = Texture::new(ImageSource::Compressed(levels));

    texture.prepare(&mut ctx);

    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert_eq!(record.compressed_levels, 2);
    assert!(!record.mipmapped, "pre-mipped data never generates mipmaps");
}

#[test]
fn npot_mipmaps_downgrade_without_device_support() {
    let before = warning_count();
    let mut ctx = context_with(Capabilities {
        npot_mipmaps: false,
        ..Capabilities::default()
    });

    let mut texture = Texture::new(ImageSource::Image(checker(100, 50)));
    assert!(texture.generate_mipmaps);
    texture.prepare(&mut ctx);

    assert!(!texture.generate_mipmaps);
    assert_eq!(texture.wrap_s, TextureWrap::ClampToEdge);
    assert_eq!(texture.min_filter, TextureFilter::Linear);
    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert!(!record.mipmapped);
    assert!(warning_count() > before);
}

#[test]
fn bind_before_prepare_is_a_loud_no_op() {
    let before = warning_count();
    let mut ctx = context();
    let texture = Texture::new(ImageSource::None);

    texture.bind(&mut ctx, 0);

    assert!(warning_count() > before);
}

#[test]
fn anisotropy_clamps_to_device_maximum() {
    let mut ctx = context_with(Capabilities {
        max_anisotropy: 4.0,
        ..Capabilities::default()
    });

    let mut texture = Texture::new(ImageSource::Image(checker(4, 4)));
    texture.anisotropy = 16.0;
    texture.prepare(&mut ctx);

    let record = api(&ctx).texture(texture.handle().unwrap()).unwrap();
    assert!((record.anisotropy - 4.0).abs() < f32::EPSILON);
}

// ============================================================================
// Render-target attachments
// ============================================================================

#[test]
fn depth_texture_excludes_renderbuffers() {
    let mut ctx = context();
    let mut resources = Resources::new();

    let mut target = RenderTarget::new(RenderTargetDesc {
        width: 128,
        height: 128,
        depth_texture: true,
        ..RenderTargetDesc::default()
    });
    target.prepare(&mut ctx, &mut resources.textures);

    assert!(target.depth_texture().is_some());
    assert!(!target.has_renderbuffer());

    let fb = api(&ctx).framebuffer(target.framebuffer().unwrap()).unwrap();
    assert!(fb.depth_texture.is_some());
    assert!(fb.depth_renderbuffer.is_none());
    assert!(fb.stencil_renderbuffer.is_none());
    assert!(fb.depth_stencil_renderbuffer.is_none());
}

#[test]
fn depth_stencil_without_depth_texture_support_uses_one_combined_renderbuffer() {
    let mut ctx = context_with(Capabilities {
        depth_texture: false,
        ..Capabilities::default()
    });
    let mut resources = Resources::new();

    let mut target = RenderTarget::new(RenderTargetDesc {
        width: 64,
        height: 64,
        depth: true,
        stencil: true,
        depth_texture: true,
        ..RenderTargetDesc::default()
    });
    target.prepare(&mut ctx, &mut resources.textures);

    assert!(target.depth_texture().is_none());
    assert!(target.has_renderbuffer());

    let fb = api(&ctx).framebuffer(target.framebuffer().unwrap()).unwrap();
    assert!(fb.depth_texture.is_none());
    assert!(fb.depth_stencil_renderbuffer.is_some());
    assert!(fb.depth_renderbuffer.is_none());
    assert!(fb.stencil_renderbuffer.is_none());
    assert_eq!(api(&ctx).alive_renderbuffers(), 1);
}

#[test]
fn no_depth_no_stencil_means_no_renderbuffer() {
    let mut ctx = context();
    let mut resources = Resources::new();

    let mut target = RenderTarget::new(RenderTargetDesc {
        width: 32,
        height: 32,
        depth: false,
        stencil: false,
        ..RenderTargetDesc::default()
    });
    target.prepare(&mut ctx, &mut resources.textures);

    assert!(!target.has_renderbuffer());
    assert!(target.depth_texture().is_none());
    assert_eq!(api(&ctx).alive_renderbuffers(), 0);
}

#[test]
fn multiple_color_attachments_declare_draw_buffers() {
    let mut ctx = context();
    let mut resources = Resources::new();

    let mut target = RenderTarget::new(RenderTargetDesc {
        width: 64,
        height: 64,
        color: 3,
        ..RenderTargetDesc::default()
    });
    target.prepare(&mut ctx, &mut resources.textures);

    assert_eq!(target.textures().len(), 3);
    let fb = api(&ctx).framebuffer(target.framebuffer().unwrap()).unwrap();
    assert_eq!(fb.color.len(), 3);
    assert_eq!(fb.draw_buffers.len(), 3);
}

#[test]
fn draw_buffer_absence_clamps_color_attachments() {
    let before = warning_count();
    let mut ctx = context_with(Capabilities {
        draw_buffers: false,
        ..Capabilities::default()
    });
    let mut resources = Resources::new();

    let mut target = RenderTarget::new(RenderTargetDesc {
        width: 64,
        height: 64,
        color: 3,
        ..RenderTargetDesc::default()
    });
    target.prepare(&mut ctx, &mut resources.textures);

    assert_eq!(target.textures().len(), 1);
    assert!(warning_count() > before);
}

#[test]
fn unsized_target_resolves_to_drawable_size() {
    let mut ctx = context();
    let mut resources = Resources::new();

    let mut target = RenderTarget::new(RenderTargetDesc::default());
    target.prepare(&mut ctx, &mut resources.textures);

    assert_eq!((target.width, target.height), (800, 600));
}

#[test]
fn set_size_defers_gpu_work_to_next_prepare() {
    let mut ctx = context();
    let mut resources = Resources::new();

    let mut target = RenderTarget::new(RenderTargetDesc {
        width: 64,
        height: 64,
        ..RenderTargetDesc::default()
    });
    target.prepare(&mut ctx, &mut resources.textures);

    let color = target.texture().unwrap();
    let handle = resources.textures.get(color).unwrap().handle().unwrap();
    assert_eq!(api(&ctx).texture(handle).unwrap().width, 64);

    target.set_size(128, 256);
    // Invalidation only: the GPU side is untouched until prepare.
    assert_eq!(api(&ctx).texture(handle).unwrap().width, 64);

    target.prepare(&mut ctx, &mut resources.textures);
    let record = api(&ctx).texture(handle).unwrap();
    assert_eq!((record.width, record.height), (128, 256));
    assert_eq!((target.width, target.height), (128, 256));
}

#[test]
fn destroy_releases_attachments() {
    let mut ctx = context();
    let mut resources = Resources::new();

    let key = resources.add_render_target(RenderTarget::new(RenderTargetDesc {
        width: 64,
        height: 64,
        depth: true,
        stencil: true,
        ..RenderTargetDesc::default()
    }));
    {
        let Resources {
            render_targets,
            textures,
            ..
        } = &mut resources;
        render_targets
            .get_mut(key)
            .unwrap()
            .prepare(&mut ctx, textures);
    }
    assert!(api(&ctx).alive_textures() > 0);
    assert_eq!(api(&ctx).alive_renderbuffers(), 1);

    resources.remove_render_target(&mut ctx, key);

    assert_eq!(api(&ctx).alive_textures(), 0);
    assert_eq!(api(&ctx).alive_renderbuffers(), 0);
    assert!(resources.textures.is_empty());
}
