//! GPU-backed logical resources: geometries, programs, textures and render
//! targets, plus the central [`Resources`] store the renderer draws from.
//!
//! Every resource owns its GPU objects exclusively and releases them through
//! an explicit `destroy` call - except compiled program objects, which are
//! shared by source identity and reference-counted in the context's program
//! registry.

pub mod geometry;
pub mod mesh;
pub mod program;
pub mod program_data;
pub mod render_target;
pub mod texture;

pub use geometry::{Attribute, AttributeData, AttributeDesc, DrawRange, Geometry, GeometryBounds};
pub use mesh::Mesh;
pub use program::{Program, UniformValue};
pub use program_data::{
    ActiveAttribute, ActiveUniform, ProgramData, ProgramReflection, UniformAddress,
};
pub use render_target::{RenderTarget, RenderTargetDesc};
pub use texture::{Image, ImageSource, MipLevel, Texture};

use slotmap::{SlotMap, new_key_type};

use crate::gl::Context;

new_key_type! {
    /// Handle to a [`Geometry`] in a [`Resources`] store.
    pub struct GeometryKey;
    /// Handle to a [`Program`] in a [`Resources`] store.
    pub struct ProgramKey;
    /// Handle to a [`Texture`] in a [`Resources`] store.
    pub struct TextureKey;
    /// Handle to a [`RenderTarget`] in a [`Resources`] store.
    pub struct RenderTargetKey;
    /// Handle to shared [`ProgramData`] in the context's program registry.
    pub struct ProgramDataKey;
}

/// Central storage for shared logical resources.
///
/// Kept separate from the scene so several scenes can reference the same
/// geometries and programs, and so the renderer can split-borrow the pools
/// during a frame.
#[derive(Default)]
pub struct Resources {
    pub geometries: SlotMap<GeometryKey, Geometry>,
    pub programs: SlotMap<ProgramKey, Program>,
    pub textures: SlotMap<TextureKey, Texture>,
    pub render_targets: SlotMap<RenderTargetKey, RenderTarget>,
}

impl Resources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryKey {
        self.geometries.insert(geometry)
    }

    pub fn add_program(&mut self, program: Program) -> ProgramKey {
        self.programs.insert(program)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureKey {
        self.textures.insert(texture)
    }

    pub fn add_render_target(&mut self, target: RenderTarget) -> RenderTargetKey {
        self.render_targets.insert(target)
    }

    /// Removes a geometry, releasing its buffers and vertex arrays.
    pub fn remove_geometry(&mut self, ctx: &mut Context, key: GeometryKey) {
        if let Some(mut geometry) = self.geometries.remove(key) {
            geometry.destroy(ctx);
        }
    }

    /// Removes a program, releasing its shared program-data reference.
    pub fn remove_program(&mut self, ctx: &mut Context, key: ProgramKey) {
        if let Some(mut program) = self.programs.remove(key) {
            program.destroy(ctx);
        }
    }

    /// Removes a texture, releasing its GPU handle.
    pub fn remove_texture(&mut self, ctx: &mut Context, key: TextureKey) {
        if let Some(mut texture) = self.textures.remove(key) {
            texture.destroy(ctx);
        }
    }

    /// Removes a render target together with the attachment textures it owns.
    pub fn remove_render_target(&mut self, ctx: &mut Context, key: RenderTargetKey) {
        if let Some(mut target) = self.render_targets.remove(key) {
            target.destroy(ctx, &mut self.textures);
        }
    }
}
