//! # Opal
//!
//! A lightweight real-time 3D rendering core: a mutable scene graph with
//! hierarchical transforms, a deterministic draw-order pipeline (visibility
//! culling, three-bucket sorting, two-phase prepare/draw scheduling), and a
//! GPU resource lifecycle layer - buffers, vertex layouts, shared compiled
//! programs, textures, framebuffers - over a pluggable GL-style backend.
//!
//! The graphics API itself is a collaborator behind the [`gl::GlApi`] trait;
//! [`gl::headless::HeadlessApi`] drives the whole pipeline without a device,
//! which is how the test suite runs on CI.
//!
//! ```no_run
//! use opal::gl::headless::HeadlessApi;
//! use opal::{RenderOptions, Renderer, Resources, Scene};
//!
//! let mut renderer = Renderer::new(Box::new(HeadlessApi::new()), 1280, 720);
//! let mut scene = Scene::new();
//! let mut resources = Resources::new();
//! // ... build geometry, programs, meshes ...
//! renderer.render(&mut scene, &mut resources, RenderOptions::default());
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod gl;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use errors::{OpalError, Result};
pub use gl::{Capabilities, Context, GlApi};
pub use renderer::{RenderOptions, RenderTask, RenderTaskGroup, Renderer};
pub use resources::{
    Attribute, AttributeData, AttributeDesc, Geometry, GeometryKey, Mesh, Program, ProgramKey,
    RenderTarget, RenderTargetDesc, RenderTargetKey, Resources, Texture, TextureKey, UniformValue,
};
pub use scene::{Camera, CameraKey, MeshKey, Node, NodeKey, Scene, Transform};
