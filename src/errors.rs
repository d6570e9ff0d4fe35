//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! Nothing in the render core is frame-fatal: the renderer converts every
//! failure below into a throttled diagnostic and carries on with the rest of
//! the frame. The `Result` forms exist so that inner operations can report
//! *why* something degraded instead of silently producing a broken frame.

use thiserror::Error;

/// The main error type for the Opal render core.
#[derive(Error, Debug)]
pub enum OpalError {
    // ========================================================================
    // Shader & Program Errors
    // ========================================================================
    /// A shader stage failed to compile. The log carries the backend output.
    #[error("{stage} shader failed to compile:\n{log}")]
    ShaderCompile {
        /// Which stage failed ("vertex" or "fragment")
        stage: &'static str,
        /// Backend compile log
        log: String,
    },

    /// Shader stages compiled but the program failed to link.
    #[error("program failed to link:\n{log}")]
    ProgramLink {
        /// Backend link log
        log: String,
    },

    /// A program was used before it ever linked successfully.
    #[error("program has no linked GPU object")]
    ProgramUnavailable,

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A slotmap key no longer resolves to a live resource.
    #[error("{kind} resource is no longer alive")]
    MissingResource {
        /// Resource kind ("geometry", "program", "texture", ...)
        kind: &'static str,
    },

    /// A texture was bound before it was ever prepared against a context.
    #[error("texture bound before prepare; no GPU handle exists")]
    TextureNotPrepared,
}

/// Alias for `Result<T, OpalError>`.
pub type Result<T> = std::result::Result<T, OpalError>;
