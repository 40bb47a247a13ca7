//! Error types for the renderer core.
//!
//! Matches the rest of the crate's style: plain enums with a hand-written
//! `Display` and a blanket `std::error::Error` impl, no `thiserror`. Most of
//! these are *recoverable*: they update entity state and are pushed onto the
//! `events::EventBus` rather than returned from the frame tick.

use std::fmt;

/// A structured GPU error surfaced by the [`crate::gpu_context::GpuContext`].
#[derive(Debug, Clone)]
pub struct GpuError {
    pub code: u32,
    pub name: &'static str,
    pub operation: &'static str,
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GPU error {} ({}) during {}",
            self.code, self.name, self.operation
        )
    }
}

impl std::error::Error for GpuError {}

/// Texture cache / memory manager errors.
#[derive(Debug, Clone)]
pub enum TextureError {
    NotFound(crate::id::TextureId),
    TooLarge { width: u32, height: u32, max: u32 },
    DecodeFailed(String),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::NotFound(id) => write!(f, "texture {id:?} not found"),
            TextureError::TooLarge { width, height, max } => write!(
                f,
                "texture {width}x{height} exceeds MAX_TEXTURE_SIZE ({max})"
            ),
            TextureError::DecodeFailed(msg) => write!(f, "image decode failed: {msg}"),
        }
    }
}

impl std::error::Error for TextureError {}

/// Quad-batching errors. `CannotFitFreshOp` is the one kind that's fatal —
/// it indicates a programming error, not a recoverable
/// runtime condition, so callers are expected to let it propagate/panic.
#[derive(Debug, Clone)]
pub enum BatchError {
    CannotFitFreshOp,
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::CannotFitFreshOp => write!(
                f,
                "a fresh RenderOp could not accept a texture it should always have room for"
            ),
        }
    }
}

impl std::error::Error for BatchError {}

/// Render-to-texture allocation errors. Always recoverable: the owning
/// node renders without RTT for the frame and retries next frame.
#[derive(Debug, Clone)]
pub enum RttError {
    FramebufferAllocationFailed { width: u32, height: u32 },
}

impl fmt::Display for RttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RttError::FramebufferAllocationFailed { width, height } => {
                write!(f, "failed to allocate a {width}x{height} RTT framebuffer")
            }
        }
    }
}

impl std::error::Error for RttError {}

/// Image decode worker errors. Per-request; no cross-request impact.
#[derive(Debug, Clone)]
pub struct ImageWorkerError {
    pub request_id: u64,
    pub message: String,
}

impl fmt::Display for ImageWorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "image decode request {} failed: {}",
            self.request_id, self.message
        )
    }
}

impl std::error::Error for ImageWorkerError {}

/// Top-level tag for events pushed onto the [`crate::events::EventBus`] when a
/// recoverable error occurs. The frame tick never returns `Result` — this is
/// how callers observe these error kinds instead.
#[derive(Debug, Clone)]
pub enum RendererError {
    ContextLost,
    ShaderCompileFailed { shader_label: String, info_log: String },
    TextureLoadFailed { id: crate::id::TextureId, reason: String },
    TextureTooLarge { id: crate::id::TextureId, width: u32, height: u32 },
    RttAllocationFailed { node: crate::id::NodeId },
    ImageWorker(ImageWorkerError),
    FontParseFailed { family: String, reason: String },
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererError::ContextLost => write!(f, "GPU context lost"),
            RendererError::ShaderCompileFailed { shader_label, info_log } => {
                write!(f, "shader '{shader_label}' failed to compile: {info_log}")
            }
            RendererError::TextureLoadFailed { id, reason } => {
                write!(f, "texture {id:?} failed to load: {reason}")
            }
            RendererError::TextureTooLarge { id, width, height } => {
                write!(f, "texture {id:?} too large ({width}x{height})")
            }
            RendererError::RttAllocationFailed { node } => {
                write!(f, "RTT framebuffer allocation failed for node {node:?}")
            }
            RendererError::ImageWorker(err) => write!(f, "{err}"),
            RendererError::FontParseFailed { family, reason } => {
                write!(f, "font '{family}' failed to parse: {reason}")
            }
        }
    }
}

impl std::error::Error for RendererError {}
