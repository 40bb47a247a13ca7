//! # tvscene
//!
//! `tvscene` is a retained-mode 2D scene-graph renderer built on
//! [`wgpu`](https://crates.io/crates/wgpu), designed for TV-class constrained
//! devices: a bounded arena of nodes, quad batching into a small number of
//! draw calls, a byte-budgeted texture cache, render-to-texture composition,
//! and SDF text layout.
//!
//! ## Getting started
//!
//! ```toml
//! [dependencies]
//! tvscene = "0.1.0"
//! wgpu = "25"
//! ```
//!
//! ### Basic usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tvscene::{FrameDriver, NullPlatform, RendererConfig};
//!
//! async fn run(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) {
//!     let mut driver = FrameDriver::new(
//!         device,
//!         queue,
//!         wgpu::TextureFormat::Rgba8UnormSrgb,
//!         RendererConfig::default(),
//!         Arc::new(NullPlatform::default()),
//!     );
//!
//!     let node = driver.scene.create_node(None);
//!     if let Some(n) = driver.scene.get_mut(node) {
//!         n.set_w(200.0);
//!         n.set_h(100.0);
//!     }
//!
//!     // driver.tick(&surface_view, (1920.0, 1080.0));
//! }
//! ```
//!
//! For a worked scene-building example see the `tvscene-test-scenes`
//! workspace member.

pub use wgpu;

mod batch;
mod color;
mod config;
mod error;
mod events;
mod font;
mod frame;
mod framebuffer_pool;
mod gpu_context;
mod id;
mod image_worker;
mod matrix;
mod metrics;
mod node;
mod platform;
mod rtt;
mod scene;
mod shader;
mod text_layout;
mod texture;
mod texture_cache;
mod vertex;
mod zorder;

pub use color::Color;
pub use config::RendererConfig;
pub use error::{BatchError, GpuError, RendererError, RttError, TextureError};
pub use events::{Event, EventBus};
pub use font::{parse_font_json, FontDescriptor, FontId, FontRegistry, Glyph};
pub use frame::FrameDriver;
pub use gpu_context::{request_headless_device, GpuContext};
pub use id::{NodeId, RequestId, ShaderId, TextureId};
pub use image_worker::{
    DecoderCapabilities, ImageSource, ImageWorkerPool, WorkerResult,
    ImageWorkerError as ImageDecodeError,
};
pub use matrix::{BoundsMargin, Rect};
pub use metrics::{BatchCounters, FrameTimeSummary, PhaseTimings, RollingMetrics};
pub use node::{
    CornerColors, Geometry, ImageProps, Node, NodeFlags, RenderState, ResizeMode, ShaderProps,
    WorldState,
};
pub use platform::{DecodeOptions, DecodedBitmap, NullPlatform, Platform, PlatformError};
pub use rtt::{DuePass, RttScheduler};
pub use scene::Scene;
pub use shader::{ShaderProgram, ShaderRegistry, MAX_TEXTURE_IMAGE_UNITS};
pub use text_layout::{
    FontWaiters, PlacedGlyph, TextAlign, TextLayout, TextLayoutCache, TextLayoutProps,
};
pub use texture::{GpuTexture, Texture, TextureKind, TextureState};
pub use texture_cache::{TextureCache, TextureSampleInfo};
