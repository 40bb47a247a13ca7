//! Renderer configuration.

use crate::color::Color;

/// Top-level renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Logical viewport width. Default 1920.
    pub app_width: f32,
    /// Logical viewport height. Default 1080.
    pub app_height: f32,
    /// Device physical pixel ratio (e.g. for retina displays).
    pub device_physical_pixel_ratio: f32,
    /// Device logical pixel ratio.
    pub device_logical_pixel_ratio: f32,
    /// Clear color for the main pass. Default transparent black.
    pub clear_color: Color,
    /// Viewport expansion used by the out-of-bounds test.
    pub bounds_margin: crate::matrix::BoundsMargin,
    /// Eviction trigger for the texture memory manager, in bytes.
    pub tx_mem_byte_threshold: u64,
    /// Interleaved vertex arena size, in bytes.
    pub quad_buffer_size: usize,
    /// Image decode worker pool size.
    pub num_image_workers: usize,
    /// Prefer WebGL2-equivalent backend capabilities if available.
    pub force_webgl2: bool,
    /// Enable inspector instrumentation.
    pub enable_inspector: bool,
    /// Enable GPU-context call spying (records every state-changing call).
    pub enable_context_spy: bool,
    /// How often (ms) the FPS counter refreshes.
    pub fps_update_interval: f32,
    /// RTT framebuffer pool size classes, in logical pixels per side.
    pub rtt_pool_size_classes: [u32; 3],
    /// Maximum texture units a single RenderOp may bind, bounded by the
    /// device's `MAX_TEXTURE_IMAGE_UNITS`.
    pub max_texture_image_units: usize,
    /// `MAX_TEXTURE_SIZE` in either dimension before a texture load is
    /// rejected as too large.
    pub max_texture_size: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_width: 1920.0,
            app_height: 1080.0,
            device_physical_pixel_ratio: 1.0,
            device_logical_pixel_ratio: 1.0,
            clear_color: Color::TRANSPARENT,
            bounds_margin: crate::matrix::BoundsMargin::default(),
            tx_mem_byte_threshold: 124 * 1024 * 1024,
            quad_buffer_size: 4 * 1024 * 1024,
            num_image_workers: 2,
            force_webgl2: false,
            enable_inspector: false,
            enable_context_spy: false,
            fps_update_interval: 1000.0,
            rtt_pool_size_classes: [256, 512, 1024],
            max_texture_image_units: 16,
            max_texture_size: 4096,
        }
    }
}
