//! Shader Program Registry.
//!
//! Each [`crate::node::ShaderProps`] variant maps to one compiled, immutable
//! [`ShaderProgram`]. Batching keys on the variant tag directly (Design
//! Note 9: "avoid per-call virtual dispatch by keying on the variant tag in
//! the batcher's hot loop") rather than dispatching through a trait object.
//!
//! Vertex positions already carry baked NDC coordinates (computed CPU-side
//! during quad emission, `batch.rs`), so every vertex shader here is a thin
//! passthrough; the interesting work is per-fragment.

use std::num::NonZeroU32;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::id::ShaderId;
use crate::node::ShaderProps;
use crate::vertex::{GlyphVertex, Vertex};

/// Mirrors `MAX_TEXTURE_IMAGE_UNITS` (`crate::config::RendererConfig`): the
/// quad shaders bind a fixed-size texture array rather than one texture per
/// draw call, so a `RenderOp` can batch quads referencing up to this many
/// distinct textures into a single draw.
pub const MAX_TEXTURE_IMAGE_UNITS: u32 = 16;

/// GPU-side mirror of the `RoundedParams` uniform struct in
/// [`QUAD_SHADER_WGSL`] (group 1, binding 0), std140-compatible at 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RoundedParams {
    pub radius: f32,
    pub aspect: f32,
    pub _pad: [f32; 2],
}

/// GPU-side mirror of the `SdfParams` uniform struct in [`SDF_SHADER_WGSL`]
/// (group 1, binding 0), std140-compatible at 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SdfParams {
    pub color: [f32; 4],
    pub font_scale: f32,
    pub distance_range: f32,
    pub _pad: [f32; 2],
}

/// Derives the rounded-corner uniform for a shader variant. `RoundedRectangle`
/// carries four independent corner radii, but the fragment shader's SDF only
/// accepts one scalar radius, so the first corner stands in for all four.
pub fn rounded_params_for(shader: &ShaderProps) -> RoundedParams {
    let radius = match shader {
        ShaderProps::Rounded { radius } => *radius,
        ShaderProps::RoundedRectangle { radii } => radii[0],
        _ => 0.0,
    };
    RoundedParams { radius, aspect: 1.0, _pad: [0.0, 0.0] }
}

/// Derives the SDF text uniform for a shader variant and fill color.
pub fn sdf_params_for(font_scale: f32, distance_range: f32, color: [f32; 4]) -> SdfParams {
    SdfParams { color, font_scale, distance_range, _pad: [0.0, 0.0] }
}

pub const DEFAULT_SHADER: ShaderId = ShaderId(0);
pub const ROUNDED_SHADER: ShaderId = ShaderId(1);
pub const ROUNDED_RECTANGLE_SHADER: ShaderId = ShaderId(2);
pub const SDF_SHADER: ShaderId = ShaderId(3);

const QUAD_SHADER_WGSL: &str = r#"
struct VsOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) node_uv: vec2<f32>,
    @location(3) @interpolate(flat) tex_unit: u32,
};

@vertex
fn vs_main(
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: u32,
    @location(3) tex_unit: f32,
    @location(4) node_uv: vec2<f32>,
) -> VsOut {
    var out: VsOut;
    out.clip_position = vec4<f32>(position, 0.0, 1.0);
    out.uv = uv;
    out.color = vec4<f32>(
        f32(color & 0xffu) / 255.0,
        f32((color >> 8u) & 0xffu) / 255.0,
        f32((color >> 16u) & 0xffu) / 255.0,
        f32((color >> 24u) & 0xffu) / 255.0,
    );
    out.node_uv = node_uv;
    out.tex_unit = u32(tex_unit);
    return out;
}

@group(0) @binding(0) var tex_sampler: sampler;
@group(0) @binding(1) var textures: binding_array<texture_2d<f32>>;

struct RoundedParams {
    radius: f32,
    aspect: f32,
    _pad: vec2<f32>,
};
@group(1) @binding(0) var<uniform> rounded: RoundedParams;

fn rounded_alpha(node_uv: vec2<f32>, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 1.0;
    }
    let centered = abs(node_uv - vec2<f32>(0.5, 0.5)) - (vec2<f32>(0.5, 0.5) - vec2<f32>(radius, radius));
    let outside = max(centered, vec2<f32>(0.0, 0.0));
    let dist = length(outside) - radius;
    return 1.0 - clamp(dist * 64.0, 0.0, 1.0);
}

@fragment
fn fs_main_default(in: VsOut) -> @location(0) vec4<f32> {
    let sampled = textureSample(textures[in.tex_unit], tex_sampler, in.uv);
    return sampled * in.color;
}

@fragment
fn fs_main_rounded(in: VsOut) -> @location(0) vec4<f32> {
    let sampled = textureSample(textures[in.tex_unit], tex_sampler, in.uv);
    let a = rounded_alpha(in.node_uv, rounded.radius);
    return sampled * in.color * a;
}
"#;

const SDF_SHADER_WGSL: &str = r#"
struct VsOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.clip_position = vec4<f32>(position, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@group(0) @binding(0) var atlas_sampler: sampler;
@group(0) @binding(1) var atlas: texture_2d<f32>;

struct SdfParams {
    color: vec4<f32>,
    font_scale: f32,
    distance_range: f32,
    _pad: vec2<f32>,
};
@group(1) @binding(0) var<uniform> params: SdfParams;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let dist = textureSample(atlas, atlas_sampler, in.uv).r;
    let screen_px_range = max(params.distance_range * params.font_scale, 1.0);
    let signed_dist = (dist - 0.5) * screen_px_range;
    let alpha = clamp(signed_dist + 0.5, 0.0, 1.0);
    return vec4<f32>(params.color.rgb, params.color.a * alpha);
}
"#;

/// An immutable, linked shader program.
pub struct ShaderProgram {
    pub pipeline: Arc<wgpu::RenderPipeline>,
    pub texture_bind_group_layout: Arc<wgpu::BindGroupLayout>,
    pub params_bind_group_layout: Arc<wgpu::BindGroupLayout>,
}

pub struct ShaderRegistry {
    quad_texture_bgl: Arc<wgpu::BindGroupLayout>,
    rounded_params_bgl: Arc<wgpu::BindGroupLayout>,
    sdf_texture_bgl: Arc<wgpu::BindGroupLayout>,
    sdf_params_bgl: Arc<wgpu::BindGroupLayout>,

    pub default_program: ShaderProgram,
    pub rounded_program: ShaderProgram,
    pub rounded_rectangle_program: ShaderProgram,
    pub sdf_program: ShaderProgram,
}

/// Binding layout for the quad shaders: a sampler plus a fixed-size array of
/// [`MAX_TEXTURE_IMAGE_UNITS`] textures, so a `RenderOp`'s `tex_unit` index
/// (`crate::batch::TextureUnitSet`) can select among several bound textures
/// within one draw call instead of forcing a draw-call-per-texture.
fn quad_texture_bind_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: NonZeroU32::new(MAX_TEXTURE_IMAGE_UNITS),
            },
        ],
    })
}

/// Binding layout for the SDF text shader: a single atlas texture, since a
/// `TextRenderOp` draws one text node's glyphs against one font atlas at a
/// time and is never batched across texture units.
fn sdf_texture_bind_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ],
    })
}

fn uniform_bind_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn color_target(format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        write_mask: wgpu::ColorWrites::ALL,
    }
}

fn build_quad_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    shader: &wgpu::ShaderModule,
    fs_entry: &str,
    label: &str,
    texture_bgl: &wgpu::BindGroupLayout,
    params_bgl: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[texture_bgl, params_bgl],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fs_entry),
            targets: &[Some(color_target(format))],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl ShaderRegistry {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let quad_texture_bgl = Arc::new(quad_texture_bind_group_layout(device, "quad-texture-bgl"));
        let rounded_params_bgl = Arc::new(uniform_bind_group_layout(device, "rounded-params-bgl"));
        let sdf_texture_bgl = Arc::new(sdf_texture_bind_group_layout(device, "sdf-texture-bgl"));
        let sdf_params_bgl = Arc::new(uniform_bind_group_layout(device, "sdf-params-bgl"));

        let quad_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad-shader"),
            source: wgpu::ShaderSource::Wgsl(QUAD_SHADER_WGSL.into()),
        });
        let sdf_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sdf-shader"),
            source: wgpu::ShaderSource::Wgsl(SDF_SHADER_WGSL.into()),
        });

        let default_pipeline = build_quad_pipeline(
            device, surface_format, &quad_shader, "fs_main_default", "default-pipeline",
            &quad_texture_bgl, &rounded_params_bgl,
        );
        let rounded_pipeline = build_quad_pipeline(
            device, surface_format, &quad_shader, "fs_main_rounded", "rounded-pipeline",
            &quad_texture_bgl, &rounded_params_bgl,
        );
        let rounded_rectangle_pipeline = build_quad_pipeline(
            device, surface_format, &quad_shader, "fs_main_rounded", "rounded-rectangle-pipeline",
            &quad_texture_bgl, &rounded_params_bgl,
        );

        let sdf_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sdf-pipeline-layout"),
            bind_group_layouts: &[&sdf_texture_bgl, &sdf_params_bgl],
            push_constant_ranges: &[],
        });
        let sdf_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sdf-pipeline"),
            layout: Some(&sdf_layout),
            vertex: wgpu::VertexState {
                module: &sdf_shader,
                entry_point: Some("vs_main"),
                buffers: &[GlyphVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &sdf_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(color_target(surface_format))],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            default_program: ShaderProgram {
                pipeline: Arc::new(default_pipeline),
                texture_bind_group_layout: quad_texture_bgl.clone(),
                params_bind_group_layout: rounded_params_bgl.clone(),
            },
            rounded_program: ShaderProgram {
                pipeline: Arc::new(rounded_pipeline),
                texture_bind_group_layout: quad_texture_bgl.clone(),
                params_bind_group_layout: rounded_params_bgl.clone(),
            },
            rounded_rectangle_program: ShaderProgram {
                pipeline: Arc::new(rounded_rectangle_pipeline),
                texture_bind_group_layout: quad_texture_bgl.clone(),
                params_bind_group_layout: rounded_params_bgl.clone(),
            },
            sdf_program: ShaderProgram {
                pipeline: Arc::new(sdf_pipeline),
                texture_bind_group_layout: sdf_texture_bgl.clone(),
                params_bind_group_layout: sdf_params_bgl.clone(),
            },
            quad_texture_bgl,
            rounded_params_bgl,
            sdf_texture_bgl,
            sdf_params_bgl,
        }
    }

    pub fn program_for(&self, shader: &ShaderProps) -> &ShaderProgram {
        match shader {
            ShaderProps::Default => &self.default_program,
            ShaderProps::Rounded { .. } => &self.rounded_program,
            ShaderProps::RoundedRectangle { .. } => &self.rounded_rectangle_program,
            ShaderProps::Sdf { .. } => &self.sdf_program,
            // Custom shader kinds reuse the default pipeline's layout for
            // batching purposes; a user-registered kind supplies its own
            // pipeline out of band and is looked up by `ShaderId` elsewhere.
            ShaderProps::Custom { .. } => &self.default_program,
        }
    }
}

/// `reuseRenderOp(a, b) → bool`: two quads
/// using the same shader variant can share a `RenderOp` only if their
/// property bags are batching-compatible — a shader uniform is per draw
/// call, not per vertex, so differing params force a new op.
pub fn can_reuse_render_op(a: &ShaderProps, b: &ShaderProps) -> bool {
    match (a, b) {
        (ShaderProps::Default, ShaderProps::Default) => true,
        (ShaderProps::Rounded { radius: ra }, ShaderProps::Rounded { radius: rb }) => ra == rb,
        (
            ShaderProps::RoundedRectangle { radii: ra },
            ShaderProps::RoundedRectangle { radii: rb },
        ) => ra == rb,
        (
            ShaderProps::Sdf { font_scale: fa, distance_range: da },
            ShaderProps::Sdf { font_scale: fb, distance_range: db },
        ) => fa == fb && da == db,
        (
            ShaderProps::Custom { id: ia, params: pa },
            ShaderProps::Custom { id: ib, params: pb },
        ) => ia == ib && pa == pb,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shader_always_reusable() {
        assert!(can_reuse_render_op(&ShaderProps::Default, &ShaderProps::Default));
    }

    #[test]
    fn rounded_with_different_radius_is_not_reusable() {
        let a = ShaderProps::Rounded { radius: 4.0 };
        let b = ShaderProps::Rounded { radius: 8.0 };
        assert!(!can_reuse_render_op(&a, &b));
    }

    #[test]
    fn different_shader_kinds_never_reusable() {
        assert!(!can_reuse_render_op(&ShaderProps::Default, &ShaderProps::Rounded { radius: 1.0 }));
    }
}
