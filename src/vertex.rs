//! GPU-facing vertex layouts.
//!
//! Two layouts are used, matching the two kinds of quads the batcher emits:
//! [`Vertex`] for ordinary shape/image quads (drawn via the shared index
//! buffer) and [`GlyphVertex`] for SDF glyph quads (emitted as plain
//! triangle lists: one glyph quad is 6 vertices with only `(x, y, u, v)`).

use bytemuck::{Pod, Zeroable};

/// One vertex of a batched quad: `(x, y, u, v, packed_rgba, tex_unit_index,
/// node_u, node_v)` — 8 `f32`-sized words, 32 bytes.
///
/// `node_uv` carries the quad-local `0..1` coordinate independent of texture
/// UV, used by shaders that need a shape-relative coordinate (e.g. rounded
/// corners) distinct from the sampled texture region.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    /// Packed RGBA (`Color::to_packed`), reinterpreted as a `u32` in the
    /// vertex buffer and unpacked in the shader.
    pub color: u32,
    pub tex_unit: f32,
    pub node_uv: [f32; 2],
}

impl Vertex {
    pub const SIZE: usize = std::mem::size_of::<Vertex>();

    pub const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Uint32,
        3 => Float32,
        4 => Float32x2,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// A single SDF glyph-quad vertex: position and atlas UV only.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlyphVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl GlyphVertex {
    pub const SIZE: usize = std::mem::size_of::<GlyphVertex>();

    pub const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// The quad index pattern `0,1,2, 2,1,3`, repeated for every
/// quad slot the caller's index buffer needs to hold.
pub fn build_quad_index_buffer(max_quads: usize) -> Vec<u16> {
    let mut indices = Vec::with_capacity(max_quads * 6);
    for quad in 0..max_quads {
        let base = (quad * 4) as u16;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_32_bytes() {
        assert_eq!(Vertex::SIZE, 32);
    }

    #[test]
    fn index_pattern_repeats_per_quad() {
        let indices = build_quad_index_buffer(2);
        assert_eq!(indices, vec![0, 1, 2, 2, 1, 3, 4, 5, 6, 6, 5, 7]);
    }
}
