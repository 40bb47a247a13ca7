//! The scene graph's central entity: `Node` and its derived `WorldState`.
//!
//! Field groups are organized by concern: geometry, appearance, tree
//! linkage, behavior flags, and derived state recomputed each frame.

use crate::color::Color;
use crate::id::{NodeId, ShaderId, TextureId};
use crate::matrix::Rect;
use crate::text_layout::TextLayoutProps;
use glam::Affine2;

/// Render-state classification computed by the update pass.
///
/// Quad emission *reads* this but never mutates it — only the update pass
/// transitions it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// AABB intersects the viewport rect.
    InViewport,
    /// Within viewport expanded by the bounds margin, but not `InViewport`.
    InBounds,
    /// Outside viewport + margin entirely.
    OutOfBounds,
}

impl RenderState {
    pub fn is_out_of_bounds(self) -> bool {
        matches!(self, RenderState::OutOfBounds)
    }
}

/// A shader attached to a node, with its per-shader-kind property bag.
///
/// Modeled as a tagged variant rather than a trait object so the batcher's
/// hot loop can key on the variant tag directly instead of paying for
/// per-call virtual dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderProps {
    Default,
    Rounded { radius: f32 },
    RoundedRectangle { radii: [f32; 4] },
    Sdf { font_scale: f32, distance_range: f32 },
    Custom { id: ShaderId, params: Vec<f32> },
}

impl ShaderProps {
    pub fn shader_id(&self) -> ShaderId {
        match self {
            ShaderProps::Default => ShaderId(0),
            ShaderProps::Rounded { .. } => ShaderId(1),
            ShaderProps::RoundedRectangle { .. } => ShaderId(2),
            ShaderProps::Sdf { .. } => ShaderId(3),
            ShaderProps::Custom { id, .. } => *id,
        }
    }
}

/// Geometry properties of a node, all in logical pixels / radians / 0..1
/// fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub mount_x: f32,
    pub mount_y: f32,
    pub pivot_x: f32,
    pub pivot_y: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 0.0,
            h: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            mount_x: 0.0,
            mount_y: 0.0,
            pivot_x: 0.5,
            pivot_y: 0.5,
        }
    }
}

/// The four corner colors of a node's quad, packed 32-bit RGBA each.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerColors {
    pub tl: Color,
    pub tr: Color,
    pub bl: Color,
    pub br: Color,
}

impl CornerColors {
    pub fn solid(color: Color) -> Self {
        Self { tl: color, tr: color, bl: color, br: color }
    }

    pub fn is_gradient(&self) -> bool {
        !(self.tl == self.tr && self.tr == self.bl && self.bl == self.br)
    }
}

/// Boolean flags controlling clipping, render-to-texture, and sizing
/// behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags {
    pub clipping: bool,
    pub rtt: bool,
    pub autosize: bool,
    pub strict_bounds: bool,
}

/// How a node's texture is fit into its `w x h` rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    #[default]
    Stretch,
    Cover,
}

/// Per-node image-sampling properties: UV flipping and crop behavior
///. Render-target textures are additionally y-flipped
/// implicitly by the batcher, independent of this flag.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageProps {
    pub flip_x: bool,
    pub flip_y: bool,
    pub resize_mode: ResizeMode,
}

/// Derived state recomputed by the update pass every frame. Never written by
/// quad emission.
#[derive(Debug, Clone)]
pub struct WorldState {
    pub world_matrix: Affine2,
    pub world_alpha: f32,
    pub world_clipping_rect: Option<Rect>,
    pub render_state: RenderState,
    pub has_rtt_updates: bool,
    /// Screen-space AABB computed this frame, used by both `render_state`
    /// classification and quad emission.
    pub screen_aabb: Rect,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            world_matrix: Affine2::IDENTITY,
            world_alpha: 1.0,
            world_clipping_rect: None,
            render_state: RenderState::OutOfBounds,
            has_rtt_updates: false,
            screen_aabb: Rect::ZERO,
        }
    }
}

/// A node in the retained scene graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub geometry: Geometry,
    pub colors: CornerColors,
    pub alpha: f32,
    pub texture: Option<TextureId>,
    pub image_props: ImageProps,
    pub shader: Option<ShaderProps>,
    pub flags: NodeFlags,
    pub z_index: i32,
    /// Present on text nodes created via `Scene::create_text_node`
    ///. `None` for ordinary shape/image nodes.
    pub text: Option<TextLayoutProps>,

    pub parent: Option<NodeId>,
    /// Children in insertion order (stable identity for z-order tie-breaking).
    pub children: Vec<NodeId>,
    /// Children in z-sorted render order; rebuilt incrementally by `zorder`.
    pub z_order: Vec<NodeId>,

    pub world: WorldState,

    /// Set whenever a geometry property changes; cleared once the update
    /// pass rebuilds `local_matrix`.
    pub transform_dirty: bool,
    /// Set whenever a non-geometry property (color, alpha, texture, shader,
    /// flags) changes. Drives `hasRTTUpdates` propagation to RTT ancestors
    /// independently of the transform.
    pub content_dirty: bool,
    /// Set whenever `z_index` changes on a child of this node; drives
    /// incremental z-order maintenance.
    pub z_dirty_children: bool,

    /// Insertion sequence number, used to break z-index ties.
    pub insertion_seq: u64,
}

impl Node {
    pub fn new(insertion_seq: u64) -> Self {
        Self {
            geometry: Geometry::default(),
            colors: CornerColors::solid(Color::WHITE),
            alpha: 1.0,
            texture: None,
            image_props: ImageProps::default(),
            shader: None,
            flags: NodeFlags::default(),
            z_index: 0,
            parent: None,
            children: Vec::new(),
            z_order: Vec::new(),
            world: WorldState::default(),
            transform_dirty: true,
            content_dirty: true,
            z_dirty_children: false,
            insertion_seq,
        }
    }

    /// Rounding-trip law: setting a property to its current value must not
    /// mark the node dirty. Callers should route property writes through
    /// helpers like this one rather than writing fields directly.
    pub fn set_x(&mut self, x: f32) {
        if self.geometry.x != x {
            self.geometry.x = x;
            self.transform_dirty = true;
        }
    }

    pub fn set_y(&mut self, y: f32) {
        if self.geometry.y != y {
            self.geometry.y = y;
            self.transform_dirty = true;
        }
    }

    pub fn set_w(&mut self, w: f32) {
        if self.geometry.w != w {
            self.geometry.w = w;
            self.transform_dirty = true;
        }
    }

    pub fn set_h(&mut self, h: f32) {
        if self.geometry.h != h {
            self.geometry.h = h;
            self.transform_dirty = true;
        }
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        if self.geometry.rotation != rotation {
            self.geometry.rotation = rotation;
            self.transform_dirty = true;
        }
    }

    pub fn set_scale(&mut self, scale_x: f32, scale_y: f32) {
        if self.geometry.scale_x != scale_x || self.geometry.scale_y != scale_y {
            self.geometry.scale_x = scale_x;
            self.geometry.scale_y = scale_y;
            self.transform_dirty = true;
        }
    }

    pub fn set_mount(&mut self, mount_x: f32, mount_y: f32) {
        if self.geometry.mount_x != mount_x || self.geometry.mount_y != mount_y {
            self.geometry.mount_x = mount_x;
            self.geometry.mount_y = mount_y;
            self.transform_dirty = true;
        }
    }

    pub fn set_pivot(&mut self, pivot_x: f32, pivot_y: f32) {
        if self.geometry.pivot_x != pivot_x || self.geometry.pivot_y != pivot_y {
            self.geometry.pivot_x = pivot_x;
            self.geometry.pivot_y = pivot_y;
            self.transform_dirty = true;
        }
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if self.alpha != alpha {
            self.alpha = alpha;
            self.content_dirty = true;
        }
    }

    pub fn set_colors(&mut self, colors: CornerColors) {
        if self.colors != colors {
            self.colors = colors;
            self.content_dirty = true;
        }
    }

    pub fn set_texture(&mut self, texture: Option<TextureId>) {
        if self.texture != texture {
            self.texture = texture;
            self.content_dirty = true;
        }
    }

    pub fn set_shader(&mut self, shader: Option<ShaderProps>) {
        if self.shader != shader {
            self.shader = shader;
            self.content_dirty = true;
        }
    }

    pub fn set_image_props(&mut self, props: ImageProps) {
        if self.image_props != props {
            self.image_props = props;
            self.content_dirty = true;
        }
    }

    /// A clipping node with non-zero rotation silently disables clipping
    ///.
    pub fn effective_clipping(&self) -> bool {
        self.flags.clipping && self.geometry.rotation == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_property_to_same_value_does_not_mark_dirty() {
        let mut node = Node::new(0);
        node.transform_dirty = false;
        node.set_x(node.geometry.x);
        assert!(!node.transform_dirty);
    }

    #[test]
    fn setting_property_to_new_value_marks_dirty() {
        let mut node = Node::new(0);
        node.transform_dirty = false;
        node.set_x(10.0);
        assert!(node.transform_dirty);
    }

    #[test]
    fn rotated_clipping_node_reports_effective_clipping_false() {
        let mut node = Node::new(0);
        node.flags.clipping = true;
        node.geometry.rotation = 0.3;
        assert!(!node.effective_clipping());
    }

    #[test]
    fn non_rotated_clipping_node_reports_effective_clipping_true() {
        let mut node = Node::new(0);
        node.flags.clipping = true;
        assert!(node.effective_clipping());
    }
}
