//! Quad batching and the `RenderOp` pipeline.
//!
//! The [`Batcher`] owns the frame's interleaved vertex arena and walks a
//! scene subtree in z-order, coalescing consecutive quads into one
//! [`RenderOp`] whenever shader, clipping rectangle, and texture unit are
//! compatible. One `Batcher` pass corresponds to one render target: the main
//! pass walks from the scene root, RTT passes walk from an RTT node's
//! children (`rtt.rs` drives one pass per due RTT target).
//!
//! A batching invariant
//! violation (a texture that cannot fit into a brand new, all-slots-free op)
//! is a programming error, not a recoverable runtime condition — see
//! [`crate::error::BatchError`].

use smallvec::SmallVec;

use crate::color::Color;
use crate::error::BatchError;
use crate::font::FontRegistry;
use crate::id::{NodeId, TextureId};
use crate::matrix::{self, Rect};
use crate::node::{ImageProps, Node, RenderState, ResizeMode, ShaderProps};
use crate::scene::Scene;
use crate::shader::can_reuse_render_op;
use crate::text_layout::{FontWaiters, TextLayoutCache, TextLayoutProps};
use crate::texture_cache::TextureCache;
use crate::vertex::{GlyphVertex, Vertex};

/// Bounded texture-unit bin: tracks which textures are already bound
/// to the current op's texture-unit array (either already present, or a free
/// slot remains within `MAX_TEXTURE_IMAGE_UNITS`).
pub type TextureUnitSet = SmallVec<[TextureId; 16]>;

fn try_bind(units: &mut TextureUnitSet, texture: TextureId, max_units: usize) -> Option<usize> {
    if let Some(index) = units.iter().position(|&t| t == texture) {
        return Some(index);
    }
    if units.len() < max_units {
        units.push(texture);
        return Some(units.len() - 1);
    }
    None
}

/// One draw call's worth of batched quads.
#[derive(Debug, Clone)]
pub struct RenderOp {
    pub shader: ShaderProps,
    pub textures: TextureUnitSet,
    pub clip_rect: Option<Rect>,
    /// `None` means the screen (back-buffer); `Some` is an RTT target.
    pub target: Option<TextureId>,
    pub vertex_start: u32,
    pub quad_count: u32,
}

impl RenderOp {
    fn new(shader: ShaderProps, clip_rect: Option<Rect>, target: Option<TextureId>, vertex_start: u32) -> Self {
        Self { shader, textures: TextureUnitSet::new(), clip_rect, target, vertex_start, quad_count: 0 }
    }

    fn can_join(&self, shader: &ShaderProps, clip_rect: Option<Rect>, target: Option<TextureId>) -> bool {
        self.target == target && self.clip_rect == clip_rect && can_reuse_render_op(&self.shader, shader)
    }
}

/// One draw call's worth of batched SDF glyph quads for a single text node
///").
/// Unlike [`RenderOp`], text nodes never share an op with one another —
/// the SDF fragment shader's color/fontScale/distanceRange are draw-call
/// uniforms, not per-vertex data, so there is nothing to coalesce.
#[derive(Debug, Clone)]
pub struct TextRenderOp {
    pub atlas_texture: TextureId,
    pub clip_rect: Option<Rect>,
    pub target: Option<TextureId>,
    pub color: Color,
    pub font_scale: f32,
    pub distance_range: f32,
    pub vertex_start: u32,
    pub glyph_count: u32,
}

/// Bundles the read-only font registry with the two pieces of per-frame
/// mutable state glyph emission needs: the layout cache and the waiter bucket for fonts still loading
///. Borrowed in, not owned, so the
/// frame driver keeps these as long-lived singletons across frames.
pub struct TextRenderContext<'a> {
    pub fonts: &'a FontRegistry,
    pub layouts: &'a mut TextLayoutCache,
    pub waiters: &'a mut FontWaiters,
}

/// Owns the frame's interleaved vertex arena and in-progress `RenderOp` list
/// for one render target. Reused across frames via [`Batcher::begin_pass`];
/// the backing `Vec`s are cleared, not reallocated, keeping the arena a
/// reused buffer rather than a per-frame allocation.
pub struct Batcher {
    vertices: Vec<Vertex>,
    ops: Vec<RenderOp>,
    glyph_vertices: Vec<GlyphVertex>,
    text_ops: Vec<TextRenderOp>,
    max_texture_units: usize,
    default_texture: TextureId,
}

impl Batcher {
    pub fn new(max_texture_units: usize, default_texture: TextureId) -> Self {
        Self {
            vertices: Vec::new(),
            ops: Vec::new(),
            glyph_vertices: Vec::new(),
            text_ops: Vec::new(),
            max_texture_units,
            default_texture,
        }
    }

    /// Clears the arenas and op lists in place for a fresh pass, keeping
    /// capacity.
    pub fn begin_pass(&mut self) {
        self.vertices.clear();
        self.ops.clear();
        self.glyph_vertices.clear();
        self.text_ops.clear();
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    pub fn glyph_vertices(&self) -> &[GlyphVertex] {
        &self.glyph_vertices
    }

    pub fn text_ops(&self) -> &[TextRenderOp] {
        &self.text_ops
    }

    pub fn total_quads(&self) -> u32 {
        self.ops.iter().map(|op| op.quad_count).sum()
    }

    pub fn total_glyphs(&self) -> u32 {
        self.text_ops.iter().map(|op| op.glyph_count).sum()
    }

    /// Walks the main pass from the scene root. RTT nodes encountered along
    /// the way are emitted as a single textured quad sampling their
    /// render-target texture; their children do not appear here.
    pub fn emit_main_pass(
        &mut self,
        scene: &Scene,
        textures: &TextureCache,
        viewport_px: (f32, f32),
        mut text_ctx: Option<&mut TextRenderContext>,
    ) -> Result<(), BatchError> {
        self.emit_walk(scene, scene.root(), textures, viewport_px, (0.0, 0.0), None, true, text_ctx.as_deref_mut())
    }

    /// Walks one RTT node's children into a pass targeting its own texture
    /// (`rtt.rs` calls this once per due RTT pass, children-before-parents).
    ///
    /// `viewport_px` is the RTT target's own pixel dimensions, not the
    /// screen's — an RTT node's children still carry their full-screen world
    /// matrices, so this subtracts the RTT node's own screen-space origin
    /// before converting to NDC, placing its top-left corner at the render
    /// target's origin.
    pub fn emit_rtt_pass(
        &mut self,
        scene: &Scene,
        rtt_node: crate::id::NodeId,
        target_texture: TextureId,
        textures: &TextureCache,
        viewport_px: (f32, f32),
        mut text_ctx: Option<&mut TextRenderContext>,
    ) -> Result<(), BatchError> {
        let origin = scene
            .get(rtt_node)
            .map(|n| (n.world.screen_aabb.min_x, n.world.screen_aabb.min_y))
            .unwrap_or((0.0, 0.0));
        self.emit_walk(scene, rtt_node, textures, viewport_px, origin, Some(target_texture), true, text_ctx.as_deref_mut())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_walk(
        &mut self,
        scene: &Scene,
        node_id: crate::id::NodeId,
        textures: &TextureCache,
        viewport_px: (f32, f32),
        origin: (f32, f32),
        target: Option<TextureId>,
        is_pass_root: bool,
        mut text_ctx: Option<&mut TextRenderContext>,
    ) -> Result<(), BatchError> {
        let Some(node) = scene.get(node_id) else { return Ok(()) };

        if node.flags.rtt && !is_pass_root {
            // An RTT descendant is a leaf in this pass: sample its own
            // texture instead of recursing into its children.
            if node.world.render_state != RenderState::OutOfBounds {
                if let Some(texture) = node.texture {
                    self.emit_quad(node, texture, textures, viewport_px, origin, target)?;
                }
            }
            return Ok(());
        }

        if !is_pass_root && node.world.render_state != RenderState::OutOfBounds {
            if let Some(props) = &node.text {
                if let Some(ctx) = text_ctx.as_deref_mut() {
                    self.emit_text(node_id, node, props, ctx, viewport_px, origin, target);
                }
            } else {
                let texture = node.texture.unwrap_or(self.default_texture);
                self.emit_quad(node, texture, textures, viewport_px, origin, target)?;
            }
        }

        for child in scene.iter_in_z_order(node_id) {
            self.emit_walk(scene, child, textures, viewport_px, origin, target, false, text_ctx.as_deref_mut())?;
        }
        Ok(())
    }

    /// Emits one [`TextRenderOp`] for a text node's laid-out glyphs
    ///. A no-op if the node's font hasn't
    /// resolved yet (registers a waiter instead) or the layout is empty.
    #[allow(clippy::too_many_arguments)]
    fn emit_text(
        &mut self,
        node_id: NodeId,
        node: &Node,
        props: &TextLayoutProps,
        ctx: &mut TextRenderContext,
        viewport_px: (f32, f32),
        origin: (f32, f32),
        target: Option<TextureId>,
    ) {
        let Some(font) = ctx.fonts.get_by_family(&props.font_family) else {
            ctx.waiters.register(&props.font_family, node_id);
            return;
        };
        let Some(layout) = ctx.layouts.layout(Some(font), props) else { return };
        if layout.glyphs.is_empty() {
            return;
        }

        let clip_rect = node.world.world_clipping_rect;
        let vertex_start = self.glyph_vertices.len() as u32;
        let font_scale = layout.font_scale;

        for glyph in &layout.glyphs {
            let local = [
                glam::Vec2::new(glyph.x, glyph.y) * font_scale,
                glam::Vec2::new(glyph.x + glyph.width, glyph.y) * font_scale,
                glam::Vec2::new(glyph.x + glyph.width, glyph.y + glyph.height) * font_scale,
                glam::Vec2::new(glyph.x, glyph.y + glyph.height) * font_scale,
            ];
            let world = matrix::transform_corners(&node.world.world_matrix, &local);
            let uvs = [
                (glyph.uv_xy.0, glyph.uv_xy.1),
                (glyph.uv_xy.0 + glyph.uv_wh.0, glyph.uv_xy.1),
                (glyph.uv_xy.0 + glyph.uv_wh.0, glyph.uv_xy.1 + glyph.uv_wh.1),
                (glyph.uv_xy.0, glyph.uv_xy.1 + glyph.uv_wh.1),
            ];
            // Plain triangle list, not the shared quad index buffer: glyph
            // quads are drawn from their own vertex-only buffer").
            for &i in &[0usize, 1, 2, 2, 3, 0] {
                let ndc_x = ((world[i].x - origin.0) / viewport_px.0) * 2.0 - 1.0;
                let ndc_y = 1.0 - ((world[i].y - origin.1) / viewport_px.1) * 2.0;
                self.glyph_vertices.push(GlyphVertex {
                    position: [ndc_x, ndc_y],
                    uv: [uvs[i].0, uvs[i].1],
                });
            }
        }

        let glyph_count = (self.glyph_vertices.len() as u32 - vertex_start) / 6;
        self.text_ops.push(TextRenderOp {
            atlas_texture: font.atlas_texture,
            clip_rect,
            target,
            color: node.colors.tl,
            font_scale,
            distance_range: layout.distance_range,
            vertex_start,
            glyph_count,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_quad(
        &mut self,
        node: &Node,
        texture: TextureId,
        textures: &TextureCache,
        viewport_px: (f32, f32),
        origin: (f32, f32),
        target: Option<TextureId>,
    ) -> Result<(), BatchError> {
        if node.geometry.w <= 0.0 || node.geometry.h <= 0.0 {
            return Ok(());
        }

        let shader = node.shader.clone().unwrap_or(ShaderProps::Default);
        let clip_rect = node.world.world_clipping_rect;

        let sample = textures.sample_info(texture).unwrap_or(crate::texture_cache::TextureSampleInfo {
            bind_texture: texture,
            uv_origin: (0.0, 0.0),
            uv_size: (1.0, 1.0),
            is_render_target: false,
        });

        let unit_index = self.join_or_open_op(&shader, clip_rect, target, sample.bind_texture)?;

        let (uv_origin, uv_size) = apply_resize_mode(
            sample.uv_origin,
            sample.uv_size,
            node.image_props,
            (node.geometry.w, node.geometry.h),
            textures.get(sample.bind_texture).map(|t| (t.width as f32, t.height as f32)).unwrap_or((0.0, 0.0)),
        );

        let corners = matrix::local_corners(node.geometry.w, node.geometry.h);
        let world_corners = matrix::transform_corners(&node.world.world_matrix, &corners);

        let local_uvs: [(f32, f32); 4] = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let node_uvs: [(f32, f32); 4] = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let corner_colors = [node.colors.tl, node.colors.tr, node.colors.br, node.colors.bl];

        let alpha = node.world.world_alpha;
        for i in 0..4 {
            let (mut u, mut v) = local_uvs[i];
            if node.image_props.flip_x {
                u = 1.0 - u;
            }
            if node.image_props.flip_y {
                v = 1.0 - v;
            }
            if sample.is_render_target {
                v = 1.0 - v;
            }
            let uv = (uv_origin.0 + u * uv_size.0, uv_origin.1 + v * uv_size.1);

            let ndc_x = ((world_corners[i].x - origin.0) / viewport_px.0) * 2.0 - 1.0;
            let ndc_y = 1.0 - ((world_corners[i].y - origin.1) / viewport_px.1) * 2.0;

            let color = modulate_alpha(corner_colors[i].to_packed(), alpha);

            self.vertices.push(Vertex {
                position: [ndc_x, ndc_y],
                uv: [uv.0, uv.1],
                color,
                tex_unit: unit_index as f32,
                node_uv: [node_uvs[i].0, node_uvs[i].1],
            });
        }

        self.ops.last_mut().expect("an op was just opened or joined").quad_count += 1;
        Ok(())
    }

    /// Returns the texture-unit index to use for `texture` within the
    /// current (or a newly opened) op.
    fn join_or_open_op(
        &mut self,
        shader: &ShaderProps,
        clip_rect: Option<Rect>,
        target: Option<TextureId>,
        texture: TextureId,
    ) -> Result<usize, BatchError> {
        if let Some(op) = self.ops.last_mut() {
            if op.can_join(shader, clip_rect, target) {
                if let Some(unit) = try_bind(&mut op.textures, texture, self.max_texture_units) {
                    return Ok(unit);
                }
            }
        }

        let vertex_start = self.vertices.len() as u32;
        let mut op = RenderOp::new(shader.clone(), clip_rect, target, vertex_start);
        let unit = try_bind(&mut op.textures, texture, self.max_texture_units)
            .ok_or(BatchError::CannotFitFreshOp)?;
        self.ops.push(op);
        Ok(unit)
    }
}

/// Multiplies a packed RGBA color's alpha channel by `alpha`.
fn modulate_alpha(packed: u32, alpha: f32) -> u32 {
    let bytes = packed.to_le_bytes();
    let a = (bytes[3] as f32 * alpha.clamp(0.0, 1.0)).round().clamp(0.0, 255.0) as u8;
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], a])
}

/// Crops the UV rect for `resizeMode=cover`; returns
/// the rect unchanged for `Stretch` or when dimensions are unknown.
fn apply_resize_mode(
    uv_origin: (f32, f32),
    uv_size: (f32, f32),
    props: ImageProps,
    quad_wh: (f32, f32),
    tex_wh: (f32, f32),
) -> ((f32, f32), (f32, f32)) {
    if props.resize_mode != ResizeMode::Cover || tex_wh.0 <= 0.0 || tex_wh.1 <= 0.0 || quad_wh.1 <= 0.0 {
        return (uv_origin, uv_size);
    }
    let quad_aspect = quad_wh.0 / quad_wh.1;
    let tex_aspect = tex_wh.0 / tex_wh.1;
    if tex_aspect > quad_aspect {
        let visible_w = uv_size.0 * (quad_aspect / tex_aspect);
        let origin_u = uv_origin.0 + (uv_size.0 - visible_w) / 2.0;
        ((origin_u, uv_origin.1), (visible_w, uv_size.1))
    } else {
        let visible_h = uv_size.1 * (tex_aspect / quad_aspect);
        let origin_v = uv_origin.1 + (uv_size.1 - visible_h) / 2.0;
        ((uv_origin.0, origin_v), (uv_size.0, visible_h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::matrix::BoundsMargin;

    fn viewport() -> Rect {
        Rect::from_xywh(0.0, 0.0, 1920.0, 1080.0)
    }

    fn setup() -> (Scene, TextureCache, TextureId) {
        let scene = Scene::new();
        let mut textures = TextureCache::new();
        let white = textures.create_color([255, 255, 255, 255]);
        (scene, textures, white)
    }

    #[test]
    fn two_overlapping_same_shader_quads_batch_into_one_op() {
        let (mut scene, textures, white) = setup();
        for _ in 0..2 {
            let n = scene.create_node(None);
            let node = scene.get_mut(n).unwrap();
            node.set_w(100.0);
            node.set_h(100.0);
            node.texture = Some(white);
        }
        scene.update(viewport(), BoundsMargin::uniform(0.0), 0);

        let mut batcher = Batcher::new(16, white);
        batcher.begin_pass();
        batcher.emit_main_pass(&scene, &textures, (1920.0, 1080.0), None).unwrap();

        assert_eq!(batcher.ops().len(), 1);
        assert_eq!(batcher.ops()[0].quad_count, 2);
    }

    #[test]
    fn different_clip_rects_force_separate_ops() {
        let (mut scene, textures, white) = setup();
        let root = scene.root();

        let clip_a = scene.create_node(Some(root));
        {
            let n = scene.get_mut(clip_a).unwrap();
            n.set_w(100.0);
            n.set_h(100.0);
            n.flags.clipping = true;
        }
        let child_a = scene.create_node(Some(clip_a));
        {
            let n = scene.get_mut(child_a).unwrap();
            n.set_w(50.0);
            n.set_h(50.0);
            n.texture = Some(white);
        }

        let clip_b = scene.create_node(Some(root));
        {
            let n = scene.get_mut(clip_b).unwrap();
            n.set_x(500.0);
            n.set_w(100.0);
            n.set_h(100.0);
            n.flags.clipping = true;
        }
        let child_b = scene.create_node(Some(clip_b));
        {
            let n = scene.get_mut(child_b).unwrap();
            n.set_w(50.0);
            n.set_h(50.0);
            n.texture = Some(white);
        }

        scene.update(viewport(), BoundsMargin::uniform(0.0), 0);

        let mut batcher = Batcher::new(16, white);
        batcher.begin_pass();
        batcher.emit_main_pass(&scene, &textures, (1920.0, 1080.0), None).unwrap();

        assert_eq!(batcher.ops().len(), 2);
    }

    #[test]
    fn node_outside_viewport_emits_zero_quads() {
        let (mut scene, textures, white) = setup();
        let n = scene.create_node(None);
        {
            let node = scene.get_mut(n).unwrap();
            node.set_x(100_000.0);
            node.set_y(100_000.0);
            node.set_w(10.0);
            node.set_h(10.0);
            node.texture = Some(white);
        }
        scene.update(viewport(), BoundsMargin::default(), 0);

        let mut batcher = Batcher::new(16, white);
        batcher.begin_pass();
        batcher.emit_main_pass(&scene, &textures, (1920.0, 1080.0), None).unwrap();
        assert_eq!(batcher.total_quads(), 0);
    }

    #[test]
    fn texture_unit_packing_opens_new_op_past_the_limit() {
        let (mut scene, mut textures, white) = setup();
        let _ = white;
        let mut ids = Vec::new();
        for i in 0..3 {
            let id = textures.create_color([i as u8, 0, 0, 255]);
            ids.push(id);
        }
        for &id in &ids {
            let n = scene.create_node(None);
            let node = scene.get_mut(n).unwrap();
            node.set_w(10.0);
            node.set_h(10.0);
            node.texture = Some(id);
        }
        scene.update(viewport(), BoundsMargin::uniform(0.0), 0);

        let mut batcher = Batcher::new(2, ids[0]);
        batcher.begin_pass();
        batcher.emit_main_pass(&scene, &textures, (1920.0, 1080.0), None).unwrap();

        // 3 distinct textures, 2 units per op -> at least 2 ops.
        assert!(batcher.ops().len() >= 2);
        assert_eq!(batcher.total_quads(), 3);
    }

    #[test]
    fn alpha_modulation_scales_packed_color_alpha_channel() {
        let full = Color::rgba(10, 20, 30, 200).to_packed();
        let half = modulate_alpha(full, 0.5);
        let bytes = half.to_le_bytes();
        assert_eq!(bytes[3], 100);
        assert_eq!(bytes[0], 10);
    }

    const SAMPLE_FONT_JSON: &str = r#"{
        "pages": ["atlas.png"],
        "info": {"size": 32},
        "common": {"lineHeight": 40, "base": 30, "scaleW": 256, "scaleH": 256},
        "chars": [
            {"id": 65, "x": 0, "y": 0, "width": 10, "height": 20, "xoffset": 0, "yoffset": 0, "xadvance": 12, "page": 0, "chnl": 15},
            {"id": 66, "x": 10, "y": 0, "width": 10, "height": 20, "xoffset": 0, "yoffset": 0, "xadvance": 12, "page": 0, "chnl": 15}
        ],
        "kernings": [],
        "distanceField": {"fieldType": "msdf", "distanceRange": 4},
        "lightningMetrics": {"ascender": 30, "descender": -8, "lineGap": 2, "unitsPerEm": 32}
    }"#;

    fn text_props(text: &str) -> TextLayoutProps {
        TextLayoutProps {
            text: text.to_string(),
            font_family: "Test".to_string(),
            font_size: 32.0,
            font_style: "normal".to_string(),
            wrap: false,
            wrap_width: 0.0,
            max_height: 0.0,
            line_height: 40.0,
            letter_spacing: 0.0,
            max_lines: 0,
            overflow_suffix: String::new(),
            align: crate::text_layout::TextAlign::Left,
        }
    }

    #[test]
    fn text_node_with_unresolved_font_registers_a_waiter_and_emits_nothing() {
        let (mut scene, textures, white) = setup();
        let n = scene.create_node(None);
        {
            let node = scene.get_mut(n).unwrap();
            node.set_w(100.0);
            node.set_h(50.0);
            node.text = Some(text_props("AB"));
        }
        scene.update(viewport(), BoundsMargin::uniform(0.0), 0);

        let fonts = FontRegistry::new();
        let mut layouts = TextLayoutCache::new();
        let mut waiters = FontWaiters::new();
        let mut ctx = TextRenderContext { fonts: &fonts, layouts: &mut layouts, waiters: &mut waiters };

        let mut batcher = Batcher::new(16, white);
        batcher.begin_pass();
        batcher.emit_main_pass(&scene, &textures, (1920.0, 1080.0), Some(&mut ctx)).unwrap();

        assert_eq!(batcher.total_glyphs(), 0);
        assert!(batcher.text_ops().is_empty());
        assert_eq!(waiters.resolve("Test"), vec![n]);
    }

    #[test]
    fn empty_text_emits_zero_glyphs() {
        let (mut scene, textures, white) = setup();
        let n = scene.create_node(None);
        {
            let node = scene.get_mut(n).unwrap();
            node.set_w(100.0);
            node.set_h(50.0);
            node.text = Some(text_props(""));
        }
        scene.update(viewport(), BoundsMargin::uniform(0.0), 0);

        let mut fonts = FontRegistry::new();
        fonts.insert(crate::font::parse_font_json("Test", SAMPLE_FONT_JSON.as_bytes(), TextureId(99)).unwrap());
        let mut layouts = TextLayoutCache::new();
        let mut waiters = FontWaiters::new();
        let mut ctx = TextRenderContext { fonts: &fonts, layouts: &mut layouts, waiters: &mut waiters };

        let mut batcher = Batcher::new(16, white);
        batcher.begin_pass();
        batcher.emit_main_pass(&scene, &textures, (1920.0, 1080.0), Some(&mut ctx)).unwrap();

        assert_eq!(batcher.total_glyphs(), 0);
        assert!(batcher.text_ops().is_empty());
    }

    #[test]
    fn resolved_font_emits_one_text_op_with_six_vertices_per_glyph() {
        let (mut scene, textures, white) = setup();
        let n = scene.create_node(None);
        {
            let node = scene.get_mut(n).unwrap();
            node.set_w(100.0);
            node.set_h(50.0);
            node.text = Some(text_props("AB"));
            node.colors = crate::node::CornerColors::solid(Color::rgba(1, 2, 3, 255));
        }
        scene.update(viewport(), BoundsMargin::uniform(0.0), 0);

        let mut fonts = FontRegistry::new();
        fonts.insert(crate::font::parse_font_json("Test", SAMPLE_FONT_JSON.as_bytes(), TextureId(99)).unwrap());
        let mut layouts = TextLayoutCache::new();
        let mut waiters = FontWaiters::new();
        let mut ctx = TextRenderContext { fonts: &fonts, layouts: &mut layouts, waiters: &mut waiters };

        let mut batcher = Batcher::new(16, white);
        batcher.begin_pass();
        batcher.emit_main_pass(&scene, &textures, (1920.0, 1080.0), Some(&mut ctx)).unwrap();

        assert_eq!(batcher.text_ops().len(), 1);
        let op = &batcher.text_ops()[0];
        assert_eq!(op.atlas_texture, TextureId(99));
        assert_eq!(op.glyph_count, 2);
        assert_eq!(op.distance_range, 4.0);
        assert_eq!(batcher.glyph_vertices().len(), 12);
        assert!(batcher.ops().is_empty(), "text quads must not leak into the shape/image op list");
    }
}
