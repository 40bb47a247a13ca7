use tvscene::{
    Color, CornerColors, FrameDriver, TextAlign, TextLayoutProps,
};

use crate::expectations::PixelExpectation;

// ── Grid layout constants ────────────────────────────────────────────────────

const TILE_SIZE: u32 = 120;
const COLUMNS: u32 = 4;
const ROWS: u32 = 3;

pub const CANVAS_WIDTH: u32 = TILE_SIZE * COLUMNS;
pub const CANVAS_HEIGHT: u32 = TILE_SIZE * ROWS;

const SAMPLE_FONT_JSON: &str = r#"{
    "pages": ["atlas.png"],
    "info": {"size": 32},
    "common": {"lineHeight": 36, "base": 28, "scaleW": 64, "scaleH": 64},
    "chars": [
        {"id": 65, "x": 0, "y": 0, "width": 64, "height": 64, "xoffset": 0, "yoffset": 0, "xadvance": 28, "page": 0, "chnl": 15}
    ],
    "kernings": [],
    "distanceField": {"fieldType": "msdf", "distanceRange": 4},
    "lightningMetrics": {"ascender": 28, "descender": -6, "lineGap": 2, "unitsPerEm": 32}
}"#;

/// Returns the pixel origin (top-left corner) of tile number `n` (1-based).
fn tile_origin(tile_number: u32) -> (f32, f32) {
    let index = tile_number - 1;
    let column = index % COLUMNS;
    let row = index / COLUMNS;
    ((column * TILE_SIZE) as f32, (row * TILE_SIZE) as f32)
}

/// Builds a grid of small scenes exercising the scene graph, batching, RTT,
/// and SDF text paths, and returns pixel expectations to validate against
/// the rendered output. Shared between the pixel-expectation test and any
/// visual-confirmation harness driving the same `FrameDriver`.
pub fn build_main_scene(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let mut expectations = Vec::new();

    expectations.extend(tile_01_solid_rect(driver));
    expectations.extend(tile_02_corner_gradient(driver));
    expectations.extend(tile_03_overlap_same_shader(driver));
    expectations.extend(tile_04_clipping_overflow(driver));
    expectations.extend(tile_05_rotated_clip_disabled(driver));
    expectations.extend(tile_06_z_order_siblings(driver));
    expectations.extend(tile_07_alpha_blend(driver));
    expectations.extend(tile_08_nested_children(driver));
    expectations.extend(tile_09_out_of_bounds_culled(driver));
    expectations.extend(tile_10_render_to_texture(driver));
    expectations.extend(tile_11_sdf_text(driver));

    expectations
}

fn tile_01_solid_rect(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(1);
    let node = driver.scene.create_node(None);
    let n = driver.scene.get_mut(node).unwrap();
    n.set_x(ox + 10.0);
    n.set_y(oy + 10.0);
    n.set_w(100.0);
    n.set_h(100.0);
    n.set_colors(CornerColors::solid(Color::rgb(200, 40, 40)));

    vec![
        PixelExpectation::opaque(
            (ox + 60.0) as u32,
            (oy + 60.0) as u32,
            200,
            40,
            40,
            "tile01_center_red",
        ),
        PixelExpectation::transparent((ox + 5.0) as u32, (oy + 5.0) as u32, "tile01_outside_margin"),
    ]
}

fn tile_02_corner_gradient(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(2);
    let node = driver.scene.create_node(None);
    let n = driver.scene.get_mut(node).unwrap();
    n.set_x(ox + 10.0);
    n.set_y(oy + 10.0);
    n.set_w(100.0);
    n.set_h(100.0);
    n.set_colors(CornerColors {
        tl: Color::rgb(255, 0, 0),
        tr: Color::rgb(0, 255, 0),
        bl: Color::rgb(0, 0, 255),
        br: Color::rgb(255, 255, 0),
    });

    vec![
        PixelExpectation::new((ox + 12.0) as u32, (oy + 12.0) as u32, 255, 0, 0, 255, "tile02_top_left")
            .with_tolerance(40),
        PixelExpectation::new((ox + 108.0) as u32, (oy + 12.0) as u32, 0, 255, 0, 255, "tile02_top_right")
            .with_tolerance(40),
    ]
}

/// Two opaque quads sharing the default shader and clipping rect: the
/// batcher must coalesce them into one `RenderOp` (see `batch::tests`),
/// but the pixel-level result of both pixels being covered is what this
/// tile checks end to end.
fn tile_03_overlap_same_shader(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(3);
    let back = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(back).unwrap();
        n.set_x(ox + 10.0);
        n.set_y(oy + 10.0);
        n.set_w(80.0);
        n.set_h(80.0);
        n.set_colors(CornerColors::solid(Color::rgb(30, 30, 180)));
    }
    let front = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(front).unwrap();
        n.set_x(ox + 40.0);
        n.set_y(oy + 40.0);
        n.set_w(80.0);
        n.set_h(80.0);
        n.set_colors(CornerColors::solid(Color::rgb(30, 180, 30)));
    }

    vec![
        PixelExpectation::opaque((ox + 100.0) as u32, (oy + 100.0) as u32, 30, 180, 30, "tile03_front_only"),
        PixelExpectation::opaque((ox + 20.0) as u32, (oy + 20.0) as u32, 30, 30, 180, "tile03_back_only"),
    ]
}

fn tile_04_clipping_overflow(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(4);
    let container = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(container).unwrap();
        n.set_x(ox + 10.0);
        n.set_y(oy + 10.0);
        n.set_w(60.0);
        n.set_h(60.0);
        n.flags.clipping = true;
    }
    let child = driver.scene.create_node(Some(container));
    {
        let n = driver.scene.get_mut(child).unwrap();
        // Overflows the container by 30px on every side.
        n.set_x(-30.0);
        n.set_y(-30.0);
        n.set_w(120.0);
        n.set_h(120.0);
        n.set_colors(CornerColors::solid(Color::rgb(220, 120, 10)));
    }

    vec![
        PixelExpectation::opaque((ox + 40.0) as u32, (oy + 40.0) as u32, 220, 120, 10, "tile04_inside_clip"),
        PixelExpectation::transparent((ox + 90.0) as u32, (oy + 90.0) as u32, "tile04_clipped_away"),
    ]
}

/// A clipping container with non-zero rotation: `Node::effective_clipping`
/// silently disables clipping, so the overflowing child must be visible
/// past the container's nominal bounds.
fn tile_05_rotated_clip_disabled(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(5);
    let container = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(container).unwrap();
        n.set_x(ox + 20.0);
        n.set_y(oy + 20.0);
        n.set_w(40.0);
        n.set_h(40.0);
        n.flags.clipping = true;
        n.set_rotation(0.01);
    }
    let child = driver.scene.create_node(Some(container));
    {
        let n = driver.scene.get_mut(child).unwrap();
        n.set_x(-20.0);
        n.set_y(-20.0);
        n.set_w(80.0);
        n.set_h(80.0);
        n.set_colors(CornerColors::solid(Color::rgb(10, 200, 200)));
    }

    vec![PixelExpectation::opaque(
        (ox + 90.0) as u32,
        (oy + 90.0) as u32,
        10,
        200,
        200,
        "tile05_visible_past_rotated_clip",
    )]
}

fn tile_06_z_order_siblings(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(6);
    let low_z = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(low_z).unwrap();
        n.set_x(ox + 10.0);
        n.set_y(oy + 10.0);
        n.set_w(80.0);
        n.set_h(80.0);
        n.set_colors(CornerColors::solid(Color::rgb(200, 0, 200)));
    }
    let high_z = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(high_z).unwrap();
        n.set_x(ox + 40.0);
        n.set_y(oy + 40.0);
        n.set_w(80.0);
        n.set_h(80.0);
        n.set_colors(CornerColors::solid(Color::rgb(0, 200, 200)));
    }
    // low_z was inserted first but set_z_index lower, so high_z (inserted
    // second and/or given a higher index) must draw on top regardless of
    // insertion order.
    driver.scene.set_z_index(low_z, 0);
    driver.scene.set_z_index(high_z, 1);

    vec![PixelExpectation::opaque(
        (ox + 100.0) as u32,
        (oy + 100.0) as u32,
        0,
        200,
        200,
        "tile06_high_z_on_top",
    )]
}

fn tile_07_alpha_blend(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(7);
    let background = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(background).unwrap();
        n.set_x(ox + 10.0);
        n.set_y(oy + 10.0);
        n.set_w(100.0);
        n.set_h(100.0);
        n.set_colors(CornerColors::solid(Color::rgb(0, 0, 0)));
    }
    let overlay = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(overlay).unwrap();
        n.set_x(ox + 10.0);
        n.set_y(oy + 10.0);
        n.set_w(100.0);
        n.set_h(100.0);
        n.set_colors(CornerColors::solid(Color::rgb(255, 255, 255)));
        n.set_alpha(0.5);
    }

    // Over a black backdrop, a 50%-alpha white overlay should land near
    // mid-gray; generous tolerance since blending is premultiplied on GPU.
    vec![PixelExpectation::new(
        (ox + 60.0) as u32,
        (oy + 60.0) as u32,
        127,
        127,
        127,
        255,
        "tile07_mid_gray_blend",
    )
    .with_tolerance(40)]
}

fn tile_08_nested_children(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(8);
    let level1 = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(level1).unwrap();
        n.set_x(ox + 10.0);
        n.set_y(oy + 10.0);
        n.set_w(100.0);
        n.set_h(100.0);
        n.set_colors(CornerColors::solid(Color::rgb(60, 60, 60)));
    }
    let level2 = driver.scene.create_node(Some(level1));
    {
        // Local coordinates: relative to level1's world transform.
        let n = driver.scene.get_mut(level2).unwrap();
        n.set_x(10.0);
        n.set_y(10.0);
        n.set_w(80.0);
        n.set_h(80.0);
        n.set_colors(CornerColors::solid(Color::rgb(120, 120, 120)));
    }
    let level3 = driver.scene.create_node(Some(level2));
    {
        let n = driver.scene.get_mut(level3).unwrap();
        n.set_x(10.0);
        n.set_y(10.0);
        n.set_w(60.0);
        n.set_h(60.0);
        n.set_colors(CornerColors::solid(Color::rgb(220, 220, 220)));
    }

    vec![PixelExpectation::opaque(
        (ox + 60.0) as u32,
        (oy + 60.0) as u32,
        220,
        220,
        220,
        "tile08_innermost_level",
    )]
}

/// A node positioned entirely outside the viewport plus bounds margin must
/// emit zero quads; nothing should land in this tile's region at all.
fn tile_09_out_of_bounds_culled(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(9);
    let node = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(node).unwrap();
        n.set_x(CANVAS_WIDTH as f32 + 5_000.0);
        n.set_y(CANVAS_HEIGHT as f32 + 5_000.0);
        n.set_w(80.0);
        n.set_h(80.0);
        n.set_colors(CornerColors::solid(Color::rgb(255, 0, 0)));
    }

    vec![PixelExpectation::transparent(
        (ox + 60.0) as u32,
        (oy + 60.0) as u32,
        "tile09_nothing_drawn",
    )]
}

/// Exercises the RTT scheduler and framebuffer pool: a render-to-texture
/// node containing a solid-color child is rendered into an offscreen target
/// before the main pass samples it back as an ordinary textured quad.
fn tile_10_render_to_texture(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(10);
    let rtt_node = driver.scene.create_node(None);
    {
        let n = driver.scene.get_mut(rtt_node).unwrap();
        n.set_x(ox + 10.0);
        n.set_y(oy + 10.0);
        n.set_w(64.0);
        n.set_h(64.0);
        n.flags.rtt = true;
        n.set_colors(CornerColors::solid(Color::WHITE));
    }
    let child = driver.scene.create_node(Some(rtt_node));
    {
        let n = driver.scene.get_mut(child).unwrap();
        n.set_x(0.0);
        n.set_y(0.0);
        n.set_w(64.0);
        n.set_h(64.0);
        n.set_colors(CornerColors::solid(Color::rgb(250, 140, 20)));
    }

    vec![PixelExpectation::opaque(
        (ox + 40.0) as u32,
        (oy + 40.0) as u32,
        250,
        140,
        20,
        "tile10_sampled_from_rtt",
    )
    .with_tolerance(30)]
}

/// Loads a tiny single-glyph font whose atlas is a solid-red square (so the
/// SDF shader's signed distance is positive everywhere) and lays out one
/// character, exercising the font registry, layout cache, and glyph-quad
/// emission paths.
fn tile_11_sdf_text(driver: &mut FrameDriver) -> Vec<PixelExpectation> {
    let (ox, oy) = tile_origin(11);
    let atlas = driver.textures.create_color([255, 0, 0, 255]);

    // `load_font` only reads the JSON synchronously; the atlas is assumed
    // already uploaded, mirroring how an embedder decodes the PNG first.
    driver
        .load_font("test-sample", SAMPLE_FONT_JSON.as_bytes(), atlas)
        .expect("sample font JSON is well-formed");

    let text_node = driver.scene.create_text_node(
        None,
        TextLayoutProps {
            text: "A".to_string(),
            font_family: "test-sample".to_string(),
            font_size: 32.0,
            font_style: "normal".to_string(),
            wrap: false,
            wrap_width: 0.0,
            max_height: 0.0,
            line_height: 36.0,
            letter_spacing: 0.0,
            max_lines: 0,
            overflow_suffix: String::new(),
            align: TextAlign::Left,
        },
    );
    {
        let n = driver.scene.get_mut(text_node).unwrap();
        n.set_x(ox + 10.0);
        n.set_y(oy + 10.0);
        n.set_colors(CornerColors::solid(Color::rgb(240, 240, 240)));
    }

    vec![PixelExpectation::opaque(
        (ox + 15.0) as u32,
        (oy + 20.0) as u32,
        240,
        240,
        240,
        "tile11_glyph_covers_origin",
    )
    .with_tolerance(30)]
}
