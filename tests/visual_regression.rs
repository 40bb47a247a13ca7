//! Visual regression tests for the scene-graph renderer.
//!
//! These render the shared test-scene grid into an offscreen texture with a
//! real (possibly software/lavapipe) `wgpu` adapter, read the pixels back,
//! and check them against per-tile expectations. Skipped if no adapter is
//! available in the sandbox running the tests.

use std::sync::Arc;

use tvscene::wgpu;
use tvscene::{request_headless_device, FrameDriver, NullPlatform, RendererConfig};
use tvscene_test_scenes::{build_main_scene, check_pixels, CANVAS_HEIGHT, CANVAS_WIDTH};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Renders one frame of `build_main_scene` into an offscreen target and
/// returns the raw RGBA8 pixels, row-major, no padding.
fn render_scene_to_buffer() -> Option<(Vec<u8>, Vec<tvscene_test_scenes::PixelExpectation>)> {
    let (device, queue) = futures::executor::block_on(request_headless_device())?;
    let device = Arc::new(device);
    let queue = Arc::new(queue);

    let mut driver = FrameDriver::new(
        device.clone(),
        queue.clone(),
        FORMAT,
        RendererConfig {
            app_width: CANVAS_WIDTH as f32,
            app_height: CANVAS_HEIGHT as f32,
            ..Default::default()
        },
        Arc::new(NullPlatform::default()),
    );

    let expectations = build_main_scene(&mut driver);

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("visual-regression-target"),
        size: wgpu::Extent3d { width: CANVAS_WIDTH, height: CANVAS_HEIGHT, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    driver.tick(&view, (CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32));

    // wgpu requires buffer-copy row pitch to be a multiple of 256 bytes.
    let bytes_per_pixel = 4u32;
    let unpadded_bytes_per_row = CANVAS_WIDTH * bytes_per_pixel;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(256) * 256;

    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("visual-regression-readback"),
        size: (padded_bytes_per_row * CANVAS_HEIGHT) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("visual-regression-copy"),
    });
    encoder.copy_texture_to_buffer(
        target.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(CANVAS_HEIGHT),
            },
        },
        wgpu::Extent3d { width: CANVAS_WIDTH, height: CANVAS_HEIGHT, depth_or_array_layers: 1 },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::MaintainBase::Wait);
    rx.recv().ok()?.ok()?;

    let padded = slice.get_mapped_range();
    let mut pixels = vec![0u8; (unpadded_bytes_per_row * CANVAS_HEIGHT) as usize];
    for row in 0..CANVAS_HEIGHT as usize {
        let src_start = row * padded_bytes_per_row as usize;
        let dst_start = row * unpadded_bytes_per_row as usize;
        pixels[dst_start..dst_start + unpadded_bytes_per_row as usize]
            .copy_from_slice(&padded[src_start..src_start + unpadded_bytes_per_row as usize]);
    }
    drop(padded);
    readback.unmap();

    Some((pixels, expectations))
}

#[test]
fn main_scene_pixel_expectations() {
    let Some((pixels, expectations)) = render_scene_to_buffer() else {
        eprintln!("no wgpu adapter available, skipping visual regression test");
        return;
    };

    let failures = check_pixels(&pixels, CANVAS_WIDTH, CANVAS_HEIGHT, &expectations);
    if !failures.is_empty() {
        panic!("{} pixel expectation(s) failed:\n{}", failures.len(), failures.join("\n"));
    }
}

#[test]
fn empty_scene_renders_without_panicking() {
    let Some((device, queue)) = futures::executor::block_on(request_headless_device()) else {
        eprintln!("no wgpu adapter available, skipping empty-scene test");
        return;
    };
    let device = Arc::new(device);
    let queue = Arc::new(queue);

    let mut driver = FrameDriver::new(
        device.clone(),
        queue,
        FORMAT,
        RendererConfig::default(),
        Arc::new(NullPlatform::default()),
    );

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("empty-scene-target"),
        size: wgpu::Extent3d { width: 64, height: 64, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    driver.tick(&view, (64.0, 64.0));
}
