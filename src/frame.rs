//! Frame Driver.
//!
//! The top-level per-frame tick: scene update → due RTT passes
//! (children-before-parents) → main pass → present. Wires every other
//! module together so an embedder only has to drive one type.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Instant;

use ahash::{AHashMap, AHashSet};

use crate::batch::{Batcher, TextRenderContext};
use crate::color::Color;
use crate::config::RendererConfig;
use crate::error::RendererError;
use crate::events::EventBus;
use crate::font::{parse_font_json, FontId, FontRegistry};
use crate::framebuffer_pool::{Allocation, FramebufferPool};
use crate::gpu_context::GpuContext;
use crate::id::{NodeId, TextureId};
use crate::image_worker::{ImageSource, ImageWorkerPool, WorkerResult};
use crate::matrix::Rect;
use crate::metrics::{BatchCounters, PhaseTimings, RollingMetrics};
use crate::node::ShaderProps;
use crate::platform::{DecodeOptions, Platform};
use crate::rtt::{self, RttScheduler};
use crate::scene::Scene;
use crate::shader::{self, ShaderRegistry};
use crate::text_layout::{FontWaiters, TextLayoutCache};
use crate::texture::{GpuTexture, TextureState};
use crate::texture_cache::TextureCache;
use crate::vertex::{build_quad_index_buffer, Vertex};

/// Bookkeeping for one RTT node beyond what `Scene`/`RttScheduler` track: the
/// framebuffer-pool allocation backing its render target and the zero-cost
/// subtexture the main pass samples.
struct RttAllocation {
    allocation: Allocation,
    backing_texture: TextureId,
}

/// Everything one `load_image` request needs to resolve once its bytes come
/// back off the worker pool.
struct PendingImageLoad {
    texture: TextureId,
    url: String,
}

/// Owns the full renderer: scene graph, caches, GPU resources, and the
/// background worker pool. One `FrameDriver` corresponds to one on-screen (or
/// headless) render target.
pub struct FrameDriver {
    pub scene: Scene,
    pub config: RendererConfig,
    pub textures: TextureCache,
    pub fonts: FontRegistry,
    pub layouts: TextLayoutCache,
    pub waiters: FontWaiters,
    pub events: EventBus,
    pub metrics: RollingMetrics,

    gpu: GpuContext,
    shaders: ShaderRegistry,
    framebuffers: FramebufferPool,
    rtt: RttScheduler,
    rtt_allocations: AHashMap<NodeId, RttAllocation>,
    image_workers: ImageWorkerPool,
    pending_loads: AHashMap<u64, PendingImageLoad>,
    in_flight_urls: AHashSet<String>,

    main_batcher: Batcher,
    rtt_batcher: Batcher,

    sampler: wgpu::Sampler,
    default_texture: TextureId,
    surface_format: wgpu::TextureFormat,
    frame_no: u64,
}

impl FrameDriver {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        surface_format: wgpu::TextureFormat,
        config: RendererConfig,
        platform: Arc<dyn Platform>,
    ) -> Self {
        let shaders = ShaderRegistry::new(&device, surface_format);
        let max_units = config.max_texture_image_units;
        let gpu = GpuContext::new(device.clone(), queue.clone(), max_units);

        let mut textures = TextureCache::new();
        let default_texture = textures.create_color([255, 255, 255, 255]);
        let default_gpu = upload_solid_rgba(&device, &queue, [255, 255, 255, 255]);
        textures.set_loaded(default_texture, default_gpu, 1, 1);
        textures.mark_prevent_cleanup(default_texture, true);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tvscene-quad-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let image_workers = ImageWorkerPool::new(config.num_image_workers, platform);
        let framebuffers = FramebufferPool::new(&config.rtt_pool_size_classes);

        FrameDriver {
            scene: Scene::new(),
            config,
            textures,
            fonts: FontRegistry::new(),
            layouts: TextLayoutCache::new(),
            waiters: FontWaiters::new(),
            events: EventBus::new(),
            metrics: RollingMetrics::new(),
            gpu,
            shaders,
            framebuffers,
            rtt: RttScheduler::new(),
            rtt_allocations: AHashMap::new(),
            image_workers,
            pending_loads: AHashMap::new(),
            in_flight_urls: AHashSet::new(),
            main_batcher: Batcher::new(max_units, default_texture),
            rtt_batcher: Batcher::new(max_units, default_texture),
            sampler,
            default_texture,
            surface_format,
            frame_no: 0,
        }
    }

    pub fn default_texture(&self) -> TextureId {
        self.default_texture
    }

    /// Registers (or returns the already-registered id for) an image URL,
    /// submitting a decode request the first time it's seen
    ///.
    pub fn load_image(&mut self, url: &str) -> TextureId {
        let id = self.textures.get_or_create_image(url);
        if self.in_flight_urls.insert(url.to_string()) {
            let request_id = self
                .image_workers
                .submit(ImageSource::Url(url.to_string()), DecodeOptions::default());
            self.pending_loads.insert(request_id, PendingImageLoad { texture: id, url: url.to_string() });
        }
        id
    }

    /// Parses a `msdf-bmfont-xml`-schema font and registers it. Any text
    /// nodes waiting on this family are marked dirty so the next `tick`
    /// recomputes their layout.
    pub fn load_font(&mut self, family: &str, json: &[u8], atlas_texture: TextureId) -> Result<FontId, RendererError> {
        match parse_font_json(family, json, atlas_texture) {
            Ok(descriptor) => {
                let id = self.fonts.insert(descriptor);
                self.textures.mark_prevent_cleanup(atlas_texture, true);
                for waiting in self.waiters.resolve(family) {
                    if let Some(node) = self.scene.get_mut(waiting) {
                        node.content_dirty = true;
                    }
                }
                Ok(id)
            }
            Err(reason) => {
                let err = RendererError::FontParseFailed { family: family.to_string(), reason };
                self.events.emit_error(err.clone());
                Err(err)
            }
        }
    }

    /// Runs one full frame: scene update, RTT passes, main pass, present.
    /// `viewport_px` is the target's logical pixel size. Never returns a
    /// `Result` — recoverable failures are pushed onto `self.events`
    ///.
    pub fn tick(&mut self, target_view: &wgpu::TextureView, viewport_px: (f32, f32)) -> PhaseTimings {
        let frame_start = Instant::now();
        self.frame_no += 1;
        let frame_no = self.frame_no;

        let t0 = Instant::now();
        let viewport = Rect::from_xywh(0.0, 0.0, viewport_px.0, viewport_px.1);
        self.scene.update(viewport, self.config.bounds_margin, frame_no);
        self.sync_rtt_allocations();
        let scene_update = t0.elapsed();

        self.drain_image_workers();

        let t1 = Instant::now();
        let mut counters = BatchCounters::default();
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tvscene-frame-encoder"),
        });

        let due = {
            let textures = &self.textures;
            rtt::due_passes(&self.rtt, &self.scene, |tex| {
                textures.get(tex).map(|t| t.state == TextureState::Loaded).unwrap_or(false)
            })
        };

        for due_pass in &due {
            let Some(rect) = self.rtt_allocations.get(&due_pass.node).map(|a| a.allocation.rect) else { continue };
            self.rtt_batcher.begin_pass();
            let emitted = {
                let mut text_ctx = TextRenderContext { fonts: &self.fonts, layouts: &mut self.layouts, waiters: &mut self.waiters };
                self.rtt_batcher.emit_rtt_pass(
                    &self.scene,
                    due_pass.node,
                    due_pass.target_texture,
                    &self.textures,
                    (rect.2 as f32, rect.3 as f32),
                    Some(&mut text_ctx),
                )
            };
            if emitted.is_err() {
                self.events.emit_error(RendererError::RttAllocationFailed { node: due_pass.node });
                continue;
            }
            counters.rtt_passes += 1;
            counters.rtt_pass_quads += self.rtt_batcher.total_quads();

            let origin = self.scene.get(due_pass.node).map(|n| (n.world.screen_aabb.min_x, n.world.screen_aabb.min_y)).unwrap_or((0.0, 0.0));
            let Some(backing) = self.textures.get(self.rtt_allocations[&due_pass.node].backing_texture).and_then(|t| t.gpu.as_ref()) else { continue };
            let bytes = encode_pass_commands(
                &self.gpu.device, &self.shaders, &self.textures, &self.sampler, self.default_texture,
                &mut encoder, &backing.view, rect, origin, Color::TRANSPARENT, &self.rtt_batcher, &mut counters,
            );
            let _ = bytes;
            for &tex in &due_pass_textures(&self.rtt_batcher) {
                self.textures.mark_used(tex, frame_no);
            }
        }

        self.main_batcher.begin_pass();
        let emitted = {
            let mut text_ctx = TextRenderContext { fonts: &self.fonts, layouts: &mut self.layouts, waiters: &mut self.waiters };
            self.main_batcher.emit_main_pass(&self.scene, &self.textures, viewport_px, Some(&mut text_ctx))
        };
        if let Err(_err) = emitted {
            self.events.emit_error(RendererError::ContextLost);
        }
        counters.main_pass_quads = self.main_batcher.total_quads();
        counters.main_pass_ops = self.main_batcher.ops().len() as u32;
        counters.text_ops = self.main_batcher.text_ops().len() as u32;

        let viewport_rect = (0u32, 0u32, viewport_px.0 as u32, viewport_px.1 as u32);
        encode_pass_commands(
            &self.gpu.device, &self.shaders, &self.textures, &self.sampler, self.default_texture,
            &mut encoder, target_view, viewport_rect, (0.0, 0.0), self.config.clear_color, &self.main_batcher, &mut counters,
        );
        for &tex in &due_pass_textures(&self.main_batcher) {
            self.textures.mark_used(tex, frame_no);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        let batch = t1.elapsed();

        let t2 = Instant::now();
        let out_of_bounds = self.out_of_bounds_textures();
        self.textures.end_frame(self.config.tx_mem_byte_threshold, &out_of_bounds);
        self.scene.flush_destroyed(&mut self.events);
        let encode_and_submit = t2.elapsed();

        let timings = PhaseTimings {
            scene_update,
            batch,
            encode_and_submit,
            present: std::time::Duration::ZERO,
            total: frame_start.elapsed(),
        };
        self.metrics.push(Instant::now(), timings, counters);
        #[cfg(feature = "render_metrics")]
        log::trace!("frame {}: {:?}", frame_no, self.metrics.summary());
        timings
    }

    fn out_of_bounds_textures(&self) -> AHashSet<TextureId> {
        let mut set = AHashSet::new();
        for (_, node) in self.scene.iter() {
            if node.world.render_state == crate::node::RenderState::OutOfBounds {
                if let Some(tex) = node.texture {
                    set.insert(tex);
                }
            }
        }
        set
    }

    /// Polls the image worker pool and uploads anything that finished
    /// decoding into the texture cache.
    fn drain_image_workers(&mut self) {
        for result in self.image_workers.poll_completed() {
            match result {
                WorkerResult::Ok { request_id, bitmap } => {
                    let Some(pending) = self.pending_loads.remove(&request_id) else { continue };
                    self.in_flight_urls.remove(&pending.url);

                    let max_size = self.config.max_texture_size;
                    if bitmap.width > max_size || bitmap.height > max_size {
                        self.textures.set_failed(pending.texture);
                        self.events.emit_error(RendererError::TextureTooLarge {
                            id: pending.texture,
                            width: bitmap.width,
                            height: bitmap.height,
                        });
                        continue;
                    }

                    let gpu = upload_rgba(&self.gpu.device, &self.gpu.queue, bitmap.width, bitmap.height, &bitmap.rgba8);
                    self.textures.set_loaded(pending.texture, gpu, bitmap.width, bitmap.height);
                }
                WorkerResult::Err(err) => {
                    if let Some(pending) = self.pending_loads.remove(&err.request_id) {
                        self.in_flight_urls.remove(&pending.url);
                        self.textures.set_failed(pending.texture);
                        self.events.emit_error(RendererError::TextureLoadFailed { id: pending.texture, reason: err.message });
                    }
                }
            }
        }
    }

    /// Allocates (or frees) framebuffer-pool render targets for nodes whose
    /// `flags.rtt` changed since the last tick.
    fn sync_rtt_allocations(&mut self) {
        let live: AHashSet<NodeId> = self.scene.iter().filter(|(_, n)| n.flags.rtt).map(|(id, _)| id).collect();

        let stale: Vec<NodeId> = self.rtt_allocations.keys().copied().filter(|id| !live.contains(id)).collect();
        for id in stale {
            if let Some(alloc) = self.rtt_allocations.remove(&id) {
                self.framebuffers.free(&alloc.allocation);
                self.textures.dec_ref(alloc.backing_texture);
                self.rtt.remove(id);
            }
        }

        for id in live {
            if self.rtt_allocations.contains_key(&id) {
                continue;
            }
            let (w, h) = self
                .scene
                .get(id)
                .map(|n| (n.geometry.w.max(1.0) as u32, n.geometry.h.max(1.0) as u32))
                .unwrap_or((1, 1));

            let device = self.gpu.device.clone();
            let format = self.surface_format;
            let textures_cell = RefCell::new(&mut self.textures);
            let alloc = self.framebuffers.alloc(
                w,
                h,
                |side| {
                    let gpu = create_render_target(&device, format, side, side);
                    let mut textures = textures_cell.borrow_mut();
                    let tex_id = textures.register_rtt(side, side);
                    textures.set_loaded(tex_id, gpu, side, side);
                    textures.mark_prevent_cleanup(tex_id, true);
                    Some(tex_id)
                },
                |rw, rh| {
                    let gpu = create_render_target(&device, format, rw, rh);
                    let mut textures = textures_cell.borrow_mut();
                    let tex_id = textures.register_rtt(rw, rh);
                    textures.set_loaded(tex_id, gpu, rw, rh);
                    textures.mark_prevent_cleanup(tex_id, true);
                    Some(tex_id)
                },
            );

            let Some(allocation) = alloc else {
                self.events.emit_error(RendererError::RttAllocationFailed { node: id });
                continue;
            };

            let sample_texture = self.textures.create_subtexture(allocation.backing_texture, allocation.rect);
            if let Some(node) = self.scene.get_mut(id) {
                node.texture = Some(sample_texture);
            }
            self.rtt.insert(&self.scene, id);
            self.rtt_allocations.insert(id, RttAllocation { allocation, backing_texture: allocation.backing_texture });
        }
    }
}

fn due_pass_textures(batcher: &Batcher) -> Vec<TextureId> {
    let mut out: Vec<TextureId> = batcher.ops().iter().flat_map(|op| op.textures.iter().copied()).collect();
    out.extend(batcher.text_ops().iter().map(|op| op.atlas_texture));
    out
}

fn create_render_target(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("tvscene-rtt-target"),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

fn upload_solid_rgba(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4]) -> GpuTexture {
    upload_rgba(device, queue, 1, 1, &rgba)
}

fn upload_rgba(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32, rgba8: &[u8]) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("tvscene-texture"),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo { texture: &texture, mip_level: 0, origin: wgpu::Origin3d::ZERO, aspect: wgpu::TextureAspect::All },
        rgba8,
        wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(4 * width.max(1)), rows_per_image: Some(height.max(1)) },
        wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

/// Clamps a world-space clip rect (already relative to `origin`) to a
/// scissor rect that fits inside `target_wh`; `None` becomes the full target.
fn scissor_for(clip: Option<Rect>, origin: (f32, f32), target_wh: (u32, u32)) -> (u32, u32, u32, u32) {
    let Some(clip) = clip else { return (0, 0, target_wh.0.max(1), target_wh.1.max(1)) };
    let x = (clip.min_x - origin.0).max(0.0);
    let y = (clip.min_y - origin.1).max(0.0);
    let max_x = (clip.max_x - origin.0).min(target_wh.0 as f32);
    let max_y = (clip.max_y - origin.1).min(target_wh.1 as f32);
    let w = (max_x - x).max(0.0);
    let h = (max_y - y).max(0.0);
    (x as u32, y as u32, w.max(1.0) as u32, h.max(1.0) as u32)
}

/// Encodes one render pass (quads then text) against `target_view`. Returns
/// the number of draw calls issued, mostly useful for tests.
#[allow(clippy::too_many_arguments)]
fn encode_pass_commands(
    device: &wgpu::Device,
    shaders: &ShaderRegistry,
    textures: &TextureCache,
    sampler: &wgpu::Sampler,
    default_texture: TextureId,
    encoder: &mut wgpu::CommandEncoder,
    target_view: &wgpu::TextureView,
    viewport_rect: (u32, u32, u32, u32),
    origin: (f32, f32),
    clear_color: Color,
    batcher: &Batcher,
    counters: &mut BatchCounters,
) -> usize {
    use bytemuck::cast_slice;
    use wgpu::util::DeviceExt;

    let vertices = batcher.vertices();
    let quad_count = batcher.total_quads().max(1);
    let indices = build_quad_index_buffer(quad_count as usize);

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("tvscene-vertex-buffer"),
        contents: if vertices.is_empty() { cast_slice::<Vertex, u8>(&[Vertex { position: [0.0, 0.0], uv: [0.0, 0.0], color: 0, tex_unit: 0.0, node_uv: [0.0, 0.0] }]) } else { cast_slice(vertices) },
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("tvscene-index-buffer"),
        contents: cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    let glyph_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("tvscene-glyph-buffer"),
        contents: if batcher.glyph_vertices().is_empty() {
            cast_slice::<crate::vertex::GlyphVertex, u8>(&[crate::vertex::GlyphVertex { position: [0.0, 0.0], uv: [0.0, 0.0] }])
        } else {
            cast_slice(batcher.glyph_vertices())
        },
        usage: wgpu::BufferUsages::VERTEX,
    });

    let (vx, vy, vw, vh) = viewport_rect;
    let mut draw_calls = 0usize;

    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tvscene-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear_color.normalize()[0] as f64,
                        g: clear_color.normalize()[1] as f64,
                        b: clear_color.normalize()[2] as f64,
                        a: clear_color.normalize()[3] as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_viewport(vx as f32, vy as f32, vw as f32, vh as f32, 0.0, 1.0);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);

        for op in batcher.ops() {
            let program = shaders.program_for(&op.shader);
            pass.set_pipeline(&program.pipeline);

            let mut views: Vec<&wgpu::TextureView> = Vec::with_capacity(shader::MAX_TEXTURE_IMAGE_UNITS as usize);
            for slot in 0..shader::MAX_TEXTURE_IMAGE_UNITS as usize {
                let tex_id = op.textures.get(slot).copied().unwrap_or(default_texture);
                let view = textures
                    .get(tex_id)
                    .and_then(|t| t.gpu.as_ref())
                    .map(|g| &g.view)
                    .or_else(|| textures.get(default_texture).and_then(|t| t.gpu.as_ref()).map(|g| &g.view))
                    .expect("default texture is always loaded");
                views.push(view);
            }
            let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tvscene-quad-textures"),
                layout: &program.texture_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::Sampler(sampler) },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureViewArray(&views) },
                ],
            });

            let params = shader::rounded_params_for(&op.shader);
            let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tvscene-rounded-params"),
                contents: cast_slice(&[params]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tvscene-rounded-params-bg"),
                layout: &program.params_bind_group_layout,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() }],
            });

            pass.set_bind_group(0, &texture_bind_group, &[]);
            pass.set_bind_group(1, &params_bind_group, &[]);

            let (sx, sy, sw, sh) = scissor_for(op.clip_rect, origin, (vw, vh));
            pass.set_scissor_rect(sx.min(vw.max(1) - 1), sy.min(vh.max(1) - 1), sw.min(vw), sh.min(vh));

            let start = op.vertex_start;
            let index_start = 0u32;
            let index_end = op.quad_count * 6;
            pass.draw_indexed(index_start..index_end, start as i32, 0..1);
            draw_calls += 1;
        }

        pass.set_vertex_buffer(0, glyph_buffer.slice(..));
        for op in batcher.text_ops() {
            pass.set_pipeline(&shaders.sdf_program.pipeline);

            let view = textures
                .get(op.atlas_texture)
                .and_then(|t| t.gpu.as_ref())
                .map(|g| &g.view)
                .unwrap_or_else(|| &textures.get(default_texture).unwrap().gpu.as_ref().unwrap().view);
            let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tvscene-sdf-texture"),
                layout: &shaders.sdf_program.texture_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::Sampler(sampler) },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view) },
                ],
            });

            let params = shader::sdf_params_for(op.font_scale, op.distance_range, op.color.normalize());
            let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tvscene-sdf-params"),
                contents: cast_slice(&[params]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("tvscene-sdf-params-bg"),
                layout: &shaders.sdf_program.params_bind_group_layout,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() }],
            });

            pass.set_bind_group(0, &texture_bind_group, &[]);
            pass.set_bind_group(1, &params_bind_group, &[]);

            let (sx, sy, sw, sh) = scissor_for(op.clip_rect, origin, (vw, vh));
            pass.set_scissor_rect(sx.min(vw.max(1) - 1), sy.min(vh.max(1) - 1), sw.min(vw), sh.min(vh));

            let start = op.vertex_start;
            let count = op.glyph_count * 6;
            pass.draw(start..(start + count), 0..1);
            draw_calls += 1;
        }
    }

    counters.pipeline_switches += batcher.ops().len() as u32 + batcher.text_ops().len() as u32;
    draw_calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::matrix::BoundsMargin;
    use crate::platform::NullPlatform;

    async fn make_driver() -> Option<FrameDriver> {
        let (device, queue) = crate::gpu_context::request_headless_device().await?;
        Some(FrameDriver::new(
            Arc::new(device),
            Arc::new(queue),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            RendererConfig::default(),
            Arc::new(NullPlatform::default()),
        ))
    }

    #[test]
    fn tick_with_no_nodes_does_not_panic() {
        let Some(mut driver) = futures::executor::block_on(make_driver()) else { return };
        let target = device_offscreen_view(&driver.gpu.device, 64, 64, driver.surface_format);
        driver.tick(&target, (64.0, 64.0));
        assert_eq!(driver.metrics.summary().sample_count, 1);
    }

    #[test]
    fn load_image_dedupes_repeated_urls() {
        let Some(mut driver) = futures::executor::block_on(make_driver()) else { return };
        let a = driver.load_image("http://example.com/a.png");
        let b = driver.load_image("http://example.com/a.png");
        assert_eq!(a, b);
        assert_eq!(driver.in_flight_urls.len(), 1);
    }

    #[test]
    fn rtt_node_is_allocated_a_sample_texture_after_tick() {
        let Some(mut driver) = futures::executor::block_on(make_driver()) else { return };
        let node = driver.scene.create_node(None);
        {
            let n = driver.scene.get_mut(node).unwrap();
            n.set_w(100.0);
            n.set_h(100.0);
            n.flags.rtt = true;
        }
        let target = device_offscreen_view(&driver.gpu.device, 1920, 1080, driver.surface_format);
        driver.tick(&target, (1920.0, 1080.0));
        assert!(driver.scene.get(node).unwrap().texture.is_some());
        assert_eq!(driver.rtt_allocations.len(), 1);
    }

    #[test]
    fn destroying_rtt_node_frees_its_allocation() {
        let Some(mut driver) = futures::executor::block_on(make_driver()) else { return };
        let node = driver.scene.create_node(None);
        driver.scene.get_mut(node).unwrap().flags.rtt = true;
        let target = device_offscreen_view(&driver.gpu.device, 256, 256, driver.surface_format);
        driver.tick(&target, (256.0, 256.0));
        assert_eq!(driver.rtt_allocations.len(), 1);

        driver.scene.destroy_node(node, &mut driver.events);
        driver.tick(&target, (256.0, 256.0));
        assert!(driver.rtt_allocations.is_empty());
    }

    fn device_offscreen_view(device: &wgpu::Device, width: u32, height: u32, format: wgpu::TextureFormat) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test-target"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    #[test]
    fn bounds_margin_default_is_used_when_unset() {
        // Sanity check that RendererConfig's default bounds margin round-trips
        // through a tick without panicking on an empty scene.
        let margin = BoundsMargin::default();
        assert_eq!(margin.top, 100.0);
    }
}
