//! GPU Context Wrapper.
//!
//! Wraps the graphics API and maintains a shadow of its state so that every
//! public mutator can skip the underlying call when the requested state
//! already matches. `wgpu` command encoding doesn't expose true redundant-call
//! elision the way a raw GL binding does, but the shadow still saves
//! re-creating bind groups/pipelines and re-issuing `set_scissor_rect`/
//! `set_viewport` calls that would otherwise be reissued unconditionally
//! every quad.

use std::sync::Arc;

use crate::error::GpuError;
use crate::id::ShaderId;

/// A bound-texture shadow slot. `None` means the unit is currently unbound.
type TextureUnitShadow = smallvec::SmallVec<[Option<crate::id::TextureId>; 16]>;

/// Shadowed GL-equivalent state, checked before every mutator issues work.
struct ContextState {
    bound_textures: TextureUnitShadow,
    scissor: Option<(u32, u32, u32, u32)>,
    viewport: Option<(u32, u32, u32, u32)>,
    current_pipeline: Option<ShaderId>,
    /// `None` means the default (screen) framebuffer.
    current_framebuffer: Option<crate::id::TextureId>,
    blend_enabled: bool,
}

impl ContextState {
    fn new(max_texture_units: usize) -> Self {
        Self {
            bound_textures: smallvec::smallvec![None; max_texture_units],
            scissor: None,
            viewport: None,
            current_pipeline: None,
            current_framebuffer: None,
            blend_enabled: true,
        }
    }
}

/// Wraps `wgpu::Device`/`wgpu::Queue` with a shadow-state cache. Errors
/// from the underlying API are surfaced as
/// [`GpuError`]; shader compile/link failures are never fatal (see
/// [`GpuContext::compile_shader_checked`]).
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    state: ContextState,
}

impl GpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, max_texture_units: usize) -> Self {
        Self { device, queue, state: ContextState::new(max_texture_units) }
    }

    /// Binds `texture` to unit `i` in the shadow if it isn't already there.
    /// Returns `true` if the shadow changed (caller should actually issue the
    /// bind-group/descriptor-set update), `false` if this is a no-op.
    pub fn bind_texture_unit(&mut self, unit: usize, texture: Option<crate::id::TextureId>) -> bool {
        if let Some(slot) = self.state.bound_textures.get_mut(unit) {
            if *slot == texture {
                return false;
            }
            *slot = texture;
            true
        } else {
            false
        }
    }

    pub fn set_scissor(&mut self, rect: Option<(u32, u32, u32, u32)>) -> bool {
        if self.state.scissor == rect {
            return false;
        }
        self.state.scissor = rect;
        true
    }

    pub fn set_viewport(&mut self, rect: (u32, u32, u32, u32)) -> bool {
        if self.state.viewport == Some(rect) {
            return false;
        }
        self.state.viewport = Some(rect);
        true
    }

    pub fn use_pipeline(&mut self, shader: ShaderId) -> bool {
        if self.state.current_pipeline == Some(shader) {
            return false;
        }
        self.state.current_pipeline = Some(shader);
        true
    }

    pub fn bind_framebuffer(&mut self, target: Option<crate::id::TextureId>) -> bool {
        if self.state.current_framebuffer == target {
            return false;
        }
        self.state.current_framebuffer = target;
        // Changing the render target invalidates every other cached binding:
        // a new render pass starts with nothing bound.
        for slot in self.state.bound_textures.iter_mut() {
            *slot = None;
        }
        self.state.scissor = None;
        self.state.current_pipeline = None;
        true
    }

    pub fn set_blend_enabled(&mut self, enabled: bool) -> bool {
        if self.state.blend_enabled == enabled {
            return false;
        }
        self.state.blend_enabled = enabled;
        true
    }

    /// Compiles and validates a WGSL shader module without panicking on
    /// failure. Uses `wgpu`'s error
    /// scope mechanism to downgrade a validation error into a logged
    /// warning instead of `wgpu`'s default behavior (a device-lost panic).
    pub async fn compile_shader_checked(
        &self,
        label: &str,
        source: &str,
    ) -> Option<wgpu::ShaderModule> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        match self.device.pop_error_scope().await {
            Some(err) => {
                log::warn!("shader '{label}' failed to compile: {err}");
                None
            }
            None => Some(module),
        }
    }

    pub fn report_error(code: u32, name: &'static str, operation: &'static str) -> GpuError {
        GpuError { code, name, operation }
    }
}

/// Requests a headless (surfaceless) device, used by unit/integration tests
/// and by embeddings with no on-screen window. Returns `None` if no adapter
/// is available in the current environment rather than panicking, so tests
/// can skip gracefully on CI runners without a GPU.
pub async fn request_headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::None,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok()?;
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("tvscene-headless"),
            #[cfg(feature = "performance_measurement")]
            required_features: wgpu::Features::TIMESTAMP_QUERY,
            #[cfg(not(feature = "performance_measurement"))]
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        })
        .await
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_same_texture_unit_is_a_no_op() {
        let mut state = ContextState::new(4);
        let id = crate::id::TextureId(1);
        assert!(state.bound_textures.get_mut(0).is_some());
        // Simulate GpuContext::bind_texture_unit without constructing a real device.
        let changed_first = {
            let slot = &mut state.bound_textures[0];
            if *slot == Some(id) {
                false
            } else {
                *slot = Some(id);
                true
            }
        };
        let changed_second = {
            let slot = &mut state.bound_textures[0];
            if *slot == Some(id) {
                false
            } else {
                *slot = Some(id);
                true
            }
        };
        assert!(changed_first);
        assert!(!changed_second);
    }

    #[test]
    fn changing_framebuffer_clears_texture_shadow() {
        let device_queue = futures::executor::block_on(request_headless_device());
        let Some((device, queue)) = device_queue else { return };
        let mut ctx = GpuContext::new(Arc::new(device), Arc::new(queue), 4);
        ctx.bind_texture_unit(0, Some(crate::id::TextureId(1)));
        ctx.bind_framebuffer(Some(crate::id::TextureId(99)));
        assert!(ctx.bind_texture_unit(0, Some(crate::id::TextureId(1))));
    }
}
