//! The `Texture` entity and its loading state machine
//! (Design Note 9: "express each texture as a small state machine `{Free →
//! Loading → Loaded | Failed}` advanced by callbacks posted onto the frame
//! tick's queue").

use crate::id::TextureId;

/// A texture's loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    Free,
    Loading,
    Loaded,
    Failed,
}

/// What a texture key was constructed from — also how the cache decides
/// whether a texture occupies its own GPU memory or borrows a parent's
///.
#[derive(Debug, Clone)]
pub enum TextureKind {
    Image { url: String },
    SubTexture { parent: TextureId, rect: (u32, u32, u32, u32) },
    RenderTexture { width: u32, height: u32 },
    Color { rgba: [u8; 4] },
}

/// A cached GPU texture entry.
pub struct Texture {
    pub id: TextureId,
    pub kind: TextureKind,
    pub state: TextureState,
    pub width: u32,
    pub height: u32,
    /// GPU-side resources. `None` until `state == Loaded`.
    pub gpu: Option<GpuTexture>,
    /// Nodes referencing this texture contribute one count each
    ///.
    pub ref_count: u32,
    /// Estimated GPU memory cost in bytes (0 for subtextures: they borrow
    /// the parent's allocation).
    pub memory_cost: u64,
    /// Font atlases and other `preventCleanup` textures are never evicted.
    pub prevent_cleanup: bool,
    /// Frame number this texture was last referenced by an emitted quad;
    /// eviction candidates are ordered by this ascending.
    pub last_used_frame: u64,
}

/// The actual GPU-side resources backing a loaded texture.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Texture {
    pub fn new(id: TextureId, kind: TextureKind) -> Self {
        let memory_cost_hint = match &kind {
            TextureKind::SubTexture { .. } => 0,
            _ => 0, // filled in once dimensions are known (`set_loaded`)
        };
        Texture {
            id,
            kind,
            state: TextureState::Free,
            width: 0,
            height: 0,
            gpu: None,
            ref_count: 0,
            memory_cost: memory_cost_hint,
            prevent_cleanup: false,
            last_used_frame: 0,
        }
    }

    /// Estimated bytes for an RGBA8 texture of `width x height`.
    pub fn estimate_bytes(width: u32, height: u32) -> u64 {
        width as u64 * height as u64 * 4
    }

    pub fn set_loaded(&mut self, gpu: GpuTexture, width: u32, height: u32) {
        self.gpu = Some(gpu);
        self.width = width;
        self.height = height;
        self.memory_cost = match self.kind {
            TextureKind::SubTexture { .. } => 0,
            _ => Self::estimate_bytes(width, height),
        };
        self.state = TextureState::Loaded;
    }

    pub fn set_failed(&mut self) {
        self.state = TextureState::Failed;
        self.gpu = None;
    }

    pub fn is_evictable_by_ref_count(&self) -> bool {
        self.ref_count == 0
    }
}
