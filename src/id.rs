//! Identifiers used throughout the renderer.
//!
//! `NodeId` is a `slotmap` generational key: arena-allocated node indices
//! rather than pointer cycles. A destroyed node's old `NodeId` simply fails
//! to resolve rather than aliasing a reused slot.

use std::fmt;

slotmap::new_key_type! {
    /// A handle to a node in the scene graph.
    pub struct NodeId;
}

/// A texture's content fingerprint: a URL hash, subtexture descriptor hash,
/// or a generated id for RTT/color textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered shader kind tag, used to key the uniform-location and
/// reuse-predicate tables in the shader registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

/// A registered font family id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontId(pub u32);

/// A monotonically increasing id for in-flight image decode requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);
