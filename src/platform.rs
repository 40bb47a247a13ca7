//! The Platform interface injected into the renderer core.
//!
//! The core never creates a window, fetches bytes, or decodes an image
//! itself — it calls out to a `Platform` implementation provided by the
//! embedding environment, keeping the core renderer free of windowing and
//! asset-fetching glue, generalized into an explicit trait so the core
//! stays environment-agnostic.

use std::fmt;

/// An opaque bitmap returned by a platform image load/decode.
#[derive(Debug, Clone)]
pub struct DecodedBitmap {
    pub width: u32,
    pub height: u32,
    /// Premultiplied-alpha RGBA8 pixel data, `width * height * 4` bytes.
    pub rgba8: Vec<u8>,
}

/// Options accepted by an image load/decode request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub premultiply_alpha: bool,
    pub clip_rect: Option<(u32, u32, u32, u32)>,
}

#[derive(Debug, Clone)]
pub struct PlatformError(pub String);

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PlatformError {}

/// Environment services the renderer core consumes but does not implement
/// itself. Implemented once per embedding (browser canvas, native window,
/// headless test harness).
pub trait Platform: Send + Sync {
    /// Fetches raw bytes for a URL (used for image and font loads).
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, PlatformError>;

    /// Decodes an already-fetched byte buffer into a bitmap.
    fn decode_blob(
        &self,
        bytes: &[u8],
        options: DecodeOptions,
    ) -> Result<DecodedBitmap, PlatformError>;

    /// Monotonic wall-clock time in milliseconds, used to drive the frame
    /// tick and `lastUsedFrame`/metrics bookkeeping.
    fn timestamp(&self) -> f64;
}

/// A minimal `Platform` used by unit tests and `tvscene-test-scenes`: fetches
/// nothing (callers pre-populate bytes), decodes by treating the input bytes
/// as already-decoded RGBA8 data. Useful for headless tests.
#[derive(Debug, Default)]
pub struct NullPlatform {
    clock_ms: std::sync::atomic::AtomicU64,
}

impl Platform for NullPlatform {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, PlatformError> {
        Err(PlatformError(format!("NullPlatform cannot fetch '{url}'")))
    }

    fn decode_blob(
        &self,
        bytes: &[u8],
        _options: DecodeOptions,
    ) -> Result<DecodedBitmap, PlatformError> {
        if !bytes.len().is_multiple_of(4) {
            return Err(PlatformError(
                "NullPlatform expects pre-decoded RGBA8 bytes".to_string(),
            ));
        }
        let pixels = bytes.len() / 4;
        let side = (pixels as f64).sqrt() as u32;
        Ok(DecodedBitmap {
            width: side.max(1),
            height: side.max(1),
            rgba8: bytes.to_vec(),
        })
    }

    fn timestamp(&self) -> f64 {
        use std::sync::atomic::Ordering;
        // Advances by 1ms per call so ordering-sensitive tests stay deterministic
        // without reaching for a real wall clock.
        self.clock_ms.fetch_add(1, Ordering::Relaxed) as f64
    }
}
