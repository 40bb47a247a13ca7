//! SDF Font Registry.
//!
//! A font is `(fontFamily, atlas texture, glyph table, kerning table,
//! metrics)`. Font JSON follows the `msdf-bmfont-xml` schema, parsed with
//! `serde`/`serde_json`; the atlas PNG is decoded with the `image` crate.

use ahash::AHashMap;
use serde::Deserialize;

use crate::id::{FontId, TextureId};

/// One glyph's atlas placement, local offset, and advance, all in font
/// design units.
#[derive(Debug, Clone, Copy)]
pub struct Glyph {
    pub atlas_xy: (f32, f32),
    pub atlas_wh: (f32, f32),
    pub offset: (f32, f32),
    pub advance: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FontMetrics {
    pub ascender: f32,
    pub descender: f32,
    pub line_gap: f32,
    /// Design units per em; used to derive `fontScale = fontSize / em_size`
    ///.
    pub units_per_em: f32,
}

pub struct FontDescriptor {
    pub family: String,
    pub atlas_texture: TextureId,
    pub atlas_size: (f32, f32),
    pub glyphs: AHashMap<u32, Glyph>,
    pub kerning: AHashMap<(u32, u32), f32>,
    pub metrics: FontMetrics,
    pub line_height: f32,
    pub distance_range: f32,
}

impl FontDescriptor {
    pub fn kerning_for(&self, prev: u32, current: u32) -> f32 {
        self.kerning.get(&(prev, current)).copied().unwrap_or(0.0)
    }
}

// ---- msdf-bmfont-xml JSON schema -----------------------

#[derive(Deserialize)]
struct BmFontJson {
    info: BmFontInfo,
    common: BmFontCommon,
    chars: Vec<BmFontChar>,
    #[serde(default)]
    kernings: Vec<BmFontKerning>,
    #[serde(rename = "distanceField")]
    distance_field: BmFontDistanceField,
    #[serde(rename = "lightningMetrics")]
    lightning_metrics: Option<BmFontLightningMetrics>,
}

#[derive(Deserialize)]
struct BmFontInfo {
    size: f32,
}

#[derive(Deserialize)]
struct BmFontCommon {
    #[serde(rename = "lineHeight")]
    line_height: f32,
    #[allow(dead_code)]
    base: f32,
    #[serde(rename = "scaleW")]
    scale_w: f32,
    #[serde(rename = "scaleH")]
    scale_h: f32,
}

#[derive(Deserialize)]
struct BmFontChar {
    id: u32,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    xoffset: f32,
    yoffset: f32,
    xadvance: f32,
    #[allow(dead_code)]
    page: u32,
    #[allow(dead_code)]
    chnl: u32,
}

#[derive(Deserialize)]
struct BmFontKerning {
    first: u32,
    second: u32,
    amount: f32,
}

#[derive(Deserialize)]
struct BmFontDistanceField {
    #[serde(rename = "fieldType")]
    #[allow(dead_code)]
    field_type: String,
    #[serde(rename = "distanceRange")]
    distance_range: f32,
}

#[derive(Deserialize)]
struct BmFontLightningMetrics {
    ascender: f32,
    descender: f32,
    #[serde(rename = "lineGap")]
    line_gap: f32,
    #[serde(rename = "unitsPerEm")]
    units_per_em: f32,
}

/// Parses a `msdf-bmfont-xml`-schema JSON document into a [`FontDescriptor`]
/// (minus the atlas texture id, which the caller fills in once the atlas PNG
/// referenced by `pages[]` has been decoded and uploaded).
pub fn parse_font_json(family: &str, json: &[u8], atlas_texture: TextureId) -> Result<FontDescriptor, String> {
    let raw: BmFontJson = serde_json::from_slice(json).map_err(|e| e.to_string())?;

    let mut glyphs = AHashMap::new();
    for c in &raw.chars {
        glyphs.insert(
            c.id,
            Glyph {
                atlas_xy: (c.x, c.y),
                atlas_wh: (c.width, c.height),
                offset: (c.xoffset, c.yoffset),
                advance: c.xadvance,
            },
        );
    }

    let mut kerning = AHashMap::new();
    for k in &raw.kernings {
        kerning.insert((k.first, k.second), k.amount);
    }

    let metrics = match raw.lightning_metrics {
        Some(lm) => FontMetrics {
            ascender: lm.ascender,
            descender: lm.descender,
            line_gap: lm.line_gap,
            units_per_em: lm.units_per_em,
        },
        // Fall back to deriving an approximate units-per-em from the declared
        // point size when the optional metrics block is absent.
        None => FontMetrics {
            ascender: raw.info.size,
            descender: 0.0,
            line_gap: 0.0,
            units_per_em: raw.info.size,
        },
    };

    Ok(FontDescriptor {
        family: family.to_string(),
        atlas_texture,
        atlas_size: (raw.common.scale_w, raw.common.scale_h),
        glyphs,
        kerning,
        metrics,
        line_height: raw.common.line_height,
        distance_range: raw.distance_field.distance_range,
    })
}

/// Owns every loaded font, keyed by family name. The waiter bucket for text
/// nodes whose font hasn't resolved yet lives separately in [`crate::text_layout::FontWaiters`], since
/// the batcher only ever has a `&FontRegistry` borrowed alongside a
/// `&mut FontWaiters` — folding the waiters in here would force the
/// registry itself to be mutable on every text-emitting frame.
#[derive(Default)]
pub struct FontRegistry {
    by_family: AHashMap<String, FontId>,
    fonts: AHashMap<FontId, FontDescriptor>,
    next_id: u32,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_by_family(&self, family: &str) -> Option<&FontDescriptor> {
        self.by_family.get(family).and_then(|id| self.fonts.get(id))
    }

    pub fn get(&self, id: FontId) -> Option<&FontDescriptor> {
        self.fonts.get(&id)
    }

    pub fn insert(&mut self, descriptor: FontDescriptor) -> FontId {
        let id = FontId(self.next_id);
        self.next_id += 1;
        self.by_family.insert(descriptor.family.clone(), id);
        self.fonts.insert(id, descriptor);
        id
    }

    pub fn is_loaded(&self, family: &str) -> bool {
        self.by_family.contains_key(family)
    }

    /// Removes a font; the caller is responsible for also invalidating
    /// `TextLayoutCache` entries and resolving/dropping any `FontWaiters`
    /// registered against `family`.
    pub fn unload(&mut self, family: &str) {
        if let Some(id) = self.by_family.remove(family) {
            self.fonts.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "pages": ["atlas.png"],
        "info": {"size": 42},
        "common": {"lineHeight": 50, "base": 40, "scaleW": 512, "scaleH": 512},
        "chars": [
            {"id": 65, "x": 0, "y": 0, "width": 20, "height": 30, "xoffset": 0, "yoffset": 0, "xadvance": 24, "page": 0, "chnl": 15},
            {"id": 66, "x": 20, "y": 0, "width": 18, "height": 30, "xoffset": 0, "yoffset": 0, "xadvance": 22, "page": 0, "chnl": 15}
        ],
        "kernings": [
            {"first": 65, "second": 66, "amount": -2}
        ],
        "distanceField": {"fieldType": "msdf", "distanceRange": 4},
        "lightningMetrics": {"ascender": 40, "descender": -10, "lineGap": 2, "unitsPerEm": 42}
    }"#;

    #[test]
    fn parses_glyphs_and_kerning() {
        let font = parse_font_json("Test", SAMPLE_JSON.as_bytes(), TextureId(1)).unwrap();
        assert_eq!(font.glyphs.len(), 2);
        assert_eq!(font.glyphs[&65].advance, 24.0);
        assert_eq!(font.kerning_for(65, 66), -2.0);
        assert_eq!(font.metrics.units_per_em, 42.0);
    }

    #[test]
    fn unload_removes_family_lookup() {
        let mut registry = FontRegistry::new();
        registry.insert(parse_font_json("Test", SAMPLE_JSON.as_bytes(), TextureId(1)).unwrap());
        assert!(registry.is_loaded("Test"));
        registry.unload("Test");
        assert!(!registry.is_loaded("Test"));
    }
}
