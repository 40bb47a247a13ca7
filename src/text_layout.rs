//! SDF Text Layout and glyph-quad emission.
//!
//! Given a font and a set of layout properties, produces a [`TextLayout`]:
//! a list of visual lines plus the glyph quads needed to render them. A
//! small cache keyed on the property tuple avoids re-running the wrap
//! algorithm every frame for unchanged text nodes.

use std::num::NonZeroUsize;

use ahash::AHashMap;
use lru::LruCache;

use crate::font::FontDescriptor;
use crate::id::NodeId;

/// Bound on the number of distinct `(text, font, ...)` tuples kept cached at
/// once. Text content on a TV UI tends to churn (live data, scrolling lists),
/// so this is an LRU rather than the unbounded map a more static cache could
/// get away with.
const LAYOUT_CACHE_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// The properties a text layout is computed and cached from.
/// Layout cache key: `(text, fontFamily, fontSize, fontStyle,
/// wrap, wrapWidth, letterSpacing, maxLines, overflowSuffix)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayoutProps {
    pub text: String,
    pub font_family: String,
    pub font_size: f32,
    pub font_style: String,
    pub wrap: bool,
    /// Wrap boundary in pixels (the same space `font_size` is specified in).
    /// Converted to design units (divided by `fontScale = font_size /
    /// units_per_em`) before being compared against glyph advances, which
    /// `font.rs` stores in design units.
    pub wrap_width: f32,
    pub max_height: f32,
    pub line_height: f32,
    pub letter_spacing: f32,
    pub max_lines: u32,
    pub overflow_suffix: String,
    pub align: TextAlign,
}

impl TextLayoutProps {
    fn cache_key(&self) -> TextLayoutCacheKey {
        TextLayoutCacheKey {
            text: self.text.clone(),
            font_family: self.font_family.clone(),
            font_size_bits: self.font_size.to_bits(),
            font_style: self.font_style.clone(),
            wrap: self.wrap,
            wrap_width_bits: self.wrap_width.to_bits(),
            letter_spacing_bits: self.letter_spacing.to_bits(),
            max_lines: self.max_lines,
            overflow_suffix: self.overflow_suffix.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextLayoutCacheKey {
    text: String,
    font_family: String,
    font_size_bits: u32,
    font_style: String,
    wrap: bool,
    wrap_width_bits: u32,
    letter_spacing_bits: u32,
    max_lines: u32,
    overflow_suffix: String,
}

/// One glyph placed at a design-unit position, ready to be turned into a
/// quad by the batcher.
#[derive(Debug, Clone, Copy)]
pub struct PlacedGlyph {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub uv_xy: (f32, f32),
    pub uv_wh: (f32, f32),
}

#[derive(Debug, Clone)]
pub struct TextLayout {
    pub glyphs: Vec<PlacedGlyph>,
    /// `fontSize / font.em_size`.
    pub font_scale: f32,
    pub distance_range: f32,
    /// Pixel dimensions: `ceil(max_width_found * font_scale)` /
    /// `ceil(line_count * design_line_height * font_scale)`.
    pub pixel_width: f32,
    pub pixel_height: f32,
}

struct Word {
    /// Codepoints making up the word, excluding the trailing space.
    chars: Vec<u32>,
    width: f32,
}

fn word_width(font: &FontDescriptor, word: &[u32], letter_spacing: f32) -> f32 {
    let mut width = 0.0;
    let mut prev = None;
    for &ch in word {
        let Some(glyph) = font.glyphs.get(&ch) else { continue };
        if let Some(p) = prev {
            width += font.kerning_for(p, ch);
        }
        width += glyph.advance + letter_spacing;
        prev = Some(ch);
    }
    width
}

fn tokenize_words(line: &str) -> Vec<Word> {
    // Split on space (U+0020) and zero-width space (U+200B), keeping each
    // word as its raw codepoints.
    line.split(|c: char| c == ' ' || c == '\u{200B}')
        .filter(|w| !w.is_empty())
        .map(|w| Word { chars: w.chars().map(|c| c as u32).collect(), width: 0.0 })
        .collect()
}

/// Hard-breaks `word` at the last codepoint whose cumulative width still
/// fits `max_width`: words longer than `max_width` are hard-broken at the
/// last fitting codepoint.
fn hard_break(font: &FontDescriptor, word: &[u32], letter_spacing: f32, max_width: f32) -> (Vec<u32>, Vec<u32>) {
    let mut width = 0.0;
    let mut prev = None;
    for (i, &ch) in word.iter().enumerate() {
        let Some(glyph) = font.glyphs.get(&ch) else { continue };
        let mut next_width = width;
        if let Some(p) = prev {
            next_width += font.kerning_for(p, ch);
        }
        next_width += glyph.advance + letter_spacing;
        if next_width > max_width && i > 0 {
            return (word[..i].to_vec(), word[i..].to_vec());
        }
        width = next_width;
        prev = Some(ch);
    }
    (word.to_vec(), Vec::new())
}

/// Runs the wrap algorithm over one logical (newline-delimited) line,
/// producing visual lines of codepoints.
fn wrap_logical_line(font: &FontDescriptor, line: &str, wrap: bool, max_width: f32, letter_spacing: f32) -> Vec<Vec<u32>> {
    if !wrap {
        return vec![line.chars().map(|c| c as u32).collect()];
    }

    let mut words = tokenize_words(line);
    for w in &mut words {
        w.width = word_width(font, &w.chars, letter_spacing);
    }

    let mut visual_lines = Vec::new();
    let mut current: Vec<u32> = Vec::new();
    let mut current_width = 0.0f32;
    let space_width = font
        .glyphs
        .get(&(' ' as u32))
        .map(|g| g.advance + letter_spacing)
        .unwrap_or(letter_spacing);

    let mut i = 0;
    while i < words.len() {
        let word = &words[i];
        if word.width > max_width {
            // Hard-break oversized words across as many lines as needed.
            let mut remaining = word.chars.clone();
            if !current.is_empty() {
                visual_lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            while !remaining.is_empty() {
                let (fit, rest) = hard_break(font, &remaining, letter_spacing, max_width);
                visual_lines.push(fit);
                remaining = rest;
            }
            i += 1;
            continue;
        }

        let extra = if current.is_empty() { word.width } else { space_width + word.width };
        if current_width + extra > max_width && !current.is_empty() {
            visual_lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        if !current.is_empty() {
            current.push(' ' as u32);
            current_width += space_width;
        }
        current.extend_from_slice(&word.chars);
        current_width += word.width;
        i += 1;
    }
    if !current.is_empty() || visual_lines.is_empty() {
        visual_lines.push(current);
    }
    visual_lines
}

fn line_pixel_width(font: &FontDescriptor, line: &[u32], letter_spacing: f32) -> f32 {
    let mut width = 0.0;
    let mut prev = None;
    for &ch in line {
        if ch == 0x200B {
            continue;
        }
        let Some(glyph) = font.glyphs.get(&ch) else { continue };
        if let Some(p) = prev {
            width += font.kerning_for(p, ch);
        }
        width += glyph.advance + letter_spacing;
        prev = Some(ch);
    }
    width
}

/// Runs the complete layout algorithm — wrapping, truncation, alignment —
/// plus glyph emission, without consulting the cache.
fn compute_layout(font: &FontDescriptor, props: &TextLayoutProps) -> TextLayout {
    let font_scale = if font.metrics.units_per_em > 0.0 { props.font_size / font.metrics.units_per_em } else { 1.0 };

    // `wrap_width` arrives in the same pixel space as `font_size`; every
    // width it's compared against (glyph advances, kerning, letter spacing)
    // is in design units, so convert once up front rather than scaling each
    // comparison site.
    let wrap_width_design = if font_scale > 0.0 { props.wrap_width / font_scale } else { props.wrap_width };

    let should_wrap = props.wrap && props.wrap_width > 0.0;
    let effective_max_lines = match (props.max_lines, props.max_height > 0.0) {
        (0, false) => u32::MAX,
        (0, true) => (props.max_height / props.line_height).floor() as u32,
        (n, false) => n,
        (n, true) => n.min((props.max_height / props.line_height).floor() as u32),
    };

    let mut visual_lines: Vec<Vec<u32>> = Vec::new();
    for logical in props.text.split('\n') {
        visual_lines.extend(wrap_logical_line(font, logical, should_wrap, wrap_width_design, props.letter_spacing));
    }

    if visual_lines.len() as u32 > effective_max_lines && effective_max_lines > 0 {
        visual_lines.truncate(effective_max_lines as usize);
        if !props.overflow_suffix.is_empty() {
            if let Some(last) = visual_lines.last_mut() {
                let suffix: Vec<u32> = props.overflow_suffix.chars().map(|c| c as u32).collect();
                let suffix_width = line_pixel_width(font, &suffix, props.letter_spacing);
                let budget = (wrap_width_design - suffix_width).max(0.0);
                while !last.is_empty() && line_pixel_width(font, last, props.letter_spacing) > budget {
                    last.pop();
                }
                last.extend_from_slice(&suffix);
            }
        }
    }

    let line_widths: Vec<f32> = visual_lines.iter().map(|l| line_pixel_width(font, l, props.letter_spacing)).collect();
    let max_width_found = line_widths.iter().cloned().fold(0.0f32, f32::max);

    let available = if should_wrap { wrap_width_design } else { max_width_found };

    let mut glyphs = Vec::new();
    for (line_index, line) in visual_lines.iter().enumerate() {
        let line_width = line_widths[line_index];
        let mut x = match props.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => (available - line_width) / 2.0,
            TextAlign::Right => available - line_width,
        };
        let y = line_index as f32 * props.line_height;

        let mut prev = None;
        for &ch in line {
            if ch == 0x200B {
                prev = Some(ch);
                continue;
            }
            let kerning = prev.map(|p| font.kerning_for(p, ch)).unwrap_or(0.0);
            x += kerning;
            if let Some(glyph) = font.glyphs.get(&ch) {
                glyphs.push(PlacedGlyph {
                    x: x + glyph.offset.0,
                    y: y + glyph.offset.1,
                    width: glyph.atlas_wh.0,
                    height: glyph.atlas_wh.1,
                    uv_xy: (glyph.atlas_xy.0 / font.atlas_size.0, glyph.atlas_xy.1 / font.atlas_size.1),
                    uv_wh: (glyph.atlas_wh.0 / font.atlas_size.0, glyph.atlas_wh.1 / font.atlas_size.1),
                });
                x += glyph.advance + props.letter_spacing;
            }
            prev = Some(ch);
        }
    }

    TextLayout {
        glyphs,
        font_scale,
        distance_range: font.distance_range,
        pixel_width: (max_width_found * font_scale).ceil(),
        pixel_height: (visual_lines.len() as f32 * props.line_height * font_scale).ceil(),
    }
}

/// Caches computed layouts and tracks nodes waiting on a font that hasn't
/// resolved yet. Bounded LRU: an
/// evicted entry simply recomputes on next use, it isn't an error.
pub struct TextLayoutCache {
    entries: LruCache<TextLayoutCacheKey, TextLayout>,
}

impl Default for TextLayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutCache {
    pub fn new() -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(LAYOUT_CACHE_CAPACITY).unwrap()),
        }
    }

    /// Returns the cached or freshly computed layout for `props` against
    /// `font`. Returns `None` if `font` is unavailable — the caller is
    /// expected to have already registered the node as a waiter via
    /// [`FontWaiters::register`].
    pub fn layout(&mut self, font: Option<&FontDescriptor>, props: &TextLayoutProps) -> Option<&TextLayout> {
        let font = font?;
        let key = props.cache_key();
        if !self.entries.contains(&key) {
            let layout = compute_layout(font, props);
            self.entries.put(key.clone(), layout);
        }
        self.entries.get(&key)
    }

    /// Invalidates every cached layout for `family`.
    pub fn invalidate_family(&mut self, family: &str) {
        let stale: Vec<TextLayoutCacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.font_family == family)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            self.entries.pop(&key);
        }
    }
}

/// Tracks which nodes are waiting on which font family, independent of the
/// font registry itself, so the frame driver can mark waiters dirty without
/// borrowing the registry mutably at the same time.
#[derive(Default)]
pub struct FontWaiters {
    waiting: AHashMap<String, Vec<NodeId>>,
}

impl FontWaiters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, family: &str, node: NodeId) {
        self.waiting.entry(family.to_string()).or_default().push(node);
    }

    pub fn resolve(&mut self, family: &str) -> Vec<NodeId> {
        self.waiting.remove(family).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TextureId;

    fn make_font() -> FontDescriptor {
        let json = br#"{
            "pages": ["atlas.png"],
            "info": {"size": 32},
            "common": {"lineHeight": 40, "base": 30, "scaleW": 256, "scaleH": 256},
            "chars": [
                {"id": 65, "x": 0, "y": 0, "width": 10, "height": 20, "xoffset": 0, "yoffset": 0, "xadvance": 12, "page": 0, "chnl": 15},
                {"id": 66, "x": 10, "y": 0, "width": 10, "height": 20, "xoffset": 0, "yoffset": 0, "xadvance": 12, "page": 0, "chnl": 15},
                {"id": 32, "x": 0, "y": 0, "width": 0, "height": 0, "xoffset": 0, "yoffset": 0, "xadvance": 6, "page": 0, "chnl": 15}
            ],
            "kernings": [],
            "distanceField": {"fieldType": "msdf", "distanceRange": 4},
            "lightningMetrics": {"ascender": 30, "descender": -8, "lineGap": 2, "unitsPerEm": 32}
        }"#;
        crate::font::parse_font_json("Test", json, TextureId(1)).unwrap()
    }

    fn base_props(text: &str) -> TextLayoutProps {
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
            align: TextAlign::Left,
        }
    }

    #[test]
    fn unwrapped_single_line_emits_one_glyph_per_codepoint() {
        let font = make_font();
        let mut cache = TextLayoutCache::new();
        let layout = cache.layout(Some(&font), &base_props("AB")).unwrap();
        assert_eq!(layout.glyphs.len(), 2);
        assert_eq!(layout.glyphs[1].x, 12.0);
    }

    #[test]
    fn wrapping_breaks_at_word_boundary() {
        let font = make_font();
        let mut props = base_props("A B");
        props.wrap = true;
        props.wrap_width = 13.0; // fits "A" but not "A B"
        let mut cache = TextLayoutCache::new();
        let layout = cache.layout(Some(&font), &props).unwrap();
        // Two visual lines of one glyph each.
        assert_eq!(layout.glyphs.len(), 2);
        assert_eq!(layout.glyphs[1].y, 40.0);
    }

    #[test]
    fn caching_returns_stable_results_for_identical_props() {
        let font = make_font();
        let mut cache = TextLayoutCache::new();
        let props = base_props("AB");
        let first = cache.layout(Some(&font), &props).unwrap().pixel_width;
        let second = cache.layout(Some(&font), &props).unwrap().pixel_width;
        assert_eq!(first, second);
    }

    #[test]
    fn missing_font_returns_none_for_waiter_registration() {
        let mut cache = TextLayoutCache::new();
        assert!(cache.layout(None, &base_props("AB")).is_none());
    }

    #[test]
    fn invalidate_family_drops_cached_entries() {
        let font = make_font();
        let mut cache = TextLayoutCache::new();
        let props = base_props("AB");
        cache.layout(Some(&font), &props);
        cache.invalidate_family("Test");
        assert!(cache.entries.is_empty());
    }
}
