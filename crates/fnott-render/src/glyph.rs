//! Glyph rasterization and the per-notification shaped-run cache.

use std::sync::Arc;

use fnott_wayland::Subpixel;

use crate::font::LoadedFont;

/// Pixel content of a rasterized glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlyphImage {
    /// 8-bit coverage mask; colored at composite time.
    Mask(Vec<u8>),
    /// Fully rendered premultiplied `ARGB8888` bitmap (color glyphs).
    Color(Vec<u32>),
}

/// One rasterized glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRaster {
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Horizontal offset from the pen position to the bitmap's left edge.
    pub xmin: i32,
    /// Vertical offset from the baseline up to the bitmap's bottom edge.
    pub ymin: i32,
    /// Horizontal pen advance.
    pub advance: i32,
    /// The pixels.
    pub image: GlyphImage,
}

impl GlyphRaster {
    /// Whether the glyph contributes no pixels (e.g. whitespace).
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Vertical metrics of the font a run was rasterized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunMetrics {
    /// Baseline distance from the line top.
    pub ascent: i32,
    /// Distance from the baseline down to the underline top.
    pub underline_offset: i32,
    /// Underline thickness.
    pub underline_thickness: i32,
}

impl From<&LoadedFont> for RunMetrics {
    fn from(font: &LoadedFont) -> Self {
        Self {
            ascent: font.ascent,
            underline_offset: font.underline_offset,
            underline_thickness: font.underline_thickness,
        }
    }
}

/// A rasterized same-variant stretch of text.
#[derive(Debug, Clone)]
pub struct GlyphRun {
    /// Metrics of the font the run was rasterized with.
    pub metrics: RunMetrics,
    /// Scalar offset of each glyph in the source text.
    pub clusters: Vec<usize>,
    /// The glyphs, parallel to `clusters`.
    pub glyphs: Vec<Arc<GlyphRaster>>,
    /// Whether the run is underlined.
    pub underline: bool,
}

/// SDBM hash over a scalar sequence.
pub fn sdbm_hash(text: &[char]) -> u64 {
    let mut hash: u64 = 0;
    for &ch in text {
        hash = (ch as u64)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash);
    }
    hash
}

#[derive(Debug)]
struct CacheEntry {
    hash: u64,
    font_id: u64,
    subpixel: Subpixel,
    ofs: usize,
    clusters: Vec<usize>,
    glyphs: Vec<Arc<GlyphRaster>>,
}

/// Cache of rasterized runs.
///
/// The key includes the subpixel order and the cluster offset of the run
/// within its text block; dropping either would hand out glyph positions
/// computed for a different layout.
#[derive(Debug, Default)]
pub struct RunCache {
    entries: Vec<CacheEntry>,
}

impl RunCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached run.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached runs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(
        &self,
        hash: u64,
        font_id: u64,
        subpixel: Subpixel,
        ofs: usize,
    ) -> Option<(Vec<usize>, Vec<Arc<GlyphRaster>>)> {
        self.entries
            .iter()
            .find(|e| e.hash == hash && e.font_id == font_id && e.subpixel == subpixel && e.ofs == ofs)
            .map(|e| (e.clusters.clone(), e.glyphs.clone()))
    }

    /// Rasterizes `text` with `font`, consulting and filling the cache.
    ///
    /// `ofs` is the scalar offset of the run within the surrounding text
    /// block; the returned clusters are already offset by it.
    pub fn rasterize(
        &mut self,
        font: &Arc<LoadedFont>,
        subpixel: Subpixel,
        text: &[char],
        ofs: usize,
        underline: bool,
    ) -> Option<GlyphRun> {
        if text.is_empty() {
            return None;
        }

        let hash = sdbm_hash(text);

        if let Some((clusters, glyphs)) = self.lookup(hash, font.id, subpixel, ofs) {
            return Some(GlyphRun {
                metrics: RunMetrics::from(font.as_ref()),
                clusters,
                glyphs,
                underline,
            });
        }

        let mut clusters = Vec::with_capacity(text.len());
        let mut glyphs = Vec::with_capacity(text.len());

        for (i, &ch) in text.iter().enumerate() {
            let (metrics, bitmap) = font.font.rasterize(ch, font.px);

            clusters.push(ofs + i);
            glyphs.push(Arc::new(GlyphRaster {
                width: metrics.width as u32,
                height: metrics.height as u32,
                xmin: metrics.xmin,
                ymin: metrics.ymin,
                advance: metrics.advance_width.round() as i32,
                image: GlyphImage::Mask(bitmap),
            }));
        }

        self.entries.insert(
            0,
            CacheEntry {
                hash,
                font_id: font.id,
                subpixel,
                ofs,
                clusters: clusters.clone(),
                glyphs: glyphs.clone(),
            },
        );

        Some(GlyphRun {
            metrics: RunMetrics::from(font.as_ref()),
            clusters,
            glyphs,
            underline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdbm_hash_is_stable_and_content_sensitive() {
        let a: Vec<char> = "hello".chars().collect();
        let b: Vec<char> = "hellp".chars().collect();

        assert_eq!(sdbm_hash(&a), sdbm_hash(&a));
        assert_ne!(sdbm_hash(&a), sdbm_hash(&b));
    }

    #[test]
    fn sdbm_hash_of_empty_text_is_zero() {
        assert_eq!(sdbm_hash(&[]), 0);
    }

    #[test]
    fn empty_raster_detection() {
        let raster = GlyphRaster {
            width: 0,
            height: 0,
            xmin: 0,
            ymin: 0,
            advance: 4,
            image: GlyphImage::Mask(Vec::new()),
        };

        assert!(raster.is_empty());
    }
}
