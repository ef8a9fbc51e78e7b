//! Font discovery and sizing.
//!
//! Families are resolved through the system font database; each text class
//! keeps four variants (regular, bold, italic, bold-italic) at the size the
//! configuration requests, corrected for monitor DPI when `dpi-aware` is
//! set and for the output scale factor otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use fnott_config::FontSpec;
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use tracing::{debug, warn};

use crate::Error;

/// A rasterizable font face at a fixed pixel size.
pub struct LoadedFont {
    /// Unique handle, used in run-cache keys.
    pub id: u64,
    /// The parsed face.
    pub font: fontdue::Font,
    /// Pixel size all metrics below are computed at.
    pub px: f32,
    /// Baseline distance from the line top.
    pub ascent: i32,
    /// Line advance.
    pub height: i32,
    /// Distance from the baseline down to the underline top.
    pub underline_offset: i32,
    /// Underline thickness.
    pub underline_thickness: i32,
}

impl std::fmt::Debug for LoadedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFont")
            .field("id", &self.id)
            .field("px", &self.px)
            .field("ascent", &self.ascent)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl LoadedFont {
    fn new(id: u64, font: fontdue::Font, px: f32) -> Self {
        let (ascent, height) = match font.horizontal_line_metrics(px) {
            Some(metrics) => (
                metrics.ascent.round() as i32,
                metrics.new_line_size.round() as i32,
            ),
            None => (px.round() as i32, px.round() as i32),
        };

        let descent = height - ascent;
        Self {
            id,
            font,
            px,
            ascent,
            height: height.max(1),
            underline_offset: (descent / 2).max(1),
            underline_thickness: ((px / 14.0).round() as i32).max(1),
        }
    }
}

/// The four style variants of one text class.
#[derive(Debug, Clone)]
pub struct FontSet {
    /// Upright regular weight.
    pub regular: Arc<LoadedFont>,
    /// Bold.
    pub bold: Arc<LoadedFont>,
    /// Italic.
    pub italic: Arc<LoadedFont>,
    /// Bold italic.
    pub bold_italic: Arc<LoadedFont>,
}

impl FontSet {
    /// The minimal variant matching the active markup attributes.
    pub fn select(&self, bold: bool, italic: bool) -> &Arc<LoadedFont> {
        match (bold, italic) {
            (true, true) => &self.bold_italic,
            (true, false) => &self.bold,
            (false, true) => &self.italic,
            (false, false) => &self.regular,
        }
    }

    /// Line advance of the set, taken from the regular variant.
    pub fn line_height(&self) -> i32 {
        self.regular.height
    }
}

/// System font database plus a cache of loaded faces.
pub struct FontSystem {
    db: Database,
    cache: HashMap<(fontdb::ID, u32), Arc<LoadedFont>>,
    next_font_id: u64,
}

impl std::fmt::Debug for FontSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSystem")
            .field("faces", &self.db.len())
            .field("loaded", &self.cache.len())
            .finish()
    }
}

impl FontSystem {
    /// Creates a font system backed by the system's installed fonts.
    pub fn new() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        debug!(faces = db.len(), "font database loaded");

        Self {
            db,
            cache: HashMap::new(),
            next_font_id: 1,
        }
    }

    /// Loads all four variants of `spec`.
    ///
    /// The pixel size is `pixelsize * scale` when the request names a pixel
    /// size, and `size_pt * scale * dpi / 72` otherwise; in DPI-aware mode
    /// the scale factor is ignored and the real monitor DPI is used,
    /// otherwise the DPI is pinned at 96 and the scale factor applies.
    ///
    /// Missing styled variants fall back to the regular face.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FontNotFound`] when not even a generic family
    /// matches, or [`Error::FontLoad`] when the face fails to parse.
    pub fn load_set(
        &mut self,
        spec: &FontSpec,
        dpi_aware: bool,
        scale: f32,
        dpi: f32,
    ) -> Result<FontSet, Error> {
        let scale = if dpi_aware { 1.0 } else { scale };
        let dpi = if dpi_aware { dpi } else { 96.0 };

        let px = match spec.px_size {
            Some(px_size) => (px_size as f32 * scale).round(),
            None => spec.pt_size * scale * dpi / 72.0,
        };

        let regular = self.load_variant(spec, Weight::NORMAL, Style::Normal, px)?;
        let bold = self.variant_or(spec, Weight::BOLD, Style::Normal, px, &regular);
        let italic = self.variant_or(spec, Weight::NORMAL, Style::Italic, px, &regular);
        let bold_italic = self.variant_or(spec, Weight::BOLD, Style::Italic, px, &regular);

        Ok(FontSet {
            regular,
            bold,
            italic,
            bold_italic,
        })
    }

    fn variant_or(
        &mut self,
        spec: &FontSpec,
        weight: Weight,
        style: Style,
        px: f32,
        fallback: &Arc<LoadedFont>,
    ) -> Arc<LoadedFont> {
        match self.load_variant(spec, weight, style, px) {
            Ok(font) => font,
            Err(error) => {
                warn!(family = %spec.family, ?weight, ?style, %error, "variant unavailable");
                Arc::clone(fallback)
            }
        }
    }

    fn load_variant(
        &mut self,
        spec: &FontSpec,
        weight: Weight,
        style: Style,
        px: f32,
    ) -> Result<Arc<LoadedFont>, Error> {
        let family = match spec.family.to_ascii_lowercase().as_str() {
            "sans serif" | "sans-serif" | "sans" => Family::SansSerif,
            "serif" => Family::Serif,
            "monospace" | "mono" => Family::Monospace,
            _ => Family::Name(&spec.family),
        };

        let query = Query {
            families: &[family, Family::SansSerif],
            weight,
            stretch: Stretch::Normal,
            style,
        };

        let face_id = self.db.query(&query).ok_or_else(|| Error::FontNotFound {
            family: spec.family.clone(),
        })?;

        let key = (face_id, px.to_bits());
        if let Some(font) = self.cache.get(&key) {
            return Ok(Arc::clone(font));
        }

        let font_id = self.next_font_id;
        let loaded = self
            .db
            .with_face_data(face_id, |data, index| {
                let settings = fontdue::FontSettings {
                    collection_index: index,
                    scale: px,
                    ..fontdue::FontSettings::default()
                };
                fontdue::Font::from_bytes(data, settings)
            })
            .ok_or_else(|| Error::FontNotFound {
                family: spec.family.clone(),
            })?
            .map_err(|reason| Error::FontLoad {
                family: spec.family.clone(),
                reason: reason.to_owned(),
            })?;

        let font = Arc::new(LoadedFont::new(font_id, loaded, px));
        self.next_font_id += 1;
        self.cache.insert(key, Arc::clone(&font));
        Ok(font)
    }
}

impl Default for FontSystem {
    fn default() -> Self {
        Self::new()
    }
}
