//! Word-wrapping text layout.
//!
//! Text is first split into same-variant runs (markup-aware) and
//! rasterized through the run cache; the placement pass then walks the
//! glyphs, wrapping at word boundaries so a word is only broken when it
//! cannot fit on a line of its own.

use std::sync::Arc;

use fnott_config::Color;
use fnott_wayland::Subpixel;

use crate::font::FontSet;
use crate::glyph::{GlyphRaster, GlyphRun, RunCache};
use crate::markup;

/// Inputs to the placement pass.
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    /// Pen start / wrap column, in pixels.
    pub left_pad: i32,
    /// Reserved space on the right, in pixels.
    pub right_pad: i32,
    /// Top of the first line.
    pub y: i32,
    /// Lines that would end below this are clipped; `None` disables
    /// clipping.
    pub max_y: Option<i32>,
    /// Floor for the reported width; `0` disables the floor.
    pub min_width: i32,
    /// Wrap column; `0` disables wrapping.
    pub max_width: i32,
    /// Line advance, from the text class's regular font.
    pub line_height: i32,
    /// Color applied to every placed glyph.
    pub color: Color,
}

/// Underline segment attached to a placed glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Underline {
    /// Top of the underline.
    pub y: i32,
    /// Underline thickness.
    pub thickness: i32,
}

/// One glyph with its final position.
#[derive(Debug, Clone)]
pub struct PlacedGlyph {
    /// The rasterized glyph.
    pub raster: Arc<GlyphRaster>,
    /// Glyph color.
    pub color: Color,
    /// Pen x position (bitmap placement adds the glyph bearing).
    pub x: i32,
    /// Baseline y position.
    pub baseline: i32,
    /// Underline segment, when the run is underlined.
    pub underline: Option<Underline>,
}

/// Extent of a laid-out text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Widest line including padding.
    pub width: i32,
    /// Total height in whole lines.
    pub height: i32,
}

/// For the first glyph of every whitespace-delimited word, the pixel
/// advance of the rest of that word. All other entries are zero, so a word
/// that has already been wrapped to a fresh line is never wrapped again as
/// a unit.
fn word_distances(text: &[char], clusters: &[usize], advances: &[i32]) -> Vec<i32> {
    let total = clusters.len();
    let mut distance = vec![0; total];

    let mut i = 0;
    while i < total {
        if text[clusters[i]].is_whitespace() {
            i += 1;
            continue;
        }

        let mut word_advance = 0;
        let mut j = i;
        while j < total && !text[clusters[j]].is_whitespace() {
            word_advance += advances[j];
            j += 1;
        }

        distance[i] = word_advance - advances[i];
        i = j;
    }

    distance
}

/// Places `runs` (rasterized from `text`) into lines.
///
/// Appends the placed glyphs to `out` and returns the block extent.
pub fn place(text: &[char], runs: &[GlyphRun], opts: &LayoutOptions, out: &mut Vec<PlacedGlyph>) -> Extent {
    let (clusters, advances): (Vec<usize>, Vec<i32>) = runs
        .iter()
        .flat_map(|run| {
            run.clusters
                .iter()
                .copied()
                .zip(run.glyphs.iter().map(|g| g.advance))
        })
        .unzip();

    let distance = word_distances(text, &clusters, &advances);

    let mut x = opts.left_pad;
    let mut y = opts.y;
    let mut width = opts.min_width.max(0);
    let mut height = 0;
    let mut idx = 0;

    'runs: for run in runs {
        for (cluster, raster) in run.clusters.iter().zip(&run.glyphs) {
            let ch = text[*cluster];
            let dist = distance[idx];
            idx += 1;

            let overflows = opts.max_width > 0
                && x > opts.left_pad
                && x + raster.advance + dist + opts.right_pad > opts.max_width;

            if overflows || ch == '\n' {
                width = width.max(x + opts.right_pad);
                height += opts.line_height;
                x = opts.left_pad;
                y += opts.line_height;

                if ch.is_whitespace() {
                    // Trailing whitespace at a wrap boundary is dropped.
                    continue;
                }
            }

            if let Some(max_y) = opts.max_y {
                if y + opts.line_height > max_y {
                    break 'runs;
                }
            }

            out.push(PlacedGlyph {
                raster: Arc::clone(raster),
                color: opts.color,
                x,
                baseline: y + run.metrics.ascent,
                underline: run.underline.then(|| Underline {
                    y: y + run.metrics.ascent + run.metrics.underline_offset,
                    thickness: run.metrics.underline_thickness,
                }),
            });

            x += raster.advance;
        }
    }

    Extent {
        width: width.max(x + opts.right_pad),
        height: height + opts.line_height,
    }
}

/// Lays out one markup-bearing text block: scans the markup, rasterizes
/// each span with the matching font variant, then places the glyphs.
pub fn layout_text(
    text: &[char],
    fonts: &FontSet,
    subpixel: Subpixel,
    cache: &mut RunCache,
    opts: &LayoutOptions,
    out: &mut Vec<PlacedGlyph>,
) -> Extent {
    let spans = markup::scan(text);

    let runs: Vec<GlyphRun> = spans
        .iter()
        .filter_map(|span| {
            let font = fonts.select(span.bold, span.italic);
            cache.rasterize(
                font,
                subpixel,
                &text[span.start..span.start + span.len],
                span.start,
                span.underline,
            )
        })
        .collect();

    place(text, &runs, opts, out)
}

#[cfg(test)]
mod tests {
    use fnott_config::Color;

    use super::*;
    use crate::glyph::{GlyphImage, RunMetrics};

    const ADVANCE: i32 = 10;
    const LINE: i32 = 16;

    fn metrics() -> RunMetrics {
        RunMetrics {
            ascent: 12,
            underline_offset: 2,
            underline_thickness: 1,
        }
    }

    fn raster() -> Arc<GlyphRaster> {
        Arc::new(GlyphRaster {
            width: 8,
            height: 10,
            xmin: 1,
            ymin: 0,
            advance: ADVANCE,
            image: GlyphImage::Mask(vec![0xff; 80]),
        })
    }

    /// One run covering all of `text`, every glyph 10px wide.
    fn run_for(text: &[char], underline: bool) -> GlyphRun {
        GlyphRun {
            metrics: metrics(),
            clusters: (0..text.len()).collect(),
            glyphs: (0..text.len()).map(|_| raster()).collect(),
            underline,
        }
    }

    fn options(max_width: i32) -> LayoutOptions {
        LayoutOptions {
            left_pad: 0,
            right_pad: 0,
            y: 0,
            max_y: None,
            min_width: 0,
            max_width,
            line_height: LINE,
            color: Color::from_straight(0xff, 0xff, 0xff, 0xff),
        }
    }

    #[test]
    fn single_line_extent_counts_all_advances() {
        let text: Vec<char> = "abc".chars().collect();
        let runs = [run_for(&text, false)];
        let mut out = Vec::new();

        let extent = place(&text, &runs, &options(0), &mut out);

        assert_eq!(extent.width, 3 * ADVANCE);
        assert_eq!(extent.height, LINE);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn wraps_at_word_boundary() {
        // "Hello world foo" at 10px per glyph: "Hello world" is 110px wide
        // and fits in 115px; the following space overflows, so "foo" moves
        // to line two.
        let text: Vec<char> = "Hello world foo".chars().collect();
        let runs = [run_for(&text, false)];
        let mut out = Vec::new();

        let extent = place(&text, &runs, &options(115), &mut out);

        assert_eq!(extent.height, 2 * LINE);
        // "Hello world" on line one, "foo" on line two.
        let line2: Vec<&PlacedGlyph> = out.iter().filter(|g| g.baseline > 12).collect();
        assert_eq!(line2.len(), 3);
        assert_eq!(line2[0].x, 0);
    }

    #[test]
    fn trailing_whitespace_is_dropped_at_wrap() {
        let text: Vec<char> = "Hello world foo".chars().collect();
        let runs = [run_for(&text, false)];
        let mut out = Vec::new();

        place(&text, &runs, &options(115), &mut out);

        // 15 glyphs minus the space consumed by the wrap.
        assert_eq!(out.len(), 14);
    }

    #[test]
    fn newline_forces_a_wrap() {
        let text: Vec<char> = "ab\ncd".chars().collect();
        let runs = [run_for(&text, false)];
        let mut out = Vec::new();

        let extent = place(&text, &runs, &options(0), &mut out);

        assert_eq!(extent.height, 2 * LINE);
        assert_eq!(out.len(), 4);
        assert_eq!(out[2].x, 0);
        assert_eq!(out[2].baseline, LINE + 12);
    }

    #[test]
    fn long_word_starts_on_its_own_line() {
        // "hi aaaaaaaaaaaa": the second word is 120px wide and cannot fit
        // after "hi " on an 80px line, so it wraps once and then fills
        // whole lines rather than wrapping per character.
        let text: Vec<char> = "hi aaaaaaaaaaaa".chars().collect();
        let runs = [run_for(&text, false)];
        let mut out = Vec::new();

        let extent = place(&text, &runs, &options(80), &mut out);

        // Line one: "hi"; lines two/three: eight + four 'a's.
        assert_eq!(extent.height, 3 * LINE);
    }

    #[test]
    fn max_y_clips_excess_lines() {
        let text: Vec<char> = "ab\ncd\nef".chars().collect();
        let runs = [run_for(&text, false)];
        let mut out = Vec::new();
        let mut opts = options(0);
        opts.max_y = Some(2 * LINE);

        place(&text, &runs, &opts, &mut out);

        // Third line would end below max_y; its glyphs are clipped.
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn min_width_is_a_floor_on_the_extent() {
        let text: Vec<char> = "a".chars().collect();
        let runs = [run_for(&text, false)];
        let mut out = Vec::new();
        let mut opts = options(0);
        opts.min_width = 200;

        let extent = place(&text, &runs, &opts, &mut out);

        assert_eq!(extent.width, 200);
    }

    #[test]
    fn underlined_runs_attach_underline_segments() {
        let text: Vec<char> = "ab".chars().collect();
        let runs = [run_for(&text, true)];
        let mut out = Vec::new();

        place(&text, &runs, &options(0), &mut out);

        let underline = out[0].underline.expect("underline missing");
        assert_eq!(underline.y, 12 + 2);
        assert_eq!(underline.thickness, 1);
    }

    #[test]
    fn padding_is_reflected_in_pen_and_extent() {
        let text: Vec<char> = "ab".chars().collect();
        let runs = [run_for(&text, false)];
        let mut out = Vec::new();
        let mut opts = options(0);
        opts.left_pad = 20;
        opts.right_pad = 20;

        let extent = place(&text, &runs, &opts, &mut out);

        assert_eq!(out[0].x, 20);
        assert_eq!(extent.width, 20 + 2 * ADVANCE + 20);
    }
}
