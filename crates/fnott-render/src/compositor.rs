//! Per-frame drawing onto pixel buffers.
//!
//! All colors are premultiplied `ARGB8888`. Fills use SRC semantics (the
//! pixel is replaced), composites use OVER.

use fnott_config::{Color, Progress, ProgressStyle, UrgencyConfig};
use fnott_wayland::Buffer;

use crate::glyph::GlyphImage;
use crate::image::Raster;
use crate::layout::PlacedGlyph;

/// A pixel-aligned box; `x2`/`y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Box32 {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge (exclusive).
    pub x2: i32,
    /// Bottom edge (exclusive).
    pub y2: i32,
}

/// OVER-composites premultiplied `src` onto premultiplied `dst`.
pub fn blend_over(dst: u32, src: u32) -> u32 {
    let src_a = src >> 24;
    if src_a == 0xff {
        return src;
    }
    if src_a == 0 {
        return dst;
    }

    let inverse = 0xff - src_a;
    let channel = |shift: u32| {
        let d = (dst >> shift) & 0xff;
        let s = (src >> shift) & 0xff;
        (s + (d * inverse) / 0xff).min(0xff)
    };

    (channel(24) << 24) | (channel(16) << 16) | (channel(8) << 8) | channel(0)
}

/// Scales a premultiplied pixel by `coverage` (0..=255).
fn scale_pixel(px: u32, coverage: u32) -> u32 {
    let channel = |shift: u32| (((px >> shift) & 0xff) * coverage / 0xff) << shift;
    channel(24) | channel(16) | channel(8) | channel(0)
}

/// Fills a rectangle with SRC semantics, clipped to the buffer.
pub fn fill_rect(buf: &mut Buffer, color: Color, x: i32, y: i32, width: i32, height: i32) {
    let px = color.argb();
    for row in y.max(0)..(y + height).min(buf.height() as i32) {
        for col in x.max(0)..(x + width).min(buf.width() as i32) {
            buf.put_pixel(col, row, px);
        }
    }
}

/// Fills a rectangle with OVER semantics, clipped to the buffer.
pub fn fill_rect_over(buf: &mut Buffer, color: Color, x: i32, y: i32, width: i32, height: i32) {
    let src = color.argb();
    for row in y.max(0)..(y + height).min(buf.height() as i32) {
        for col in x.max(0)..(x + width).min(buf.width() as i32) {
            buf.put_pixel(col, row, blend_over(buf.pixel(col, row), src));
        }
    }
}

/// Fills a set of boxes with SRC semantics.
pub fn fill_boxes(buf: &mut Buffer, color: Color, boxes: &[Box32]) {
    for b in boxes {
        fill_rect(buf, color, b.x1, b.y1, b.x2 - b.x1, b.y2 - b.y1);
    }
}

/// Scanline decomposition of a rounded rectangle.
///
/// For each scanline in the corner bands the horizontal span is inset by
/// `radius - sqrt(radius^2 - ydist^2)`; the middle band is the full
/// rectangle inset vertically by `radius`.
pub fn rounded_region(x: i32, y: i32, width: i32, height: i32, radius: i32) -> Vec<Box32> {
    let mut boxes = Vec::with_capacity(2 * radius as usize + 1);

    for i in 0..=radius {
        let ydist = f64::from(radius - i);
        let curve = (f64::from(radius) * f64::from(radius) - ydist * ydist).sqrt() as i32;

        boxes.push(Box32 {
            x1: x + radius - curve,
            y1: y + i,
            x2: x + width - radius + curve,
            y2: y + i + 1,
        });
        boxes.push(Box32 {
            x1: x + radius - curve,
            y1: y + height - i,
            x2: x + width - radius + curve,
            y2: y + height - i + 1,
        });
    }

    boxes.push(Box32 {
        x1: x,
        y1: y + radius,
        x2: x + width,
        y2: y + height + 1 - radius,
    });

    boxes
}

/// Intersects every box with a rectangle, dropping empty results.
pub fn clip_boxes(boxes: &[Box32], x1: i32, y1: i32, x2: i32, y2: i32) -> Vec<Box32> {
    boxes
        .iter()
        .filter_map(|b| {
            let clipped = Box32 {
                x1: b.x1.max(x1),
                y1: b.y1.max(y1),
                x2: b.x2.min(x2),
                y2: b.y2.min(y2),
            };
            (clipped.x1 < clipped.x2 && clipped.y1 < clipped.y2).then_some(clipped)
        })
        .collect()
}

/// Downscales `src` (2x supersampled) into `dst` by averaging each 2x2
/// block, the box equivalent of a bilinear filter at exactly half size.
fn downscale_into(dst: &mut Buffer, src: &Buffer) {
    for y in 0..dst.height() as i32 {
        for x in 0..dst.width() as i32 {
            let samples = [
                src.pixel(2 * x, 2 * y),
                src.pixel(2 * x + 1, 2 * y),
                src.pixel(2 * x, 2 * y + 1),
                src.pixel(2 * x + 1, 2 * y + 1),
            ];

            let avg = |shift: u32| {
                let sum: u32 = samples.iter().map(|px| (px >> shift) & 0xff).sum();
                (sum / 4) << shift
            };

            dst.put_pixel(x, y, avg(24) | avg(16) | avg(8) | avg(0));
        }
    }
}

/// Draws the border, background and (background-style) progress fill.
///
/// With a zero radius this is four border strips and an interior fill;
/// otherwise the frame is rendered 2x supersampled and downscale-composed
/// for smooth corners.
pub fn draw_background(buf: &mut Buffer, urgency: &UrgencyConfig, progress: i8) {
    let width = buf.width() as i32;
    let height = buf.height() as i32;

    let border_size = urgency.border.size;
    let radius = urgency
        .border
        .radius
        .min(width / 2)
        .min(height / 2);

    if radius == 0 {
        // Border strips: top, right, bottom, left.
        fill_rect(buf, urgency.border.color, 0, 0, width, border_size);
        fill_rect(buf, urgency.border.color, width - border_size, 0, border_size, height);
        fill_rect(buf, urgency.border.color, 0, height - border_size, width, border_size);
        fill_rect(buf, urgency.border.color, 0, 0, border_size, height);

        fill_rect(
            buf,
            urgency.background,
            border_size,
            border_size,
            width - 2 * border_size,
            height - 2 * border_size,
        );

        if progress > 0 && urgency.progress.style == ProgressStyle::Background {
            fill_rect(
                buf,
                urgency.progress.color,
                border_size,
                border_size,
                (width - 2 * border_size) * i32::from(progress) / 100,
                height - 2 * border_size,
            );
        }
        return;
    }

    let ss = 2;
    let ss_width = width * ss;
    let ss_height = height * ss;
    let ss_border = border_size * ss;
    let ss_radius = radius * ss;

    let mut ss_buf = Buffer::new(ss_width as u32, ss_height as u32);

    let border_region = rounded_region(0, 0, ss_width, ss_height, ss_radius);
    fill_boxes(&mut ss_buf, urgency.border.color, &border_region);

    let bg_radius = (ss_radius - ss_border).max(0);
    let bg_region = rounded_region(
        ss_border,
        ss_border,
        ss_width - 2 * ss_border,
        ss_height - 2 * ss_border,
        bg_radius,
    );
    fill_boxes(&mut ss_buf, urgency.background, &bg_region);

    if progress > 0 && urgency.progress.style == ProgressStyle::Background {
        let progress_width = (ss_width - 2 * ss_border) * i32::from(progress) / 100;
        let clipped = clip_boxes(
            &bg_region,
            ss_border,
            ss_border,
            ss_border + progress_width,
            ss_height - ss_border,
        );
        fill_boxes(&mut ss_buf, urgency.progress.color, &clipped);
    }

    downscale_into(buf, &ss_buf);
}

/// OVER-composites a prepared image at `(x, y)`.
pub fn draw_image(buf: &mut Buffer, raster: &Raster, x: i32, y: i32) {
    for row in 0..raster.height() as i32 {
        for col in 0..raster.width() as i32 {
            let src = raster.pixels()[(row * raster.width() as i32 + col) as usize];
            let dst = buf.pixel(x + col, y + row);
            buf.put_pixel(x + col, y + row, blend_over(dst, src));
        }
    }
}

/// Composites placed glyphs, coloring alpha masks and drawing underlines.
pub fn draw_glyphs(buf: &mut Buffer, glyphs: &[PlacedGlyph]) {
    for placed in glyphs {
        let raster = &placed.raster;
        let left = placed.x + raster.xmin;
        let top = placed.baseline - raster.height as i32 - raster.ymin;

        match &raster.image {
            GlyphImage::Mask(coverage) => {
                let color = placed.color.argb();
                for row in 0..raster.height as i32 {
                    for col in 0..raster.width as i32 {
                        let cov = u32::from(coverage[(row * raster.width as i32 + col) as usize]);
                        if cov == 0 {
                            continue;
                        }

                        let src = scale_pixel(color, cov);
                        let dst = buf.pixel(left + col, top + row);
                        buf.put_pixel(left + col, top + row, blend_over(dst, src));
                    }
                }
            }
            GlyphImage::Color(pixels) => {
                for row in 0..raster.height as i32 {
                    for col in 0..raster.width as i32 {
                        let src = pixels[(row * raster.width as i32 + col) as usize];
                        let dst = buf.pixel(left + col, top + row);
                        buf.put_pixel(left + col, top + row, blend_over(dst, src));
                    }
                }
            }
        }

        if let Some(underline) = placed.underline {
            fill_rect_over(
                buf,
                placed.color,
                placed.x,
                underline.y,
                raster.advance,
                underline.thickness,
            );
        }
    }
}

/// Draws the bar-style progress indicator: a thin outline with a
/// proportional fill.
pub fn draw_progress_bar(
    buf: &mut Buffer,
    progress_conf: &Progress,
    progress: i8,
    bar_y: i32,
    pad_horizontal: i32,
    scale: f32,
) {
    let full_width = buf.width() as i32 - pad_horizontal * 2;
    let fill_width = full_width * i32::from(progress) / 100;
    let bar_height = progress_conf.height;

    let scale = scale.round() as i32;
    let border = if bar_height > 2 * scale && fill_width > 2 * scale {
        scale
    } else {
        0
    };

    let color = progress_conf.color;
    let x = pad_horizontal;

    // Outline: left, top, bottom, right.
    fill_rect_over(buf, color, x, bar_y, border, bar_height);
    fill_rect_over(buf, color, x + border, bar_y, full_width - border * 2, border);
    fill_rect_over(
        buf,
        color,
        x + border,
        bar_y + bar_height - border,
        full_width - border * 2,
        border,
    );
    fill_rect_over(buf, color, x + full_width - border, bar_y, border, bar_height);

    // The bar itself.
    fill_rect_over(
        buf,
        color,
        x + border,
        bar_y + border,
        fill_width - border * 2,
        bar_height - border * 2,
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fnott_config::{Config, Urgency};

    use super::*;
    use crate::glyph::GlyphRaster;

    fn urgency_conf() -> UrgencyConfig {
        Config::default().urgency(Urgency::Normal).clone()
    }

    #[test]
    fn blend_over_is_identity_for_opaque_and_transparent_sources() {
        assert_eq!(blend_over(0x1122_3344, 0xffaa_bbcc), 0xffaa_bbcc);
        assert_eq!(blend_over(0x1122_3344, 0), 0x1122_3344);
    }

    #[test]
    fn blend_over_mixes_half_transparent_source() {
        // 50% white over opaque black: roughly half intensity everywhere.
        let out = blend_over(0xff00_0000, 0x8080_8080);

        assert_eq!(out >> 24, 0xff);
        let r = (out >> 16) & 0xff;
        assert!((0x7f..=0x81).contains(&r));
    }

    #[test]
    fn square_background_has_border_and_interior() {
        let conf = urgency_conf();
        let mut buf = Buffer::new(20, 10);

        draw_background(&mut buf, &conf, -1);

        assert_eq!(buf.pixel(0, 0), conf.border.color.argb());
        assert_eq!(buf.pixel(10, 5), conf.background.argb());
    }

    #[test]
    fn background_progress_fills_proportional_width() {
        let mut conf = urgency_conf();
        conf.progress.style = ProgressStyle::Background;
        conf.progress.color = Color::from_straight(1, 2, 3, 0xff);
        let mut buf = Buffer::new(102, 10);

        draw_background(&mut buf, &conf, 50);

        // Interior is 100px wide; 50% progress covers the first 50.
        assert_eq!(buf.pixel(25, 5), conf.progress.color.argb());
        assert_eq!(buf.pixel(75, 5), conf.background.argb());
    }

    #[test]
    fn rounded_background_leaves_corners_untouched() {
        let mut conf = urgency_conf();
        conf.border.radius = 8;
        let mut buf = Buffer::new(40, 20);

        draw_background(&mut buf, &conf, -1);

        assert_eq!(buf.pixel(0, 0), 0);
        assert_eq!(buf.pixel(20, 10), conf.background.argb());
    }

    #[test]
    fn rounded_region_narrows_toward_the_corner_rows() {
        let region = rounded_region(0, 0, 100, 50, 10);

        let top_row = region.iter().find(|b| b.y1 == 0).expect("row 0 missing");
        let radius_row = region
            .iter()
            .find(|b| b.y1 == 10 && b.y2 == 11)
            .expect("row 10 missing");

        assert!(top_row.x2 - top_row.x1 < radius_row.x2 - radius_row.x1);
        assert_eq!(radius_row.x1, 0);
        assert_eq!(radius_row.x2, 100);
    }

    #[test]
    fn clip_boxes_drops_empty_intersections() {
        let boxes = [Box32 {
            x1: 0,
            y1: 0,
            x2: 10,
            y2: 10,
        }];

        let clipped = clip_boxes(&boxes, 5, 5, 8, 8);
        assert_eq!(clipped, vec![Box32 { x1: 5, y1: 5, x2: 8, y2: 8 }]);

        let empty = clip_boxes(&boxes, 20, 20, 30, 30);
        assert!(empty.is_empty());
    }

    #[test]
    fn glyph_mask_is_colored_and_composited() {
        let mut buf = Buffer::new(10, 10);
        let color = Color::from_straight(0xff, 0, 0, 0xff);
        let glyph = PlacedGlyph {
            raster: Arc::new(GlyphRaster {
                width: 2,
                height: 2,
                xmin: 0,
                ymin: 0,
                advance: 2,
                image: GlyphImage::Mask(vec![0xff, 0x00, 0x00, 0xff]),
            }),
            color,
            x: 4,
            baseline: 6,
            underline: None,
        };

        draw_glyphs(&mut buf, &[glyph]);

        // Bitmap top is baseline - height - ymin = 4.
        assert_eq!(buf.pixel(4, 4), color.argb());
        assert_eq!(buf.pixel(5, 4), 0);
        assert_eq!(buf.pixel(5, 5), color.argb());
    }

    #[test]
    fn underline_spans_the_glyph_advance() {
        let mut buf = Buffer::new(10, 10);
        let color = Color::from_straight(0, 0xff, 0, 0xff);
        let glyph = PlacedGlyph {
            raster: Arc::new(GlyphRaster {
                width: 0,
                height: 0,
                xmin: 0,
                ymin: 0,
                advance: 6,
                image: GlyphImage::Mask(Vec::new()),
            }),
            color,
            x: 2,
            baseline: 5,
            underline: Some(crate::layout::Underline { y: 7, thickness: 2 }),
        };

        draw_glyphs(&mut buf, &[glyph]);

        assert_eq!(buf.pixel(2, 7), color.argb());
        assert_eq!(buf.pixel(7, 8), color.argb());
        assert_eq!(buf.pixel(8, 7), 0);
        assert_eq!(buf.pixel(2, 6), 0);
    }

    #[test]
    fn empty_progress_bar_draws_outline_only() {
        let conf = urgency_conf();
        let mut buf = Buffer::new(100, 60);

        draw_progress_bar(&mut buf, &conf.progress, 0, 10, 10, 1.0);

        // Fill width 0 disables the outline border, so only the top strip
        // at zero border width is drawn, which is nothing.
        assert_eq!(buf.pixel(50, 20), 0);
    }

    #[test]
    fn full_progress_bar_fills_the_interior() {
        let conf = urgency_conf();
        let mut buf = Buffer::new(100, 60);

        draw_progress_bar(&mut buf, &conf.progress, 100, 10, 10, 1.0);

        assert_eq!(buf.pixel(50, 20), conf.progress.color.argb());
    }

    #[test]
    fn image_composites_over_background() {
        let mut buf = Buffer::new(8, 8);
        fill_rect(&mut buf, Color::from_straight(0, 0, 0xff, 0xff), 0, 0, 8, 8);

        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0xff, 0, 0, 0xff]));
        let raster = Raster::from_rgba(&img);

        draw_image(&mut buf, &raster, 3, 3);

        assert_eq!(buf.pixel(3, 3), 0xffff_0000);
        assert_eq!(buf.pixel(0, 0), 0xff00_00ff);
    }
}
