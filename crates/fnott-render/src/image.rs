//! Image preparation: raw pixel buffers, files and URIs in, rescaled
//! premultiplied rasters out.

use std::path::{Path, PathBuf};

use fnott_config::ScalingFilter;
use image::imageops::FilterType;
use image::RgbaImage;
use tracing::{debug, warn};
use url::Url;

use crate::Error;

/// A raw pixel buffer as delivered in `image-data` hints.
///
/// Pixels are packed `ABGR`: on a little-endian wire that is one byte each
/// of red, green, blue and (when `has_alpha`) alpha, rows `stride` bytes
/// apart. Alpha is straight; the pipeline premultiplies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Row stride in bytes.
    pub stride: i32,
    /// Whether the last channel is alpha.
    pub has_alpha: bool,
    /// Bits per sample; only 8 is supported.
    pub bits_per_sample: i32,
    /// Channels per pixel; 3 or 4.
    pub channels: i32,
    /// The pixel bytes.
    pub data: Vec<u8>,
}

/// Where a notification image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Raw pixels from an `image-data` hint.
    Raw(RawImage),
    /// A file on disk.
    Path(PathBuf),
    /// A URI, expected to be a `file://` URI for the local host.
    Uri(String),
}

/// A decoded, rescaled image ready for compositing: premultiplied
/// `ARGB8888`, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Raster {
    /// Raster width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Raster height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The premultiplied pixels, row-major.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Converts a straight-alpha RGBA image, premultiplying each pixel.
    pub fn from_rgba(img: &RgbaImage) -> Self {
        let premul = |c: u8, a: u8| ((u16::from(c) * u16::from(a)) / 0xff) as u32;

        let pixels = img
            .pixels()
            .map(|px| {
                let [r, g, b, a] = px.0;
                (u32::from(a) << 24)
                    | (premul(r, a) << 16)
                    | (premul(g, a) << 8)
                    | premul(b, a)
            })
            .collect();

        Self {
            width: img.width(),
            height: img.height(),
            pixels,
        }
    }
}

/// Resolves a `file://` URI (or bare path string) to a filesystem path.
///
/// Only URIs naming the local host are accepted; anything that does not
/// parse as a URL is treated as a plain path.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => {
            let localhost = matches!(url.host_str(), None | Some("") | Some("localhost"));
            if !localhost {
                warn!(uri, "ignoring file URI for a remote host");
                return None;
            }
            url.to_file_path().ok()
        }
        Ok(_) => None,
        Err(_) => Some(PathBuf::from(uri)),
    }
}

fn decode_raw(raw: &RawImage) -> Result<RgbaImage, Error> {
    if raw.bits_per_sample != 8 || !matches!(raw.channels, 3 | 4) {
        return Err(Error::UnsupportedImageFormat {
            bits_per_sample: raw.bits_per_sample,
            channels: raw.channels,
        });
    }

    let bytes_per_pixel = raw.channels as usize;
    if raw.width <= 0 || raw.height <= 0 || (raw.stride as usize) < raw.width as usize * bytes_per_pixel
    {
        return Err(Error::InvalidImageDimensions {
            width: raw.width,
            height: raw.height,
            stride: raw.stride,
        });
    }

    let width = raw.width as usize;
    let height = raw.height as usize;
    let stride = raw.stride as usize;

    if raw.data.len() < stride * (height - 1) + width * bytes_per_pixel {
        warn!(
            expected = stride * height,
            actual = raw.data.len(),
            "image data truncated"
        );
    }

    let mut img = RgbaImage::new(raw.width as u32, raw.height as u32);
    for y in 0..height {
        for x in 0..width {
            let base = y * stride + x * bytes_per_pixel;
            let sample = |i: usize| raw.data.get(base + i).copied().unwrap_or(0);

            let (r, g, b) = (sample(0), sample(1), sample(2));
            let a = if raw.has_alpha && raw.channels == 4 {
                sample(3)
            } else {
                0xff
            };
            img.put_pixel(x as u32, y as u32, image::Rgba([r, g, b, a]));
        }
    }

    Ok(img)
}

fn decode_file(path: &Path) -> Result<RgbaImage, Error> {
    let img = image::open(path).map_err(|source| Error::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.into_rgba8())
}

/// Decodes `source` into a straight-alpha RGBA image.
///
/// # Errors
///
/// Returns an error for unsupported raw formats, unresolvable URIs and
/// undecodable files.
pub fn decode(source: &ImageSource) -> Result<RgbaImage, Error> {
    match source {
        ImageSource::Raw(raw) => decode_raw(raw),
        ImageSource::Path(path) => decode_file(path),
        ImageSource::Uri(uri) => {
            let path = uri_to_path(uri).ok_or_else(|| Error::ImageDecode {
                path: PathBuf::from(uri),
                source: image::ImageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "not a local file URI",
                )),
            })?;
            decode_file(&path)
        }
    }
}

fn filter_type(filter: ScalingFilter) -> FilterType {
    match filter {
        ScalingFilter::None | ScalingFilter::Nearest => FilterType::Nearest,
        ScalingFilter::Bilinear => FilterType::Triangle,
        ScalingFilter::Cubic => FilterType::CatmullRom,
        ScalingFilter::Lanczos3 => FilterType::Lanczos3,
    }
}

/// Shrinks `img` so neither edge exceeds `max_size`, preserving the aspect
/// ratio. Images already within bounds pass through untouched.
pub fn rescale(img: RgbaImage, max_size: u32, filter: ScalingFilter) -> RgbaImage {
    let (width, height) = img.dimensions();
    if width <= max_size && height <= max_size {
        return img;
    }

    let scale = f64::from(width.max(height)) / f64::from(max_size);
    let new_width = ((f64::from(width) / scale) as u32).max(1);
    let new_height = ((f64::from(height) / scale) as u32).max(1);

    debug!(
        from = %format!("{width}x{height}"),
        to = %format!("{new_width}x{new_height}"),
        "image re-scaled"
    );

    image::imageops::resize(&img, new_width, new_height, filter_type(filter))
}

/// Runs the full pipeline: decode, rescale, premultiply.
///
/// Returns `None` when `max_size` is zero (images disabled).
///
/// # Errors
///
/// Propagates decode errors; the caller decides whether they are fatal to
/// the notification or merely logged.
pub fn prepare(
    source: &ImageSource,
    max_size: u32,
    filter: ScalingFilter,
) -> Result<Option<Raster>, Error> {
    if max_size == 0 {
        return Ok(None);
    }

    let img = decode(source)?;
    let img = rescale(img, max_size, filter);
    Ok(Some(Raster::from_rgba(&img)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_rgba(width: i32, height: i32) -> RawImage {
        let mut data = Vec::new();
        for _ in 0..width * height {
            data.extend_from_slice(&[0xff, 0x00, 0x00, 0x80]);
        }
        RawImage {
            width,
            height,
            stride: width * 4,
            has_alpha: true,
            bits_per_sample: 8,
            channels: 4,
            data,
        }
    }

    #[test]
    fn raw_rgba_is_premultiplied() {
        let raster = prepare(
            &ImageSource::Raw(raw_rgba(2, 2)),
            48,
            ScalingFilter::Nearest,
        )
        .unwrap()
        .expect("raster expected");

        // 50% alpha red premultiplies to 0x80 in the red channel.
        assert_eq!(raster.pixels()[0], 0x8080_0000);
    }

    #[test]
    fn three_channel_images_are_opaque() {
        let raw = RawImage {
            width: 1,
            height: 1,
            stride: 3,
            has_alpha: false,
            bits_per_sample: 8,
            channels: 3,
            data: vec![0x10, 0x20, 0x30],
        };

        let raster = prepare(&ImageSource::Raw(raw), 48, ScalingFilter::Nearest)
            .unwrap()
            .expect("raster expected");

        assert_eq!(raster.pixels()[0], 0xff10_2030);
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        let mut raw = raw_rgba(1, 1);
        raw.bits_per_sample = 16;

        let result = prepare(&ImageSource::Raw(raw), 48, ScalingFilter::Nearest);

        assert!(matches!(
            result,
            Err(Error::UnsupportedImageFormat {
                bits_per_sample: 16,
                channels: 4
            })
        ));
    }

    #[test]
    fn oversized_images_are_rescaled_preserving_aspect() {
        let raster = prepare(
            &ImageSource::Raw(raw_rgba(100, 50)),
            25,
            ScalingFilter::Bilinear,
        )
        .unwrap()
        .expect("raster expected");

        assert_eq!((raster.width(), raster.height()), (25, 12));
    }

    #[test]
    fn small_images_pass_through_unscaled() {
        let raster = prepare(
            &ImageSource::Raw(raw_rgba(10, 10)),
            48,
            ScalingFilter::Lanczos3,
        )
        .unwrap()
        .expect("raster expected");

        assert_eq!((raster.width(), raster.height()), (10, 10));
    }

    #[test]
    fn max_size_zero_disables_images() {
        let result = prepare(&ImageSource::Raw(raw_rgba(4, 4)), 0, ScalingFilter::None).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn file_uri_for_localhost_resolves_to_a_path() {
        assert_eq!(
            uri_to_path("file:///usr/share/icons/x.png"),
            Some(PathBuf::from("/usr/share/icons/x.png"))
        );
        assert_eq!(
            uri_to_path("file://localhost/x.png"),
            Some(PathBuf::from("/x.png"))
        );
    }

    #[test]
    fn remote_file_uri_is_rejected() {
        assert_eq!(uri_to_path("file://elsewhere/x.png"), None);
        assert_eq!(uri_to_path("https://example.com/x.png"), None);
    }

    #[test]
    fn bare_path_passes_through_uri_resolution() {
        assert_eq!(
            uri_to_path("/usr/share/pixmaps/x.png"),
            Some(PathBuf::from("/usr/share/pixmaps/x.png"))
        );
    }
}
