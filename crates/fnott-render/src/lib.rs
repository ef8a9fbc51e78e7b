//! Rendering pipeline: format expansion, text shaping and layout, image
//! preparation, and per-frame compositing onto pixel buffers.
//!
//! The pipeline is pure with respect to the display server: everything draws
//! into [`fnott_wayland::Buffer`]s, which the daemon then commits through its
//! surface backend.

pub mod compositor;
pub mod font;
pub mod format;
pub mod glyph;
pub mod image;
pub mod layout;
pub mod markup;

use std::path::PathBuf;

pub use crate::font::{FontSet, FontSystem, LoadedFont};
pub use crate::glyph::{GlyphImage, GlyphRaster, GlyphRun, RunCache};
pub use crate::image::{ImageSource, Raster, RawImage};
pub use crate::layout::{LayoutOptions, PlacedGlyph, Underline};

/// Rendering errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No installed font matches the requested family.
    #[error("{family}: no matching font installed")]
    FontNotFound {
        /// The requested family.
        family: String,
    },

    /// A font file could not be parsed.
    #[error("{family}: cannot load font face: {reason}")]
    FontLoad {
        /// The requested family.
        family: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Raw image data uses a pixel format the pipeline does not understand.
    #[error("unsupported image format: bpp={bits_per_sample}, channels={channels}")]
    UnsupportedImageFormat {
        /// Bits per sample as reported by the sender.
        bits_per_sample: i32,
        /// Channel count as reported by the sender.
        channels: i32,
    },

    /// Raw image dimensions are nonsensical.
    #[error("invalid image dimensions: {width}x{height}, stride {stride}")]
    InvalidImageDimensions {
        /// Reported width.
        width: i32,
        /// Reported height.
        height: i32,
        /// Reported row stride.
        stride: i32,
    },

    /// An image file could not be decoded.
    #[error("{}: cannot decode image: {source}", path.display())]
    ImageDecode {
        /// Offending file.
        path: PathBuf,
        /// Decoder diagnostic.
        #[source]
        source: ::image::ImageError,
    },
}
