//! Value types shared across the configuration and the daemon.

use std::fmt;
use std::str::FromStr;

/// Notification urgency level.
///
/// Determines stacking position, colors, fonts and timeouts. Higher urgency
/// notifications stack above lower urgency ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Urgency {
    /// Informational, lowest priority.
    Low = 0,
    /// Regular priority.
    #[default]
    Normal = 1,
    /// Important, highest priority.
    Critical = 2,
}

impl Urgency {
    /// All urgencies, lowest first.
    pub const ALL: [Urgency; 3] = [Urgency::Low, Urgency::Normal, Urgency::Critical];

    /// Index into per-urgency tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl From<u8> for Urgency {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Low,
            2 => Self::Critical,
            _ => Self::Normal,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => "low".fmt(f),
            Self::Normal => "normal".fmt(f),
            Self::Critical => "critical".fmt(f),
        }
    }
}

/// Direction in which concurrently visible notifications grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackingOrder {
    /// The stack grows from the anchor edge upward.
    #[default]
    BottomUp,
    /// The stack grows from the anchor edge downward.
    TopDown,
}

/// Screen corner (or center) the stack is placed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    /// Top-left corner.
    TopLeft,
    /// Top-right corner.
    #[default]
    TopRight,
    /// Bottom-left corner.
    BottomLeft,
    /// Bottom-right corner.
    BottomRight,
    /// Centered on the output.
    Center,
}

impl Anchor {
    /// Whether the stack hangs from the top edge.
    pub fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }
}

/// Compositor layer a notification surface is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layer {
    /// Below regular windows, above the wallpaper.
    Background,
    /// Below regular windows.
    Bottom,
    /// Above regular windows.
    #[default]
    Top,
    /// Above everything, including fullscreen windows.
    Overlay,
}

/// Resampling filter used when rescaling images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingFilter {
    /// No filtering.
    None,
    /// Nearest-neighbor sampling.
    Nearest,
    /// Linear interpolation.
    Bilinear,
    /// Cubic interpolation.
    Cubic,
    /// Lanczos with a window of 3.
    #[default]
    Lanczos3,
}

/// Visual encoding of a progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressStyle {
    /// A thin outlined bar below the text.
    #[default]
    Bar,
    /// A horizontal background fill behind the whole body.
    Background,
}

/// An RGBA color with premultiplied color channels.
///
/// Configuration colors are written as `RRGGBBAA`; the loader premultiplies
/// the color channels with the alpha so the renderer can blend directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    /// Red, premultiplied.
    pub r: u8,
    /// Green, premultiplied.
    pub g: u8,
    /// Blue, premultiplied.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Builds a color from straight (non-premultiplied) channels.
    pub fn from_straight(r: u8, g: u8, b: u8, a: u8) -> Self {
        let premul = |c: u8| ((u16::from(c) * u16::from(a)) / 0xff) as u8;
        Self {
            r: premul(r),
            g: premul(g),
            b: premul(b),
            a,
        }
    }

    /// Whether the color is fully opaque.
    pub fn is_opaque(self) -> bool {
        self.a == 0xff
    }

    /// Packs the color as a premultiplied `ARGB8888` pixel.
    pub fn argb(self) -> u32 {
        (u32::from(self.a) << 24) | (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 || !s.is_ascii() {
            return Err(format!("'{s}': colors must be 8 hexadecimal digits (RRGGBBAA)"));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&s[range], 16).map_err(|_| format!("'{s}': invalid hexadecimal color"))
        };

        let r = channel(0..2)?;
        let g = channel(2..4)?;
        let b = channel(4..6)?;
        let a = channel(6..8)?;
        Ok(Self::from_straight(r, g, b, a))
    }
}

/// A font request: a family pattern plus a point or pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// Font family name, e.g. `sans serif` or `Fira Code`.
    pub family: String,
    /// Size in points; ignored when `px_size` is set.
    pub pt_size: f32,
    /// Size in pixels, when given as `pixelsize=N`.
    pub px_size: Option<u32>,
}

impl FontSpec {
    const DEFAULT_PT_SIZE: f32 = 8.0;

    /// Builds the default font request (`sans serif`, 8 pt).
    pub fn default_font() -> Self {
        Self {
            family: "sans serif".to_owned(),
            pt_size: Self::DEFAULT_PT_SIZE,
            px_size: None,
        }
    }

    /// Parses `family[:size=PT][:pixelsize=PX]`.
    ///
    /// Unknown `key=value` attributes are ignored. An empty family falls
    /// back to the default family.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when a size attribute is not a
    /// number.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let mut parts = pattern.split(':');
        let family = parts.next().unwrap_or_default().trim();

        let mut spec = Self::default_font();
        if !family.is_empty() {
            spec.family = family.to_owned();
        }

        for attr in parts {
            let Some((key, value)) = attr.split_once('=') else {
                continue;
            };

            match key.trim() {
                "size" => {
                    spec.pt_size = value
                        .trim()
                        .parse()
                        .map_err(|_| format!("'{value}': invalid point size"))?;
                }
                "pixelsize" => {
                    spec.px_size = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| format!("'{value}': invalid pixel size"))?,
                    );
                }
                _ => {}
            }
        }

        Ok(spec)
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::default_font()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_orders_low_below_critical() {
        assert!(Urgency::Low < Urgency::Normal);
        assert!(Urgency::Normal < Urgency::Critical);
    }

    #[test]
    fn urgency_from_byte_defaults_unknown_levels_to_normal() {
        assert_eq!(Urgency::from(0), Urgency::Low);
        assert_eq!(Urgency::from(2), Urgency::Critical);
        assert_eq!(Urgency::from(17), Urgency::Normal);
    }

    #[test]
    fn color_parse_premultiplies_channels() {
        let color: Color = "ff000080".parse().unwrap();

        assert_eq!(color.a, 0x80);
        assert_eq!(color.r, 0x80);
        assert_eq!(color.g, 0);
        assert_eq!(color.b, 0);
    }

    #[test]
    fn color_parse_rejects_wrong_length_and_non_hex() {
        assert!("fff".parse::<Color>().is_err());
        assert!("gggggggg".parse::<Color>().is_err());
    }

    #[test]
    fn color_argb_packs_premultiplied_channels() {
        let color: Color = "ffffffff".parse().unwrap();

        assert_eq!(color.argb(), 0xffff_ffff);
    }

    #[test]
    fn font_spec_parses_family_and_sizes() {
        let spec = FontSpec::parse("Fira Code:size=10.5").unwrap();
        assert_eq!(spec.family, "Fira Code");
        assert!((spec.pt_size - 10.5).abs() < f32::EPSILON);
        assert_eq!(spec.px_size, None);

        let spec = FontSpec::parse("monospace:pixelsize=14").unwrap();
        assert_eq!(spec.px_size, Some(14));
    }

    #[test]
    fn font_spec_rejects_bad_sizes_and_ignores_unknown_attributes() {
        assert!(FontSpec::parse("sans:size=huge").is_err());

        let spec = FontSpec::parse("sans:weight=bold").unwrap();
        assert_eq!(spec.family, "sans");
    }

    #[test]
    fn empty_font_pattern_falls_back_to_default_family() {
        let spec = FontSpec::parse("").unwrap();

        assert_eq!(spec.family, "sans serif");
    }
}
