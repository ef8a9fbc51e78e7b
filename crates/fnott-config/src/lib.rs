//! Configuration model and loader for the fnott daemon.
//!
//! The configuration is an INI-style file with four sections: `main` plus
//! one section per urgency (`low`, `normal`, `critical`). Urgency keys set
//! in `main` broadcast to all three urgency sections; keys set in an urgency
//! section override the broadcast value. Unknown keys are fatal.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

pub mod spawn;
mod types;

pub use spawn::SpawnTemplate;
pub use types::{
    Anchor, Color, FontSpec, Layer, ProgressStyle, ScalingFilter, StackingOrder, Urgency,
};

/// Configuration loading errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configuration file could not be read.
    #[error("{}: cannot read configuration: {source}", path.display())]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed at all.
    #[error("{}:{line}: syntax error: {reason}", path.display())]
    Syntax {
        /// Offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// A section header names an unknown section.
    #[error("{}:{line}: invalid section name: {name}", path.display())]
    InvalidSection {
        /// Offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// The section name as written.
        name: String,
    },

    /// A key is not recognized in its section.
    #[error("{}:{line}: [{section}]: unknown key: {key}", path.display())]
    UnknownKey {
        /// Offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Section being parsed.
        section: Section,
        /// The unknown key.
        key: String,
    },

    /// A key has a malformed value.
    #[error("{}:{line}: {key}: {reason}", path.display())]
    InvalidValue {
        /// Offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// The key whose value is malformed.
        key: String,
        /// What is wrong with the value.
        reason: String,
    },
}

/// Configuration file sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Global settings plus urgency-key broadcast.
    Main,
    /// Overrides for low-urgency notifications.
    Low,
    /// Overrides for normal-urgency notifications.
    Normal,
    /// Overrides for critical-urgency notifications.
    Critical,
}

impl Section {
    const ALL: [Section; 4] = [Section::Main, Section::Low, Section::Normal, Section::Critical];

    fn urgency(self) -> Option<Urgency> {
        match self {
            Self::Main => None,
            Self::Low => Some(Urgency::Low),
            Self::Normal => Some(Urgency::Normal),
            Self::Critical => Some(Urgency::Critical),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => "main".fmt(f),
            Self::Low => "low".fmt(f),
            Self::Normal => "normal".fmt(f),
            Self::Critical => "critical".fmt(f),
        }
    }
}

impl FromStr for Section {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "critical" => Ok(Self::Critical),
            _ => Err(()),
        }
    }
}

/// Vertical and horizontal padding inside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    /// Pixels above and below the content.
    pub vertical: i32,
    /// Pixels left and right of the content.
    pub horizontal: i32,
}

/// Margins between notifications and the screen edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    /// Distance from the anchored vertical screen edge.
    pub vertical: i32,
    /// Distance from the anchored horizontal screen edge.
    pub horizontal: i32,
    /// Distance between stacked notifications.
    pub between: i32,
}

/// Border styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
    /// Border color.
    pub color: Color,
    /// Border thickness in pixels.
    pub size: i32,
    /// Corner radius in pixels; `0` draws square corners.
    pub radius: i32,
}

/// Font, color and format template for one text class.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Font request for this class.
    pub font: FontSpec,
    /// Text color.
    pub color: Color,
    /// Format template expanded per notification (`%a`, `%s`, `%b`, ...).
    pub format: String,
}

/// Font and color for rendered action labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStyle {
    /// Font request for action labels.
    pub font: FontSpec,
    /// Label color.
    pub color: Color,
}

/// Progress rendering settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bar height in pixels (bar style only).
    pub height: i32,
    /// Bar or fill color.
    pub color: Color,
    /// Bar versus background fill.
    pub style: ProgressStyle,
}

/// Per-urgency settings.
#[derive(Debug, Clone, PartialEq)]
pub struct UrgencyConfig {
    /// Compositor layer for surfaces of this urgency.
    pub layer: Layer,
    /// Background fill.
    pub background: Color,
    /// Border styling.
    pub border: Border,
    /// Content padding.
    pub padding: Padding,
    /// Application-name (title) line styling.
    pub app: TextStyle,
    /// Summary line styling.
    pub summary: TextStyle,
    /// Body styling.
    pub body: TextStyle,
    /// Action label styling.
    pub action: ActionStyle,
    /// Progress rendering.
    pub progress: Progress,
    /// Upper bound on any timeout, in seconds; `0` means unbounded.
    pub max_timeout_secs: u32,
    /// Timeout applied when the notification requests the server default,
    /// in seconds; `0` means never expire.
    pub default_timeout_secs: u32,
    /// Seat idle threshold for this urgency, in seconds; `0` disables
    /// idle-pausing.
    pub idle_timeout_secs: u32,
    /// Sound file played when a notification of this urgency is shown.
    pub sound_file: Option<PathBuf>,
    /// Default icon name, resolved against the icon theme.
    pub icon: Option<String>,
}

impl UrgencyConfig {
    fn default_for(urgency: Urgency) -> Self {
        let text_color = match urgency {
            Urgency::Low => Color::from_straight(0x88, 0x88, 0x88, 0xff),
            Urgency::Normal | Urgency::Critical => Color::from_straight(0xff, 0xff, 0xff, 0xff),
        };
        let background = match urgency {
            Urgency::Low => Color::from_straight(0x2b, 0x2b, 0x2b, 0xff),
            Urgency::Normal => Color::from_straight(0x3f, 0x5f, 0x3f, 0xff),
            Urgency::Critical => Color::from_straight(0x6c, 0x33, 0x33, 0xff),
        };

        Self {
            layer: Layer::Top,
            background,
            border: Border {
                color: Color::from_straight(0x90, 0x90, 0x90, 0xff),
                size: 1,
                radius: 0,
            },
            padding: Padding {
                vertical: 20,
                horizontal: 20,
            },
            app: TextStyle {
                font: FontSpec::default_font(),
                color: text_color,
                format: "<i>%a%A</i>".to_owned(),
            },
            summary: TextStyle {
                font: FontSpec::default_font(),
                color: text_color,
                format: "<b>%s</b>\\n".to_owned(),
            },
            body: TextStyle {
                font: FontSpec::default_font(),
                color: text_color,
                format: "%b".to_owned(),
            },
            action: ActionStyle {
                font: FontSpec::default_font(),
                color: text_color,
            },
            progress: Progress {
                height: 20,
                color: Color::from_straight(0xff, 0xff, 0xff, 0xff),
                style: ProgressStyle::Bar,
            },
            max_timeout_secs: 0,
            default_timeout_secs: 0,
            idle_timeout_secs: 0,
            sound_file: None,
            icon: None,
        }
    }
}

/// The complete daemon configuration, immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Output (monitor) to place notifications on; `None` lets the
    /// compositor pick.
    pub output: Option<String>,
    /// Minimum notification width in pixels; `0` disables the floor.
    pub min_width: i32,
    /// Maximum notification width in pixels; `0` disables wrapping.
    pub max_width: i32,
    /// Maximum notification height in pixels; `0` disables clipping.
    pub max_height: i32,
    /// Size fonts by monitor DPI instead of by integer scale factor.
    pub dpi_aware: bool,
    /// Icon theme searched for named icons.
    pub icon_theme: String,
    /// Largest icon edge in pixels; `0` disables icons entirely.
    pub max_icon_size: u32,
    /// Direction the stack grows in.
    pub stacking_order: StackingOrder,
    /// Corner (or center) the stack is anchored to.
    pub anchor: Anchor,
    /// Screen-edge and inter-notification margins.
    pub margins: Margins,
    /// Per-urgency settings, indexed by [`Urgency`].
    pub by_urgency: [UrgencyConfig; 3],
    /// Command line of the external action selector.
    pub selection_helper: String,
    /// Separate selector labels with `\0` instead of `\n`.
    pub selection_helper_uses_null_separator: bool,
    /// Command template used to play notification sounds.
    pub play_sound: SpawnTemplate,
    /// Filter used when rescaling images.
    pub scaling_filter: ScalingFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: None,
            min_width: 0,
            max_width: 0,
            max_height: 0,
            dpi_aware: false,
            icon_theme: "default".to_owned(),
            max_icon_size: 48,
            stacking_order: StackingOrder::BottomUp,
            anchor: Anchor::TopRight,
            margins: Margins {
                vertical: 10,
                horizontal: 10,
                between: 10,
            },
            by_urgency: [
                UrgencyConfig::default_for(Urgency::Low),
                UrgencyConfig::default_for(Urgency::Normal),
                UrgencyConfig::default_for(Urgency::Critical),
            ],
            selection_helper: "dmenu".to_owned(),
            selection_helper_uses_null_separator: false,
            play_sound: SpawnTemplate {
                raw: "aplay ${filename}".to_owned(),
                argv: vec!["aplay".to_owned(), "${filename}".to_owned()],
            },
            scaling_filter: ScalingFilter::Lanczos3,
        }
    }
}

impl Config {
    /// Settings for one urgency level.
    pub fn urgency(&self, urgency: Urgency) -> &UrgencyConfig {
        &self.by_urgency[urgency.index()]
    }

    /// Loads the configuration.
    ///
    /// With an explicit `path` the file must exist. Without one, the default
    /// locations are searched and built-in defaults are used when no file is
    /// found.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    warn!("no configuration found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        info!(path = %path.display(), "loading configuration");

        let content = fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        Self::parse(&content, &path)
    }

    /// Parses configuration text; `path` is used for diagnostics only.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first offending line.
    pub fn parse(content: &str, path: &Path) -> Result<Self, Error> {
        let entries = scan(content, path)?;
        let mut conf = Self::default();

        // Apply the main section first so urgency sections override the
        // broadcast values regardless of their order in the file.
        for section in Section::ALL {
            for entry in entries.iter().filter(|e| e.section == section) {
                conf.apply(entry, path)?;
            }
        }

        Ok(conf)
    }

    fn apply(&mut self, entry: &Entry<'_>, path: &Path) -> Result<(), Error> {
        let ctx = Context {
            path,
            line: entry.line,
            key: entry.key,
        };

        match entry.section.urgency() {
            Some(urgency) => {
                if !apply_urgency_key(&mut self.by_urgency[urgency.index()], entry, &ctx)? {
                    return Err(Error::UnknownKey {
                        path: path.to_path_buf(),
                        line: entry.line,
                        section: entry.section,
                        key: entry.key.to_owned(),
                    });
                }
                Ok(())
            }
            None => self.apply_main_key(entry, &ctx),
        }
    }

    fn apply_main_key(&mut self, entry: &Entry<'_>, ctx: &Context<'_>) -> Result<(), Error> {
        let value = entry.value;

        match entry.key {
            "output" => {
                self.output = (!value.is_empty()).then(|| value.to_owned());
            }
            "min-width" => self.min_width = parse_px(value, ctx)?,
            "max-width" => self.max_width = parse_px(value, ctx)?,
            "max-height" => self.max_height = parse_px(value, ctx)?,
            "dpi-aware" => self.dpi_aware = parse_bool(value, ctx)?,
            "icon-theme" => self.icon_theme = value.to_owned(),
            "max-icon-size" => self.max_icon_size = parse_number(value, ctx)?,
            "stacking-order" => {
                self.stacking_order = match value.to_ascii_lowercase().as_str() {
                    "bottom-up" => StackingOrder::BottomUp,
                    "top-down" => StackingOrder::TopDown,
                    _ => {
                        return Err(invalid(
                            ctx,
                            format!("'{value}': must be one of \"bottom-up\" or \"top-down\""),
                        ));
                    }
                };
            }
            "anchor" => {
                self.anchor = match value.to_ascii_lowercase().as_str() {
                    "top-left" => Anchor::TopLeft,
                    "top-right" => Anchor::TopRight,
                    "bottom-left" => Anchor::BottomLeft,
                    "bottom-right" => Anchor::BottomRight,
                    "center" => Anchor::Center,
                    _ => {
                        return Err(invalid(
                            ctx,
                            format!(
                                "'{value}': must be one of \"top-left\", \"top-right\", \
                                 \"bottom-left\", \"bottom-right\" or \"center\""
                            ),
                        ));
                    }
                };
            }
            "edge-margin-vertical" => self.margins.vertical = parse_px(value, ctx)?,
            "edge-margin-horizontal" => self.margins.horizontal = parse_px(value, ctx)?,
            "notification-margin" => self.margins.between = parse_px(value, ctx)?,
            "selection-helper" => self.selection_helper = value.to_owned(),
            "selection-helper-uses-null-separator" => {
                self.selection_helper_uses_null_separator = parse_bool(value, ctx)?;
            }
            "play-sound" => {
                self.play_sound =
                    SpawnTemplate::parse(value).map_err(|e| invalid(ctx, e.to_string()))?;
            }
            "scaling-filter" => {
                self.scaling_filter = match value.to_ascii_lowercase().as_str() {
                    "none" => ScalingFilter::None,
                    "nearest" => ScalingFilter::Nearest,
                    "bilinear" => ScalingFilter::Bilinear,
                    "cubic" => ScalingFilter::Cubic,
                    "lanczos3" => ScalingFilter::Lanczos3,
                    _ => {
                        return Err(invalid(
                            ctx,
                            format!(
                                "'{value}': must be one of \"none\", \"nearest\", \
                                 \"bilinear\", \"cubic\" or \"lanczos3\""
                            ),
                        ));
                    }
                };
            }
            _ => {
                // Urgency keys in [main] broadcast to all three urgencies.
                let mut known = true;
                for urgency in Urgency::ALL {
                    known &= apply_urgency_key(&mut self.by_urgency[urgency.index()], entry, ctx)?;
                }
                if !known {
                    return Err(Error::UnknownKey {
                        path: ctx.path.to_path_buf(),
                        line: ctx.line,
                        section: Section::Main,
                        key: entry.key.to_owned(),
                    });
                }
            }
        }

        Ok(())
    }
}

struct Context<'a> {
    path: &'a Path,
    line: usize,
    key: &'a str,
}

struct Entry<'a> {
    section: Section,
    key: &'a str,
    value: &'a str,
    line: usize,
}

fn invalid(ctx: &Context<'_>, reason: String) -> Error {
    Error::InvalidValue {
        path: ctx.path.to_path_buf(),
        line: ctx.line,
        key: ctx.key.to_owned(),
        reason,
    }
}

fn parse_number<T: FromStr>(value: &str, ctx: &Context<'_>) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| invalid(ctx, format!("'{value}': invalid number")))
}

fn parse_px(value: &str, ctx: &Context<'_>) -> Result<i32, Error> {
    let px: i32 = parse_number(value, ctx)?;
    if px < 0 {
        return Err(invalid(ctx, format!("'{value}': must not be negative")));
    }
    Ok(px)
}

fn parse_bool(value: &str, ctx: &Context<'_>) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(ctx, format!("'{value}': invalid boolean"))),
    }
}

fn parse_color(value: &str, ctx: &Context<'_>) -> Result<Color, Error> {
    value.parse().map_err(|reason| invalid(ctx, reason))
}

fn parse_font(value: &str, ctx: &Context<'_>) -> Result<FontSpec, Error> {
    FontSpec::parse(value).map_err(|reason| invalid(ctx, reason))
}

/// Applies one urgency-section key; returns `Ok(false)` when the key is not
/// an urgency key at all.
fn apply_urgency_key(
    conf: &mut UrgencyConfig,
    entry: &Entry<'_>,
    ctx: &Context<'_>,
) -> Result<bool, Error> {
    let value = entry.value;

    match entry.key {
        "layer" => {
            conf.layer = match value.to_ascii_lowercase().as_str() {
                "background" => Layer::Background,
                "bottom" => Layer::Bottom,
                "top" => Layer::Top,
                "overlay" => Layer::Overlay,
                _ => {
                    return Err(invalid(
                        ctx,
                        format!(
                            "'{value}': must be one of \"background\", \"bottom\", \
                             \"top\" or \"overlay\""
                        ),
                    ));
                }
            };
        }
        "background" => conf.background = parse_color(value, ctx)?,
        "border-color" => conf.border.color = parse_color(value, ctx)?,
        "border-size" => conf.border.size = parse_px(value, ctx)?,
        "border-radius" => conf.border.radius = parse_px(value, ctx)?,
        "padding-vertical" => conf.padding.vertical = parse_px(value, ctx)?,
        "padding-horizontal" => conf.padding.horizontal = parse_px(value, ctx)?,
        "title-font" => conf.app.font = parse_font(value, ctx)?,
        "summary-font" => conf.summary.font = parse_font(value, ctx)?,
        "body-font" => conf.body.font = parse_font(value, ctx)?,
        "action-font" => conf.action.font = parse_font(value, ctx)?,
        "title-color" => conf.app.color = parse_color(value, ctx)?,
        "summary-color" => conf.summary.color = parse_color(value, ctx)?,
        "body-color" => conf.body.color = parse_color(value, ctx)?,
        "action-color" => conf.action.color = parse_color(value, ctx)?,
        "title-format" => conf.app.format = value.to_owned(),
        "summary-format" => conf.summary.format = value.to_owned(),
        "body-format" => conf.body.format = value.to_owned(),
        "progress-color" => conf.progress.color = parse_color(value, ctx)?,
        "progress-bar-height" => conf.progress.height = parse_px(value, ctx)?,
        "progress-style" => {
            conf.progress.style = match value.to_ascii_lowercase().as_str() {
                "bar" => ProgressStyle::Bar,
                "background" => ProgressStyle::Background,
                _ => {
                    return Err(invalid(
                        ctx,
                        format!("'{value}': must be one of \"bar\" or \"background\""),
                    ));
                }
            };
        }
        "max-timeout" => conf.max_timeout_secs = parse_number(value, ctx)?,
        "default-timeout" => conf.default_timeout_secs = parse_number(value, ctx)?,
        "idle-timeout" => conf.idle_timeout_secs = parse_number(value, ctx)?,
        "sound-file" => {
            conf.sound_file = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        "icon" => {
            conf.icon = (!value.is_empty()).then(|| value.to_owned());
        }
        _ => return Ok(false),
    }

    Ok(true)
}

/// Scans the raw file into `(section, key, value)` entries, validating
/// sections and line syntax.
fn scan<'a>(content: &'a str, path: &Path) -> Result<Vec<Entry<'a>>, Error> {
    let mut entries = Vec::new();
    let mut section = Section::Main;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;

        // Strip trailing comments, then surrounding whitespace.
        let line = raw_line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let Some(name) = rest.strip_suffix(']') else {
                return Err(Error::Syntax {
                    path: path.to_path_buf(),
                    line: line_no,
                    reason: format!("'{line}': unterminated section header"),
                });
            };

            section = name.parse().map_err(|()| Error::InvalidSection {
                path: path.to_path_buf(),
                line: line_no,
                name: name.to_owned(),
            })?;
            continue;
        }

        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim_end(), value.trim_start()),
            None => (line, ""),
        };

        if key.is_empty() {
            return Err(Error::Syntax {
                path: path.to_path_buf(),
                line: line_no,
                reason: "no key specified".to_owned(),
            });
        }

        entries.push(Entry {
            section,
            key,
            value,
            line: line_no,
        });
    }

    Ok(entries)
}

fn default_path() -> Option<PathBuf> {
    if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(config_home).join("fnott/fnott.ini"));
    }

    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config/fnott/fnott.ini"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Config, Error> {
        Config::parse(content, Path::new("test.ini"))
    }

    #[test]
    fn empty_input_yields_defaults() {
        let conf = parse("").unwrap();

        assert_eq!(conf, Config::default());
    }

    #[test]
    fn main_keys_are_applied() {
        let conf = parse(
            "max-width=400\n\
             stacking-order=top-down\n\
             anchor=bottom-left\n\
             selection-helper-uses-null-separator=yes\n",
        )
        .unwrap();

        assert_eq!(conf.max_width, 400);
        assert_eq!(conf.stacking_order, StackingOrder::TopDown);
        assert_eq!(conf.anchor, Anchor::BottomLeft);
        assert!(conf.selection_helper_uses_null_separator);
    }

    #[test]
    fn urgency_key_in_main_broadcasts_to_all_sections() {
        let conf = parse("border-size=5\n").unwrap();

        for urgency in Urgency::ALL {
            assert_eq!(conf.urgency(urgency).border.size, 5);
        }
    }

    #[test]
    fn urgency_section_overrides_broadcast_value() {
        let conf = parse(
            "[critical]\n\
             border-size=9\n\
             [main]\n\
             border-size=5\n",
        )
        .unwrap();

        assert_eq!(conf.urgency(Urgency::Low).border.size, 5);
        assert_eq!(conf.urgency(Urgency::Normal).border.size, 5);
        assert_eq!(conf.urgency(Urgency::Critical).border.size, 9);
    }

    #[test]
    fn unknown_key_is_fatal_and_names_file_and_line() {
        let error = parse("max-width=100\nfrobnicate=1\n").unwrap_err();

        match error {
            Error::UnknownKey { line, key, .. } => {
                assert_eq!(line, 2);
                assert_eq!(key, "frobnicate");
            }
            other => panic!("expected UnknownKey, got {other}"),
        }
    }

    #[test]
    fn unknown_section_is_fatal() {
        let error = parse("[sometimes]\n").unwrap_err();

        assert!(matches!(error, Error::InvalidSection { line: 1, .. }));
    }

    #[test]
    fn malformed_color_is_fatal() {
        let error = parse("background=red\n").unwrap_err();

        assert!(matches!(error, Error::InvalidValue { .. }));
    }

    #[test]
    fn colors_are_premultiplied_on_load() {
        let conf = parse("[normal]\nbackground=ff000080\n").unwrap();

        let bg = conf.urgency(Urgency::Normal).background;
        assert_eq!((bg.r, bg.g, bg.b, bg.a), (0x80, 0, 0, 0x80));
    }

    #[test]
    fn progress_style_is_a_first_class_urgency_key() {
        let conf = parse("[critical]\nprogress-style=background\n").unwrap();

        assert_eq!(
            conf.urgency(Urgency::Critical).progress.style,
            ProgressStyle::Background
        );
        assert_eq!(conf.urgency(Urgency::Normal).progress.style, ProgressStyle::Bar);
    }

    #[test]
    fn invalid_layer_value_is_fatal() {
        let error = parse("[low]\nlayer=everywhere\n").unwrap_err();

        assert!(matches!(error, Error::InvalidValue { .. }));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let conf = parse(
            "# leading comment\n\
             \n\
             max-width=320  # trailing comment\n",
        )
        .unwrap();

        assert_eq!(conf.max_width, 320);
    }

    #[test]
    fn play_sound_template_is_tokenized() {
        let conf = parse("play-sound=paplay --volume=65536 ${filename}\n").unwrap();

        assert_eq!(conf.play_sound.argv[0], "paplay");
        assert_eq!(conf.play_sound.argv[2], "${filename}");
    }

    #[test]
    fn unterminated_quote_in_play_sound_is_fatal() {
        let error = parse("play-sound=aplay 'oops\n").unwrap_err();

        assert!(matches!(error, Error::InvalidValue { .. }));
    }

    #[test]
    fn timeouts_parse_per_urgency() {
        let conf = parse(
            "default-timeout=10\n\
             [critical]\n\
             default-timeout=0\n\
             max-timeout=60\n",
        )
        .unwrap();

        assert_eq!(conf.urgency(Urgency::Normal).default_timeout_secs, 10);
        assert_eq!(conf.urgency(Urgency::Critical).default_timeout_secs, 0);
        assert_eq!(conf.urgency(Urgency::Critical).max_timeout_secs, 60);
    }

    #[test]
    fn load_with_explicit_missing_path_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/fnott.ini")));

        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fnott.ini");
        std::fs::write(&path, "max-icon-size=64\n").unwrap();

        let conf = Config::load(Some(&path)).unwrap();

        assert_eq!(conf.max_icon_size, 64);
    }
}
