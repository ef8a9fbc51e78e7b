//! Freedesktop icon lookup.
//!
//! Walks the standard icon base directories, indexes the configured theme
//! (plus `hicolor` as fallback), and resolves icon names to the best-sized
//! PNG available. The index is built once at startup and read-only after
//! that.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, warn};

/// Icon lookup errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The icon file exists but cannot be decoded.
    #[error("{}: cannot decode icon: {source}", path.display())]
    Decode {
        /// Offending file.
        path: PathBuf,
        /// Decoder diagnostic.
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirType {
    Fixed,
    Scalable,
    Threshold,
}

#[derive(Debug)]
struct IconDir {
    path: PathBuf,
    size: i32,
    min_size: i32,
    max_size: i32,
    threshold: i32,
    kind: DirType,
}

impl IconDir {
    fn matches(&self, size: i32) -> bool {
        match self.kind {
            DirType::Fixed => self.size == size,
            DirType::Scalable => (self.min_size..=self.max_size).contains(&size),
            DirType::Threshold => (self.size - size).abs() <= self.threshold,
        }
    }

    fn distance(&self, size: i32) -> i32 {
        match self.kind {
            DirType::Fixed => (self.size - size).abs(),
            DirType::Scalable | DirType::Threshold => {
                if size < self.min_size {
                    self.min_size - size
                } else if size > self.max_size {
                    size - self.max_size
                } else {
                    0
                }
            }
        }
    }
}

/// Read-only index over the installed icon themes.
#[derive(Debug)]
pub struct IconIndex {
    dirs: Vec<IconDir>,
    pixmap_dirs: Vec<PathBuf>,
}

fn base_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(home) = env::var("HOME") {
        dirs.push(PathBuf::from(&home).join(".icons"));
    }

    match env::var("XDG_DATA_HOME") {
        Ok(data_home) => dirs.push(PathBuf::from(data_home).join("icons")),
        Err(_) => {
            if let Ok(home) = env::var("HOME") {
                dirs.push(PathBuf::from(home).join(".local/share/icons"));
            }
        }
    }

    let data_dirs =
        env::var("XDG_DATA_DIRS").unwrap_or_else(|_| "/usr/local/share:/usr/share".to_owned());
    for dir in data_dirs.split(':').filter(|d| !d.is_empty()) {
        dirs.push(PathBuf::from(dir).join("icons"));
    }

    dirs
}

fn parse_index_theme(theme_root: &Path, content: &str) -> Vec<IconDir> {
    let mut dirs = Vec::new();

    let mut section: Option<String> = None;
    let mut size = 0;
    let mut min_size = -1;
    let mut max_size = -1;
    let mut threshold = 2;
    let mut kind = DirType::Threshold;

    let flush = |section: &Option<String>,
                     size: i32,
                     min_size: i32,
                     max_size: i32,
                     threshold: i32,
                     kind: DirType,
                     dirs: &mut Vec<IconDir>| {
        let Some(name) = section else {
            return;
        };
        if name == "Icon Theme" || size <= 0 {
            return;
        }
        dirs.push(IconDir {
            path: theme_root.join(name),
            size,
            min_size: if min_size > 0 { min_size } else { size },
            max_size: if max_size > 0 { max_size } else { size },
            threshold,
            kind,
        });
    };

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            if let Some(name) = rest.strip_suffix(']') {
                flush(&section, size, min_size, max_size, threshold, kind, &mut dirs);
                section = Some(name.to_owned());
                size = 0;
                min_size = -1;
                max_size = -1;
                threshold = 2;
                kind = DirType::Threshold;
                continue;
            }
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "Size" => size = value.parse().unwrap_or(0),
            "MinSize" => min_size = value.parse().unwrap_or(-1),
            "MaxSize" => max_size = value.parse().unwrap_or(-1),
            "Threshold" => threshold = value.parse().unwrap_or(2),
            "Type" => {
                kind = match value.to_ascii_lowercase().as_str() {
                    "fixed" => DirType::Fixed,
                    "scalable" => DirType::Scalable,
                    _ => DirType::Threshold,
                }
            }
            _ => {}
        }
    }

    flush(&section, size, min_size, max_size, threshold, kind, &mut dirs);
    dirs
}

impl IconIndex {
    /// Indexes `theme_name` (and `hicolor`) across the standard base
    /// directories.
    pub fn new(theme_name: &str) -> Self {
        Self::with_base_dirs(theme_name, &base_dirs())
    }

    /// Indexes against explicit base directories.
    pub fn with_base_dirs(theme_name: &str, bases: &[PathBuf]) -> Self {
        let mut dirs = Vec::new();

        let mut themes = vec![theme_name];
        if theme_name != "hicolor" {
            themes.push("hicolor");
        }

        for theme in themes {
            for base in bases {
                let theme_root = base.join(theme);
                let Ok(content) = fs::read_to_string(theme_root.join("index.theme")) else {
                    continue;
                };
                dirs.extend(parse_index_theme(&theme_root, &content));
            }
        }

        let pixmap_dirs = vec![PathBuf::from("/usr/share/pixmaps")];

        debug!(theme = theme_name, dirs = dirs.len(), "icon index built");
        Self { dirs, pixmap_dirs }
    }

    /// Resolves `name` to the icon file closest to `size` pixels.
    pub fn lookup(&self, name: &str, size: i32) -> Option<PathBuf> {
        let mut fallback: Option<(i32, PathBuf)> = None;

        for dir in &self.dirs {
            let candidate = dir.path.join(format!("{name}.png"));
            if !candidate.is_file() {
                continue;
            }

            if dir.matches(size) {
                return Some(candidate);
            }

            let distance = dir.distance(size);
            match &fallback {
                Some((best, _)) if *best <= distance => {}
                _ => fallback = Some((distance, candidate)),
            }
        }

        if let Some((_, path)) = fallback {
            return Some(path);
        }

        self.pixmap_dirs
            .iter()
            .map(|dir| dir.join(format!("{name}.png")))
            .find(|path| path.is_file())
    }

    /// Loads an icon by name or path.
    ///
    /// Anything containing a path separator (or an absolute path) is loaded
    /// directly; everything else goes through theme lookup at `size`.
    /// Returns `Ok(None)` when no matching icon is installed.
    ///
    /// # Errors
    ///
    /// Returns an error when a located file fails to decode.
    pub fn load(&self, name: &str, size: i32) -> Result<Option<RgbaImage>, Error> {
        let path = if name.contains('/') {
            PathBuf::from(name)
        } else {
            match self.lookup(name, size) {
                Some(path) => path,
                None => {
                    debug!(name, "no icon found");
                    return Ok(None);
                }
            }
        };

        if !path.is_file() {
            warn!(path = %path.display(), "icon path does not exist");
            return Ok(None);
        }

        let img = image::open(&path).map_err(|source| Error::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(Some(img.into_rgba8()))
    }
}
