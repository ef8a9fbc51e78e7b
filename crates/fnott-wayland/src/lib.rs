//! Compositor-client seam.
//!
//! The daemon core never talks to a display server directly; it drives a
//! [`SurfaceBackend`] and reacts to [`SurfaceEvent`]s delivered on the main
//! event channel. This keeps the lifecycle engine, frame scheduling and
//! rendering independent of the wire protocol of any particular compositor.
//! [`HeadlessBackend`] implements the same contract entirely in memory and
//! backs the test suites.

mod buffer;
mod headless;

use fnott_config::{Anchor, Layer, Urgency};
use tokio::sync::mpsc::UnboundedSender;

pub use buffer::Buffer;
pub use headless::HeadlessBackend;

/// Surface backend errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The backend could not allocate a surface.
    #[error("cannot create surface: {0}")]
    SurfaceCreation(String),

    /// The backend could not allocate a pixel buffer.
    #[error("cannot allocate a {width}x{height} buffer")]
    BufferAllocation {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// An operation referenced a surface that no longer exists.
    #[error("unknown surface: {0:?}")]
    UnknownSurface(SurfaceId),
}

/// Opaque surface handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Physical subpixel layout of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Subpixel {
    /// Layout unknown; the renderer decides.
    #[default]
    Default,
    /// No subpixel structure (grayscale antialiasing).
    None,
    /// Horizontal RGB stripes.
    HorizontalRgb,
    /// Horizontal BGR stripes.
    HorizontalBgr,
    /// Vertical RGB stripes.
    VerticalRgb,
    /// Vertical BGR stripes.
    VerticalBgr,
}

/// Properties of the output a surface is (or would be) mapped on.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputInfo {
    /// Output name, when known.
    pub name: Option<String>,
    /// Integer-or-fractional scale factor.
    pub scale: f32,
    /// Dots per inch.
    pub dpi: f32,
    /// Subpixel layout.
    pub subpixel: Subpixel,
}

impl Default for OutputInfo {
    fn default() -> Self {
        Self {
            name: None,
            scale: 1.0,
            dpi: 96.0,
            subpixel: Subpixel::Default,
        }
    }
}

/// Placement request for a new notification surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRequest {
    /// Compositor layer to place the surface on.
    pub layer: Layer,
    /// Screen anchor the surface is positioned against.
    pub anchor: Anchor,
    /// Initial width in logical (scale-divided) pixels.
    pub width: u32,
    /// Initial height in logical pixels.
    pub height: u32,
}

/// Margins around a surface, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceMargins {
    /// Distance from the top edge.
    pub top: i32,
    /// Distance from the right edge.
    pub right: i32,
    /// Distance from the bottom edge.
    pub bottom: i32,
    /// Distance from the left edge.
    pub left: i32,
}

/// Events produced by the backend, consumed by the daemon event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// The compositor acknowledged the surface configuration; committing
    /// buffers is now allowed.
    Configured {
        /// The configured surface.
        surface: SurfaceId,
    },
    /// The previously committed frame was presented; the next buffer may be
    /// committed.
    FrameDone {
        /// The presented surface.
        surface: SurfaceId,
    },
    /// The compositor closed the surface; all handles are invalid.
    Closed {
        /// The closed surface.
        surface: SurfaceId,
    },
    /// The output under a surface changed scale, DPI or subpixel layout.
    OutputChanged {
        /// The affected surface.
        surface: SurfaceId,
        /// New output properties.
        info: OutputInfo,
    },
    /// The seat idle state for one urgency changed.
    IdleChanged {
        /// Urgency whose idle threshold was crossed.
        urgency: Urgency,
        /// Whether the seat is now considered idle for that urgency.
        idle: bool,
    },
}

/// Surface operations the notification core depends on.
///
/// Implementations must deliver [`SurfaceEvent`]s on the sender they were
/// constructed with: `Configured` after [`create`](Self::create), `FrameDone`
/// after every [`attach`](Self::attach), and `Closed` when the compositor
/// revokes the surface.
pub trait SurfaceBackend {
    /// Creates a new surface. No buffer may be attached until the
    /// `Configured` event arrives.
    ///
    /// # Errors
    ///
    /// Returns an error when the compositor refuses the surface.
    fn create(&mut self, request: &SurfaceRequest) -> Result<SurfaceId, Error>;

    /// Updates the logical size of a surface.
    fn set_size(&mut self, surface: SurfaceId, width: u32, height: u32);

    /// Updates the margins of a surface.
    fn set_margins(&mut self, surface: SurfaceId, margins: SurfaceMargins);

    /// Commits pending surface state (size, margins) without a new buffer.
    fn commit(&mut self, surface: SurfaceId);

    /// Attaches `buffer`, damages the full surface, requests a frame
    /// callback and commits.
    fn attach(&mut self, surface: SurfaceId, buffer: Buffer);

    /// Destroys a surface and all resources attached to it.
    fn destroy(&mut self, surface: SurfaceId);

    /// Properties of the output new surfaces would be mapped on.
    fn output(&self) -> OutputInfo;

    /// Whether the seat has been idle longer than the configured threshold
    /// for `urgency`.
    fn is_idle(&self, urgency: Urgency) -> bool;

    /// Compositor-issued activation token for the surface, when available.
    fn activation_token(&self, surface: SurfaceId) -> Option<String>;
}

/// Channel type used to hand backend events to the daemon.
pub type EventSender = UnboundedSender<SurfaceEvent>;
