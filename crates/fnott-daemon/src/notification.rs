//! Per-notification state.

use fnott_config::Urgency;
use fnott_render::{FontSet, Raster, RunCache};
use fnott_wayland::{Buffer, Subpixel, SurfaceId};
use tokio_util::sync::CancellationToken;

/// One notification action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Action identifier, sent back in `ActionInvoked`.
    pub id: String,
    /// Human-readable label, shown by the selector.
    pub label: String,
}

/// The "don't destroy yet" machine guarding a notification while an action
/// selector is running.
///
/// `Immediate` destroys on request; `Deferred` records the request as
/// `Delayed` instead; `Delayed` destroys as soon as the selector completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeferredState {
    /// No selector outstanding; destroy requests act immediately.
    #[default]
    Immediate,
    /// A selector is running; destroy requests are queued.
    Deferred,
    /// A destroy request arrived while deferred; honor it on completion.
    Delayed,
}

/// Where the notification's surface is in its commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceState {
    /// No usable surface (none created, or created but not yet
    /// acknowledged by the compositor).
    #[default]
    Unattached,
    /// Configuration acknowledged; a buffer may be committed.
    Configured,
    /// A frame is in flight; later buffers queue as `pending`.
    AwaitingFrame,
    /// The last committed frame has been presented.
    Committed,
}

/// Surface handles and the frame-scheduling state.
#[derive(Debug, Default)]
pub struct SurfaceAttachment {
    /// Backend surface handle, once created.
    pub surface: Option<SurfaceId>,
    /// Commit-cycle state.
    pub state: SurfaceState,
    /// Buffer waiting for the in-flight frame to finish.
    pub pending: Option<Buffer>,
}

impl SurfaceAttachment {
    /// Drops all handles, returning to the unattached state.
    pub fn reset(&mut self) {
        self.surface = None;
        self.state = SurfaceState::Unattached;
        self.pending = None;
    }
}

/// Loaded font sets plus the parameters they were resolved against; used to
/// skip reloads when nothing affecting font selection changed.
#[derive(Debug)]
pub struct NotifFonts {
    /// Title (application name) fonts.
    pub app: FontSet,
    /// Summary fonts.
    pub summary: FontSet,
    /// Body fonts.
    pub body: FontSet,
    /// Action label fonts.
    pub action: FontSet,
    /// DPI the sets were sized for.
    pub dpi: f32,
    /// Scale the sets were sized for.
    pub scale: f32,
    /// Whether DPI-aware sizing was used.
    pub dpi_aware: bool,
    /// Urgency the sets were selected for.
    pub urgency: Urgency,
}

/// A live notification, owned by the manager.
#[derive(Debug)]
pub struct Notification {
    /// Unique id, never `0`.
    pub id: u32,
    /// Guards callbacks against stale ids after replacement.
    pub generation: u64,
    /// Coalescing tag, unique among live notifications.
    pub sync_tag: Option<String>,
    /// Application name.
    pub app: Vec<char>,
    /// Summary, entity-decoded.
    pub summary: Vec<char>,
    /// Body, entity-decoded.
    pub body: Vec<char>,
    /// Urgency level; determines stacking and styling.
    pub urgency: Urgency,
    /// Actions in the order they arrived.
    pub actions: Vec<Action>,
    /// Progress percent, `-1` for none.
    pub progress: i8,
    /// Requested timeout; `-1` server default, `0` never.
    pub timeout_ms: i32,
    /// Cancellation handle of the armed expiry timer.
    pub timer: Option<CancellationToken>,
    /// Deferred-dismissal state.
    pub deferred_dismissal: DeferredState,
    /// Deferred-expiry state.
    pub deferred_expiry: DeferredState,
    /// Lazily loaded fonts.
    pub fonts: Option<NotifFonts>,
    /// Prepared image, already rescaled.
    pub image: Option<Raster>,
    /// Whether the image came from the sender (as opposed to the
    /// configured default icon).
    pub image_is_custom: bool,
    /// Surface and frame-scheduling state.
    pub surface: SurfaceAttachment,
    /// Scale factor of the output the surface is on.
    pub scale: f32,
    /// DPI of the output the surface is on.
    pub dpi: f32,
    /// Subpixel order of the output the surface is on.
    pub subpixel: Subpixel,
    /// Top edge of the notification within the stack, in pixels.
    pub y: i32,
    /// Shaped-run cache.
    pub run_cache: RunCache,
}

impl Notification {
    /// Creates an empty notification shell; content is applied through the
    /// manager's mutators.
    pub fn new(id: u32, generation: u64, sync_tag: Option<String>) -> Self {
        Self {
            id,
            generation,
            sync_tag,
            app: Vec::new(),
            summary: Vec::new(),
            body: Vec::new(),
            urgency: Urgency::Normal,
            actions: Vec::new(),
            progress: -1,
            timeout_ms: -1,
            timer: None,
            deferred_dismissal: DeferredState::Immediate,
            deferred_expiry: DeferredState::Immediate,
            fonts: None,
            image: None,
            image_is_custom: false,
            surface: SurfaceAttachment::default(),
            scale: 1.0,
            dpi: 96.0,
            subpixel: Subpixel::Default,
            y: 0,
            run_cache: RunCache::new(),
        }
    }

    /// Cancels the armed expiry timer, if any.
    pub fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Looks an action up by its label (the selector echoes labels).
    pub fn action_by_label(&self, label: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.label == label)
    }

    /// Looks an action up by its id.
    pub fn action_by_id(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// The summary as a string, for the control-socket list reply.
    pub fn summary_string(&self) -> String {
        self.summary.iter().collect()
    }
}

impl Drop for Notification {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
