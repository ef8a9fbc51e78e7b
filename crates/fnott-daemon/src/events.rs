//! The daemon's single event-loop input.

use fnott_config::Urgency;
use fnott_protocol::{ListEntry, Reply};
use fnott_render::ImageSource;
use fnott_wayland::SurfaceEvent;
use tokio::sync::oneshot;

/// A fully parsed `Notify` request, produced by the bus frontend.
#[derive(Debug)]
pub struct NotifyRequest {
    /// Application name, trailing whitespace trimmed.
    pub app_name: String,
    /// Notification id to replace, `0` for none.
    pub replaces_id: u32,
    /// The `app_icon` argument as sent; empty for none.
    pub app_icon: String,
    /// Summary, trailing whitespace trimmed.
    pub summary: String,
    /// Body, trailing whitespace trimmed.
    pub body: String,
    /// `(id, label)` action pairs, in order.
    pub actions: Vec<(String, String)>,
    /// Urgency from the `urgency` hint.
    pub urgency: Urgency,
    /// Coalescing tag from `x-canonical-private-synchronous`.
    pub sync_tag: Option<String>,
    /// Progress percent from the `value` hint; `-1` for none.
    pub progress: i8,
    /// Image from the `image-data`/`image-path` hints.
    pub image: Option<ImageSource>,
    /// Requested timeout in milliseconds; `-1` for server default, `0`
    /// for never.
    pub timeout_ms: i32,
}

/// Everything the event loop reacts to.
#[derive(Debug)]
pub enum Event {
    /// A `Notify` bus call.
    Notify {
        /// The parsed request.
        request: Box<NotifyRequest>,
        /// Resolves the bus reply with the notification id.
        reply: oneshot::Sender<u32>,
    },

    /// A `CloseNotification` bus call.
    CloseNotification {
        /// Target id.
        id: u32,
        /// Whether the id named a live notification.
        reply: oneshot::Sender<bool>,
    },

    /// A notification timer fired.
    Expire {
        /// Target id.
        id: u32,
        /// Generation the timer was armed for; stale timers are dropped.
        generation: u64,
    },

    /// An action selector finished.
    SelectorDone {
        /// Id of the notification the selector was started for.
        id: u32,
        /// Trimmed selector output on clean (status 0) exit.
        output: Option<String>,
        /// Pending control-socket reply, when a CLI started the selection.
        reply: Option<oneshot::Sender<Reply>>,
    },

    /// Surface backend event.
    Surface(SurfaceEvent),

    /// Control socket: list notifications.
    CtrlList {
        /// List entries, head of the stack first.
        reply: oneshot::Sender<Vec<ListEntry>>,
    },

    /// Control socket: pause display of new notifications.
    CtrlPause {
        /// Acknowledged once the pause took effect.
        reply: oneshot::Sender<()>,
    },

    /// Control socket: resume display of new notifications.
    CtrlUnpause {
        /// Acknowledged once the unpause took effect.
        reply: oneshot::Sender<()>,
    },

    /// Control socket: dismiss one notification (`0` targets the head).
    CtrlDismiss {
        /// Target id.
        id: u32,
        /// Whether a notification was dismissed (or deferred).
        reply: oneshot::Sender<bool>,
    },

    /// Control socket: dismiss everything.
    CtrlDismissAll {
        /// Whether all dismissals succeeded.
        reply: oneshot::Sender<bool>,
    },

    /// Control socket: run the action selector for one notification.
    /// The reply resolves only after the selector exits.
    CtrlActions {
        /// Target id.
        id: u32,
        /// Final result, sent after selector completion.
        reply: oneshot::Sender<Reply>,
    },

    /// Control socket: invoke the `default` action, then dismiss.
    CtrlDefaultAction {
        /// Target id.
        id: u32,
        /// Result of the dismissal.
        reply: oneshot::Sender<Reply>,
    },

    /// Control socket: shut the daemon down.
    Quit {
        /// Acknowledged right before the event loop exits.
        reply: oneshot::Sender<()>,
    },

    /// Terminate the event loop (signal handler).
    Shutdown,
}
