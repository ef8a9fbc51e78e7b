//! The fnott daemon core: notification manager, lifecycle engine, bus and
//! control-socket frontends.
//!
//! All mutable state is owned by one event loop ([`daemon::Daemon`]).
//! Peripheral tasks (the D-Bus object, control-socket clients, timers,
//! action selectors, the surface backend) communicate with it exclusively
//! through the [`events::Event`] channel; requests that need an answer carry
//! a oneshot sender.

pub mod ctrl;
pub mod daemon;
pub mod dbus;
pub mod entities;
pub mod events;
pub mod manager;
pub mod notification;
pub mod selector;
pub mod signals;
pub mod sound;
pub mod timeout;

pub use daemon::Daemon;
pub use manager::NotificationManager;

/// Daemon errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// D-Bus communication error.
    #[error("D-Bus operation failed: {0}")]
    Dbus(#[from] zbus::Error),

    /// Cannot claim the notification service name on the bus.
    #[error("cannot claim org.freedesktop.Notifications: {0}")]
    NameClaimFailed(String),

    /// Control-socket setup failed.
    #[error("{}: cannot bind control socket: {source}", path.display())]
    ControlSocket {
        /// Socket path.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The event channel closed while the daemon was still running.
    #[error("event channel closed")]
    ChannelClosed,

    /// The action selector command line is malformed.
    #[error("selection helper: {0}")]
    SelectionHelper(String),

    /// Surface backend failure.
    #[error(transparent)]
    Surface(#[from] fnott_wayland::Error),
}
