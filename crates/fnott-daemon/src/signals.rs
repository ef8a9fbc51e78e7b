//! Bus signal emission.
//!
//! The manager reports lifecycle transitions through a [`SignalSink`];
//! the production sink emits `org.freedesktop.Notifications` signals, tests
//! substitute a capturing sink.

use async_trait::async_trait;
use tracing::warn;
use zbus::Connection;

/// D-Bus constants for the notification service.
pub mod dbus {
    /// Well-known bus name.
    pub const SERVICE_NAME: &str = "org.freedesktop.Notifications";

    /// Object path.
    pub const SERVICE_PATH: &str = "/org/freedesktop/Notifications";

    /// Interface name.
    pub const SERVICE_INTERFACE: &str = "org.freedesktop.Notifications";
}

/// Why a notification was closed, as encoded in `NotificationClosed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CloseReason {
    /// The notification expired.
    Expired = 1,
    /// The user dismissed the notification.
    Dismissed = 2,
    /// A `CloseNotification` call closed it.
    Closed = 3,
}

/// Signals emitted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A notification went away.
    NotificationClosed,
    /// The user chose an action.
    ActionInvoked,
    /// An activation token is available for a chosen action.
    ActivationToken,
}

impl Signal {
    /// The D-Bus member name.
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::NotificationClosed => "NotificationClosed",
            Signal::ActionInvoked => "ActionInvoked",
            Signal::ActivationToken => "ActivationToken",
        }
    }
}

/// Destination for lifecycle signals.
#[async_trait]
pub trait SignalSink: Send {
    /// A notification was destroyed.
    async fn notification_closed(&self, id: u32, reason: CloseReason);

    /// An action was chosen for a notification.
    async fn action_invoked(&self, id: u32, action_key: &str);

    /// An activation token accompanies a chosen action.
    async fn activation_token(&self, id: u32, token: &str);
}

/// Emits signals on the session bus.
#[derive(Debug, Clone)]
pub struct BusSignals {
    connection: Connection,
}

impl BusSignals {
    /// Wraps an established bus connection.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

macro_rules! emit {
    ($self:ident, $signal:expr, $body:expr) => {
        if let Err(e) = $self
            .connection
            .emit_signal(
                None::<()>,
                dbus::SERVICE_PATH,
                dbus::SERVICE_INTERFACE,
                $signal.as_str(),
                $body,
            )
            .await
        {
            warn!(signal = $signal.as_str(), error = %e, "cannot emit signal");
        }
    };
}

#[async_trait]
impl SignalSink for BusSignals {
    async fn notification_closed(&self, id: u32, reason: CloseReason) {
        emit!(self, Signal::NotificationClosed, &(id, reason as u32));
    }

    async fn action_invoked(&self, id: u32, action_key: &str) {
        emit!(self, Signal::ActionInvoked, &(id, action_key));
    }

    async fn activation_token(&self, id: u32, token: &str) {
        emit!(self, Signal::ActivationToken, &(id, token));
    }
}

/// Discards every signal; used when running without a bus connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSignals;

#[async_trait]
impl SignalSink for NullSignals {
    async fn notification_closed(&self, _id: u32, _reason: CloseReason) {}

    async fn action_invoked(&self, _id: u32, _action_key: &str) {}

    async fn activation_token(&self, _id: u32, _token: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names_match_the_bus_members() {
        assert_eq!(Signal::NotificationClosed.as_str(), "NotificationClosed");
        assert_eq!(Signal::ActionInvoked.as_str(), "ActionInvoked");
        assert_eq!(Signal::ActivationToken.as_str(), "ActivationToken");
    }

    #[test]
    fn close_reasons_use_the_wire_encoding() {
        assert_eq!(CloseReason::Expired as u32, 1);
        assert_eq!(CloseReason::Dismissed as u32, 2);
        assert_eq!(CloseReason::Closed as u32, 3);
    }
}
