//! Expiry timer scheduling.
//!
//! Each notification owns at most one timer. Timers are single-shot tasks
//! on the monotonic clock; firing posts an [`Event::Expire`] carrying the
//! notification's generation so a timer armed for an earlier incarnation of
//! an id is ignored.

use std::time::Duration;

use fnott_config::UrgencyConfig;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::Event;
use crate::notification::Notification;

/// Effective timeout in milliseconds for a notification.
///
/// `-1` requests pick up the per-urgency default; `max-timeout` (when set)
/// clamps everything, including "never expire" requests. `0` means no
/// timer.
pub fn effective_timeout_ms(timeout_ms: i32, urgency_conf: &UrgencyConfig) -> u64 {
    let max_ms = u64::from(urgency_conf.max_timeout_secs) * 1000;
    let default_ms = u64::from(urgency_conf.default_timeout_secs) * 1000;

    let mut ms = if timeout_ms < 0 {
        default_ms
    } else {
        timeout_ms as u64
    };

    if max_ms > 0 {
        ms = if ms > 0 { ms.min(max_ms) } else { max_ms };
    }

    ms
}

/// Cancels any armed timer and re-arms per the current timeout, urgency
/// configuration and idle state.
pub fn reload(
    notif: &mut Notification,
    urgency_conf: &UrgencyConfig,
    seat_is_idle: bool,
    events: &UnboundedSender<Event>,
) {
    notif.cancel_timer();

    if seat_is_idle {
        debug!(id = notif.id, urgency = %notif.urgency, "timer not armed, seat is idle");
        return;
    }

    let ms = effective_timeout_ms(notif.timeout_ms, urgency_conf);
    if ms == 0 {
        return;
    }

    debug!(id = notif.id, timeout_ms = ms, "timer armed");

    let token = CancellationToken::new();
    notif.timer = Some(token.clone());

    let id = notif.id;
    let generation = notif.generation;
    let events = events.clone();

    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = tokio::time::sleep(Duration::from_millis(ms)) => {
                let _ = events.send(Event::Expire { id, generation });
            }
        }
    });
}
