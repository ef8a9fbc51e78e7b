//! The daemon event loop.

use fnott_protocol::Reply;
use fnott_wayland::SurfaceBackend;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::events::Event;
use crate::manager::NotificationManager;

/// Owns the manager and drains the event channel.
///
/// Every callback runs to completion before the next event is dispatched,
/// which gives the ordering guarantees the bus and control frontends rely
/// on: all effects of one incoming message are applied before the next
/// message's, and a notification's frame-done is observed before any
/// subsequent commit for it.
pub struct Daemon<B: SurfaceBackend> {
    manager: NotificationManager<B>,
    events: UnboundedReceiver<Event>,
}

impl<B: SurfaceBackend> Daemon<B> {
    /// Creates the event loop around a manager and its event channel.
    pub fn new(manager: NotificationManager<B>, events: UnboundedReceiver<Event>) -> Self {
        Self { manager, events }
    }

    /// Read access to the manager (tests).
    pub fn manager(&self) -> &NotificationManager<B> {
        &self.manager
    }

    /// Runs until a shutdown request arrives or every event sender is
    /// gone.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            if self.handle(event).await.is_break() {
                break;
            }
        }

        info!("event loop finished, dismissing remaining notifications");
        self.manager.dismiss_all().await;
    }

    async fn handle(&mut self, event: Event) -> std::ops::ControlFlow<()> {
        use std::ops::ControlFlow;

        match event {
            Event::Notify { request, reply } => {
                let id = self.manager.notify(*request);
                let _ = reply.send(id);
            }

            Event::CloseNotification { id, reply } => {
                let closed = self.manager.close_notification(id).await;
                let _ = reply.send(closed);
            }

            Event::Expire { id, generation } => {
                let live = self
                    .manager
                    .get(id)
                    .is_some_and(|n| n.id == id && n.generation == generation);
                if live {
                    self.manager.expire_id(id).await;
                } else {
                    debug!(id, generation, "stale expiry timer, ignoring");
                }
            }

            Event::SelectorDone { id, output, reply } => {
                self.manager.selector_done(id, output, reply).await;
            }

            Event::Surface(surface_event) => {
                self.manager.handle_surface_event(surface_event);
            }

            Event::CtrlList { reply } => {
                let _ = reply.send(self.manager.list_entries());
            }

            Event::CtrlPause { reply } => {
                self.manager.pause();
                let _ = reply.send(());
            }

            Event::CtrlUnpause { reply } => {
                self.manager.unpause();
                let _ = reply.send(());
            }

            Event::CtrlDismiss { id, reply } => {
                let dismissed = self.manager.dismiss_id(id).await;
                let _ = reply.send(dismissed);
            }

            Event::CtrlDismissAll { reply } => {
                let ok = self.manager.dismiss_all().await;
                let _ = reply.send(ok);
            }

            Event::CtrlActions { id, reply } => {
                self.manager.start_action_selection(id, reply);
            }

            Event::CtrlDefaultAction { id, reply } => {
                let result = match self.manager.get(id).map(|n| n.id) {
                    Some(real_id) => {
                        self.manager.signal_action(real_id, "default").await;
                        if self.manager.dismiss_id(real_id).await {
                            Reply::Ok
                        } else {
                            Reply::InvalidId
                        }
                    }
                    None => Reply::InvalidId,
                };
                let _ = reply.send(result);
            }

            Event::Quit { reply } => {
                let _ = reply.send(());
                return ControlFlow::Break(());
            }

            Event::Shutdown => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }
}
