//! An in-memory surface backend.
//!
//! Implements the full [`SurfaceBackend`] contract without a display server:
//! surfaces are configured as soon as they are created, and frame callbacks
//! fire immediately after each attach (configurable for tests that need to
//! hold a frame open).

use std::collections::HashMap;

use fnott_config::Urgency;
use tracing::debug;

use crate::{
    Buffer, Error, EventSender, OutputInfo, SurfaceBackend, SurfaceEvent, SurfaceId,
    SurfaceMargins, SurfaceRequest,
};

/// State tracked per headless surface.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    /// Logical size last requested via `set_size` or `create`.
    pub size: (u32, u32),
    /// Margins last requested.
    pub margins: SurfaceMargins,
    /// The most recently attached buffer.
    pub committed: Option<Buffer>,
    /// Number of buffer attaches.
    pub attaches: u32,
    /// Number of bufferless commits.
    pub commits: u32,
}

/// A display-server-free [`SurfaceBackend`].
#[derive(Debug)]
pub struct HeadlessBackend {
    events: EventSender,
    output: OutputInfo,
    /// When false, `attach` withholds the `FrameDone` event until
    /// [`complete_frame`](Self::complete_frame) is called.
    auto_frame: bool,
    idle: [bool; 3],
    next_id: u64,
    surfaces: HashMap<SurfaceId, HeadlessSurface>,
}

impl HeadlessBackend {
    /// Creates a backend that delivers events on `events`.
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            output: OutputInfo::default(),
            auto_frame: true,
            idle: [false; 3],
            next_id: 1,
            surfaces: HashMap::new(),
        }
    }

    /// Disables automatic frame completion; frames must then be finished
    /// explicitly with [`complete_frame`](Self::complete_frame).
    pub fn hold_frames(mut self) -> Self {
        self.auto_frame = false;
        self
    }

    /// Overrides the reported output properties.
    pub fn with_output(mut self, output: OutputInfo) -> Self {
        self.output = output;
        self
    }

    /// Marks the seat idle (or active) for one urgency.
    pub fn set_idle(&mut self, urgency: Urgency, idle: bool) {
        self.idle[urgency.index()] = idle;
        let _ = self.events.send(SurfaceEvent::IdleChanged { urgency, idle });
    }

    /// Delivers the frame callback for `surface`.
    pub fn complete_frame(&self, surface: SurfaceId) {
        let _ = self.events.send(SurfaceEvent::FrameDone { surface });
    }

    /// Simulates the compositor closing `surface`.
    pub fn close_surface(&mut self, surface: SurfaceId) {
        self.surfaces.remove(&surface);
        let _ = self.events.send(SurfaceEvent::Closed { surface });
    }

    /// State of one surface, for assertions.
    pub fn surface(&self, surface: SurfaceId) -> Option<&HeadlessSurface> {
        self.surfaces.get(&surface)
    }

    /// Number of live surfaces.
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }
}

impl SurfaceBackend for HeadlessBackend {
    fn create(&mut self, request: &SurfaceRequest) -> Result<SurfaceId, Error> {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;

        self.surfaces.insert(
            id,
            HeadlessSurface {
                size: (request.width, request.height),
                ..HeadlessSurface::default()
            },
        );

        debug!(surface = id.0, ?request, "headless surface created");
        let _ = self.events.send(SurfaceEvent::Configured { surface: id });
        Ok(id)
    }

    fn set_size(&mut self, surface: SurfaceId, width: u32, height: u32) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.size = (width, height);
        }
    }

    fn set_margins(&mut self, surface: SurfaceId, margins: SurfaceMargins) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.margins = margins;
        }
    }

    fn commit(&mut self, surface: SurfaceId) {
        if let Some(state) = self.surfaces.get_mut(&surface) {
            state.commits += 1;
        }
    }

    fn attach(&mut self, surface: SurfaceId, buffer: Buffer) {
        let Some(state) = self.surfaces.get_mut(&surface) else {
            return;
        };

        state.committed = Some(buffer);
        state.attaches += 1;

        if self.auto_frame {
            let _ = self.events.send(SurfaceEvent::FrameDone { surface });
        }
    }

    fn destroy(&mut self, surface: SurfaceId) {
        self.surfaces.remove(&surface);
    }

    fn output(&self) -> OutputInfo {
        self.output.clone()
    }

    fn is_idle(&self, urgency: Urgency) -> bool {
        self.idle[urgency.index()]
    }

    fn activation_token(&self, surface: SurfaceId) -> Option<String> {
        self.surfaces
            .contains_key(&surface)
            .then(|| format!("headless-token-{}", surface.0))
    }
}

#[cfg(test)]
mod tests {
    use fnott_config::{Anchor, Layer};
    use tokio::sync::mpsc;

    use super::*;

    fn request() -> SurfaceRequest {
        SurfaceRequest {
            layer: Layer::Top,
            anchor: Anchor::TopRight,
            width: 100,
            height: 50,
        }
    }

    #[test]
    fn create_emits_configured() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = HeadlessBackend::new(tx);

        let id = backend.create(&request()).unwrap();

        assert_eq!(rx.try_recv().unwrap(), SurfaceEvent::Configured { surface: id });
    }

    #[test]
    fn attach_emits_frame_done_when_auto() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = HeadlessBackend::new(tx);
        let id = backend.create(&request()).unwrap();
        let _ = rx.try_recv();

        backend.attach(id, Buffer::new(100, 50));

        assert_eq!(rx.try_recv().unwrap(), SurfaceEvent::FrameDone { surface: id });
        assert_eq!(backend.surface(id).unwrap().attaches, 1);
    }

    #[test]
    fn held_frames_are_delivered_on_demand() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = HeadlessBackend::new(tx).hold_frames();
        let id = backend.create(&request()).unwrap();
        let _ = rx.try_recv();

        backend.attach(id, Buffer::new(100, 50));
        assert!(rx.try_recv().is_err());

        backend.complete_frame(id);
        assert_eq!(rx.try_recv().unwrap(), SurfaceEvent::FrameDone { surface: id });
    }

    #[test]
    fn idle_flag_is_tracked_per_urgency() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut backend = HeadlessBackend::new(tx);

        backend.set_idle(Urgency::Normal, true);

        assert!(backend.is_idle(Urgency::Normal));
        assert!(!backend.is_idle(Urgency::Critical));
    }

    #[test]
    fn destroy_forgets_the_surface() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut backend = HeadlessBackend::new(tx);
        let id = backend.create(&request()).unwrap();

        backend.destroy(id);

        assert!(backend.surface(id).is_none());
        assert!(backend.activation_token(id).is_none());
    }
}
