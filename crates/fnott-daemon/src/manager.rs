//! The notification manager: collection ownership, identity resolution,
//! urgency-ordered stacking, lifecycle operations and the refresh pass.

use std::sync::Arc;

use fnott_config::{Config, ProgressStyle, StackingOrder, Urgency};
use fnott_icons::IconIndex;
use fnott_protocol::{ListEntry, Reply};
use fnott_render::{
    compositor, format, format::FormatContent, image as img_pipeline, layout, FontSystem,
    ImageSource, LayoutOptions, Raster,
};
use fnott_wayland::{
    Buffer, Subpixel, SurfaceBackend, SurfaceEvent, SurfaceId, SurfaceMargins, SurfaceRequest,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::entities::EntityMatcher;
use crate::events::{Event, NotifyRequest};
use crate::notification::{Action, DeferredState, Notification, NotifFonts, SurfaceState};
use crate::selector;
use crate::signals::{CloseReason, SignalSink};
use crate::sound;
use crate::timeout;

/// Owns every live notification and the resources they render with.
pub struct NotificationManager<B: SurfaceBackend> {
    config: Arc<Config>,
    backend: B,
    fonts: FontSystem,
    icons: Arc<IconIndex>,
    entities: EntityMatcher,
    signals: Box<dyn SignalSink>,
    events_tx: UnboundedSender<Event>,
    /// The stack; index 0 is the head ("current" notification).
    notifs: Vec<Notification>,
    next_id: u32,
    next_generation: u64,
    paused: bool,
}

impl<B: SurfaceBackend> NotificationManager<B> {
    /// Creates an empty manager.
    pub fn new(
        config: Arc<Config>,
        backend: B,
        icons: Arc<IconIndex>,
        signals: Box<dyn SignalSink>,
        events_tx: UnboundedSender<Event>,
    ) -> Self {
        Self {
            config,
            backend,
            fonts: FontSystem::new(),
            icons,
            entities: EntityMatcher::new(),
            signals,
            events_tx,
            notifs: Vec::new(),
            next_id: 1,
            next_generation: 1,
            paused: false,
        }
    }

    /// Number of live notifications.
    pub fn len(&self) -> usize {
        self.notifs.len()
    }

    /// Whether no notifications are live.
    pub fn is_empty(&self) -> bool {
        self.notifs.is_empty()
    }

    /// Whether new-notification display is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pauses display of new notifications.
    pub fn pause(&mut self) {
        info!("pausing");
        self.paused = true;
    }

    /// Resumes display of new notifications.
    pub fn unpause(&mut self) {
        info!("unpausing");
        self.paused = false;
    }

    /// Read access to the surface backend (tests, activation tokens).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the surface backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn position(&self, id: u32) -> Option<usize> {
        if id == 0 {
            return (!self.notifs.is_empty()).then_some(0);
        }
        self.notifs.iter().position(|n| n.id == id)
    }

    /// Looks a notification up by id; `0` targets the head of the stack.
    pub fn get(&self, id: u32) -> Option<&Notification> {
        self.position(id).map(|idx| &self.notifs[idx])
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut Notification> {
        self.position(id).map(|idx| &mut self.notifs[idx])
    }

    /// Looks a notification up by its sync tag.
    pub fn get_by_sync_tag(&self, tag: &str) -> Option<&Notification> {
        self.notifs
            .iter()
            .find(|n| n.sync_tag.as_deref() == Some(tag))
    }

    /// Looks a notification up by its surface handle.
    pub fn get_by_surface(&self, surface: SurfaceId) -> Option<&Notification> {
        self.notifs
            .iter()
            .find(|n| n.surface.surface == Some(surface))
    }

    fn position_by_surface(&self, surface: SurfaceId) -> Option<usize> {
        self.notifs
            .iter()
            .position(|n| n.surface.surface == Some(surface))
    }

    /// Ids of all live notifications, head of the stack first.
    pub fn ids(&self) -> Vec<u32> {
        self.notifs.iter().map(|n| n.id).collect()
    }

    /// Control-socket list records, head of the stack first.
    pub fn list_entries(&self) -> Vec<ListEntry> {
        self.notifs
            .iter()
            .map(|n| ListEntry {
                id: n.id,
                summary: n.summary_string(),
            })
            .collect()
    }

    /// Insertion index keeping the stack non-increasing in urgency from
    /// head to tail: directly after the last entry at least as urgent.
    fn stack_position(&self, urgency: Urgency) -> usize {
        for (idx, notif) in self.notifs.iter().enumerate().rev() {
            if notif.urgency >= urgency {
                return idx + 1;
            }
        }
        0
    }

    /// Resolves a `Notify` request to a notification, creating one when
    /// neither the sync tag nor `replaces_id` matches. Returns the id.
    ///
    /// The caller is expected to re-apply content and then refresh.
    pub fn create_notif(&mut self, replaces_id: u32, sync_tag: Option<&str>) -> u32 {
        if let Some(tag) = sync_tag {
            if let Some(existing) = self.get_by_sync_tag(tag) {
                return existing.id;
            }
        }

        if replaces_id != 0 {
            if let Some(existing) = self.get(replaces_id) {
                return existing.id;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let generation = self.next_generation;
        self.next_generation += 1;

        let notif = Notification::new(id, generation, sync_tag.map(str::to_owned));
        let idx = self.stack_position(notif.urgency);
        self.notifs.insert(idx, notif);

        self.reload_default_icon(id);
        self.reload_timeout(id);

        debug!(id, "notification created");
        id
    }

    /// Sets the application name.
    pub fn set_application(&mut self, id: u32, text: &str) {
        if let Some(notif) = self.get_mut(id) {
            notif.app = text.chars().collect();
        }
    }

    /// Sets the summary, decoding HTML entities.
    pub fn set_summary(&mut self, id: u32, text: &str) {
        let decoded = self.entities.decode(text);
        if let Some(notif) = self.get_mut(id) {
            notif.summary = decoded;
        }
    }

    /// The decoded summary.
    pub fn get_summary(&self, id: u32) -> Option<String> {
        self.get(id).map(Notification::summary_string)
    }

    /// Sets the body, decoding HTML entities.
    pub fn set_body(&mut self, id: u32, text: &str) {
        let decoded = self.entities.decode(text);
        if let Some(notif) = self.get_mut(id) {
            notif.body = decoded;
        }
    }

    /// Sets the urgency, re-stacking the notification and reloading its
    /// timer and default icon. Fonts follow lazily on the next frame.
    pub fn set_urgency(&mut self, id: u32, urgency: Urgency) {
        let Some(idx) = self.position(id) else {
            return;
        };

        if self.notifs[idx].urgency == urgency {
            return;
        }

        let mut notif = self.notifs.remove(idx);
        notif.urgency = urgency;
        let new_idx = self.stack_position(urgency);
        self.notifs.insert(new_idx, notif);

        self.reload_timeout(id);
        self.reload_default_icon(id);
    }

    /// Sets the progress value; `-1` disables the progress region.
    pub fn set_progress(&mut self, id: u32, progress: i8) {
        if let Some(notif) = self.get_mut(id) {
            notif.progress = progress;
        }
    }

    /// Sets the requested timeout and re-arms the timer.
    pub fn set_timeout(&mut self, id: u32, timeout_ms: i32) {
        if let Some(notif) = self.get_mut(id) {
            notif.timeout_ms = timeout_ms;
        }
        self.reload_timeout(id);
    }

    /// Replaces the action list.
    pub fn set_actions(&mut self, id: u32, actions: Vec<(String, String)>) {
        if let Some(notif) = self.get_mut(id) {
            notif.actions = actions
                .into_iter()
                .map(|(action_id, label)| Action {
                    id: action_id,
                    label,
                })
                .collect();
        }
    }

    /// Attaches a sender-provided image.
    pub fn set_image(&mut self, id: u32, raster: Raster) {
        if let Some(notif) = self.get_mut(id) {
            notif.image = Some(raster);
            notif.image_is_custom = true;
        }
    }

    /// Re-resolves the per-urgency default icon; sender-provided images
    /// are left alone.
    fn reload_default_icon(&mut self, id: u32) {
        let Some(idx) = self.position(id) else {
            return;
        };
        if self.notifs[idx].image_is_custom {
            return;
        }

        let urgency = self.notifs[idx].urgency;
        let raster = self
            .config
            .urgency(urgency)
            .icon
            .as_ref()
            .and_then(|name| self.load_icon(name));
        self.notifs[idx].image = raster;
    }

    /// Loads and prepares a themed icon (or icon path) for display.
    fn load_icon(&self, name: &str) -> Option<Raster> {
        let max_size = self.config.max_icon_size;
        if max_size == 0 {
            return None;
        }

        match self.icons.load(name, max_size as i32) {
            Ok(Some(img)) => {
                let img = img_pipeline::rescale(img, max_size, self.config.scaling_filter);
                Some(Raster::from_rgba(&img))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(icon = name, error = %e, "cannot load icon");
                None
            }
        }
    }

    fn reload_timeout(&mut self, id: u32) {
        let Some(idx) = self.position(id) else {
            return;
        };
        let urgency = self.notifs[idx].urgency;
        let idle = self.backend.is_idle(urgency);
        timeout::reload(
            &mut self.notifs[idx],
            self.config.urgency(urgency),
            idle,
            &self.events_tx,
        );
    }

    /// Re-arms every notification's timer, honoring the current idle
    /// state. Called when the seat's idle state changes.
    pub fn reload_timeouts(&mut self) {
        for id in self.ids() {
            self.reload_timeout(id);
        }
    }

    async fn destroy_at(&mut self, idx: usize, reason: CloseReason) {
        let mut notif = self.notifs.remove(idx);
        notif.cancel_timer();
        if let Some(surface) = notif.surface.surface.take() {
            self.backend.destroy(surface);
        }

        debug!(id = notif.id, ?reason, "notification destroyed");
        self.signals.notification_closed(notif.id, reason).await;
    }

    /// Dismisses a notification on the user's behalf; `0` targets the
    /// head. Destruction is deferred while an action selector runs.
    pub async fn dismiss_id(&mut self, id: u32) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };

        match self.notifs[idx].deferred_dismissal {
            DeferredState::Immediate => {
                self.destroy_at(idx, CloseReason::Dismissed).await;
                self.refresh();
                true
            }
            DeferredState::Deferred => {
                self.notifs[idx].deferred_dismissal = DeferredState::Delayed;
                true
            }
            DeferredState::Delayed => true,
        }
    }

    /// Expires a notification; `0` targets the head. Destruction is
    /// deferred while an action selector runs.
    pub async fn expire_id(&mut self, id: u32) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };

        match self.notifs[idx].deferred_expiry {
            DeferredState::Immediate => {
                self.destroy_at(idx, CloseReason::Expired).await;
                self.refresh();
                true
            }
            DeferredState::Deferred => {
                self.notifs[idx].deferred_expiry = DeferredState::Delayed;
                true
            }
            DeferredState::Delayed => true,
        }
    }

    /// Dismisses everything; notifications guarded by a running selector
    /// are marked for dismissal on completion.
    pub async fn dismiss_all(&mut self) -> bool {
        let mut idx = 0;
        while idx < self.notifs.len() {
            match self.notifs[idx].deferred_dismissal {
                DeferredState::Immediate => {
                    self.destroy_at(idx, CloseReason::Dismissed).await;
                }
                DeferredState::Deferred => {
                    self.notifs[idx].deferred_dismissal = DeferredState::Delayed;
                    idx += 1;
                }
                DeferredState::Delayed => idx += 1,
            }
        }

        self.refresh();
        true
    }

    /// Handles a bus `CloseNotification`: destroys outright (the deferred
    /// machine does not apply to method-initiated closes).
    pub async fn close_notification(&mut self, id: u32) -> bool {
        if id == 0 {
            return false;
        }
        let Some(idx) = self.position(id) else {
            return false;
        };

        self.destroy_at(idx, CloseReason::Closed).await;
        self.refresh();
        true
    }

    /// Emits `ActionInvoked` (preceded by `ActivationToken` when the
    /// compositor provides one) for a known action id.
    pub async fn signal_action(&mut self, id: u32, action_id: &str) -> bool {
        let Some(notif) = self.get(id) else {
            return false;
        };
        if notif.action_by_id(action_id).is_none() {
            return false;
        }

        let token = notif
            .surface
            .surface
            .and_then(|surface| self.backend.activation_token(surface));

        if let Some(token) = token {
            self.signals.activation_token(id, &token).await;
        }
        self.signals.action_invoked(id, action_id).await;
        true
    }

    /// Starts the action selector for `id`; `reply` resolves when the
    /// selector completes (or immediately on the error paths).
    pub fn start_action_selection(&mut self, id: u32, reply: oneshot::Sender<Reply>) {
        let Some(idx) = self.position(id) else {
            let _ = reply.send(Reply::InvalidId);
            return;
        };
        let id = self.notifs[idx].id;

        if self.notifs[idx].actions.is_empty() {
            let _ = reply.send(Reply::NoActions);
            return;
        }

        let argv = match fnott_config::spawn::tokenize(&self.config.selection_helper) {
            Ok(argv) => argv,
            Err(e) => {
                warn!(helper = %self.config.selection_helper, error = %e, "bad selection-helper command line");
                let _ = reply.send(Reply::Error);
                return;
            }
        };

        let labels: Vec<String> = self.notifs[idx]
            .actions
            .iter()
            .map(|a| a.label.clone())
            .collect();

        match selector::launch(
            &argv,
            &labels,
            self.config.selection_helper_uses_null_separator,
        ) {
            Ok(sel) => {
                self.notifs[idx].deferred_dismissal = DeferredState::Deferred;
                self.notifs[idx].deferred_expiry = DeferredState::Deferred;
                sel.complete(id, Some(reply), &self.events_tx);
            }
            Err(e) => {
                warn!(error = %e, "cannot start the selection helper");
                let _ = reply.send(Reply::Error);
            }
        }
    }

    /// Finishes an action selection: correlates the child's output with
    /// the (possibly already dismissed) notification, signals the chosen
    /// action, answers the waiting control client, and honors any destroy
    /// request queued while the selector ran.
    pub async fn selector_done(
        &mut self,
        id: u32,
        output: Option<String>,
        reply: Option<oneshot::Sender<Reply>>,
    ) {
        let idx = self.notifs.iter().position(|n| n.id == id);

        let action_id = match (idx, output.as_deref()) {
            (Some(idx), Some(label)) => self.notifs[idx]
                .action_by_label(label)
                .map(|a| a.id.clone()),
            _ => None,
        };

        if idx.is_none() {
            warn!(
                id,
                chosen = output.as_deref(),
                "notification was dismissed before the action could be signalled"
            );
        } else if let (Some(label), None) = (output.as_deref(), action_id.as_deref()) {
            warn!(id, label, "cannot map the chosen label to an action id");
        }

        let result = match action_id.as_deref() {
            Some(action_id) => {
                if self.signal_action(id, action_id).await {
                    Reply::Ok
                } else {
                    Reply::Error
                }
            }
            None => Reply::InvalidId,
        };
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }

        // Honor destroy requests queued while the selector was running.
        let Some(idx) = self.notifs.iter().position(|n| n.id == id) else {
            return;
        };

        let expiry = self.notifs[idx].deferred_expiry;
        let dismissal = self.notifs[idx].deferred_dismissal;
        self.notifs[idx].deferred_expiry = DeferredState::Immediate;
        self.notifs[idx].deferred_dismissal = DeferredState::Immediate;

        if expiry == DeferredState::Delayed {
            self.expire_id(id).await;
        } else if dismissal == DeferredState::Delayed {
            self.dismiss_id(id).await;
        }
    }

    /// Applies a full `Notify` request.
    ///
    /// When paused, nothing is created and the echoed `replaces_id` keeps
    /// the bus reply well-formed.
    pub fn notify(&mut self, request: NotifyRequest) -> u32 {
        if self.paused {
            debug!("paused, refusing to notify");
            return request.replaces_id;
        }

        let id = self.create_notif(request.replaces_id, request.sync_tag.as_deref());

        self.set_application(id, &request.app_name);
        self.set_summary(id, &request.summary);
        self.set_body(id, &request.body);
        self.set_urgency(id, request.urgency);
        self.set_progress(id, request.progress);
        self.set_timeout(id, request.timeout_ms);

        let raster = self
            .prepare_custom_image(request.image.as_ref())
            .or_else(|| self.resolve_app_icon(&request.app_icon, &request.app_name));
        if let Some(raster) = raster {
            self.set_image(id, raster);
        }

        self.set_actions(id, request.actions);
        sound::play(&self.config, request.urgency);
        self.refresh();

        id
    }

    fn prepare_custom_image(&self, source: Option<&ImageSource>) -> Option<Raster> {
        let source = source?;
        match img_pipeline::prepare(source, self.config.max_icon_size, self.config.scaling_filter)
        {
            Ok(raster) => raster,
            Err(e) => {
                warn!(error = %e, "ignoring notification image");
                None
            }
        }
    }

    /// Falls back to the `app_icon` argument (URI, path or themed name),
    /// then to the lower-cased application name as a themed icon.
    fn resolve_app_icon(&self, app_icon: &str, app_name: &str) -> Option<Raster> {
        let name = if app_icon.is_empty() {
            app_name.to_lowercase()
        } else if let Some(path) = img_pipeline::uri_to_path(app_icon) {
            path.display().to_string()
        } else {
            app_icon.to_owned()
        };

        if name.is_empty() {
            return None;
        }
        self.load_icon(&name)
    }

    /// Lays out and commits every live notification, walking the stack in
    /// the configured direction with a running y cursor.
    pub fn refresh(&mut self) {
        let mut y = self.config.margins.vertical;

        let order: Vec<u32> = match self.config.stacking_order {
            StackingOrder::BottomUp => self.notifs.iter().rev().map(|n| n.id).collect(),
            StackingOrder::TopDown => self.ids(),
        };

        for id in order {
            let Some(idx) = self.position(id) else {
                continue;
            };

            match self.show_at(idx, y) {
                Ok(height) => y += height + self.config.margins.between,
                Err(e) => {
                    // Contained to this notification: no signal, no reply,
                    // just gone.
                    warn!(id, error = %e, "dropping notification, cannot display it");
                    let mut notif = self.notifs.remove(idx);
                    notif.cancel_timer();
                    if let Some(surface) = notif.surface.surface.take() {
                        self.backend.destroy(surface);
                    }
                }
            }
        }
    }

    /// Renders one frame for the notification at `idx`, placed at stack
    /// offset `y`. Returns its final height.
    fn show_at(&mut self, idx: usize, y: i32) -> Result<i32, fnott_wayland::Error> {
        let Self {
            config,
            backend,
            fonts: font_system,
            notifs,
            ..
        } = self;

        let notif = &mut notifs[idx];
        let uconf = config.urgency(notif.urgency);

        // Until the surface exists, adopt the preferred output's
        // properties; afterwards they track enter/update events.
        if notif.surface.surface.is_none() {
            let output = backend.output();
            notif.scale = output.scale.max(1.0);
            notif.dpi = output.dpi;
            notif.subpixel = output.subpixel;
        }

        if !reload_fonts(notif, font_system, config) {
            // Fonts unavailable; keep the notification alive but skip the
            // frame.
            return Ok(0);
        }
        let Some(class_fonts) = &notif.fonts else {
            return Ok(0);
        };

        let subpixel = if uconf.background.is_opaque() {
            notif.subpixel
        } else {
            Subpixel::None
        };

        let pad_h = uconf.padding.horizontal;
        let pad_v = uconf.padding.vertical;

        let mut indent = pad_h;
        if let Some(img) = &notif.image {
            indent += img.width() as i32 + pad_h;
        }

        let content = FormatContent {
            app: &notif.app,
            summary: &notif.summary,
            body: &notif.body,
            has_actions: !notif.actions.is_empty(),
        };
        let title = format::expand(&uconf.app.format, &content);
        let summary = format::expand(&uconf.summary.format, &content);
        let body = format::expand(&uconf.body.format, &content);

        let mut glyphs = Vec::new();
        let mut width = 0;
        let mut height = pad_v;

        let blocks = [
            (&title, &class_fonts.app, uconf.app.color),
            (&summary, &class_fonts.summary, uconf.summary.color),
            (&body, &class_fonts.body, uconf.body.color),
        ];
        for (text, fonts, color) in blocks {
            if text.is_empty() {
                continue;
            }

            let opts = LayoutOptions {
                left_pad: indent,
                right_pad: pad_h,
                y: height,
                max_y: (config.max_height > 0).then(|| config.max_height - pad_v),
                min_width: config.min_width,
                max_width: config.max_width,
                line_height: fonts.line_height(),
                color,
            };
            let extent =
                layout::layout_text(text, fonts, subpixel, &mut notif.run_cache, &opts, &mut glyphs);
            width = width.max(extent.width);
            height += extent.height;
        }

        if let Some(img) = &notif.image {
            height = height.max(pad_v + img.height() as i32 + pad_v);
            width = width.max(pad_h + img.width() as i32 + pad_h);
        }

        let pbar_height = uconf.progress.height;
        let mut pbar_y = -1;
        if notif.progress >= 0 && uconf.progress.style == ProgressStyle::Bar {
            let bar_y = height + class_fonts.body.line_height();
            if config.max_height == 0 || bar_y + pbar_height <= config.max_height - pad_v {
                pbar_y = bar_y;
                height += class_fonts.body.line_height() + pbar_height;
                width = width.max(3 * pad_h);
            }
        }

        height += pad_v;
        if config.max_height > 0 {
            height = height.min(config.max_height);
        }

        // Width and height must be divisible by the scale.
        let scale = notif.scale;
        let logical = |v: i32| ((v as f32 / scale).round() as i32).max(1);
        let snap = |v: i32| ((v as f32 / scale).round() * scale).round() as i32;
        let width = snap(width.max(1));
        let height = snap(height.max(1));

        let surface = match notif.surface.surface {
            Some(surface) => {
                backend.set_size(surface, logical(width) as u32, logical(height) as u32);
                surface
            }
            None => {
                let surface = backend.create(&SurfaceRequest {
                    layer: uconf.layer,
                    anchor: config.anchor,
                    width: logical(width) as u32,
                    height: logical(height) as u32,
                })?;
                notif.surface.surface = Some(surface);
                notif.surface.state = SurfaceState::Unattached;
                surface
            }
        };

        let top_anchored = config.anchor.is_top();
        backend.set_margins(
            surface,
            SurfaceMargins {
                top: if top_anchored {
                    logical(y)
                } else {
                    logical(config.margins.vertical)
                },
                right: logical(config.margins.horizontal),
                bottom: if top_anchored {
                    logical(config.margins.between)
                } else {
                    logical(y)
                },
                left: logical(config.margins.horizontal),
            },
        );

        let mut buf = Buffer::new(width as u32, height as u32);
        compositor::draw_background(&mut buf, uconf, notif.progress);

        if let Some(img) = &notif.image {
            let img_y = (height
                - img.height() as i32
                - if pbar_y >= 0 { pbar_height } else { 0 })
                / 2;
            compositor::draw_image(&mut buf, img, pad_h, img_y);
        }

        compositor::draw_glyphs(&mut buf, &glyphs);

        if pbar_y >= 0 {
            compositor::draw_progress_bar(
                &mut buf,
                &uconf.progress,
                notif.progress,
                pbar_y,
                pad_h,
                scale,
            );
        }

        match notif.surface.state {
            SurfaceState::Unattached | SurfaceState::AwaitingFrame => {
                // Not configured yet, or a frame is in flight: park the
                // buffer and commit only the size/margin updates.
                notif.surface.pending = Some(buf);
                backend.commit(surface);
            }
            SurfaceState::Configured | SurfaceState::Committed => {
                notif.surface.pending = None;
                notif.surface.state = SurfaceState::AwaitingFrame;
                backend.attach(surface, buf);
            }
        }

        notif.y = y;
        Ok(height)
    }

    /// Reacts to a surface backend event.
    pub fn handle_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Configured { surface } => {
                let Some(idx) = self.position_by_surface(surface) else {
                    return;
                };

                let notif = &mut self.notifs[idx];
                if notif.surface.state == SurfaceState::Unattached {
                    notif.surface.state = SurfaceState::Configured;
                }

                if notif.surface.state != SurfaceState::AwaitingFrame {
                    if let Some(buf) = notif.surface.pending.take() {
                        notif.surface.state = SurfaceState::AwaitingFrame;
                        self.backend.attach(surface, buf);
                        return;
                    }
                }

                // The configure ack must be followed by a commit.
                let y = self.notifs[idx].y;
                if let Err(e) = self.show_at(idx, y) {
                    warn!(error = %e, "cannot redraw after configure");
                }
            }
            SurfaceEvent::FrameDone { surface } => {
                let Some(idx) = self.position_by_surface(surface) else {
                    return;
                };

                let notif = &mut self.notifs[idx];
                if let Some(buf) = notif.surface.pending.take() {
                    notif.surface.state = SurfaceState::AwaitingFrame;
                    self.backend.attach(surface, buf);
                } else {
                    notif.surface.state = SurfaceState::Committed;
                }
            }
            SurfaceEvent::Closed { surface } => {
                let Some(idx) = self.position_by_surface(surface) else {
                    return;
                };

                self.backend.destroy(surface);
                let notif = &mut self.notifs[idx];
                notif.surface.reset();
                notif.fonts = None;
            }
            SurfaceEvent::OutputChanged { surface, info } => {
                let Some(idx) = self.position_by_surface(surface) else {
                    return;
                };

                let notif = &mut self.notifs[idx];
                notif.scale = info.scale.max(1.0);
                notif.dpi = info.dpi;
                notif.subpixel = info.subpixel;
                self.refresh();
            }
            SurfaceEvent::IdleChanged { urgency, idle } => {
                debug!(%urgency, idle, "seat idle state changed");
                self.reload_timeouts();
            }
        }
    }
}

/// Reloads the per-class font sets when DPI, scale, DPI-awareness or
/// urgency changed since the last load. Returns whether usable fonts are
/// available afterwards.
fn reload_fonts(notif: &mut Notification, fonts: &mut FontSystem, config: &Config) -> bool {
    let needs_reload = match &notif.fonts {
        None => true,
        Some(loaded) => {
            loaded.dpi_aware != config.dpi_aware
                || loaded.urgency != notif.urgency
                || (if config.dpi_aware {
                    loaded.dpi != notif.dpi
                } else {
                    loaded.scale != notif.scale
                })
        }
    };

    if !needs_reload {
        return true;
    }

    let uconf = config.urgency(notif.urgency);
    let dpi_aware = config.dpi_aware;

    let app = fonts.load_set(&uconf.app.font, dpi_aware, notif.scale, notif.dpi);
    let summary = fonts.load_set(&uconf.summary.font, dpi_aware, notif.scale, notif.dpi);
    let body = fonts.load_set(&uconf.body.font, dpi_aware, notif.scale, notif.dpi);
    let action = fonts.load_set(&uconf.action.font, dpi_aware, notif.scale, notif.dpi);

    match (app, summary, body, action) {
        (Ok(app), Ok(summary), Ok(body), Ok(action)) => {
            notif.fonts = Some(NotifFonts {
                app,
                summary,
                body,
                action,
                dpi: notif.dpi,
                scale: notif.scale,
                dpi_aware,
                urgency: notif.urgency,
            });
            true
        }
        (app, ..) => {
            if let Err(e) = app {
                warn!(id = notif.id, error = %e, "cannot load fonts");
            }
            // Stale fonts are better than no frame at all.
            notif.fonts.is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fnott_wayland::HeadlessBackend;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Emitted {
        Closed(u32, u32),
        Action(u32, String),
        Token(u32, String),
    }

    #[derive(Default)]
    struct Capture(Arc<Mutex<Vec<Emitted>>>);

    #[async_trait]
    impl SignalSink for Capture {
        async fn notification_closed(&self, id: u32, reason: CloseReason) {
            self.0.lock().unwrap().push(Emitted::Closed(id, reason as u32));
        }

        async fn action_invoked(&self, id: u32, action_key: &str) {
            self.0
                .lock()
                .unwrap()
                .push(Emitted::Action(id, action_key.to_owned()));
        }

        async fn activation_token(&self, id: u32, token: &str) {
            self.0
                .lock()
                .unwrap()
                .push(Emitted::Token(id, token.to_owned()));
        }
    }

    struct Fixture {
        manager: NotificationManager<HeadlessBackend>,
        signals: Arc<Mutex<Vec<Emitted>>>,
        events: UnboundedReceiver<Event>,
    }

    fn fixture() -> Fixture {
        fixture_with(Config::default())
    }

    fn fixture_with(config: Config) -> Fixture {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (surface_tx, _surface_rx) = mpsc::unbounded_channel();

        let capture = Capture::default();
        let signals = Arc::clone(&capture.0);

        let manager = NotificationManager::new(
            Arc::new(config),
            HeadlessBackend::new(surface_tx),
            Arc::new(IconIndex::with_base_dirs("default", &[])),
            Box::new(capture),
            events_tx,
        );

        Fixture {
            manager,
            signals,
            events,
        }
    }

    fn emitted(fix: &Fixture) -> Vec<Emitted> {
        fix.signals.lock().unwrap().clone()
    }

    fn request(summary: &str) -> NotifyRequest {
        NotifyRequest {
            app_name: "test".to_owned(),
            replaces_id: 0,
            app_icon: String::new(),
            summary: summary.to_owned(),
            body: String::new(),
            actions: Vec::new(),
            urgency: Urgency::Normal,
            sync_tag: None,
            progress: -1,
            image: None,
            timeout_ms: -1,
        }
    }

    #[tokio::test]
    async fn ids_are_allocated_monotonically_from_one() {
        let mut fix = fixture();

        let first = fix.manager.create_notif(0, None);
        let second = fix.manager.create_notif(0, None);

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn sync_tag_coalesces_into_one_notification() {
        let mut fix = fixture();

        let first = fix.manager.create_notif(0, Some("upload"));
        let second = fix.manager.create_notif(0, Some("upload"));

        assert_eq!(first, second);
        assert_eq!(fix.manager.len(), 1);
    }

    #[tokio::test]
    async fn replaces_id_returns_the_existing_notification() {
        let mut fix = fixture();

        let id = fix.manager.create_notif(0, None);
        let replaced = fix.manager.create_notif(id, None);

        assert_eq!(replaced, id);
        assert_eq!(fix.manager.len(), 1);
    }

    #[tokio::test]
    async fn nonexistent_replaces_id_allocates_a_new_notification() {
        let mut fix = fixture();

        let id = fix.manager.create_notif(99, None);
        assert_eq!(fix.manager.len(), 1);

        let again = fix.manager.create_notif(id, None);
        assert_eq!(again, id);
        assert_eq!(fix.manager.len(), 1);
    }

    #[tokio::test]
    async fn stack_orders_higher_urgency_first() {
        let mut fix = fixture();

        let normal = fix.manager.create_notif(0, None);
        let low = fix.manager.create_notif(0, None);
        fix.manager.set_urgency(low, Urgency::Low);
        let critical = fix.manager.create_notif(0, None);
        fix.manager.set_urgency(critical, Urgency::Critical);

        assert_eq!(fix.manager.ids(), vec![critical, normal, low]);
    }

    #[tokio::test]
    async fn equal_urgency_preserves_insertion_order() {
        let mut fix = fixture();

        let first = fix.manager.create_notif(0, None);
        let second = fix.manager.create_notif(0, None);

        assert_eq!(fix.manager.ids(), vec![first, second]);
    }

    #[tokio::test]
    async fn set_summary_decodes_html_entities() {
        let mut fix = fixture();
        let id = fix.manager.create_notif(0, None);

        fix.manager.set_summary(id, "A &amp; B");

        assert_eq!(fix.manager.get_summary(id).as_deref(), Some("A & B"));
    }

    #[tokio::test]
    async fn dismiss_destroys_and_signals_reason_two() {
        let mut fix = fixture();
        let id = fix.manager.create_notif(0, None);

        assert!(fix.manager.dismiss_id(id).await);
        assert!(!fix.manager.dismiss_id(id).await);
        assert_eq!(emitted(&fix), vec![Emitted::Closed(id, 2)]);
    }

    #[tokio::test]
    async fn expire_signals_reason_one() {
        let mut fix = fixture();
        let id = fix.manager.create_notif(0, None);

        assert!(fix.manager.expire_id(id).await);

        assert_eq!(emitted(&fix), vec![Emitted::Closed(id, 1)]);
    }

    #[tokio::test]
    async fn close_notification_signals_reason_three() {
        let mut fix = fixture();
        let id = fix.manager.create_notif(0, None);

        assert!(fix.manager.close_notification(id).await);
        assert!(!fix.manager.close_notification(id).await);
        assert_eq!(emitted(&fix), vec![Emitted::Closed(id, 3)]);
    }

    #[tokio::test]
    async fn id_zero_targets_the_head_of_the_stack() {
        let mut fix = fixture();
        let normal = fix.manager.create_notif(0, None);
        let critical = fix.manager.create_notif(0, None);
        fix.manager.set_urgency(critical, Urgency::Critical);

        assert!(fix.manager.dismiss_id(0).await);

        assert_eq!(fix.manager.ids(), vec![normal]);
        assert_eq!(emitted(&fix), vec![Emitted::Closed(critical, 2)]);
    }

    #[tokio::test]
    async fn notify_while_paused_echoes_replaces_id_without_creating() {
        let mut fix = fixture();
        fix.manager.pause();

        let mut req = request("hi");
        req.replaces_id = 17;
        let id = fix.manager.notify(req);

        assert_eq!(id, 17);
        assert!(fix.manager.is_empty());
        assert!(emitted(&fix).is_empty());

        fix.manager.unpause();
        let id = fix.manager.notify(request("hi"));
        assert_eq!(fix.manager.len(), 1);
        assert_ne!(id, 0);
    }

    #[tokio::test]
    async fn notify_replace_by_sync_tag_updates_in_place() {
        let mut fix = fixture();

        let mut req = request("Upload");
        req.sync_tag = Some("up".to_owned());
        req.progress = 1;
        let first = fix.manager.notify(req);

        let mut req = request("Upload");
        req.sync_tag = Some("up".to_owned());
        req.progress = 50;
        req.body = "50%".to_owned();
        let second = fix.manager.notify(req);

        assert_eq!(first, second);
        assert_eq!(fix.manager.len(), 1);
        let notif = fix.manager.get(first).unwrap();
        assert_eq!(notif.progress, 50);
        assert_eq!(notif.body.iter().collect::<String>(), "50%");
    }

    #[tokio::test]
    async fn deferred_dismiss_waits_for_the_selector() {
        let mut fix = fixture();
        let id = fix.manager.notify(NotifyRequest {
            actions: vec![
                ("open".to_owned(), "Open".to_owned()),
                ("later".to_owned(), "Later".to_owned()),
            ],
            ..request("pick one")
        });

        // Selector outstanding: a dismiss succeeds but defers.
        fix.manager.get_mut(id).unwrap().deferred_dismissal = DeferredState::Deferred;
        fix.manager.get_mut(id).unwrap().deferred_expiry = DeferredState::Deferred;

        assert!(fix.manager.dismiss_id(id).await);
        assert_eq!(fix.manager.len(), 1);
        assert!(emitted(&fix).is_empty());

        // Selector returns "Open": ActionInvoked, then the queued dismiss.
        fix.manager
            .selector_done(id, Some("Open".to_owned()), None)
            .await;

        assert!(fix.manager.is_empty());
        let signals = emitted(&fix);
        assert!(signals.contains(&Emitted::Action(id, "open".to_owned())));
        assert_eq!(*signals.last().unwrap(), Emitted::Closed(id, 2));

        assert!(!fix.manager.dismiss_id(id).await);
    }

    #[tokio::test]
    async fn deferred_expiry_wins_over_deferred_dismissal() {
        let mut fix = fixture();
        let id = fix.manager.notify(NotifyRequest {
            actions: vec![("open".to_owned(), "Open".to_owned())],
            ..request("x")
        });

        fix.manager.get_mut(id).unwrap().deferred_dismissal = DeferredState::Deferred;
        fix.manager.get_mut(id).unwrap().deferred_expiry = DeferredState::Deferred;

        assert!(fix.manager.expire_id(id).await);
        assert!(fix.manager.dismiss_id(id).await);

        fix.manager.selector_done(id, None, None).await;

        assert_eq!(*emitted(&fix).last().unwrap(), Emitted::Closed(id, 1));
    }

    #[tokio::test]
    async fn bulk_dismiss_defers_only_selector_guarded_notifications() {
        let mut fix = fixture();
        let guarded = fix.manager.notify(NotifyRequest {
            actions: vec![("open".to_owned(), "Open".to_owned())],
            ..request("one")
        });
        let plain = fix.manager.notify(request("two"));

        fix.manager.get_mut(guarded).unwrap().deferred_dismissal = DeferredState::Deferred;

        assert!(fix.manager.dismiss_all().await);

        assert_eq!(fix.manager.ids(), vec![guarded]);
        assert_eq!(emitted(&fix), vec![Emitted::Closed(plain, 2)]);

        fix.manager.selector_done(guarded, None, None).await;

        assert!(fix.manager.is_empty());
        assert_eq!(
            *emitted(&fix).last().unwrap(),
            Emitted::Closed(guarded, 2)
        );
    }

    #[tokio::test]
    async fn selector_result_for_a_dead_notification_is_logged_only() {
        let mut fix = fixture();
        let id = fix.manager.notify(NotifyRequest {
            actions: vec![("open".to_owned(), "Open".to_owned())],
            ..request("x")
        });

        fix.manager.close_notification(id).await;
        let before = emitted(&fix);

        fix.manager
            .selector_done(id, Some("Open".to_owned()), None)
            .await;

        assert_eq!(emitted(&fix), before);
    }

    #[tokio::test]
    async fn selection_reply_maps_labels_to_action_ids() {
        let mut fix = fixture();
        let id = fix.manager.notify(NotifyRequest {
            actions: vec![("open".to_owned(), "Open".to_owned())],
            ..request("x")
        });

        let (tx, rx) = oneshot::channel();
        fix.manager
            .selector_done(id, Some("Open".to_owned()), Some(tx))
            .await;

        assert_eq!(rx.await.unwrap(), Reply::Ok);
        assert!(emitted(&fix).contains(&Emitted::Action(id, "open".to_owned())));
    }

    #[tokio::test]
    async fn selection_reply_is_invalid_id_for_unknown_labels() {
        let mut fix = fixture();
        let id = fix.manager.notify(NotifyRequest {
            actions: vec![("open".to_owned(), "Open".to_owned())],
            ..request("x")
        });

        let (tx, rx) = oneshot::channel();
        fix.manager
            .selector_done(id, Some("Nope".to_owned()), Some(tx))
            .await;

        assert_eq!(rx.await.unwrap(), Reply::InvalidId);
    }

    #[tokio::test]
    async fn actions_by_id_rejects_unknown_and_actionless_notifications() {
        let mut fix = fixture();
        let plain = fix.manager.notify(request("no actions"));

        let (tx, rx) = oneshot::channel();
        fix.manager.start_action_selection(99, tx);
        assert_eq!(rx.await.unwrap(), Reply::InvalidId);

        let (tx, rx) = oneshot::channel();
        fix.manager.start_action_selection(plain, tx);
        assert_eq!(rx.await.unwrap(), Reply::NoActions);
    }

    #[tokio::test]
    async fn progress_is_stored_verbatim() {
        let mut fix = fixture();
        let id = fix.manager.create_notif(0, None);

        fix.manager.set_progress(id, -1);
        assert_eq!(fix.manager.get(id).unwrap().progress, -1);

        fix.manager.set_progress(id, 100);
        assert_eq!(fix.manager.get(id).unwrap().progress, 100);
    }

    #[tokio::test]
    async fn list_entries_follow_stack_order() {
        let mut fix = fixture();
        let a = fix.manager.notify(request("first"));
        let b = fix.manager.notify(NotifyRequest {
            urgency: Urgency::Critical,
            ..request("second")
        });

        let entries = fix.manager.list_entries();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, b);
        assert_eq!(entries[0].summary, "second");
        assert_eq!(entries[1].id, a);
    }

    #[tokio::test]
    async fn no_two_live_notifications_share_an_id_or_sync_tag() {
        let mut fix = fixture();

        for i in 0..5 {
            let mut req = request("r");
            if i % 2 == 0 {
                req.sync_tag = Some("even".to_owned());
            }
            fix.manager.notify(req);
        }

        let ids = fix.manager.ids();
        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());

        let tagged = ids
            .iter()
            .filter(|id| {
                fix.manager
                    .get(**id)
                    .is_some_and(|n| n.sync_tag.is_some())
            })
            .count();
        assert_eq!(tagged, 1);
    }

    #[tokio::test]
    async fn expire_event_generation_guard_is_available() {
        let mut fix = fixture();
        let id = fix.manager.create_notif(0, None);

        let generation = fix.manager.get(id).unwrap().generation;
        assert!(generation > 0);

        // Drain any events the fixture produced so far.
        while fix.events.try_recv().is_ok() {}
    }

    #[tokio::test]
    async fn idle_seat_disarms_timers_until_resume() {
        let mut config = Config::default();
        config.by_urgency[Urgency::Normal.index()].default_timeout_secs = 10;
        let mut fix = fixture_with(config);

        let id = fix.manager.create_notif(0, None);
        assert!(fix.manager.get(id).unwrap().timer.is_some());

        fix.manager.backend_mut().set_idle(Urgency::Normal, true);
        fix.manager.reload_timeouts();
        assert!(fix.manager.get(id).unwrap().timer.is_none());

        fix.manager.backend_mut().set_idle(Urgency::Normal, false);
        fix.manager.reload_timeouts();
        assert!(fix.manager.get(id).unwrap().timer.is_some());
    }

    #[tokio::test]
    async fn frame_scheduler_commits_pending_buffer_on_frame_done() {
        use fnott_config::{Anchor, Layer};
        use fnott_wayland::SurfaceRequest;

        let mut fix = fixture();
        let id = fix.manager.create_notif(0, None);

        let surface = fix
            .manager
            .backend_mut()
            .create(&SurfaceRequest {
                layer: Layer::Top,
                anchor: Anchor::TopRight,
                width: 10,
                height: 10,
            })
            .unwrap();

        {
            let notif = fix.manager.get_mut(id).unwrap();
            notif.surface.surface = Some(surface);
            notif.surface.state = SurfaceState::AwaitingFrame;
            notif.surface.pending = Some(Buffer::new(10, 10));
        }

        // First frame-done flushes the queued buffer and keeps a frame in
        // flight.
        fix.manager
            .handle_surface_event(SurfaceEvent::FrameDone { surface });
        let attachment = &fix.manager.get(id).unwrap().surface;
        assert_eq!(attachment.state, SurfaceState::AwaitingFrame);
        assert!(attachment.pending.is_none());
        assert_eq!(fix.manager.backend().surface(surface).unwrap().attaches, 1);

        // Second frame-done settles the surface.
        fix.manager
            .handle_surface_event(SurfaceEvent::FrameDone { surface });
        assert_eq!(
            fix.manager.get(id).unwrap().surface.state,
            SurfaceState::Committed
        );
    }

    #[tokio::test]
    async fn compositor_close_resets_the_surface_attachment() {
        use fnott_config::{Anchor, Layer};
        use fnott_wayland::SurfaceRequest;

        let mut fix = fixture();
        let id = fix.manager.create_notif(0, None);

        let surface = fix
            .manager
            .backend_mut()
            .create(&SurfaceRequest {
                layer: Layer::Top,
                anchor: Anchor::TopRight,
                width: 10,
                height: 10,
            })
            .unwrap();
        fix.manager.get_mut(id).unwrap().surface.surface = Some(surface);

        fix.manager
            .handle_surface_event(SurfaceEvent::Closed { surface });

        let notif = fix.manager.get(id).unwrap();
        assert!(notif.surface.surface.is_none());
        assert_eq!(notif.surface.state, SurfaceState::Unattached);
    }
}
