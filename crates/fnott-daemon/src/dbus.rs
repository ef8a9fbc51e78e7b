//! The `org.freedesktop.Notifications` bus object.
//!
//! The interface handler owns no notification state; every call is
//! forwarded to the event loop and the reply awaited on a oneshot. All
//! callbacks for one incoming message therefore run before the next
//! message is dispatched.

use std::collections::HashMap;

use fnott_config::Urgency;
use fnott_render::{ImageSource, RawImage};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::debug;
use zbus::zvariant::Value;
use zbus::{connection, fdo, interface, Connection};

use crate::events::{Event, NotifyRequest};
use crate::signals::dbus::{SERVICE_NAME, SERVICE_PATH};
use crate::Error;

/// Capabilities advertised by `GetCapabilities`.
const CAPABILITIES: [&str; 5] = [
    "body",
    "body-markup",
    "actions",
    "icon-static",
    "x-canonical-private-synchronous",
];

/// The bus-facing notification interface.
pub struct Notifications {
    events: UnboundedSender<Event>,
}

impl Notifications {
    /// Creates the interface handler.
    pub fn new(events: UnboundedSender<Event>) -> Self {
        Self { events }
    }
}

fn internal_error(context: &str) -> fdo::Error {
    fdo::Error::Failed(format!("daemon unavailable: {context}"))
}

fn trim_trailing(text: &str) -> &str {
    text.trim_end()
}

fn parse_image_data(value: Value<'_>) -> Result<RawImage, fdo::Error> {
    let (width, height, stride, has_alpha, bits_per_sample, channels, data) = value
        .downcast::<(i32, i32, i32, bool, i32, i32, Vec<u8>)>()
        .map_err(|_| {
            fdo::Error::InvalidArgs("image-data: expected a (iiibiiay) struct".to_owned())
        })?;

    Ok(RawImage {
        width,
        height,
        stride,
        has_alpha,
        bits_per_sample,
        channels,
        data,
    })
}

/// Extracts the hints the daemon consumes; unknown hints are ignored,
/// known hints with the wrong type fail the call.
fn parse_hints(
    hints: HashMap<String, Value<'_>>,
) -> Result<(Urgency, Option<String>, i8, Option<ImageSource>), fdo::Error> {
    let mut urgency = Urgency::Normal;
    let mut sync_tag = None;
    let mut progress = -1i8;
    let mut image: Option<ImageSource> = None;
    let mut image_is_data = false;

    for (name, value) in hints {
        match name.as_str() {
            "urgency" => {
                let level = value.downcast::<u8>().map_err(|_| {
                    fdo::Error::InvalidArgs("urgency hint must be a byte".to_owned())
                })?;
                urgency = Urgency::from(level);
            }
            "x-canonical-private-synchronous" => {
                sync_tag = Some(value.downcast::<String>().map_err(|_| {
                    fdo::Error::InvalidArgs(
                        "x-canonical-private-synchronous hint must be a string".to_owned(),
                    )
                })?);
            }
            "value" => {
                let v = value.downcast::<i32>().map_err(|_| {
                    fdo::Error::InvalidArgs("value hint must be an i32".to_owned())
                })?;
                progress = match v {
                    -1 => -1,
                    v => v.clamp(0, 100) as i8,
                };
            }
            "image-path" | "image_path" => {
                let path = value.downcast::<String>().map_err(|_| {
                    fdo::Error::InvalidArgs("image-path hint must be a string".to_owned())
                })?;
                if !image_is_data {
                    image = Some(ImageSource::Uri(path));
                }
            }
            "image-data" | "image_data" | "icon_data" => {
                let raw = parse_image_data(value)?;
                image = Some(ImageSource::Raw(raw));
                image_is_data = true;
            }
            other => {
                debug!(hint = other, "unrecognized hint, ignoring");
            }
        }
    }

    Ok((urgency, sync_tag, progress, image))
}

fn parse_actions(actions: Vec<String>) -> Vec<(String, String)> {
    let mut parsed = Vec::with_capacity(actions.len() / 2);
    let mut iter = actions.into_iter();

    while let Some(id) = iter.next() {
        let label = iter.next().unwrap_or_else(|| id.clone());
        parsed.push((id, label));
    }

    parsed
}

#[interface(name = "org.freedesktop.Notifications")]
impl Notifications {
    /// Creates or replaces a notification; returns its id.
    async fn notify(
        &self,
        app_name: String,
        replaces_id: u32,
        app_icon: String,
        summary: String,
        body: String,
        actions: Vec<String>,
        hints: HashMap<String, Value<'_>>,
        expire_timeout: i32,
    ) -> fdo::Result<u32> {
        debug!(app = %app_name, replaces_id, "Notify");

        let (urgency, sync_tag, progress, image) = parse_hints(hints)?;

        let request = NotifyRequest {
            app_name: trim_trailing(&app_name).to_owned(),
            replaces_id,
            app_icon,
            summary: trim_trailing(&summary).to_owned(),
            body: trim_trailing(&body).to_owned(),
            actions: parse_actions(actions),
            urgency,
            sync_tag,
            progress,
            image,
            timeout_ms: expire_timeout,
        };

        let (tx, rx) = oneshot::channel();
        self.events
            .send(Event::Notify {
                request: Box::new(request),
                reply: tx,
            })
            .map_err(|_| internal_error("Notify"))?;

        rx.await.map_err(|_| internal_error("Notify"))
    }

    /// Forcefully closes a notification.
    async fn close_notification(&self, id: u32) -> fdo::Result<()> {
        debug!(id, "CloseNotification");

        let (tx, rx) = oneshot::channel();
        self.events
            .send(Event::CloseNotification { id, reply: tx })
            .map_err(|_| internal_error("CloseNotification"))?;

        if rx.await.map_err(|_| internal_error("CloseNotification"))? {
            Ok(())
        } else {
            Err(fdo::Error::Failed("invalid notification ID".to_owned()))
        }
    }

    /// Optional capabilities implemented by this server.
    async fn get_capabilities(&self) -> Vec<String> {
        CAPABILITIES.iter().map(|&s| s.to_owned()).collect()
    }

    /// Server identity: name, vendor, version, spec version.
    async fn get_server_information(&self) -> (String, String, String, String) {
        (
            "fnott".to_owned(),
            "fnott".to_owned(),
            env!("CARGO_PKG_VERSION").to_owned(),
            "1.2".to_owned(),
        )
    }
}

/// Claims the well-known name and serves the interface.
///
/// # Errors
///
/// Returns [`Error::NameClaimFailed`] when another notification daemon
/// already owns the name, and a transport error otherwise.
pub async fn serve(events: UnboundedSender<Event>) -> Result<Connection, Error> {
    let connection = connection::Builder::session()?
        .name(SERVICE_NAME)
        .map_err(|e| Error::NameClaimFailed(e.to_string()))?
        .serve_at(SERVICE_PATH, Notifications::new(events))?
        .build()
        .await
        .map_err(|e| match e {
            zbus::Error::NameTaken => Error::NameClaimFailed("name taken".to_owned()),
            other => Error::Dbus(other),
        })?;

    debug!(name = SERVICE_NAME, "bus name claimed");
    Ok(connection)
}
