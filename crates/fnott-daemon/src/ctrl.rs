//! The local control socket serving the `fnottctl` CLI.
//!
//! One fixed-width request per connection; the reply is written once the
//! event loop (and, for `ActionsById`, the action selector) has finished
//! with it.

use std::fs;
use std::path::{Path, PathBuf};

use fnott_protocol::{Command, Reply, Request, REQUEST_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::Event;
use crate::Error;

/// The control-socket listener.
#[derive(Debug)]
pub struct CtrlServer {
    listener: UnixListener,
    path: PathBuf,
    events: UnboundedSender<Event>,
}

impl CtrlServer {
    /// Binds the session's control socket, replacing a stale one.
    ///
    /// # Errors
    ///
    /// Returns an error when the socket cannot be bound.
    pub fn bind(events: UnboundedSender<Event>) -> Result<Self, Error> {
        Self::bind_at(fnott_protocol::socket_path(), events)
    }

    /// Binds at an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error when the socket cannot be bound.
    pub fn bind_at(path: PathBuf, events: UnboundedSender<Event>) -> Result<Self, Error> {
        let _ = fs::remove_file(&path);

        let listener = UnixListener::bind(&path).map_err(|source| Error::ControlSocket {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "control socket bound");
        Ok(Self {
            listener,
            path,
            events,
        })
    }

    /// The bound socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts clients until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let events = self.events.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, events).await {
                                debug!(error = %e, "control client failed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "cannot accept control client");
                    }
                },
            }
        }
    }
}

impl Drop for CtrlServer {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

async fn handle_client(
    mut stream: UnixStream,
    events: UnboundedSender<Event>,
) -> std::io::Result<()> {
    let mut raw = [0u8; REQUEST_SIZE];
    stream.read_exact(&mut raw).await?;

    let request = match Request::decode(&raw) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed control request");
            stream.write_all(&Reply::Error.encode()).await?;
            return Ok(());
        }
    };

    debug!(?request, "control request");

    fn closed<E>(_: E) -> std::io::Error {
        std::io::Error::other("daemon event loop is gone")
    }

    match request.command {
        Command::Quit => {
            let (tx, rx) = oneshot::channel();
            events.send(Event::Quit { reply: tx }).map_err(closed)?;
            let () = rx.await.map_err(closed)?;
            stream.write_all(&Reply::Ok.encode()).await?;
        }

        Command::List => {
            let (tx, rx) = oneshot::channel();
            events.send(Event::CtrlList { reply: tx }).map_err(closed)?;
            let entries = rx.await.map_err(closed)?;

            stream.write_all(&Reply::Ok.encode()).await?;
            stream
                .write_all(&(entries.len() as u64).to_le_bytes())
                .await?;
            for entry in entries {
                stream.write_all(&entry.encode()).await?;
            }
        }

        Command::Pause => {
            let (tx, rx) = oneshot::channel();
            events.send(Event::CtrlPause { reply: tx }).map_err(closed)?;
            let () = rx.await.map_err(closed)?;
            stream.write_all(&Reply::Ok.encode()).await?;
        }

        Command::Unpause => {
            let (tx, rx) = oneshot::channel();
            events
                .send(Event::CtrlUnpause { reply: tx })
                .map_err(closed)?;
            let () = rx.await.map_err(closed)?;
            stream.write_all(&Reply::Ok.encode()).await?;
        }

        Command::DismissById => {
            let (tx, rx) = oneshot::channel();
            events
                .send(Event::CtrlDismiss {
                    id: request.id,
                    reply: tx,
                })
                .map_err(closed)?;
            let dismissed = rx.await.map_err(closed)?;
            let reply = if dismissed { Reply::Ok } else { Reply::InvalidId };
            stream.write_all(&reply.encode()).await?;
        }

        Command::DismissAll => {
            let (tx, rx) = oneshot::channel();
            events
                .send(Event::CtrlDismissAll { reply: tx })
                .map_err(closed)?;
            let ok = rx.await.map_err(closed)?;
            let reply = if ok { Reply::Ok } else { Reply::Error };
            stream.write_all(&reply.encode()).await?;
        }

        Command::ActionsById => {
            let (tx, rx) = oneshot::channel();
            events
                .send(Event::CtrlActions {
                    id: request.id,
                    reply: tx,
                })
                .map_err(closed)?;
            // Resolves only once the selection helper exits.
            let reply = rx.await.map_err(closed)?;
            stream.write_all(&reply.encode()).await?;
        }

        Command::DismissWithDefaultActionById => {
            let (tx, rx) = oneshot::channel();
            events
                .send(Event::CtrlDefaultAction {
                    id: request.id,
                    reply: tx,
                })
                .map_err(closed)?;
            let reply = rx.await.map_err(closed)?;
            stream.write_all(&reply.encode()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fnott_config::Config;
    use fnott_icons::IconIndex;
    use fnott_protocol::ListEntry;
    use fnott_wayland::HeadlessBackend;
    use tokio::sync::mpsc;

    use super::*;
    use crate::daemon::Daemon;
    use crate::manager::NotificationManager;
    use crate::signals::NullSignals;

    async fn roundtrip(path: &Path, request: Request) -> (Reply, Vec<u8>) {
        let mut stream = UnixStream::connect(path).await.unwrap();
        stream.write_all(&request.encode()).await.unwrap();

        let mut reply = [0u8; 1];
        stream.read_exact(&mut reply).await.unwrap();

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();

        (Reply::decode(&reply).unwrap(), rest)
    }

    fn start_daemon() -> (tempfile::TempDir, PathBuf, CancellationToken) {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("fnott-test.sock");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (surface_tx, _surface_rx) = mpsc::unbounded_channel();

        let manager = NotificationManager::new(
            Arc::new(Config::default()),
            HeadlessBackend::new(surface_tx),
            Arc::new(IconIndex::with_base_dirs("default", &[])),
            Box::new(NullSignals),
            events_tx.clone(),
        );

        let shutdown = CancellationToken::new();
        let server = CtrlServer::bind_at(socket.clone(), events_tx).unwrap();
        tokio::spawn(server.run(shutdown.clone()));
        tokio::spawn(Daemon::new(manager, events_rx).run());

        (dir, socket, shutdown)
    }

    #[tokio::test]
    async fn list_on_an_empty_daemon_returns_zero_entries() {
        let (_dir, socket, _shutdown) = start_daemon();

        let (reply, rest) = roundtrip(
            &socket,
            Request {
                command: Command::List,
                id: 0,
            },
        )
        .await;

        assert_eq!(reply, Reply::Ok);
        assert_eq!(rest, 0u64.to_le_bytes());
    }

    #[tokio::test]
    async fn dismissing_an_unknown_id_is_invalid() {
        let (_dir, socket, _shutdown) = start_daemon();

        let (reply, _) = roundtrip(
            &socket,
            Request {
                command: Command::DismissById,
                id: 42,
            },
        )
        .await;

        assert_eq!(reply, Reply::InvalidId);
    }

    #[tokio::test]
    async fn pause_and_unpause_round_trip() {
        let (_dir, socket, _shutdown) = start_daemon();

        let (reply, _) = roundtrip(
            &socket,
            Request {
                command: Command::Pause,
                id: 0,
            },
        )
        .await;
        assert_eq!(reply, Reply::Ok);

        let (reply, _) = roundtrip(
            &socket,
            Request {
                command: Command::Unpause,
                id: 0,
            },
        )
        .await;
        assert_eq!(reply, Reply::Ok);
    }

    #[tokio::test]
    async fn actions_on_an_unknown_id_is_invalid() {
        let (_dir, socket, _shutdown) = start_daemon();

        let (reply, _) = roundtrip(
            &socket,
            Request {
                command: Command::ActionsById,
                id: 9,
            },
        )
        .await;

        assert_eq!(reply, Reply::InvalidId);
    }

    #[tokio::test]
    async fn quit_acknowledges_before_shutdown() {
        let (_dir, socket, _shutdown) = start_daemon();

        let (reply, _) = roundtrip(
            &socket,
            Request {
                command: Command::Quit,
                id: 0,
            },
        )
        .await;

        assert_eq!(reply, Reply::Ok);
    }

    #[tokio::test]
    async fn garbage_requests_get_an_error_reply() {
        let (_dir, socket, _shutdown) = start_daemon();

        let mut stream = UnixStream::connect(&socket).await.unwrap();
        stream.write_all(&[0xfe, 0, 0, 0, 0]).await.unwrap();

        let mut reply = [0u8; 1];
        stream.read_exact(&mut reply).await.unwrap();

        assert_eq!(Reply::decode(&reply).unwrap(), Reply::Error);
    }

    #[test]
    fn list_entry_payload_matches_protocol_framing() {
        let entry = ListEntry {
            id: 3,
            summary: "hi".to_owned(),
        };

        let encoded = entry.encode();
        let (decoded, _) = ListEntry::decode(&encoded).unwrap();

        assert_eq!(decoded, entry);
    }
}
