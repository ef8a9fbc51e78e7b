//! Wire protocol for the fnott control socket.
//!
//! The daemon listens on a unix-domain socket and the `fnottctl` CLI connects
//! to it. Requests are fixed-width records (a one-byte command followed by a
//! little-endian `u32` id), replies are a single result byte. A successful
//! `List` reply is followed by a `u64` entry count and one length-prefixed
//! summary record per live notification.

use std::env;
use std::path::PathBuf;

/// Byte size of an encoded [`Request`].
pub const REQUEST_SIZE: usize = 5;

/// Byte size of an encoded [`Reply`].
pub const REPLY_SIZE: usize = 1;

/// Errors produced while decoding protocol frames.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The input did not contain a whole frame.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes needed for a complete frame.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The command byte does not name a known command.
    #[error("unknown command: {0}")]
    UnknownCommand(u8),

    /// The result byte does not name a known result.
    #[error("unknown result: {0}")]
    UnknownResult(u8),

    /// A list-entry summary was not valid UTF-8.
    #[error("list entry summary is not valid UTF-8")]
    InvalidSummary,
}

/// Commands understood by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Shut the daemon down.
    Quit = 0,
    /// List live notifications (id + summary).
    List = 1,
    /// Stop displaying new notifications.
    Pause = 2,
    /// Resume displaying new notifications.
    Unpause = 3,
    /// Dismiss one notification; id `0` targets the topmost.
    DismissById = 4,
    /// Dismiss every notification.
    DismissAll = 5,
    /// Run the action selector for one notification.
    ActionsById = 6,
    /// Invoke the `default` action, then dismiss.
    DismissWithDefaultActionById = 7,
}

impl TryFrom<u8> for Command {
    type Error = DecodeError;

    fn try_from(raw: u8) -> Result<Self, DecodeError> {
        match raw {
            0 => Ok(Self::Quit),
            1 => Ok(Self::List),
            2 => Ok(Self::Pause),
            3 => Ok(Self::Unpause),
            4 => Ok(Self::DismissById),
            5 => Ok(Self::DismissAll),
            6 => Ok(Self::ActionsById),
            7 => Ok(Self::DismissWithDefaultActionById),
            other => Err(DecodeError::UnknownCommand(other)),
        }
    }
}

/// A single client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// The command to execute.
    pub command: Command,
    /// Target notification id; meaningful for the by-id commands, `0`
    /// otherwise.
    pub id: u32,
}

impl Request {
    /// Encodes the request into its fixed-width wire form.
    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        let id = self.id.to_le_bytes();
        [self.command as u8, id[0], id[1], id[2], id[3]]
    }

    /// Decodes a request from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] when fewer than [`REQUEST_SIZE`]
    /// bytes are available, or [`DecodeError::UnknownCommand`] for an
    /// unrecognized command byte.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < REQUEST_SIZE {
            return Err(DecodeError::Truncated {
                expected: REQUEST_SIZE,
                actual: bytes.len(),
            });
        }

        let command = Command::try_from(bytes[0])?;
        let id = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        Ok(Self { command, id })
    }
}

/// Daemon reply codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reply {
    /// The command succeeded.
    Ok = 0,
    /// No notification with the requested id exists.
    InvalidId = 1,
    /// The notification has no actions to select from.
    NoActions = 2,
    /// The command failed for another reason.
    Error = 3,
}

impl Reply {
    /// Encodes the reply into its single-byte wire form.
    pub fn encode(self) -> [u8; REPLY_SIZE] {
        [self as u8]
    }

    /// Decodes a reply byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] on empty input or
    /// [`DecodeError::UnknownResult`] for an unrecognized result byte.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        match bytes.first() {
            None => Err(DecodeError::Truncated {
                expected: REPLY_SIZE,
                actual: 0,
            }),
            Some(0) => Ok(Self::Ok),
            Some(1) => Ok(Self::InvalidId),
            Some(2) => Ok(Self::NoActions),
            Some(3) => Ok(Self::Error),
            Some(&other) => Err(DecodeError::UnknownResult(other)),
        }
    }
}

/// One record of a successful `List` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Notification id.
    pub id: u32,
    /// Decoded summary text.
    pub summary: String,
}

impl ListEntry {
    /// Encodes the entry as `id (u32 le) | len (u32 le) | summary bytes`.
    pub fn encode(&self) -> Vec<u8> {
        let summary = self.summary.as_bytes();
        let mut out = Vec::with_capacity(8 + summary.len());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&(summary.len() as u32).to_le_bytes());
        out.extend_from_slice(summary);
        out
    }

    /// Decodes one entry from the front of `bytes`, returning the entry and
    /// the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] when the record is incomplete and
    /// [`DecodeError::InvalidSummary`] when the summary is not UTF-8.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        if bytes.len() < 8 {
            return Err(DecodeError::Truncated {
                expected: 8,
                actual: bytes.len(),
            });
        }

        let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

        if bytes.len() < 8 + len {
            return Err(DecodeError::Truncated {
                expected: 8 + len,
                actual: bytes.len(),
            });
        }

        let summary = std::str::from_utf8(&bytes[8..8 + len])
            .map_err(|_| DecodeError::InvalidSummary)?
            .to_owned();

        Ok((Self { id, summary }, 8 + len))
    }
}

/// Resolves the control-socket path for the current session.
///
/// Prefers `$XDG_RUNTIME_DIR/fnott-$WAYLAND_DISPLAY.sock`, then
/// `$XDG_RUNTIME_DIR/fnott.sock`, then `/tmp/fnott.sock`.
pub fn socket_path() -> PathBuf {
    let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") else {
        return PathBuf::from("/tmp/fnott.sock");
    };

    match env::var("WAYLAND_DISPLAY") {
        Ok(display) => PathBuf::from(runtime_dir).join(format!("fnott-{display}.sock")),
        Err(_) => PathBuf::from(runtime_dir).join("fnott.sock"),
    }
}
