//! Out-of-process action selection.
//!
//! The configured helper (e.g. `dmenu`) is spawned with a pipe to each of
//! its standard streams; the action labels are streamed to its stdin, its
//! stdout is drained to EOF, and the chosen label is correlated back to the
//! notification by id. Writing and reading proceed concurrently so a
//! helper that produces output before consuming all labels cannot deadlock
//! the daemon, and a failed write still leaves the reader draining.

use std::process::Stdio;

use fnott_protocol::Reply;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::events::Event;
use crate::Error;

/// A launched selection helper whose I/O has not started yet.
///
/// Splitting launch from completion lets the caller keep its reply channel
/// when the process cannot be spawned at all.
#[derive(Debug)]
pub struct Selector {
    child: Child,
    input: Vec<u8>,
}

/// Spawns the selection helper.
///
/// `argv` is the tokenized helper command line; `labels` become the
/// child's stdin, each followed by `\n` (or `\0` when `null_separator`).
///
/// # Errors
///
/// Returns an error when the command line is empty or the process cannot
/// be spawned.
pub fn launch(argv: &[String], labels: &[String], null_separator: bool) -> Result<Selector, Error> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::SelectionHelper("empty command line".to_owned()))?;

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| Error::SelectionHelper(format!("{program}: {e}")))?;

    let separator = if null_separator { b'\0' } else { b'\n' };
    let mut input = Vec::new();
    for label in labels {
        input.extend_from_slice(label.as_bytes());
        input.push(separator);
    }

    Ok(Selector { child, input })
}

impl Selector {
    /// Drives the helper to completion in the background.
    ///
    /// Posts [`Event::SelectorDone`] for notification `id` when the child
    /// exits; `output` is the right-trimmed stdout on a clean (status 0)
    /// exit and `None` otherwise. `reply` rides along for a control-socket
    /// client waiting on the outcome.
    pub fn complete(
        mut self,
        id: u32,
        reply: Option<oneshot::Sender<Reply>>,
        events: &UnboundedSender<Event>,
    ) {
        let stdin = self.child.stdin.take();
        let stdout = self.child.stdout.take();
        let input = self.input;
        let mut child = self.child;
        let events = events.clone();

        tokio::spawn(async move {
            let (_, mut output) = tokio::join!(
                async move {
                    let Some(mut stdin) = stdin else {
                        return;
                    };
                    if let Err(e) = stdin.write_all(&input).await {
                        warn!(error = %e, "cannot write labels to the selection helper");
                    }
                    // Dropping stdin closes the pipe, signalling the end
                    // of the label stream.
                },
                async move {
                    let mut buf = Vec::new();
                    let Some(mut stdout) = stdout else {
                        return buf;
                    };
                    if let Err(e) = stdout.read_to_end(&mut buf).await {
                        warn!(error = %e, "cannot read from the selection helper");
                    }
                    buf
                },
            );

            let chosen = match child.wait().await {
                Ok(status) if status.success() => {
                    while output.last().is_some_and(u8::is_ascii_whitespace) {
                        output.pop();
                    }
                    String::from_utf8(output).ok()
                }
                Ok(status) => {
                    warn!(code = ?status.code(), "selection helper exited with failure");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "cannot wait for the selection helper");
                    None
                }
            };

            debug!(id, chosen = chosen.as_deref(), "selection helper finished");
            let _ = events.send(Event::SelectorDone {
                id,
                output: chosen,
                reply,
            });
        });
    }
}
