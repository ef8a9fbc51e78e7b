//! fnottctl — control CLI for the fnott daemon.

use std::process;

use clap::{Parser, Subcommand};
use fnott_protocol::{Command, ListEntry, Reply, Request};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Parser, Debug)]
#[command(name = "fnottctl", version, about = "Control a running fnott daemon")]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List live notifications as `ID: summary` lines
    List,

    /// Stop displaying new notifications
    Pause,

    /// Resume displaying new notifications
    Unpause,

    /// Dismiss one notification (the most recent when no id is given), or
    /// all of them
    Dismiss {
        /// Notification id, or "all"
        target: Option<String>,
    },

    /// Run the configured selection helper for a notification's actions
    Actions {
        /// Notification id
        id: u32,
    },

    /// Invoke the default action, then dismiss
    DefaultAction {
        /// Notification id
        id: u32,
    },

    /// Shut the daemon down
    Quit,
}

fn to_request(command: &Cmd) -> Result<Request, String> {
    let request = match command {
        Cmd::List => Request {
            command: Command::List,
            id: 0,
        },
        Cmd::Pause => Request {
            command: Command::Pause,
            id: 0,
        },
        Cmd::Unpause => Request {
            command: Command::Unpause,
            id: 0,
        },
        Cmd::Dismiss { target } => match target.as_deref() {
            None => Request {
                command: Command::DismissById,
                id: 0,
            },
            Some("all") => Request {
                command: Command::DismissAll,
                id: 0,
            },
            Some(id) => Request {
                command: Command::DismissById,
                id: id
                    .parse()
                    .map_err(|_| format!("{id}: not a notification id"))?,
            },
        },
        Cmd::Actions { id } => Request {
            command: Command::ActionsById,
            id: *id,
        },
        Cmd::DefaultAction { id } => Request {
            command: Command::DismissWithDefaultActionById,
            id: *id,
        },
        Cmd::Quit => Request {
            command: Command::Quit,
            id: 0,
        },
    };

    Ok(request)
}

async fn execute(request: Request, expect_list: bool) -> Result<(), String> {
    let path = fnott_protocol::socket_path();
    let mut stream = UnixStream::connect(&path)
        .await
        .map_err(|e| format!("{}: {e} (is fnott running?)", path.display()))?;

    stream
        .write_all(&request.encode())
        .await
        .map_err(|e| format!("cannot send request: {e}"))?;

    let mut reply = [0u8; fnott_protocol::REPLY_SIZE];
    stream
        .read_exact(&mut reply)
        .await
        .map_err(|e| format!("cannot read reply: {e}"))?;

    match Reply::decode(&reply).map_err(|e| e.to_string())? {
        Reply::Ok => {}
        Reply::InvalidId => return Err("no such notification".to_owned()),
        Reply::NoActions => return Err("notification has no actions".to_owned()),
        Reply::Error => return Err("daemon reported an error".to_owned()),
    }

    if expect_list {
        let mut payload = Vec::new();
        stream
            .read_to_end(&mut payload)
            .await
            .map_err(|e| format!("cannot read list reply: {e}"))?;

        if payload.len() < 8 {
            return Err("truncated list reply".to_owned());
        }

        let count = u64::from_le_bytes(
            payload[..8].try_into().map_err(|_| "truncated list reply")?,
        );

        let mut offset = 8;
        for _ in 0..count {
            let (entry, consumed) =
                ListEntry::decode(&payload[offset..]).map_err(|e| e.to_string())?;
            offset += consumed;
            println!("{}: {}", entry.id, entry.summary);
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let request = match to_request(&args.command) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let expect_list = request.command == Command::List;
    if let Err(e) = execute(request, expect_list).await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
