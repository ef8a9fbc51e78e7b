//! fnott — entry point for the notification daemon.

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use fnott_config::Config;
use fnott_daemon::ctrl::CtrlServer;
use fnott_daemon::events::Event;
use fnott_daemon::signals::BusSignals;
use fnott_daemon::{dbus, Daemon, NotificationManager};
use fnott_icons::IconIndex;
use fnott_wayland::HeadlessBackend;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fnott", version, about = "Keyboard friendly Wayland notification daemon")]
struct Args {
    /// Load configuration from PATH instead of the default location
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the daemon PID to FILE (or to an already-open FD number)
    /// once initialization is complete
    #[arg(short, long, value_name = "FILE|FD")]
    print_pid: Option<String>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Writes the PID to the requested target. A numeric target is treated as
/// an inherited file descriptor; anything else is created as a fresh file,
/// whose path is returned so it can be unlinked at exit.
fn print_pid(target: &str) -> std::io::Result<Option<PathBuf>> {
    let pid = format!("{}\n", process::id());

    if target.parse::<u32>().is_ok() {
        std::fs::write(format!("/proc/self/fd/{target}"), pid)?;
        return Ok(None);
    }

    let path = PathBuf::from(target);
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)?;
    file.write_all(pid.as_bytes())?;

    Ok(Some(path))
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::load(args.config.as_deref())?);
    let icons = Arc::new(IconIndex::new(&config.icon_theme));

    let (events_tx, events_rx) = mpsc::unbounded_channel();

    // Surface events feed the same loop as everything else.
    let (surface_tx, mut surface_rx) = mpsc::unbounded_channel();
    {
        let events_tx = events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = surface_rx.recv().await {
                if events_tx.send(Event::Surface(event)).is_err() {
                    break;
                }
            }
        });
    }

    // Display-server integration plugs in behind the SurfaceBackend seam;
    // the in-tree backend composites frames in memory.
    let backend = HeadlessBackend::new(surface_tx);

    let connection = dbus::serve(events_tx.clone()).await?;

    let manager = NotificationManager::new(
        Arc::clone(&config),
        backend,
        icons,
        Box::new(BusSignals::new(connection.clone())),
        events_tx.clone(),
    );

    let ctrl_shutdown = CancellationToken::new();
    let ctrl = CtrlServer::bind(events_tx.clone())?;
    info!(socket = %ctrl.path().display(), "control socket ready");
    tokio::spawn(ctrl.run(ctrl_shutdown.clone()));

    {
        let events_tx = events_tx.clone();
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = sigint.recv() => {}
            }
            info!("signal received, shutting down");
            let _ = events_tx.send(Event::Shutdown);
        });
    }

    let pid_file = match args.print_pid.as_deref() {
        Some(target) => print_pid(target)?,
        None => None,
    };

    info!(version = env!("CARGO_PKG_VERSION"), "fnott started");
    Daemon::new(manager, events_rx).run().await;

    ctrl_shutdown.cancel();
    if let Some(path) = pid_file {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "cannot remove PID file");
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
