mod render_log;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use thingdash_core::{Session, SessionEvent};
use thingdash_link::{Link, LinkEvent};

use crate::render_log::LogRender;

/// Headless dashboard client: connects to a thingdash server, mirrors
/// its state, and logs every render effect.
#[derive(Debug, Parser)]
#[command(name = "thingdash", version, about)]
struct Cli {
    /// Config file path (defaults to the platform config directory).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Dashboard origin, overriding the config file.
    #[arg(short, long, value_name = "URL", env = "THINGDASH_ORIGIN")]
    origin: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config =
        thingdash_config::load_config(cli.config.as_deref()).wrap_err("loading config")?;
    if let Some(origin) = cli.origin {
        config.origin = origin;
    }
    let ws_url = config.ws_url().wrap_err("deriving websocket endpoint")?;

    // A headless client has no page to hide; the surface is always
    // visible. The channel stays so embedders can gate the link.
    let (_visibility_tx, visibility_rx) = watch::channel(true);
    let cancel = CancellationToken::new();
    let (link, mut link_events) = Link::spawn(ws_url, visibility_rx, cancel.clone());

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (mut session, mut session_events) = Session::new(LogRender::default(), out_tx);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                link.shutdown();
                break;
            }
            event = link_events.recv() => {
                let Some(event) = event else { break };
                session.handle_event(match event {
                    LinkEvent::Opened => SessionEvent::LinkOpened,
                    LinkEvent::Closed => SessionEvent::LinkClosed,
                    LinkEvent::Frame(text) => SessionEvent::Frame(text),
                });
            }
            Some(event) = session_events.recv() => {
                session.handle_event(event);
            }
            Some(msg) = out_rx.recv() => {
                link.send(msg);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}
