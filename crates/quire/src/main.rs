//! `quire` - standalone IMAP4rev1 server
//!
//! Serves the accounts listed in its settings file from an in-memory store.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod settings;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use quire_imap::Connection;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "IMAP4rev1 server")]
struct Args {
    /// Settings file (JSON). Defaults to `<config dir>/quire/settings.json`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the settings file.
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quire=info,quire_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        settings.listen = listen;
    }

    let ctx = settings.build_context()?;
    let listener = TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("binding {}", settings.listen))?;
    info!(address = %settings.listen, users = settings.users.len(), "quire listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                };
                info!(%peer, "connection accepted");
                let connection = Connection::new(stream, ctx.clone());
                tokio::spawn(async move {
                    if let Err(e) = connection.serve().await {
                        debug!(%peer, error = %e, "connection failed");
                    }
                    info!(%peer, "connection closed");
                });
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for Ctrl-C")?;
                info!("shutting down");
                return Ok(());
            }
        }
    }
}
