//! sessiondeck-daemon - command line front end for the session mirror.
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`SESSIONDECK_*`)
//! 3. `<config_dir>/config.json`
//! 4. Default values (lowest priority)
//!
//! Every command prints pretty JSON on stdout. `watch` keeps the background
//! sync running and prints one event per line until Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use sessiondeck_core::backend::Feature;
use sessiondeck_core::config::{self, DeckConfig};
use sessiondeck_core::{DeckContext, ModePreference, RemoteClient, SessionStatus};
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(name = "sessiondeck-daemon")]
#[command(version, about = "Mirror and reconcile remote sessions", long_about = None)]
struct Cli {
    /// Configuration directory (default: $SESSIONDECK_CONFIG_DIR or ~/.config/sessiondeck)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Backend mode: auto, production or mock
    #[arg(long, global = true)]
    mode: Option<ModePreference>,

    /// Base URL of the production session API
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List an owner's sessions, newest first.
    List {
        #[arg(long)]
        owner: String,
    },
    /// Look up one session.
    Get { id: String },
    /// Create a session for an owner.
    Create { owner: String },
    /// Delete a session remotely and locally.
    Delete { id: String },
    /// Set a session's status locally.
    Status { id: String, status: String },
    /// Reconcile the local mirror with the backend once.
    Sync,
    /// Count stored sessions by status.
    Stats,
    /// Show a session's message history.
    Messages { id: String },
    /// Resolve the backend mode and show feature availability.
    Mode,
    /// Run background sync and print events until Ctrl-C.
    Watch,
}

impl Cli {
    fn resolve_config(&self) -> Result<(PathBuf, DeckConfig), String> {
        let dir = match &self.config_dir {
            Some(dir) => dir.clone(),
            None => config::resolve_config_dir().map_err(|e| e.to_string())?,
        };

        let mut config = DeckConfig::load(&dir).map_err(|e| e.to_string())?;
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        Ok((dir, config))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let (dir, config) = cli.resolve_config()?;
    log::debug!("Using config dir {}", dir.display());

    let ctx = DeckContext::builder()
        .config(config)
        .config_dir(dir)
        .build();

    if cli.command == Command::Watch {
        return watch(&ctx).await;
    }

    let output = execute(&ctx, cli.command).await?;
    let text = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

async fn execute(ctx: &DeckContext, command: Command) -> Result<Value, String> {
    let sessions = &ctx.sessions;

    let value = match command {
        Command::List { owner } => to_value(sessions.sessions_for_owner(&owner).await)?,
        Command::Get { id } => {
            let session = sessions
                .get(&id)
                .await
                .ok_or_else(|| format!("Session not found: {id}"))?;
            to_value(session)?
        }
        Command::Create { owner } => {
            let session = sessions.create(owner).await.map_err(|e| e.to_string())?;
            to_value(session)?
        }
        Command::Delete { id } => {
            sessions.delete(&id).await;
            json!({ "deleted": id })
        }
        Command::Status { id, status } => {
            let status: SessionStatus = status.parse().unwrap_or_else(|e| match e {});
            let session = sessions
                .update_status(&id, status)
                .await
                .ok_or_else(|| format!("Session not found: {id}"))?;
            to_value(session)?
        }
        Command::Sync => to_value(sessions.sync().await)?,
        Command::Stats => to_value(sessions.stats().await)?,
        Command::Messages { id } => {
            let messages = ctx.backend.messages(&id).await.map_err(|e| e.to_string())?;
            to_value(messages)?
        }
        Command::Mode => mode_report(ctx).await,
        Command::Watch => return Err("watch streams events and has no single result".to_string()),
    };

    Ok(value)
}

async fn mode_report(ctx: &DeckContext) -> Value {
    let backend = &ctx.backend;
    let mode = backend.initialize().await;

    let features: Vec<Value> = Feature::ALL
        .iter()
        .map(|feature| {
            json!({
                "feature": feature,
                "category": feature.category(),
                "available": backend.is_feature_available(*feature),
            })
        })
        .collect();

    json!({
        "mode": mode,
        "preference": backend.config().preference,
        "simulatedBackend": backend.has_simulated(),
        "features": features,
    })
}

async fn watch(ctx: &DeckContext) -> Result<(), String> {
    let mut events = ctx.event_bus.subscribe();
    let mode = ctx.backend.initialize().await;
    log::info!(
        "Watching sessions on {} backend (sync every {:?})",
        mode,
        ctx.sessions.config().sync_interval
    );
    ctx.sessions.start_sync();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    let line = serde_json::to_string(&event).map_err(|e| e.to_string())?;
                    println!("{line}");
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Event stream lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    ctx.sessions.stop_sync();
    Ok(())
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}
