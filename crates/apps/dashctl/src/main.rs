//! dashctl - terminal front end for the chat message dashboard
//!
//! This is the main entry point for the dashctl application.

use anyhow::{Context, Result};
use clap::Parser;
use dashboard::views::filter_messages;
use dashboard::{ChannelEvent, Dashboard, DashboardConfig, LiveUpdate};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

mod cli;
mod commands;
mod render;

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    let mut settings = DashboardConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        settings.api_url = url;
    }
    let dashboard = Arc::new(Dashboard::connect(settings)?);

    match cli.command {
        Command::Watch { filter } => watch(dashboard, filter).await,
        command => {
            tokio::task::spawn_blocking(move || commands::execute(&dashboard, command))
                .await
                .context("Command task failed")?
        }
    }
}

/// Print the snapshot, then stream new messages until Ctrl-C
async fn watch(dashboard: Arc<Dashboard>, filter: Option<String>) -> Result<()> {
    let loader = dashboard.clone();
    tokio::task::spawn_blocking(move || loader.start())
        .await
        .context("Snapshot task failed")?;
    if let Some(banner) = dashboard.banner() {
        warn!("{}", banner);
    }

    if let Some(filter) = &filter {
        dashboard.session().set_filter(filter.clone());
    }
    commands::print_messages(&dashboard, &dashboard.filtered());

    let filter = filter.unwrap_or_default();
    dashboard.subscribe_live(move |update| match update {
        LiveUpdate::Merged(outcome) => {
            for message in filter_messages(&outcome.inserted, &filter) {
                println!("{}", render::message_line(message, false));
            }
        }
        LiveUpdate::Status(ChannelEvent::Reconnecting { attempt, delay }) => {
            info!("Reconnecting (attempt {}) in {:?}", attempt, delay);
        }
        LiveUpdate::Status(ChannelEvent::GaveUp { attempts }) => {
            error!("Live updates stopped after {} failed attempts", attempts);
        }
        LiveUpdate::Status(_) => {}
    })?;
    info!("Watching for new messages, press Ctrl-C to stop");

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Stopping");
                break;
            }
            _ = ticker.tick() => {
                if !dashboard.is_live() {
                    break;
                }
            }
        }
    }

    dashboard.unsubscribe();
    Ok(())
}
