#[cfg(feature = "audio")]
mod audio;
pub mod config;
pub mod cue;
pub mod db;
pub mod session;
pub mod settings;
pub mod timer;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};

use config::AppConfig;
use cue::CuePlayer;
use db::Database;
use session::{MemorySessions, SessionBackend};
use settings::{LocalStorage, SettingsStore};
use timer::{
    commands::{describe, execute, render_event, Command, Reply},
    TimerController,
};

pub async fn run() -> Result<()> {
    // RUST_LOG overrides the default level.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("focuscycle starting up...");

    let config = AppConfig::from_env()?;
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;

    let settings = Arc::new(SettingsStore::new(LocalStorage::open(config.settings_dir())?));
    let player = cue_player();

    if config.ephemeral {
        info!("Ephemeral mode: sessions are kept in memory");
        let controller =
            TimerController::new(MemorySessions::new(), config.user_id, settings, player);
        serve(controller).await
    } else {
        let database = Database::new(config.database_path())?;
        let controller = TimerController::new(database, config.user_id, settings, player);
        serve(controller).await
    }
}

#[cfg(feature = "audio")]
fn cue_player() -> Arc<dyn CuePlayer> {
    Arc::new(audio::AudioEngineHandle::new())
}

#[cfg(not(feature = "audio"))]
fn cue_player() -> Arc<dyn CuePlayer> {
    Arc::new(cue::SilentPlayer)
}

async fn serve<B: SessionBackend>(controller: TimerController<B>) -> Result<()> {
    // Finalize sessions that were running when the process last died.
    match controller.recorder().recover_orphans(Utc::now()).await {
        Ok(0) => {}
        Ok(count) => warn!("Closed {count} unfinished sessions from a previous run"),
        Err(err) => warn!("Could not recover unfinished sessions: {err:#}"),
    }
    controller.restore_from_history().await;

    let mut events = controller.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!("Event printer skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{}", describe(&controller.snapshot().await));
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.unwrap_or_else(|err| {
                warn!("Failed to read stdin: {err}");
                None
            }),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err:#}");
                continue;
            }
        };

        match execute(&controller, command).await {
            Ok(Reply::Text(text)) => println!("{text}"),
            Ok(Reply::Quit) => break,
            Err(err) => println!("error: {err:#}"),
        }
    }

    controller.shutdown().await;
    printer.abort();
    info!("focuscycle stopped");
    Ok(())
}
