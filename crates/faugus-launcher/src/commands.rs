use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use faugus_core::games::GameStore;
use faugus_core::instance_lock::SingleInstanceGate;
use faugus_process::{ProcFs, ProcessTable};

use crate::launch;
use crate::monitor::ReconcilePoller;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "faugus-launcher", about = "Launch and track games")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Hold the instance lock and keep the running-games registry fresh.
    Run,
    /// Print every configured game and whether it is running.
    List,
    /// Launch a game and wait for it to exit.
    Play { gameid: String },
    /// Terminate a running game's process tree.
    Stop { title: String },
    /// Kill every compatibility-layer process owned by this user.
    KillAll,
}

impl Command {
    /// Only the long-lived instance writes missing config defaults.
    pub fn initialises_config(&self) -> bool {
        matches!(self, Command::Run)
    }
}

pub async fn dispatch(cli: Cli, state: AppState) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Run => run(state).await,
        Command::List => {
            for line in list(&state, &ProcFs::default()) {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Play { gameid } => {
            let code = launch::play(&state, &gameid).await?;
            Ok(match code {
                Some(0) | None => ExitCode::SUCCESS,
                Some(_) => ExitCode::FAILURE,
            })
        }
        Command::Stop { title } => {
            tokio::task::spawn_blocking(move || {
                launch::stop(&state.registry, &*state.controller, &title)
            })
            .await
            .context("stop task failed")??;
            Ok(ExitCode::SUCCESS)
        }
        Command::KillAll => {
            let killed = state.controller.kill_all().context("kill compatibility processes")?;
            tracing::info!(count = killed.len(), "killed compatibility processes");
            println!("killed {} process(es)", killed.len());
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(state: AppState) -> anyhow::Result<ExitCode> {
    let gate = match SingleInstanceGate::acquire(&state.settings.paths.lock_file) {
        Ok(gate) => gate,
        Err(faugus_core::Error::AlreadyRunning(path)) => {
            eprintln!("faugus-launcher is already running ({})", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };
    tracing::info!(lock = %gate.path().display(), "launcher started");

    let poller = ReconcilePoller::new(state.registry.clone(), Arc::new(ProcFs::default())).spawn();
    shutdown_signal().await;
    poller.abort();
    tracing::info!("launcher stopping");
    drop(gate);
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// One line per configured game. Reads the registry without reconciling it;
/// a dead main process just shows as stopped.
pub fn list(state: &AppState, table: &impl ProcessTable) -> Vec<String> {
    let store = GameStore::load(&state.settings.paths.games_file);
    store
        .games()
        .iter()
        .map(|game| {
            let running = state
                .registry
                .get(&game.title)
                .is_some_and(|entry| table.is_alive(entry.main));
            let status = if running { "running" } else { "stopped" };
            format!("{}\t{}\t{status}", game.gameid, game.title)
        })
        .collect()
}
