use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use faugus_core::Settings;
use faugus_core::command::{ComposeDefaults, compose};
use faugus_core::games::GameStore;
use faugus_process::LaunchId;
use tracing::Instrument;

mod cli;
mod indicator;
mod log_file;
mod orchestrator;
mod output;
mod prepare;

use cli::Cli;
use indicator::ConsoleIndicator;
use orchestrator::{Orchestrator, Outcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load();

    let message = match &cli.game {
        Some(gameid) => {
            let store = GameStore::load(&settings.paths.games_file);
            let game = store
                .find(gameid)
                .ok_or_else(|| faugus_core::Error::GameNotFound(gameid.clone()))?;
            compose(game, &ComposeDefaults::from_tools(&settings.tools))
        }
        None => cli.message.clone().context("no command line given")?,
    };

    let launch_id = LaunchId::new();
    let span = tracing::info_span!("launch", %launch_id);
    let mut orch = Orchestrator::new(&message, cli.mode(), &settings, ConsoleIndicator::new());
    let outcome = orch.run().instrument(span).await?;

    Ok(match outcome {
        Outcome::Exited(_) => ExitCode::SUCCESS,
        Outcome::RunnerNotFound(_) => ExitCode::FAILURE,
    })
}
