use std::process::ExitCode;

use clap::Parser;
use faugus_core::Settings;
use faugus_core::paths::Paths;
use faugus_launcher::commands::{self, Cli};
use faugus_launcher::state::AppState;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let logs_dir = Paths::from_env().logs_dir;
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "launcher.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let settings = if cli.command.initialises_config() {
        Settings::load_or_init()?
    } else {
        Settings::load()
    };
    let state = AppState::new(settings);

    commands::dispatch(cli, state).await
}
