use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use faugus_core::games::GameStore;
use faugus_core::paths::find_binary;
use faugus_core::registry::RunningGameRegistry;
use faugus_process::{ProcessTable, ProcessTreeController, Signaller, TerminateReport};
use tokio::process::Child;

use crate::state::AppState;

/// Executable name of the compatibility runner under each launch.
pub const HELPER_NAME: &str = "umu-run";
const DISCOVERY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(u32),
    /// The launch ended before the helper showed up.
    Exited(Option<i32>),
}

/// Poll `child`'s descendants for `name` until one appears or `child` exits.
pub async fn discover_helper<T: ProcessTable, S: Signaller>(
    controller: &ProcessTreeController<T, S>,
    child: &mut Child,
    name: &str,
    every: Duration,
) -> anyhow::Result<Discovery> {
    let pid = child.id().context("launch has no pid")?;
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            status = child.wait() => {
                let code = status.context("wait for launch")?.code();
                return Ok(Discovery::Exited(code));
            }
            _ = ticker.tick() => {
                match controller.find_descendant_named(pid, name) {
                    Ok(Some(helper)) => return Ok(Discovery::Found(helper)),
                    Ok(None) => {}
                    Err(err) => tracing::debug!(error = %err, "process table scan failed"),
                }
            }
        }
    }
}

/// `faugus-run` next to this executable, else from `PATH`.
fn orchestrator_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .map(|exe| exe.with_file_name("faugus-run"))
        .filter(|p| p.is_file())
        .unwrap_or_else(|| find_binary("faugus-run"))
}

/// Launch one game and block until its orchestrator exits.
pub async fn play(state: &AppState, gameid: &str) -> anyhow::Result<Option<i32>> {
    let store = GameStore::load(&state.settings.paths.games_file);
    let game = store
        .find(gameid)
        .ok_or_else(|| faugus_core::Error::GameNotFound(gameid.to_string()))?;
    let title = game.title.clone();
    if state.registry.is_running(&title) {
        anyhow::bail!("{title} is already running");
    }

    let bin = orchestrator_binary();
    let mut child = tokio::process::Command::new(&bin)
        .arg("--game")
        .arg(gameid)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn {}", bin.display()))?;
    let main_pid = child.id().context("launch has no pid")?;
    tracing::info!(title = %title, main_pid, "launched");

    match discover_helper(&*state.controller, &mut child, HELPER_NAME, DISCOVERY_INTERVAL).await? {
        Discovery::Exited(code) => {
            tracing::info!(title = %title, ?code, "launch ended before the runner started");
            Ok(code)
        }
        Discovery::Found(helper) => {
            let registry = state.registry.clone();
            let registered = title.clone();
            blocking(move || registry.register(&registered, main_pid, Some(helper))).await?;
            let status = child.wait().await.context("wait for launch")?;
            let registry = state.registry.clone();
            let finished = title.clone();
            blocking(move || registry.unregister(&finished)).await?;
            tracing::info!(title = %title, code = ?status.code(), "launch exited");
            Ok(status.code())
        }
    }
}

/// Run a registry call on the blocking pool; it may wait on the file lock.
async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> faugus_core::Result<T> + Send + 'static,
{
    let out = tokio::task::spawn_blocking(f)
        .await
        .context("registry task failed")??;
    Ok(out)
}

/// Terminate a running title's whole process tree and forget it.
pub fn stop<T: ProcessTable, S: Signaller>(
    registry: &RunningGameRegistry,
    controller: &ProcessTreeController<T, S>,
    title: &str,
) -> anyhow::Result<TerminateReport> {
    let entry = registry
        .get(title)
        .with_context(|| format!("{title} is not running"))?;
    let report = controller
        .terminate(entry.main)
        .with_context(|| format!("terminate {title}"))?;
    tracing::info!(
        title,
        signalled = report.signalled.len(),
        failed = report.failed.len(),
        "stopped"
    );
    registry.unregister(title)?;
    Ok(report)
}
