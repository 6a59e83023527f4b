use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use faugus_core::Settings;
use faugus_core::command::{RunnerChoice, last_token};
use faugus_core::runners::{latest_installed, pin_rolling_runner, rolling_family_of, runner_available};
use faugus_process::LaunchState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cli::Mode;
use crate::indicator::{Indicator, Notice};
use crate::log_file::GameLog;
use crate::output::{Readiness, Route, classify, route, strip_ansi};
use crate::prepare::{Prepared, augment, load_env_file, spawn_line};

/// How long to keep reading a child's pipes after it exited. A grandchild
/// that inherited them (wineserver) can hold them open indefinitely.
const PIPE_DRAIN: Duration = Duration::from_millis(500);
const LOG_FLUSH: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Prereqs,
    Game,
}

/// Messages from the pipe readers and the wait task to the controller.
#[derive(Debug)]
enum LaunchEvent {
    Line(String),
    Exited(Option<i32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit code of the launched shell, if it exited normally.
    Exited(Option<i32>),
    /// Nothing was spawned.
    RunnerNotFound(String),
}

/// Drives one launch from composed command line to child exit.
///
/// All indicator updates happen on the task calling [`Orchestrator::run`];
/// reader and wait tasks only send [`LaunchEvent`]s.
pub struct Orchestrator<'a, I: Indicator> {
    settings: &'a Settings,
    indicator: I,
    mode: Mode,
    state: LaunchState,
    history: Vec<LaunchState>,
    prepared: Prepared,
    readiness: Readiness,
    ready: bool,
    env: Vec<(String, String)>,
    game_log: Option<GameLog>,
    log_task: Option<JoinHandle<()>>,
}

impl<'a, I: Indicator> Orchestrator<'a, I> {
    pub fn new(message: &str, mode: Mode, settings: &'a Settings, indicator: I) -> Self {
        let prepared = augment(message, settings);
        let readiness = Readiness::for_message(&prepared.message);
        Self {
            settings,
            indicator,
            mode,
            state: LaunchState::Init,
            history: vec![LaunchState::Init],
            prepared,
            readiness,
            ready: false,
            env: Vec::new(),
            game_log: None,
            log_task: None,
        }
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    pub fn history(&self) -> &[LaunchState] {
        &self.history
    }

    /// The command line as it stands now (after augmentation and pinning).
    pub fn message(&self) -> &str {
        &self.prepared.message
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    fn transition(&mut self, next: LaunchState) {
        tracing::info!(from = ?self.state, to = ?next, "launch state");
        self.state = next;
        self.history.push(next);
    }

    pub async fn run(&mut self) -> anyhow::Result<Outcome> {
        self.indicator
            .set_primary(&RunnerChoice::of(&self.prepared.message).label());
        if !self.settings.config.splash_disable() {
            self.indicator.show();
        }
        if self.mode == Mode::LogViewer {
            self.indicator.open_log_viewer();
        }

        if let Some(title) = self.prepared.log_title.clone() {
            let path = self.settings.paths.game_log_dir(&title).join("umu.log");
            let (log, task) = GameLog::spawn(path);
            self.game_log = Some(log);
            self.log_task = Some(task);
        }
        self.env = load_env_file(&self.settings.paths.envar_file);

        if let Some(family) = rolling_family_of(&self.prepared.message) {
            self.transition(LaunchState::FetchingPrereqs);
            let resolver = self.settings.tools.proton_downloader.display().to_string();
            let code = self.run_stage(Stage::Prereqs, &resolver).await?;
            if code != Some(0) {
                tracing::warn!(?code, family = family.name, "runner download exited unsuccessfully");
            }
            match latest_installed(&self.settings.paths.compatibility_dir, family) {
                Some(version) => {
                    tracing::info!(family = family.name, %version, "pinned rolling runner");
                    self.prepared.message =
                        pin_rolling_runner(&self.prepared.message, family, &version);
                }
                None => tracing::warn!(family = family.name, "no installed build of rolling runner"),
            }
        }

        if let Err(runner) =
            runner_available(&self.prepared.message, &self.settings.paths.compatibility_dir)
        {
            tracing::error!(%runner, "runner not installed");
            self.indicator.close();
            self.indicator.close_log_viewer();
            self.indicator.notice(Notice::RunnerNotFound(runner.clone()));
            self.transition(LaunchState::Exited);
            self.finish_log().await;
            return Ok(Outcome::RunnerNotFound(runner));
        }

        self.transition(LaunchState::Running);
        let line = spawn_line(&self.prepared, self.settings);
        let code = self.run_stage(Stage::Game, &line).await?;

        self.transition(LaunchState::Exited);
        self.indicator.close();
        self.indicator.close_log_viewer();
        if last_token(&self.prepared.message).is_some_and(|t| t.ends_with(".reg")) {
            self.indicator.notice(Notice::RegistryImported);
        }
        self.finish_log().await;
        Ok(Outcome::Exited(code))
    }

    /// Spawn `bash -c <line>` and pump its events until it exits.
    async fn run_stage(&mut self, stage: Stage, line: &str) -> anyhow::Result<Option<i32>> {
        let mut rx = self.spawn(stage, line)?;
        while let Some(event) = rx.recv().await {
            match event {
                LaunchEvent::Line(raw) => self.handle_line(&raw),
                LaunchEvent::Exited(code) => {
                    tracing::info!(?stage, ?code, "child exited");
                    return Ok(code);
                }
            }
        }
        // every sender is gone without an exit report
        Ok(None)
    }

    fn spawn(&self, stage: Stage, line: &str) -> anyhow::Result<mpsc::UnboundedReceiver<LaunchEvent>> {
        let bash = &self.settings.tools.bash;
        let mut cmd = tokio::process::Command::new(bash);
        cmd.arg("-c")
            .arg(line)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {} for {stage:?}", bash.display()))?;
        tracing::debug!(?stage, pid = ?child.id(), %line, "spawned");

        let (tx, rx) = mpsc::unbounded_channel::<LaunchEvent>();
        let mut readers = Vec::new();
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, tx.clone()));
        }

        tokio::spawn(async move {
            let res = child.wait().await;
            let _ = tokio::time::timeout(PIPE_DRAIN, async {
                for r in readers {
                    let _ = r.await;
                }
            })
            .await;
            let code = match res {
                Ok(status) => status.code(),
                Err(err) => {
                    tracing::warn!(error = %err, "wait for child failed");
                    None
                }
            };
            let _ = tx.send(LaunchEvent::Exited(code));
        });

        Ok(rx)
    }

    fn handle_line(&mut self, raw: &str) {
        let cleaned = strip_ansi(raw);
        let line = cleaned.trim();

        if let Some(log) = &self.game_log {
            log.write(line);
        }

        let outcome = classify(line, self.readiness);
        if outcome.force_show {
            self.indicator.show();
        }
        if let Some(text) = outcome.primary {
            self.indicator.set_primary(text);
        }
        if let Some(text) = outcome.secondary {
            self.indicator.set_secondary(text);
        }
        if outcome.ready && !self.ready {
            self.ready = true;
            tracing::info!("game is up");
            self.indicator.close();
        }

        match route(line, self.mode == Mode::LogViewer) {
            Route::Drop => {}
            Route::Stdout => println!("{raw}"),
            Route::LogViewer => self.indicator.append_log(line),
        }
    }

    async fn finish_log(&mut self) {
        self.game_log = None;
        if let Some(task) = self.log_task.take() {
            let _ = tokio::time::timeout(LOG_FLUSH, task).await;
        }
    }
}

fn spawn_reader<R>(pipe: R, tx: mpsc::UnboundedSender<LaunchEvent>) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut segments = BufReader::new(pipe).split(b'\n');
        while let Ok(Some(bytes)) = segments.next_segment().await {
            let mut line = String::from_utf8_lossy(&bytes).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }
            if tx.send(LaunchEvent::Line(line)).is_err() {
                break;
            }
        }
    })
}
