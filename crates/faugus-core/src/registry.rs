//! `running_games.json`: which titles the launcher believes are running.
//!
//! Written by whichever process started a game and reconciled by the
//! long-lived launcher once a second. Every mutation takes an exclusive
//! `flock` on a sidecar `.lock` file for its read-merge-write and replaces the
//! data file by rename, so concurrent launches no longer drop each other's
//! entries and readers never see a torn file. The lock wait is bounded: a
//! reconcile pass that cannot get it is skipped, and register/unregister fall
//! back to an unlocked last-writer-wins update.
//!
//! All of this is blocking file I/O; async callers go through
//! `spawn_blocking`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use faugus_process::ProcessTable;
use serde::{Deserialize, Serialize};

use crate::error::{IoContext, write_atomic};
use crate::instance_lock::FileLock;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningGameEntry {
    /// Top-level pid of the launch (the orchestrator).
    pub main: u32,
    /// Pid of the compatibility runner under it, once discovered.
    #[serde(rename = "umu", default)]
    pub helper: Option<u32>,
}

pub type RunningGames = BTreeMap<String, RunningGameEntry>;

const LOCK_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RunningGameRegistry {
    path: PathBuf,
    lock_path: PathBuf,
    lock_wait: Duration,
}

impl RunningGameRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.as_os_str().to_owned();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
            lock_wait: LOCK_WAIT,
        }
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents. Missing or malformed file reads as empty.
    pub fn read(&self) -> RunningGames {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(_) => return RunningGames::new(),
        };
        match serde_json::from_slice(&raw) {
            Ok(v) => v,
            Err(err) => {
                tracing::debug!(path = %self.path.display(), error = %err, "running games file malformed, treating as empty");
                RunningGames::new()
            }
        }
    }

    fn write(&self, games: &RunningGames) -> crate::Result<()> {
        let data = serde_json::to_vec_pretty(games).map_err(|source| Error::Json {
            context: "serialize running games".to_string(),
            source,
        })?;
        write_atomic(&self.path, &data)
    }

    /// `None` when another process held the lock for the whole wait.
    fn lock(&self) -> crate::Result<Option<FileLock>> {
        let lock = FileLock::acquire_within(&self.lock_path, self.lock_wait)
            .io_context(|| format!("lock {}", self.lock_path.display()))?;
        if lock.is_none() {
            tracing::warn!(path = %self.lock_path.display(), "running games lock is busy");
        }
        Ok(lock)
    }

    fn modify<T>(&self, f: impl FnOnce(&mut RunningGames) -> (T, bool)) -> crate::Result<T> {
        let mut games = self.read();
        let (out, changed) = f(&mut games);
        if changed {
            self.write(&games)?;
        }
        Ok(out)
    }

    pub fn register(&self, title: &str, main_pid: u32, helper_pid: Option<u32>) -> crate::Result<()> {
        let _lock = self.lock()?;
        self.modify(|games| {
            games.insert(
                title.to_string(),
                RunningGameEntry {
                    main: main_pid,
                    helper: helper_pid,
                },
            );
            ((), true)
        })?;
        tracing::info!(title, main_pid, ?helper_pid, "registered running game");
        Ok(())
    }

    pub fn unregister(&self, title: &str) -> crate::Result<Option<RunningGameEntry>> {
        let _lock = self.lock()?;
        self.modify(|games| {
            let removed = games.remove(title);
            let changed = removed.is_some();
            (removed, changed)
        })
    }

    /// Drop every entry whose main pid is gone or a zombie. Rewrites the file
    /// only when something was removed; returns the removed titles. Does
    /// nothing when the lock stays busy; the next pass catches up.
    pub fn reconcile(&self, table: &impl ProcessTable) -> crate::Result<Vec<String>> {
        let Some(_lock) = self.lock()? else {
            return Ok(Vec::new());
        };
        let removed = self.modify(|games| {
            let dead: Vec<String> = games
                .iter()
                .filter(|(_, e)| !table.is_alive(e.main))
                .map(|(title, _)| title.clone())
                .collect();
            for title in &dead {
                games.remove(title);
            }
            let changed = !dead.is_empty();
            (dead, changed)
        })?;
        for title in &removed {
            tracing::info!(title = %title, "game no longer running");
        }
        Ok(removed)
    }

    pub fn get(&self, title: &str) -> Option<RunningGameEntry> {
        self.read().get(title).copied()
    }

    pub fn is_running(&self, title: &str) -> bool {
        self.read().contains_key(title)
    }
}
