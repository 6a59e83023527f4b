//! Per-game `umu.log`: emptied when a run prints its first line, then
//! appended to and rotated by size into `umu.log.1`, `umu.log.2`, ...

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLimits {
    /// Size at which the live file is rotated out.
    pub max_bytes: u64,
    /// Rotated files kept next to the live one.
    pub keep: usize,
}

impl Default for LogLimits {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            keep: 3,
        }
    }
}

fn clamped<T: FromStr + Ord>(raw: Option<String>, default: T, min: T, max: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .map(|v| v.clamp(min, max))
        .unwrap_or(default)
}

impl LogLimits {
    /// `FAUGUS_LOG_FILE_MAX_BYTES` (256 KiB..1 GiB) and
    /// `FAUGUS_LOG_FILE_MAX_FILES` (1..20); unset or unparsable keeps the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_bytes: clamped(
                var("FAUGUS_LOG_FILE_MAX_BYTES"),
                defaults.max_bytes,
                256 * 1024,
                1024 * 1024 * 1024,
            ),
            keep: clamped(var("FAUGUS_LOG_FILE_MAX_FILES"), defaults.keep, 1, 20),
        }
    }
}

fn generation(base: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// The open live file and how much of it this run has written.
struct LiveFile {
    path: PathBuf,
    limits: LogLimits,
    file: File,
    written: u64,
}

impl LiveFile {
    async fn start(path: PathBuf, limits: LogLimits) -> std::io::Result<Self> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            limits,
            file,
            written: 0,
        })
    }

    async fn shift_generations(&mut self) -> std::io::Result<()> {
        self.file.flush().await?;
        for n in (1..=self.limits.keep).rev() {
            let from = if n == 1 {
                self.path.clone()
            } else {
                generation(&self.path, n - 1)
            };
            match tokio::fs::rename(&from, generation(&self.path, n)).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        self.written = 0;
        Ok(())
    }

    async fn append(&mut self, line: &str) -> std::io::Result<()> {
        let len = line.len() as u64 + 1;
        if self.written > 0 && self.written + len > self.limits.max_bytes {
            if let Err(err) = self.shift_generations().await {
                tracing::debug!(path = %self.path.display(), error = %err, "log rotation failed");
            }
        }
        self.file.write_all(line.as_bytes()).await?;
        self.file.write_all(b"\n").await?;
        self.file.flush().await?;
        self.written += len;
        Ok(())
    }
}

/// Sends lines to a background writer task. The file is only opened (and
/// emptied) once the first line arrives, so a run that prints nothing keeps
/// the previous log.
#[derive(Clone)]
pub struct GameLog {
    tx: mpsc::UnboundedSender<String>,
}

impl GameLog {
    pub fn spawn(path: PathBuf) -> (Self, JoinHandle<()>) {
        Self::spawn_with(path, LogLimits::from_env())
    }

    fn spawn_with(path: PathBuf, limits: LogLimits) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(async move {
            let Some(first) = rx.recv().await else {
                return;
            };
            let mut live = match LiveFile::start(path.clone(), limits).await {
                Ok(live) => live,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "cannot open game log");
                    return;
                }
            };
            let mut line = Some(first);
            while let Some(text) = line {
                if let Err(err) = live.append(&text).await {
                    tracing::debug!(path = %path.display(), error = %err, "game log write failed");
                }
                line = rx.recv().await;
            }
        });
        (Self { tx }, task)
    }

    pub fn write(&self, line: &str) {
        let _ = self.tx.send(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_dir_for;

    #[tokio::test]
    async fn first_line_truncates_previous_run() {
        let dir = temp_dir_for("log-truncate");
        let path = dir.join("Doom").join("umu.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "old run\n").unwrap();

        let (log, task) = GameLog::spawn(path.clone());
        log.write("first");
        log.write("second");
        drop(log);
        task.await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn no_lines_leaves_file_untouched() {
        let dir = temp_dir_for("log-untouched");
        let path = dir.join("umu.log");
        std::fs::write(&path, "old run\n").unwrap();

        let (log, task) = GameLog::spawn(path.clone());
        drop(log);
        task.await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old run\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn rotates_when_full() {
        let dir = temp_dir_for("log-rotate");
        let path = dir.join("umu.log");
        let limits = LogLimits {
            max_bytes: 10,
            keep: 2,
        };

        let (log, task) = GameLog::spawn_with(path.clone(), limits);
        for line in ["aaaaaaa", "bbbbbbb", "ccccccc", "ddddddd"] {
            log.write(line);
        }
        drop(log);
        task.await.unwrap();

        let read = |p: PathBuf| std::fs::read_to_string(p).unwrap();
        assert_eq!(read(path.clone()), "ddddddd\n");
        assert_eq!(read(dir.join("umu.log.1")), "ccccccc\n");
        assert_eq!(read(dir.join("umu.log.2")), "bbbbbbb\n");
        assert!(!dir.join("umu.log.3").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn limits_are_clamped_and_default_on_garbage() {
        let limits = LogLimits::from_lookup(|name| match name {
            "FAUGUS_LOG_FILE_MAX_BYTES" => Some("1".to_string()),
            "FAUGUS_LOG_FILE_MAX_FILES" => Some("500".to_string()),
            _ => None,
        });
        assert_eq!(limits, LogLimits { max_bytes: 256 * 1024, keep: 20 });

        let limits = LogLimits::from_lookup(|_| Some("lots".to_string()));
        assert_eq!(limits, LogLimits::default());
    }
}
