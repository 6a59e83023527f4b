use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("a game with id {0:?} already exists")]
    DuplicateGameId(String),

    #[error("another instance is already running (lock held on {})", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("{0} was not found.")]
    RunnerNotFound(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) trait IoContext<T> {
    fn io_context(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|source| Error::Io {
            context: context(),
            source,
        })
    }
}

/// Write `data` to `path` via a sibling temp file and rename, so readers in
/// other processes never observe a half-written file.
pub(crate) fn write_atomic(path: &std::path::Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .io_context(|| format!("create dir {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", std::process::id()));
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, data).io_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).io_context(|| format!("persist {}", path.display()))?;
    Ok(())
}
