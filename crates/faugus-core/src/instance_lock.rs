use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use crate::Error;

const LOCK_RETRY: Duration = Duration::from_millis(20);

/// An exclusive advisory `flock` on a file. Released on drop (and by the
/// kernel if the process dies). The file itself is never deleted.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

#[cfg(unix)]
fn flock(file: &File, op: libc::c_int) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    loop {
        let rc = unsafe { libc::flock(file.as_raw_fd(), op) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

impl FileLock {
    /// Take the lock without waiting. `Ok(None)` when someone else holds it.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = open_lock_file(path)?;
        #[cfg(unix)]
        if let Err(err) = flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                return Ok(None);
            }
            return Err(err);
        }
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// Retry [`FileLock::try_acquire`] until `wait` has passed. `Ok(None)`
    /// when the holder kept the lock the whole time.
    pub fn acquire_within(path: &Path, wait: Duration) -> io::Result<Option<Self>> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                return Ok(Some(lock));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(LOCK_RETRY.min(deadline - now));
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        let _ = flock(&self.file, libc::LOCK_UN);
    }
}

/// Guarantees a single long-lived launcher per user. Hold the value for the
/// life of the process; dropping it releases the lock.
#[derive(Debug)]
pub struct SingleInstanceGate {
    lock: FileLock,
}

impl SingleInstanceGate {
    /// Fails immediately with [`Error::AlreadyRunning`] if another instance
    /// holds the lock. Never waits.
    pub fn acquire(path: &Path) -> crate::Result<Self> {
        match FileLock::try_acquire(path) {
            Ok(Some(lock)) => {
                tracing::debug!(path = %path.display(), "instance lock acquired");
                Ok(Self { lock })
            }
            Ok(None) => Err(Error::AlreadyRunning(path.to_path_buf())),
            Err(source) => Err(Error::Io {
                context: format!("open lock file {}", path.display()),
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        self.lock.path()
    }
}
