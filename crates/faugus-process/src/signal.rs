use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM: ask the process to exit.
    Terminate,
    /// SIGKILL.
    Kill,
}

pub trait Signaller {
    fn send(&self, pid: u32, signal: Signal) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSignaller;

impl Signaller for SystemSignaller {
    #[cfg(unix)]
    fn send(&self, pid: u32, signal: Signal) -> io::Result<()> {
        // kill(0, ..) and kill(-1, ..) address whole groups; never allow them.
        let pid = i32::try_from(pid)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid pid"))?;
        let sig = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        let rc = unsafe { libc::kill(pid, sig) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn send(&self, _pid: u32, _signal: Signal) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "signals are unix-only"))
    }
}
