use std::io;

use crate::{ProcessTable, Signal, Signaller};

/// Name fragments of compatibility-runtime processes swept by `kill_all`.
pub const KILL_ALL_PATTERNS: &[&str] = &[
    "wineserver",
    "wine64-preloader",
    "wine-preloader",
    "winedevice.exe",
    "umu-run",
    "pressure-vessel",
    ".exe",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminateReport {
    /// Pids that accepted the signal, in the order they were signalled.
    pub signalled: Vec<u32>,
    /// Pids that were gone (or refused) by the time we got to them.
    pub failed: Vec<u32>,
}

/// Starts nothing; only finds and signals. Every call walks a fresh snapshot
/// because the runner keeps spawning children after the initial launch.
#[derive(Debug, Clone)]
pub struct ProcessTreeController<T, S> {
    table: T,
    signaller: S,
}

impl<T: ProcessTable, S: Signaller> ProcessTreeController<T, S> {
    pub fn new(table: T, signaller: S) -> Self {
        Self { table, signaller }
    }

    /// SIGTERM every descendant of `main_pid`, then `main_pid` itself.
    pub fn terminate(&self, main_pid: u32) -> io::Result<TerminateReport> {
        let snapshot = self.table.snapshot()?;
        let mut report = TerminateReport::default();
        let targets = snapshot
            .descendants(main_pid)
            .into_iter()
            .chain(std::iter::once(main_pid));
        for pid in targets {
            match self.signaller.send(pid, Signal::Terminate) {
                Ok(()) => report.signalled.push(pid),
                Err(err) => {
                    tracing::debug!(pid, error = %err, "terminate: signal failed, continuing");
                    report.failed.push(pid);
                }
            }
        }
        tracing::info!(
            main_pid,
            signalled = report.signalled.len(),
            failed = report.failed.len(),
            "terminated process tree"
        );
        Ok(report)
    }

    /// SIGKILL every process whose executable name matches a
    /// compatibility-runtime pattern, regardless of what the registry believes.
    pub fn kill_all(&self) -> io::Result<Vec<u32>> {
        let snapshot = self.table.snapshot()?;
        let me = std::process::id();
        let mut killed = Vec::new();
        for p in snapshot.iter() {
            if p.pid == me || !KILL_ALL_PATTERNS.iter().any(|pat| p.name_contains(pat)) {
                continue;
            }
            match self.signaller.send(p.pid, Signal::Kill) {
                Ok(()) => killed.push(p.pid),
                Err(err) => tracing::debug!(pid = p.pid, error = %err, "kill_all: signal failed"),
            }
        }
        tracing::warn!(count = killed.len(), "killed all compatibility-runtime processes");
        Ok(killed)
    }

    /// Helper pid lookup used right after a launch: the first descendant of
    /// `root` whose executable is `name`.
    pub fn find_descendant_named(&self, root: u32, name: &str) -> io::Result<Option<u32>> {
        Ok(self.table.snapshot()?.find_descendant_named(root, name))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::testing::proc;
    use crate::{ProcState, ProcessInfo, ProcessSnapshot};

    struct FakeTable(Vec<ProcessInfo>);

    impl ProcessTable for FakeTable {
        fn snapshot(&self) -> io::Result<ProcessSnapshot> {
            Ok(ProcessSnapshot::new(self.0.clone()))
        }

        fn state_of(&self, pid: u32) -> ProcState {
            self.0
                .iter()
                .find(|p| p.pid == pid)
                .map(|p| p.state)
                .unwrap_or(ProcState::Dead)
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<(u32, Signal)>>,
        gone: Vec<u32>,
    }

    impl Signaller for &Recorder {
        fn send(&self, pid: u32, signal: Signal) -> io::Result<()> {
            self.sent.borrow_mut().push((pid, signal));
            if self.gone.contains(&pid) {
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }
            Ok(())
        }
    }

    fn game_tree() -> FakeTable {
        FakeTable(vec![
            proc(1, 0, "init"),
            proc(500, 1, "faugus-run"),
            proc(501, 500, "bash"),
            proc(502, 501, "umu-run"),
            proc(503, 502, "pressure-vessel"),
            proc(504, 503, "wineserver"),
            proc(505, 503, "doom.exe"),
            proc(600, 1, "firefox"),
        ])
    }

    #[test]
    fn terminate_signals_descendants_before_root() {
        let rec = Recorder::default();
        let ctl = ProcessTreeController::new(game_tree(), &rec);
        let report = ctl.terminate(500).unwrap();

        let sent = rec.sent.borrow();
        assert_eq!(sent.last(), Some(&(500, Signal::Terminate)));
        let pids: Vec<u32> = sent.iter().map(|(p, _)| *p).collect();
        assert_eq!(pids, vec![501, 502, 503, 504, 505, 500]);
        assert!(sent.iter().all(|(_, s)| *s == Signal::Terminate));
        assert_eq!(report.signalled, pids);
        assert!(!pids.contains(&600));
    }

    #[test]
    fn terminate_continues_past_vanished_descendants() {
        let rec = Recorder {
            gone: vec![502, 504],
            ..Default::default()
        };
        let ctl = ProcessTreeController::new(game_tree(), &rec);
        let report = ctl.terminate(500).unwrap();
        assert_eq!(report.failed, vec![502, 504]);
        assert_eq!(report.signalled, vec![501, 503, 505, 500]);
    }

    #[test]
    fn terminate_of_leaf_signals_only_root() {
        let rec = Recorder::default();
        let ctl = ProcessTreeController::new(game_tree(), &rec);
        ctl.terminate(600).unwrap();
        assert_eq!(*rec.sent.borrow(), vec![(600, Signal::Terminate)]);
    }

    #[test]
    fn kill_all_matches_runtime_patterns_only() {
        let rec = Recorder::default();
        let ctl = ProcessTreeController::new(game_tree(), &rec);
        let killed = ctl.kill_all().unwrap();
        assert_eq!(killed, vec![502, 503, 504, 505]);
        assert!(rec.sent.borrow().iter().all(|(_, s)| *s == Signal::Kill));
    }

    #[test]
    fn kill_all_spares_processes_with_exe_arguments() {
        let mut editor = proc(700, 1, "vim");
        editor.cmdline = vec!["vim".into(), "setup.exe".into()];
        let mut checksum = proc(701, 1, "sha256sum");
        checksum.cmdline = vec![
            "/usr/bin/sha256sum".into(),
            "/home/u/Downloads/GOG_setup.exe".into(),
        ];
        let mut game = proc(702, 1, "setup.exe");
        game.cmdline = vec!["C:\\setup.exe".into()];

        let rec = Recorder::default();
        let ctl = ProcessTreeController::new(FakeTable(vec![editor, checksum, game]), &rec);
        assert_eq!(ctl.kill_all().unwrap(), vec![702]);
    }

    #[test]
    fn helper_discovery_finds_runner_under_root() {
        let rec = Recorder::default();
        let ctl = ProcessTreeController::new(game_tree(), &rec);
        assert_eq!(ctl.find_descendant_named(500, "umu-run").unwrap(), Some(502));
        assert_eq!(ctl.find_descendant_named(600, "umu-run").unwrap(), None);
        assert!(rec.sent.borrow().is_empty());
    }
}
