use std::collections::{HashSet, VecDeque};

pub mod procfs;
pub mod signal;
pub mod tree;

pub use procfs::ProcFs;
pub use signal::{Signal, Signaller, SystemSignaller};
pub use tree::{KILL_ALL_PATTERNS, ProcessTreeController, TerminateReport};

/// Identifies one orchestrator run in logs. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LaunchId(pub String);

impl LaunchId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for LaunchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LaunchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a single orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LaunchState {
    Init,
    FetchingPrereqs,
    Running,
    Exited,
}

/// Scheduler state as reported by the kernel (`/proc/<pid>/stat` field 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProcState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Zombie,
    Dead,
    Unknown,
}

impl ProcState {
    pub fn from_stat_char(c: char) -> Self {
        match c {
            'R' => Self::Running,
            'S' | 'I' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'T' | 't' => Self::Stopped,
            'Z' => Self::Zombie,
            'X' | 'x' => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// Zombies count as gone: they have exited and only wait to be reaped.
    pub fn is_alive(self) -> bool {
        !matches!(self, Self::Zombie | Self::Dead)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    /// Kernel `comm` name (truncated to 15 bytes by the kernel).
    pub name: String,
    pub state: ProcState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmdline: Vec<String>,
}

fn basename(arg: &str) -> &str {
    arg.rsplit('/').next().unwrap_or(arg)
}

impl ProcessInfo {
    /// Interpreted launchers such as `python3 /usr/bin/umu-run` only show
    /// their real name in argv[1], so that counts too.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.cmdline.iter().take(2).any(|a| basename(a) == name)
    }

    /// Substring match on `comm` and the argv[0] basename. Arguments never
    /// count: `vim setup.exe` is not a Windows process.
    pub fn name_contains(&self, pattern: &str) -> bool {
        self.name.contains(pattern)
            || self
                .cmdline
                .first()
                .is_some_and(|a| basename(a).contains(pattern))
    }
}

/// A point-in-time copy of the OS process table. Built fresh for every
/// operation and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    processes: Vec<ProcessInfo>,
}

impl ProcessSnapshot {
    pub fn new(processes: Vec<ProcessInfo>) -> Self {
        Self { processes }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessInfo> {
        self.processes.iter()
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessInfo> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    pub fn children(&self, pid: u32) -> impl Iterator<Item = &ProcessInfo> {
        self.processes
            .iter()
            .filter(move |p| p.ppid == pid && p.pid != pid)
    }

    /// All live-or-zombie descendants of `root` in breadth-first order,
    /// excluding `root` itself.
    pub fn descendants(&self, root: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(pid) = queue.pop_front() {
            for child in self.children(pid) {
                if seen.insert(child.pid) {
                    out.push(child.pid);
                    queue.push_back(child.pid);
                }
            }
        }
        out
    }

    /// First descendant of `root` (breadth-first) whose executable is `name`.
    pub fn find_descendant_named(&self, root: u32, name: &str) -> Option<u32> {
        self.descendants(root)
            .into_iter()
            .find(|pid| self.get(*pid).is_some_and(|p| p.is_named(name)))
    }
}

/// Source of process-table snapshots and liveness checks.
pub trait ProcessTable {
    fn snapshot(&self) -> std::io::Result<ProcessSnapshot>;

    /// State of a single pid; a pid that no longer exists is `Dead`.
    fn state_of(&self, pid: u32) -> ProcState;

    fn is_alive(&self, pid: u32) -> bool {
        self.state_of(pid).is_alive()
    }
}
