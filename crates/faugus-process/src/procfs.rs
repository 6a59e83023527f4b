use std::path::PathBuf;

use crate::{ProcState, ProcessInfo, ProcessSnapshot, ProcessTable};

/// Process table backed by a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_process(&self, pid: u32) -> Option<ProcessInfo> {
        let dir = self.root.join(pid.to_string());
        let stat = std::fs::read_to_string(dir.join("stat")).ok()?;
        let (name, state, ppid) = parse_stat(&stat)?;
        // Kernel threads and zombies have an empty cmdline.
        let cmdline = std::fs::read(dir.join("cmdline"))
            .map(|raw| parse_cmdline(&raw))
            .unwrap_or_default();
        Some(ProcessInfo {
            pid,
            ppid,
            name,
            state,
            cmdline,
        })
    }
}

/// Parses `pid (comm) S ppid ...`. `comm` may itself contain spaces and
/// parentheses, so the name ends at the last `)`.
pub fn parse_stat(s: &str) -> Option<(String, ProcState, u32)> {
    let start = s.find('(')?;
    let end = s.rfind(')')?;
    if end < start {
        return None;
    }
    let name = s.get(start + 1..end)?.to_string();
    let rest = s.get(end + 1..)?;
    let mut it = rest.split_whitespace();
    let state = it.next()?.chars().next().map(ProcState::from_stat_char)?;
    let ppid = it.next()?.parse().ok()?;
    Some((name, state, ppid))
}

fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|b| *b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}

impl ProcessTable for ProcFs {
    fn snapshot(&self) -> std::io::Result<ProcessSnapshot> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.root)?.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            // The process may exit between readdir and the stat read.
            if let Some(info) = self.read_process(pid) {
                out.push(info);
            }
        }
        out.sort_by_key(|p| p.pid);
        Ok(ProcessSnapshot::new(out))
    }

    fn state_of(&self, pid: u32) -> ProcState {
        if pid == 0 {
            return ProcState::Dead;
        }
        let path = self.root.join(pid.to_string()).join("stat");
        match std::fs::read_to_string(path) {
            Ok(s) => parse_stat(&s)
                .map(|(_, state, _)| state)
                .unwrap_or(ProcState::Unknown),
            Err(_) => ProcState::Dead,
        }
    }
}
