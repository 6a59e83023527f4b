use std::{cmp::Ordering, path::Path};

use regex::{Captures, Regex};

use crate::command::env_value;

/// A runner name that stands for "newest installed build of this family" and
/// must be pinned to a concrete directory before launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingFamily {
    pub name: &'static str,
    pub dir_prefix: &'static str,
}

pub const ROLLING_FAMILIES: &[RollingFamily] = &[RollingFamily {
    name: "Proton-EM",
    dir_prefix: "proton-EM-",
}];

/// Runners the compatibility runner downloads on its own, so they need not
/// exist locally.
pub const SELF_MANAGED_RUNNERS: &[&str] = &["GE-Proton"];

/// Rolling family referenced by the line's `PROTONPATH`, if any.
pub fn rolling_family_of(line: &str) -> Option<&'static RollingFamily> {
    let runner = env_value(line, "PROTONPATH")?;
    ROLLING_FAMILIES.iter().find(|f| f.name == runner)
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut digits: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let d = c.is_ascii_digit();
        match digits {
            Some(prev) if prev != d => {
                out.push(if prev {
                    Chunk::Digits(&s[start..i])
                } else {
                    Chunk::Text(&s[start..i])
                });
                start = i;
            }
            _ => {}
        }
        digits = Some(d);
    }
    match digits {
        Some(true) => out.push(Chunk::Digits(&s[start..])),
        Some(false) => out.push(Chunk::Text(&s[start..])),
        None => {}
    }
    out
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    // Compare by magnitude without parsing so long runs cannot overflow.
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering: digit runs compare numerically, everything else
/// lexicographically. `proton-EM-10.0-2` sorts after `proton-EM-9.5-30`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ca = chunks(a);
    let cb = chunks(b);
    for (x, y) in ca.iter().zip(cb.iter()) {
        let ord = match (x, y) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len()).then_with(|| a.cmp(b))
}

/// Names of runner directories under `dir` starting with `prefix`.
pub fn installed_runners(dir: &Path, prefix: &str) -> Vec<String> {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    rd.flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix))
        .collect()
}

pub fn latest_installed(dir: &Path, family: &RollingFamily) -> Option<String> {
    installed_runners(dir, family.dir_prefix)
        .into_iter()
        .max_by(|a, b| natural_cmp(a, b))
}

/// Replace every whole `PROTONPATH=<family>` token with `PROTONPATH=<version>`.
pub fn pin_rolling_runner(line: &str, family: &RollingFamily, version: &str) -> String {
    let pattern = format!(r"\bPROTONPATH={}(\s|$)", regex::escape(family.name));
    let token = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            tracing::warn!(error = %err, family = family.name, "cannot build runner pattern");
            return line.to_string();
        }
    };
    token
        .replace_all(line, |caps: &Captures| format!("PROTONPATH={version}{}", &caps[1]))
        .into_owned()
}

/// Whether the runner named in `line` can be used. Missing `PROTONPATH`
/// (bundled default) and self-managed runners always pass.
pub fn runner_available(line: &str, compatibility_dir: &Path) -> Result<(), String> {
    let Some(runner) = env_value(line, "PROTONPATH") else {
        return Ok(());
    };
    if SELF_MANAGED_RUNNERS.contains(&runner) || compatibility_dir.join(runner).is_dir() {
        return Ok(());
    }
    Err(runner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_dir_for;

    const EM: &RollingFamily = &ROLLING_FAMILIES[0];

    #[test]
    fn natural_order_compares_digit_runs_numerically() {
        assert_eq!(natural_cmp("proton-EM-10.0-2", "proton-EM-9.5-30"), Ordering::Greater);
        assert_eq!(natural_cmp("proton-EM-10.0-2", "proton-EM-10.0-10"), Ordering::Less);
        assert_eq!(natural_cmp("a007", "a7"), Ordering::Less);
        assert_eq!(natural_cmp("x1", "x1"), Ordering::Equal);
        assert_eq!(natural_cmp("x1", "x1b"), Ordering::Less);
    }

    #[test]
    fn chunks_split_on_digit_boundaries() {
        assert_eq!(
            chunks("em-10.2"),
            vec![
                Chunk::Text("em-"),
                Chunk::Digits("10"),
                Chunk::Text("."),
                Chunk::Digits("2")
            ]
        );
        assert!(chunks("").is_empty());
    }

    #[test]
    fn latest_installed_picks_natural_max_of_family() {
        let dir = temp_dir_for("runners-latest");
        for name in ["proton-EM-9.5-30", "proton-EM-10.0-2", "proton-EM-10.0-10", "GE-Proton9-20"] {
            std::fs::create_dir_all(dir.join(name)).unwrap();
        }
        std::fs::write(dir.join("proton-EM-99.0-1"), b"not a dir").unwrap();

        assert_eq!(latest_installed(&dir, EM).as_deref(), Some("proton-EM-10.0-10"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn latest_installed_none_when_family_absent() {
        let dir = temp_dir_for("runners-none");
        assert_eq!(latest_installed(&dir, EM), None);
        assert_eq!(latest_installed(&dir.join("missing"), EM), None);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn pin_replaces_only_whole_tokens() {
        let line = "GAMEID=x PROTONPATH=Proton-EM 'umu-run' 'a.exe'";
        assert_eq!(
            pin_rolling_runner(line, EM, "proton-EM-10.0-10"),
            "GAMEID=x PROTONPATH=proton-EM-10.0-10 'umu-run' 'a.exe'"
        );
        let other = "PROTONPATH=Proton-EMX 'umu-run'";
        assert_eq!(pin_rolling_runner(other, EM, "v"), other);
        assert_eq!(pin_rolling_runner("PROTONPATH=Proton-EM", EM, "v"), "PROTONPATH=v");
        assert_eq!(
            pin_rolling_runner("PROTONPATH=Proton-EM\tPROTONPATH=Proton-EM x", EM, "v"),
            "PROTONPATH=v\tPROTONPATH=v x"
        );
        assert_eq!(pin_rolling_runner("XPROTONPATH=Proton-EM x", EM, "v"), "XPROTONPATH=Proton-EM x");
    }

    #[test]
    fn rolling_family_detection() {
        assert_eq!(rolling_family_of("PROTONPATH=Proton-EM 'umu-run'"), Some(EM));
        assert_eq!(rolling_family_of("PROTONPATH=GE-Proton 'umu-run'"), None);
        assert_eq!(rolling_family_of("'umu-run' 'Proton-EM.exe'"), None);
    }

    #[test]
    fn runner_availability() {
        let dir = temp_dir_for("runners-available");
        std::fs::create_dir_all(dir.join("GE-Proton9-20")).unwrap();
        assert!(runner_available("GAMEID=x 'umu-run'", &dir).is_ok());
        assert!(runner_available("PROTONPATH=GE-Proton 'umu-run'", &dir).is_ok());
        assert!(runner_available("PROTONPATH=GE-Proton9-20 'umu-run'", &dir).is_ok());
        assert_eq!(
            runner_available("PROTONPATH=Proton-EM 'umu-run'", &dir),
            Err("Proton-EM".to_string())
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
