use std::path::{Path, PathBuf};

const APP_DIR: &str = "faugus-launcher";

/// Per-user file locations. Resolved once from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub is_flatpak: bool,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub envar_file: PathBuf,
    pub games_file: PathBuf,
    pub running_games_file: PathBuf,
    pub logs_dir: PathBuf,
    pub eac_runtime_dir: PathBuf,
    pub be_runtime_dir: PathBuf,
    pub default_prefixes_dir: PathBuf,
    pub share_dir: PathBuf,
    pub compatibility_dir: PathBuf,
    pub lock_file: PathBuf,
}

impl Paths {
    pub fn from_env() -> Self {
        let flatpak = std::env::var_os("FLATPAK_ID").is_some()
            || Path::new("/.flatpak-info").exists();
        Self::from_vars(|k| std::env::var(k).ok(), flatpak)
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>, is_flatpak: bool) -> Self {
        let non_empty = |k: &str| var(k).filter(|v| !v.trim().is_empty()).map(PathBuf::from);
        let home = non_empty("HOME").unwrap_or_else(|| PathBuf::from("/"));
        let config_home = non_empty("XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config"));
        let data_home = non_empty("XDG_DATA_HOME").unwrap_or_else(|| home.join(".local/share"));
        let share_dir = if is_flatpak {
            home.join(".local/share")
        } else {
            data_home.clone()
        };

        let config_dir = config_home.join(APP_DIR);
        Self {
            is_flatpak,
            config_file: config_dir.join("config.ini"),
            envar_file: config_dir.join("envar.txt"),
            games_file: config_dir.join("games.json"),
            running_games_file: config_dir.join("running_games.json"),
            logs_dir: config_dir.join("logs"),
            eac_runtime_dir: config_dir.join("components/eac"),
            be_runtime_dir: config_dir.join("components/be"),
            default_prefixes_dir: home.join("Faugus"),
            compatibility_dir: share_dir.join("Steam/compatibilitytools.d"),
            lock_file: data_home.join(APP_DIR).join("faugus-launcher.lock"),
            share_dir,
            config_dir,
        }
    }

    /// Directory holding one game's runner logs and `umu.log`.
    pub fn game_log_dir(&self, title: &str) -> PathBuf {
        self.logs_dir.join(title)
    }
}

/// Locate `name` on `PATH`, falling back to `/usr/bin/<name>`.
pub fn find_binary(name: &str) -> PathBuf {
    let path_var = std::env::var("PATH").unwrap_or_default();
    find_binary_in(&path_var, name)
}

pub fn find_binary_in(path_var: &str, name: &str) -> PathBuf {
    path_var
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(name))
        .find(|p| p.exists())
        .unwrap_or_else(|| Path::new("/usr/bin").join(name))
}

const LIB_DIRS: &[&str] = &[
    "/usr/lib",
    "/usr/lib32",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib64",
];

pub fn find_library(name: &str) -> Option<PathBuf> {
    LIB_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|p| p.exists())
}

/// External executables the launcher drives or wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub umu_run: PathBuf,
    pub components: PathBuf,
    pub proton_downloader: PathBuf,
    pub bash: PathBuf,
    pub mangohud: Option<PathBuf>,
    pub gamemoderun: Option<PathBuf>,
}

impl Tools {
    pub fn discover() -> Self {
        let path_var = std::env::var("PATH").unwrap_or_default();
        Self::discover_in(&path_var)
    }

    pub fn discover_in(path_var: &str) -> Self {
        let installed = |name: &str| Some(find_binary_in(path_var, name)).filter(|p| p.exists());
        Self {
            umu_run: find_binary_in(path_var, "umu-run"),
            components: find_binary_in(path_var, "faugus-components"),
            proton_downloader: find_binary_in(path_var, "faugus-proton-downloader"),
            bash: find_binary_in(path_var, "bash"),
            mangohud: installed("mangohud"),
            gamemoderun: installed("gamemoderun"),
        }
    }

    pub fn has_mangohud(&self) -> bool {
        self.mangohud.is_some()
    }

    pub fn has_gamemode(&self) -> bool {
        self.gamemoderun.is_some()
    }

    /// `LD_PRELOAD` value for gamemode's client libraries, if any are present.
    pub fn gamemode_preload() -> String {
        ["libgamemode.so.0", "libgamemodeauto.so.0"]
            .iter()
            .filter_map(|lib| find_library(lib))
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_dir_for;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |k| {
            pairs
                .iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults_follow_home() {
        let p = Paths::from_vars(vars(&[("HOME", "/home/u")]), false);
        assert_eq!(
            p.running_games_file,
            PathBuf::from("/home/u/.config/faugus-launcher/running_games.json")
        );
        assert_eq!(
            p.games_file,
            PathBuf::from("/home/u/.config/faugus-launcher/games.json")
        );
        assert_eq!(p.default_prefixes_dir, PathBuf::from("/home/u/Faugus"));
        assert_eq!(
            p.compatibility_dir,
            PathBuf::from("/home/u/.local/share/Steam/compatibilitytools.d")
        );
        assert_eq!(
            p.lock_file,
            PathBuf::from("/home/u/.local/share/faugus-launcher/faugus-launcher.lock")
        );
    }

    #[test]
    fn xdg_overrides_apply() {
        let p = Paths::from_vars(
            vars(&[
                ("HOME", "/home/u"),
                ("XDG_CONFIG_HOME", "/cfg"),
                ("XDG_DATA_HOME", "/data"),
            ]),
            false,
        );
        assert_eq!(p.config_file, PathBuf::from("/cfg/faugus-launcher/config.ini"));
        assert_eq!(
            p.compatibility_dir,
            PathBuf::from("/data/Steam/compatibilitytools.d")
        );
        assert_eq!(p.game_log_dir("doom"), PathBuf::from("/cfg/faugus-launcher/logs/doom"));
    }

    #[test]
    fn flatpak_share_dir_ignores_xdg_data_home() {
        let p = Paths::from_vars(
            vars(&[("HOME", "/home/u"), ("XDG_DATA_HOME", "/var/app/data")]),
            true,
        );
        assert_eq!(p.share_dir, PathBuf::from("/home/u/.local/share"));
        assert!(p.lock_file.starts_with("/var/app/data"));
    }

    #[test]
    fn find_binary_scans_path_then_falls_back() {
        let dir = temp_dir_for("find-binary");
        std::fs::write(dir.join("umu-run"), b"#!/bin/sh\n").unwrap();
        let path_var = format!("/nonexistent:{}", dir.display());

        assert_eq!(find_binary_in(&path_var, "umu-run"), dir.join("umu-run"));
        assert_eq!(
            find_binary_in(&path_var, "definitely-missing"),
            PathBuf::from("/usr/bin/definitely-missing")
        );

        let tools = Tools::discover_in(&path_var);
        assert_eq!(tools.umu_run, dir.join("umu-run"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
