//! Composition of the environment-prefixed shell line that launches a game,
//! plus the small token lookups the orchestrator performs on such lines.
//!
//! The compatibility runner and the orchestrator both scan this text for
//! specific `KEY=VALUE` tokens, so the token order and spelling are part of
//! the contract.

use std::path::PathBuf;

use crate::games::GameConfig;

/// Defaults the composer needs beyond the game record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeDefaults {
    pub umu_run: PathBuf,
    pub mangohud_installed: bool,
    pub gamemode_installed: bool,
}

impl ComposeDefaults {
    pub fn from_tools(tools: &crate::paths::Tools) -> Self {
        Self {
            umu_run: tools.umu_run.clone(),
            mangohud_installed: tools.has_mangohud(),
            gamemode_installed: tools.has_gamemode(),
        }
    }
}

/// Build the launch line for `game`. Pure: same input, same bytes.
pub fn compose(game: &GameConfig, defaults: &ComposeDefaults) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !game.gameid.is_empty() {
        parts.push(format!("FAUGUS_LOG='{}'", game.gameid));
    }
    if game.mangohud && defaults.mangohud_installed {
        parts.push("MANGOHUD=1".to_string());
    }
    if game.disable_hidraw {
        parts.push("PROTON_DISABLE_HIDRAW=1".to_string());
    }
    if !game.is_native() && !game.prefix.is_empty() {
        parts.push(format!("WINEPREFIX='{}'", game.prefix));
    }
    let gameid = if game.protonfix.is_empty() {
        &game.gameid
    } else {
        &game.protonfix
    };
    parts.push(format!("GAMEID={gameid}"));
    if game.is_native() {
        parts.push("UMU_NO_PROTON=1".to_string());
    } else if !game.runner.is_empty() {
        parts.push(format!("PROTONPATH={}", game.runner));
    }
    if game.gamemode && defaults.gamemode_installed {
        parts.push("gamemoderun".to_string());
    }
    if !game.launch_arguments.is_empty() {
        parts.push(game.launch_arguments.clone());
    }
    if let Some(n) = game.lossless {
        parts.push(format!("LSFG_LEGACY=1 LSFG_MULTIPLIER={n}"));
    }
    parts.push(quote(&defaults.umu_run.display().to_string()));
    if game.addapp_enabled {
        parts.push(quote(&game.addapp_script));
    } else {
        parts.push(quote(&game.path));
    }
    if !game.game_arguments.is_empty() {
        parts.push(game.game_arguments.clone());
    }

    parts.join(" ")
}

/// Wrap a path in single quotes. Not a general shell escape: a path that
/// itself contains `'` will break the line.
pub fn quote(path: &str) -> String {
    format!("'{path}'")
}

/// Value of the first whitespace-separated `KEY=value` token, unquoted.
pub fn env_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split_whitespace().find_map(|tok| {
        let value = tok.strip_prefix(key)?.strip_prefix('=')?;
        Some(unquote(value))
    })
}

pub fn has_assignment(line: &str, key: &str) -> bool {
    env_value(line, key).is_some()
}

/// Final whitespace-separated token with surrounding quotes removed.
pub fn last_token(line: &str) -> Option<&str> {
    line.split_whitespace().last().map(unquote)
}

fn unquote(s: &str) -> &str {
    let s = s.strip_prefix(['\'', '"']).unwrap_or(s);
    s.strip_suffix(['\'', '"']).unwrap_or(s)
}

/// The runner a line will use, as shown to the user before launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerChoice {
    Native,
    /// No `PROTONPATH`: the compatibility runner picks its bundled default.
    Bundled,
    Named(String),
}

impl RunnerChoice {
    pub fn of(line: &str) -> Self {
        match env_value(line, "PROTONPATH") {
            Some(name) => Self::Named(name.to_string()),
            None if line.contains("UMU_NO_PROTON") => Self::Native,
            None => Self::Bundled,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Native => "Linux Native".to_string(),
            Self::Bundled => "Using UMU-Proton Latest".to_string(),
            Self::Named(name) => format!("Using {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::NATIVE_RUNNER;

    fn defaults() -> ComposeDefaults {
        ComposeDefaults {
            umu_run: PathBuf::from("/usr/bin/umu-run"),
            mangohud_installed: true,
            gamemode_installed: true,
        }
    }

    fn doom() -> GameConfig {
        GameConfig {
            gameid: "doom-1993".to_string(),
            title: "Doom".to_string(),
            path: "/g/doom.exe".to_string(),
            prefix: "/home/u/Faugus/doom".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn bundled_runner_line_has_prefix_and_gameid_but_no_protonpath() {
        let line = compose(&doom(), &defaults());
        assert_eq!(
            line,
            "FAUGUS_LOG='doom-1993' WINEPREFIX='/home/u/Faugus/doom' GAMEID=doom-1993 '/usr/bin/umu-run' '/g/doom.exe'"
        );
        assert_eq!(env_value(&line, "WINEPREFIX"), Some("/home/u/Faugus/doom"));
        assert_eq!(env_value(&line, "GAMEID"), Some("doom-1993"));
        assert!(!has_assignment(&line, "PROTONPATH"));
    }

    #[test]
    fn native_runner_never_emits_prefix() {
        let mut g = doom();
        g.runner = NATIVE_RUNNER.to_string();
        let line = compose(&g, &defaults());
        assert!(!line.contains("WINEPREFIX"));
        assert!(line.contains(" UMU_NO_PROTON=1 "));
        assert!(!line.contains("PROTONPATH"));
        assert_eq!(RunnerChoice::of(&line), RunnerChoice::Native);
    }

    #[test]
    fn full_ordering_with_every_option() {
        let g = GameConfig {
            protonfix: "umu-2280".to_string(),
            runner: "GE-Proton9-20".to_string(),
            mangohud: true,
            gamemode: true,
            disable_hidraw: true,
            launch_arguments: "DXVK_HUD=fps".to_string(),
            game_arguments: "-nointro".to_string(),
            lossless: Some(2),
            ..doom()
        };
        assert_eq!(
            compose(&g, &defaults()),
            "FAUGUS_LOG='doom-1993' MANGOHUD=1 PROTON_DISABLE_HIDRAW=1 \
             WINEPREFIX='/home/u/Faugus/doom' GAMEID=umu-2280 PROTONPATH=GE-Proton9-20 \
             gamemoderun DXVK_HUD=fps LSFG_LEGACY=1 LSFG_MULTIPLIER=2 \
             '/usr/bin/umu-run' '/g/doom.exe' -nointro"
        );
    }

    #[test]
    fn tools_not_installed_are_skipped() {
        let g = GameConfig {
            mangohud: true,
            gamemode: true,
            ..doom()
        };
        let d = ComposeDefaults {
            mangohud_installed: false,
            gamemode_installed: false,
            ..defaults()
        };
        let line = compose(&g, &d);
        assert!(!line.contains("MANGOHUD"));
        assert!(!line.contains("gamemoderun"));
    }

    #[test]
    fn additional_app_replaces_target() {
        let g = GameConfig {
            addapp_enabled: true,
            addapp_script: "/g/faugus-doom.bat".to_string(),
            ..doom()
        };
        let line = compose(&g, &defaults());
        assert!(line.ends_with("'/usr/bin/umu-run' '/g/faugus-doom.bat'"));
        assert_eq!(last_token(&line), Some("/g/faugus-doom.bat"));
    }

    #[test]
    fn compose_is_deterministic() {
        let g = GameConfig {
            mangohud: true,
            lossless: Some(4),
            ..doom()
        };
        let a = compose(&g, &defaults());
        for _ in 0..10 {
            assert_eq!(compose(&g, &defaults()), a);
        }
    }

    #[test]
    fn runner_choice_labels() {
        assert_eq!(RunnerChoice::of("GAMEID=x 'umu-run' 'a.exe'").label(), "Using UMU-Proton Latest");
        assert_eq!(
            RunnerChoice::of("PROTONPATH=GE-Proton 'umu-run' 'a.exe'").label(),
            "Using GE-Proton"
        );
        assert_eq!(RunnerChoice::of("UMU_NO_PROTON=1 'umu-run' 'a'").label(), "Linux Native");
    }

    #[test]
    fn env_value_unquotes_and_requires_exact_key() {
        let line = "WINEPREFIX=\"/p/default\" XPROTONPATH=a PROTONPATH=b";
        assert_eq!(env_value(line, "WINEPREFIX"), Some("/p/default"));
        assert_eq!(env_value(line, "PROTONPATH"), Some("b"));
        assert_eq!(env_value(line, "PROTON"), None);
    }
}
