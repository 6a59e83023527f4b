//! Turning a composed command line into the shell line that is actually run.
//!
//! Every step prepends `KEY=VALUE` assignments, so later steps end up further
//! left in the final text.

use std::path::Path;
use std::sync::LazyLock;

use faugus_core::Settings;
use faugus_core::command::env_value;
use faugus_core::paths::Tools;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub message: String,
    /// No compatibility layer (`UMU_NO_PROTON`).
    pub native: bool,
    /// Per-game log directory name, set when logging is enabled and the
    /// line carries a `FAUGUS_LOG` tag.
    pub log_title: Option<String>,
}

/// Apply launcher-wide settings to `message`.
pub fn augment(message: &str, settings: &Settings) -> Prepared {
    let config = &settings.config;
    let native = message.contains("UMU_NO_PROTON");
    let mut msg = message.to_string();

    if !native && !msg.contains("WINEPREFIX") {
        let runner = config.default_runner();
        if !runner.is_empty() && !msg.contains("PROTONPATH") {
            prepend(&mut msg, &format!("PROTONPATH={runner}"));
        }
        let prefix = config.default_prefix().join("default");
        prepend(&mut msg, &format!("WINEPREFIX=\"{}\"", prefix.display()));
    }

    if msg.contains("gamemoderun") {
        prepend(&mut msg, &format!("LD_PRELOAD={}", Tools::gamemode_preload()));
    }

    if !msg.contains("winetricks-gui")
        && let Some(gameid) = env_value(&msg, "GAMEID")
        && !gameid.contains("umu")
    {
        prepend(&mut msg, "PROTONFIXES_DISABLE=1");
    }

    if msg.contains("proton-cachyos") && !msg.contains("slr") {
        prepend(&mut msg, "UMU_NO_RUNTIME=1");
    }

    if config.wayland_driver() {
        prepend(&mut msg, "PROTON_ENABLE_WAYLAND=1");
        if config.enable_hdr() {
            prepend(&mut msg, "PROTON_ENABLE_HDR=1");
        }
    }
    if config.enable_ntsync() {
        prepend(&mut msg, "PROTON_USE_NTSYNC=1");
    }
    if config.enable_wow64() {
        prepend(&mut msg, "PROTON_USE_WOW64=1");
    }
    if let Some(location) = config.lossless_location() {
        prepend(&mut msg, &format!("LSFG_DLL_PATH=\"{location}\""));
    }

    let log_title = if config.enable_logging() {
        log_title(&msg)
    } else {
        None
    };
    if !native && let Some(title) = &log_title {
        let dir = settings.paths.game_log_dir(title);
        prepend(
            &mut msg,
            &format!("UMU_LOG=1 PROTON_LOG_DIR={} PROTON_LOG=1", dir.display()),
        );
    }

    Prepared {
        message: msg,
        native,
        log_title,
    }
}

fn prepend(msg: &mut String, part: &str) {
    msg.insert(0, ' ');
    msg.insert_str(0, part);
}

static FAUGUS_LOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"FAUGUS_LOG=(?:'([^']*)'|"([^"]*)"|(\S+))"#).expect("FAUGUS_LOG pattern")
});

/// Last path segment of the `FAUGUS_LOG` value, which may be single-quoted,
/// double-quoted or bare.
pub fn log_title(line: &str) -> Option<String> {
    let caps = FAUGUS_LOG.captures(line)?;
    let value = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .find(|v| !v.is_empty())?;
    let title = value.rsplit('/').next().unwrap_or(value);
    (!title.is_empty()).then(|| title.to_string())
}

/// The line handed to `bash -c`: runtime hints, and for non-native launches
/// the anti-cheat components updater first.
pub fn spawn_line(prepared: &Prepared, settings: &Settings) -> String {
    let mut hints: Vec<String> = Vec::new();
    if settings.config.discrete_gpu() {
        hints.push("DRI_PRIME=1".to_string());
    }
    hints.push(format!(
        "PROTON_EAC_RUNTIME={}",
        settings.paths.eac_runtime_dir.display()
    ));
    hints.push(format!(
        "PROTON_BATTLEYE_RUNTIME={}",
        settings.paths.be_runtime_dir.display()
    ));
    let body = format!("{} {}", hints.join(" "), prepared.message);
    if prepared.native {
        body
    } else {
        format!("{}; {body}", settings.tools.components.display())
    }
}

/// `KEY=VALUE` lines from `envar.txt`. Blank lines and lines without `=` are
/// skipped; both sides are trimmed.
pub fn parse_env_file(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// Missing or unreadable file means no extra environment.
pub fn load_env_file(path: &Path) -> Vec<(String, String)> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_env_file(&text),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "no extra environment");
            Vec::new()
        }
    }
}
