//! Interpreting the child's output: escape stripping, progress labels,
//! readiness detection and routing.
//!
//! All of this is substring matching on text printed by third-party tools, so
//! it is approximate by nature. The tables are evaluated top to bottom; when
//! several rules match one line the last one wins.

use std::sync::LazyLock;

use regex::Regex;

/// Two-byte `ESC <0x40..=0x5F>` sequences and complete CSI sequences
/// `ESC [ params inter final`.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI escape pattern")
});

/// Remove ANSI escape sequences. An escape that does not start a complete
/// sequence is kept.
pub fn strip_ansi(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Runner / components progress.
    Primary,
    /// Steam Runtime progress.
    Secondary,
}

#[derive(Debug)]
pub struct StatusRule {
    /// Every pattern must appear in the line.
    pub patterns: &'static [&'static str],
    pub slot: Slot,
    pub label: &'static str,
}

const fn rule(patterns: &'static [&'static str], slot: Slot, label: &'static str) -> StatusRule {
    StatusRule {
        patterns,
        slot,
        label,
    }
}

pub const STATUS_RULES: &[StatusRule] = &[
    rule(&["Updating BattlEye..."], Slot::Primary, "Updating BattlEye..."),
    rule(&["Updating Easy Anti-Cheat..."], Slot::Primary, "Updating Easy Anti-Cheat..."),
    rule(&["Components are up to date."], Slot::Primary, "Components are up to date"),
    rule(&["Downloading GE-Proton"], Slot::Primary, "Downloading GE-Proton..."),
    rule(&["Downloading UMU-Proton"], Slot::Primary, "Downloading UMU-Proton..."),
    rule(&["Downloading steamrt3 (latest)"], Slot::Secondary, "Downloading Steam Runtime..."),
    rule(&["SteamLinuxRuntime_sniper.tar.xz"], Slot::Secondary, "Extracting Steam Runtime..."),
    rule(&["Extracting GE-Proton"], Slot::Primary, "Extracting GE-Proton..."),
    rule(&["Extracting UMU-Proton"], Slot::Primary, "Extracting UMU-Proton..."),
    rule(&["GE-Proton is up to date"], Slot::Primary, "GE-Proton is up to date"),
    rule(&["UMU-Proton is up to date"], Slot::Primary, "UMU-Proton is up to date"),
    rule(&["steamrt3 is up to date"], Slot::Secondary, "Steam Runtime is up to date"),
    rule(&["->", "GE-Proton"], Slot::Primary, "GE-Proton is up to date"),
    rule(&["->", "UMU-Proton"], Slot::Primary, "UMU-Proton is up to date"),
    rule(&["mtree is OK"], Slot::Secondary, "Steam Runtime is up to date"),
    rule(&["Downloading proton-EM"], Slot::Primary, "Downloading Proton-EM..."),
    rule(&["Extracting archive"], Slot::Primary, "Extracting Proton-EM..."),
    rule(&["Proton installed successfully"], Slot::Primary, "Proton-EM is up to date"),
];

/// Lines that bring a hidden indicator back on screen.
pub const SHOW_TRIGGERS: &[&str] = &[
    "Downloading",
    "Updating BattlEye...",
    "Updating Easy Anti-Cheat...",
];

/// Which "the game is up" markers apply to this launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// No compatibility layer: ready once the runtime checks out.
    Native,
    Compat,
}

impl Readiness {
    pub fn for_message(message: &str) -> Self {
        if message.contains("UMU_NO_PROTON") {
            Self::Native
        } else {
            Self::Compat
        }
    }

    pub fn markers(self) -> &'static [&'static str] {
        match self {
            Self::Native => &["steamrt3 is up to date", "mtree is OK"],
            Self::Compat => &[
                "fsync: up and running.",
                "Command exited with status: 0",
                "SingleInstance",
                "Using winetricks",
            ],
        }
    }

    pub fn is_ready(self, line: &str) -> bool {
        self.markers().iter().any(|m| line.contains(m))
    }
}

/// What a single cleaned line means for the indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOutcome {
    pub force_show: bool,
    pub primary: Option<&'static str>,
    pub secondary: Option<&'static str>,
    pub ready: bool,
}

pub fn classify(line: &str, readiness: Readiness) -> LineOutcome {
    let mut out = LineOutcome {
        force_show: SHOW_TRIGGERS.iter().any(|t| line.contains(t)),
        ready: readiness.is_ready(line),
        ..Default::default()
    };
    for rule in STATUS_RULES {
        if !rule.patterns.iter().all(|p| line.contains(p)) {
            continue;
        }
        match rule.slot {
            Slot::Primary => out.primary = Some(rule.label),
            Slot::Secondary => out.secondary = Some(rule.label),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Drop,
    Stdout,
    LogViewer,
}

const VIEWER_NOISE: &[&str] = &["zenity", "Gtk-WARNING", "Gtk-Message", "pixbuf"];

/// Where a cleaned line goes after logging and status matching.
pub fn route(line: &str, log_viewer: bool) -> Route {
    // gamemode's preload complaints are noise in every mode
    if line.contains("libgamemode.so") {
        return Route::Drop;
    }
    if !log_viewer {
        return Route::Stdout;
    }
    if line.is_empty() || VIEWER_NOISE.iter().any(|k| line.contains(k)) {
        Route::Drop
    } else {
        Route::LogViewer
    }
}
