use clap::Parser;

/// Run one game (or a tool inside a prefix) and report its progress.
#[derive(Debug, Parser)]
#[command(name = "faugus-run", version)]
pub struct Cli {
    /// Fully composed command line, `KEY=VALUE` assignments first.
    #[arg(required_unless_present = "game")]
    pub message: Option<String>,

    /// Optional mode; `winetricks` opens the log viewer.
    pub command: Option<String>,

    /// Look the game up in games.json and compose its command line.
    #[arg(long, value_name = "GAMEID", conflicts_with_all = ["message", "command"])]
    pub game: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Game,
    /// Output goes to a log viewer instead of stdout.
    LogViewer,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        match self.command.as_deref() {
            Some("winetricks") => Mode::LogViewer,
            _ => Mode::Game,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_message_and_mode() {
        let cli = Cli::try_parse_from(["faugus-run", "GAMEID=x 'umu-run' winetricks-gui", "winetricks"])
            .unwrap();
        assert_eq!(cli.message.as_deref(), Some("GAMEID=x 'umu-run' winetricks-gui"));
        assert_eq!(cli.mode(), Mode::LogViewer);
        assert!(cli.game.is_none());
    }

    #[test]
    fn game_flag_alone() {
        let cli = Cli::try_parse_from(["faugus-run", "--game", "doom-1993"]).unwrap();
        assert_eq!(cli.game.as_deref(), Some("doom-1993"));
        assert_eq!(cli.mode(), Mode::Game);
    }

    #[test]
    fn requires_message_or_game() {
        assert!(Cli::try_parse_from(["faugus-run"]).is_err());
        assert!(Cli::try_parse_from(["faugus-run", "x", "--game", "y"]).is_err());
    }

    #[test]
    fn unknown_mode_is_plain_game() {
        let cli = Cli::try_parse_from(["faugus-run", "GAMEID=x", "other"]).unwrap();
        assert_eq!(cli.mode(), Mode::Game);
    }
}
