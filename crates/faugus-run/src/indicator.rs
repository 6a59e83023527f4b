use std::io::Write;

/// A one-shot message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Fatal: the launch is abandoned before anything is spawned.
    RunnerNotFound(String),
    /// A `.reg` file was imported into the prefix.
    RegistryImported,
}

impl Notice {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::RunnerNotFound(runner) => vec![
                format!("{runner} was not found."),
                "Please install it or use another Proton version.".to_string(),
            ],
            Self::RegistryImported => {
                vec!["The keys and values were successfully added to the registry.".to_string()]
            }
        }
    }
}

/// The progress window, the optional log viewer and notices.
///
/// Once `close` has been called the indicator stays closed; later `show`
/// calls are ignored.
pub trait Indicator {
    fn show(&mut self);
    fn close(&mut self);
    fn set_primary(&mut self, text: &str);
    fn set_secondary(&mut self, text: &str);

    fn open_log_viewer(&mut self);
    fn append_log(&mut self, line: &str);
    fn close_log_viewer(&mut self);

    fn notice(&mut self, notice: Notice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Hidden,
    Visible,
    Closed,
}

/// Terminal rendition: progress goes to the diagnostic log, the log viewer to
/// stdout and notices to stderr.
#[derive(Debug)]
pub struct ConsoleIndicator {
    window: Window,
    viewer_open: bool,
    primary: String,
    secondary: String,
}

impl ConsoleIndicator {
    pub fn new() -> Self {
        Self {
            window: Window::Hidden,
            viewer_open: false,
            primary: String::new(),
            secondary: String::new(),
        }
    }
}

impl Default for ConsoleIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for ConsoleIndicator {
    fn show(&mut self) {
        if self.window == Window::Hidden {
            self.window = Window::Visible;
            tracing::info!(status = %self.primary, "starting");
        }
    }

    fn close(&mut self) {
        if self.window != Window::Closed {
            self.window = Window::Closed;
            tracing::debug!("progress indicator closed");
        }
    }

    fn set_primary(&mut self, text: &str) {
        if self.primary != text {
            self.primary = text.to_string();
            if self.window == Window::Visible {
                tracing::info!(status = %text);
            }
        }
    }

    fn set_secondary(&mut self, text: &str) {
        if self.secondary != text {
            self.secondary = text.to_string();
            if self.window == Window::Visible {
                tracing::info!(runtime = %text);
            }
        }
    }

    fn open_log_viewer(&mut self) {
        self.viewer_open = true;
    }

    fn append_log(&mut self, line: &str) {
        if self.viewer_open {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{line}");
        }
    }

    fn close_log_viewer(&mut self) {
        self.viewer_open = false;
    }

    fn notice(&mut self, notice: Notice) {
        let mut err = std::io::stderr().lock();
        for line in notice.lines() {
            let _ = writeln!(err, "{line}");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Show,
        Close,
        Primary(String),
        Secondary(String),
        OpenViewer,
        Log(String),
        CloseViewer,
        Notice(Notice),
    }

    #[derive(Debug, Default)]
    pub struct Recorder {
        pub calls: Vec<Call>,
    }

    impl Recorder {
        pub fn notices(&self) -> Vec<&Notice> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Notice(n) => Some(n),
                    _ => None,
                })
                .collect()
        }

        pub fn closed(&self) -> bool {
            self.calls.contains(&Call::Close)
        }
    }

    impl Indicator for Recorder {
        fn show(&mut self) {
            self.calls.push(Call::Show);
        }
        fn close(&mut self) {
            self.calls.push(Call::Close);
        }
        fn set_primary(&mut self, text: &str) {
            self.calls.push(Call::Primary(text.to_string()));
        }
        fn set_secondary(&mut self, text: &str) {
            self.calls.push(Call::Secondary(text.to_string()));
        }
        fn open_log_viewer(&mut self) {
            self.calls.push(Call::OpenViewer);
        }
        fn append_log(&mut self, line: &str) {
            self.calls.push(Call::Log(line.to_string()));
        }
        fn close_log_viewer(&mut self) {
            self.calls.push(Call::CloseViewer);
        }
        fn notice(&mut self, notice: Notice) {
            self.calls.push(Call::Notice(notice));
        }
    }
}
