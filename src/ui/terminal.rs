//! Terminal UI.

use console::Term;
use std::io::Write;

use crate::error::Result;

use super::{prompt_confirm, should_use_colors, OutputMode, Prompt, QuireTheme, UserInterface};

/// Terminal UI implementation.
///
/// Status goes to stdout, warnings and errors to stderr. Prompts are only
/// shown when stdout is a terminal and `interactive` was requested; otherwise
/// they answer with their default.
pub struct TerminalUI {
    out: Term,
    err: Term,
    theme: QuireTheme,
    mode: OutputMode,
    interactive: bool,
}

impl TerminalUI {
    /// Create a new terminal UI.
    pub fn new(mode: OutputMode, interactive: bool) -> Self {
        let theme = if should_use_colors() {
            QuireTheme::new()
        } else {
            QuireTheme::plain()
        };

        let out = Term::stdout();
        let interactive = interactive && out.is_term();
        Self {
            out,
            err: Term::stderr(),
            theme,
            mode,
            interactive,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.err, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.err, "{}", self.theme.format_error(msg)).ok();
    }

    fn content(&mut self, content: &str) {
        self.out.write_all(content.as_bytes()).ok();
        if !content.ends_with('\n') {
            writeln!(self.out).ok();
        }
        self.out.flush().ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.out, "{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn confirm(&mut self, prompt: &Prompt) -> Result<bool> {
        if !self.interactive {
            return Ok(prompt.default);
        }
        prompt_confirm(prompt, &self.out)
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Check if running under a CI service.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS", "JENKINS_URL"]
        .iter()
        .any(|var| std::env::var(var).is_ok())
}

/// Create the UI for the binary.
pub fn create_ui(interactive: bool, mode: OutputMode) -> Box<dyn UserInterface> {
    Box::new(TerminalUI::new(mode, interactive && !is_ci()))
}
