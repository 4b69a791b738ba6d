//! Terminal output and prompts for the `quire` binary.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for terminal usage
//! - [`MockUI`] for tests
//!
//! # Example
//!
//! ```
//! use quire::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.success("Compiled 3 templates");
//! assert!(ui.has_success("Compiled"));
//! ```

pub mod mock;
pub mod output;
pub mod prompts;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use prompts::prompt_confirm;
pub use terminal::{create_ui, is_ci, TerminalUI};
pub use theme::{should_use_colors, QuireTheme};

use crate::error::Result;

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Write rendered content as-is, regardless of output mode.
    fn content(&mut self, content: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Ask a yes/no question.
    fn confirm(&mut self, prompt: &Prompt) -> Result<bool>;

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;
}

/// A yes/no question to show to the user.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Unique key for the prompt (used for lookup in tests).
    pub key: String,
    /// The question to display.
    pub question: String,
    /// Answer used when the user just presses enter.
    pub default: bool,
}

impl Prompt {
    /// Create a prompt defaulting to "no".
    pub fn new(key: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            question: question.into(),
            default: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_defaults_to_no() {
        let prompt = Prompt::new("clear_cache", "Clear 3 artifacts?");
        assert_eq!(prompt.key, "clear_cache");
        assert!(!prompt.default);
    }
}
