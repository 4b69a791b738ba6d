//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use crate::cli::args::{Cli, Commands};
use crate::error::Result;
use crate::ui::UserInterface;

use super::context::CommandContext;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output and prompts
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    context: CommandContext,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given context.
    pub fn new(context: CommandContext) -> Self {
        Self { context }
    }

    /// Get the command context.
    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let context = self.context.clone();
        match &cli.command {
            Commands::Render(args) => {
                super::render::RenderCommand::new(context, args.clone()).execute(ui)
            }
            Commands::Compile(args) => {
                super::compile::CompileCommand::new(context, args.clone()).execute(ui)
            }
            Commands::Check(args) => {
                super::check::CheckCommand::new(context, args.clone()).execute(ui)
            }
            Commands::Cache(args) => {
                super::cache::CacheCommand::new(context, args.clone()).execute(ui)
            }
            Commands::Config(args) => {
                super::config::ConfigCommand::new(context, args.clone()).execute(ui)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(1);
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn dispatches_render() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("views")).unwrap();
        fs::write(temp.path().join("views/home.html"), "Hi {{ $name }}").unwrap();

        let cli = Cli::parse_from(["quire", "render", "home", "--json", r#"{"name":"Ada"}"#]);
        let dispatcher = CommandDispatcher::new(CommandContext::new(temp.path()));
        let mut ui = MockUI::new();

        let result = dispatcher.dispatch(&cli, &mut ui).unwrap();
        assert!(result.success);
        assert_eq!(ui.contents(), ["Hi Ada".to_string()]);
    }
}
