//! Config command implementation.
//!
//! The `quire config` command shows resolved configuration.

use crate::cli::args::ConfigArgs;
use crate::config::{load_config, ConfigPaths};
use crate::error::{Result, ViewError};
use crate::ui::UserInterface;

use super::context::CommandContext;
use super::dispatcher::{Command, CommandResult};

/// The config command implementation.
pub struct ConfigCommand {
    context: CommandContext,
    args: ConfigArgs,
}

impl ConfigCommand {
    /// Create a new config command.
    pub fn new(context: CommandContext, args: ConfigArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ConfigArgs {
        &self.args
    }
}

impl Command for ConfigCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let root = self.context.project_root();
        // Shown unvalidated so a broken config can still be inspected.
        let config = load_config(root, self.context.config_override())?;

        match self.context.config_override() {
            Some(path) => ui.message(&format!("# {}", path.display())),
            None => {
                let paths = ConfigPaths::discover(root);
                let existing = paths.all_existing();
                if existing.is_empty() {
                    ui.message("# defaults (no .quire/config.yml)");
                }
                for path in &existing {
                    ui.message(&format!("# {}", path.display()));
                }
            }
        }

        let rendered = if self.args.json {
            serde_json::to_string_pretty(&config).map_err(|e| ViewError::Other(e.into()))?
        } else {
            serde_yaml::to_string(&config).map_err(|e| ViewError::Other(e.into()))?
        };
        ui.content(&rendered);

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn setup_project(config: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".quire");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yml"), config).unwrap();
        temp
    }

    #[test]
    fn shows_defaults_without_config() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();

        let result = ConfigCommand::new(CommandContext::new(temp.path()), ConfigArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_message("defaults"));
        assert!(ui.contents()[0].contains("views: views"));
    }

    #[test]
    fn shows_config_path_and_json() {
        let temp = setup_project("views: templates\nmax_depth: 7\n");
        let mut ui = MockUI::new();

        ConfigCommand::new(
            CommandContext::new(temp.path()),
            ConfigArgs { json: true },
        )
        .execute(&mut ui)
        .unwrap();

        assert!(ui.has_message("config.yml"));
        let json: serde_json::Value = serde_json::from_str(&ui.contents()[0]).unwrap();
        assert_eq!(json["views"], "templates");
        assert_eq!(json["max_depth"], 7);
    }
}
