//! Check command implementation.
//!
//! The `quire check` command compiles templates without storing artifacts
//! and reports every template that fails.

use serde_json::json;

use crate::cli::args::CheckArgs;
use crate::error::{Result, ViewError};
use crate::ui::UserInterface;

use super::compile::selected_names;
use super::context::CommandContext;
use super::dispatcher::{Command, CommandResult};

/// The check command implementation.
pub struct CheckCommand {
    context: CommandContext,
    args: CheckArgs,
}

impl CheckCommand {
    /// Create a new check command.
    pub fn new(context: CommandContext, args: CheckArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &CheckArgs {
        &self.args
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut engine = self.context.engine()?;
        let names = selected_names(&engine, &self.args.names)?;

        let failures: Vec<(String, ViewError)> = names
            .iter()
            .filter_map(|name| engine.check(name).err().map(|e| (name.clone(), e)))
            .collect();

        if self.args.json {
            let report = json!({
                "checked": names.len(),
                "failures": failures
                    .iter()
                    .map(|(name, e)| json!({
                        "template": name,
                        "compile_error": e.is_compile_error(),
                        "message": e.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            });
            let output = serde_json::to_string_pretty(&report).map_err(|e| ViewError::Other(e.into()))?;
            ui.content(&output);
        } else {
            for (name, e) in &failures {
                ui.error(&format!("{}: {}", name, e));
            }
            if failures.is_empty() {
                ui.success(&format!("{} templates OK", names.len()));
            } else {
                ui.warning(&format!(
                    "{} of {} templates failed to compile",
                    failures.len(),
                    names.len()
                ));
            }
        }

        Ok(if failures.is_empty() {
            CommandResult::success()
        } else {
            CommandResult::failure(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn project(templates: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        let views = temp.path().join("views");
        fs::create_dir_all(&views).unwrap();
        for (name, content) in templates {
            fs::write(views.join(name), content).unwrap();
        }
        temp
    }

    #[test]
    fn clean_templates_pass() {
        let temp = project(&[("a.html", "{{ $x }}"), ("b.html", "plain")]);
        let mut ui = MockUI::new();

        let result = CheckCommand::new(CommandContext::new(temp.path()), CheckArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_success("2 templates OK"));
    }

    #[test]
    fn check_does_not_write_artifacts() {
        let temp = project(&[("a.html", "x")]);
        let context = CommandContext::new(temp.path());
        CheckCommand::new(context.clone(), CheckArgs::default())
            .execute(&mut MockUI::new())
            .unwrap();

        assert!(context.engine().unwrap().cache_entries().unwrap().is_empty());
    }

    #[test]
    fn json_report_lists_failures() {
        let temp = project(&[("ok.html", "x"), ("bad.html", "{{ $x | nope }}")]);
        let mut ui = MockUI::new();
        let args = CheckArgs {
            json: true,
            ..Default::default()
        };

        let result = CheckCommand::new(CommandContext::new(temp.path()), args)
            .execute(&mut ui)
            .unwrap();

        assert_eq!(result.exit_code, 1);
        let report: serde_json::Value = serde_json::from_str(&ui.contents()[0]).unwrap();
        assert_eq!(report["checked"], 2);
        assert_eq!(report["failures"][0]["template"], "bad");
        assert_eq!(report["failures"][0]["compile_error"], true);
    }
}
