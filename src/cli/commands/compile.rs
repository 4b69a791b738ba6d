//! Compile command implementation.
//!
//! The `quire compile` command compiles templates ahead of time and stores
//! their artifacts, so the first render does not pay for compilation.

use crate::cli::args::CompileArgs;
use crate::error::Result;
use crate::ui::UserInterface;
use crate::view::Engine;

use super::context::CommandContext;
use super::dispatcher::{Command, CommandResult};

/// The compile command implementation.
pub struct CompileCommand {
    context: CommandContext,
    args: CompileArgs,
}

impl CompileCommand {
    /// Create a new compile command.
    pub fn new(context: CommandContext, args: CompileArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &CompileArgs {
        &self.args
    }
}

/// Templates named on the command line, or every template when none are.
pub(super) fn selected_names(engine: &Engine, names: &[String]) -> Result<Vec<String>> {
    if names.is_empty() {
        engine.resolver().template_names()
    } else {
        Ok(names.to_vec())
    }
}

impl Command for CompileCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut engine = self.context.engine()?;
        let names = selected_names(&engine, &self.args.names)?;

        let mut compiled = 0;
        let mut skipped = 0;
        let mut failed = 0;

        for name in &names {
            if self.args.stale_only && engine.freshness(name).is_ok_and(|f| f.is_fresh()) {
                skipped += 1;
                continue;
            }
            match engine.compile(name) {
                Ok(template) => {
                    compiled += 1;
                    if ui.output_mode().shows_details() {
                        ui.message(&format!(
                            "  {} ({} dependencies)",
                            name,
                            template.dependencies.len()
                        ));
                    }
                }
                Err(e) => {
                    failed += 1;
                    ui.error(&format!("{}: {}", name, e));
                }
            }
        }

        let mut summary = format!("Compiled {} of {} templates", compiled, names.len());
        if skipped > 0 {
            summary.push_str(&format!(" ({} already fresh)", skipped));
        }

        if failed > 0 {
            ui.warning(&summary);
            Ok(CommandResult::failure(1))
        } else {
            ui.success(&summary);
            Ok(CommandResult::success())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let views = temp.path().join("views");
        fs::create_dir_all(views.join("pages")).unwrap();
        fs::write(views.join("layout.html"), "<main>@yield('content')</main>").unwrap();
        fs::write(
            views.join("pages/home.html"),
            "@extends('layout')\n@section('content')\nHi\n@endsection\n",
        )
        .unwrap();
        temp
    }

    #[test]
    fn compiles_all_templates() {
        let temp = project();
        let context = CommandContext::new(temp.path());
        let mut ui = MockUI::new();

        let result = CompileCommand::new(context.clone(), CompileArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_success("Compiled 2 of 2 templates"));
        assert_eq!(context.engine().unwrap().cache_entries().unwrap().len(), 2);
    }

    #[test]
    fn stale_only_skips_fresh_artifacts() {
        let temp = project();
        let context = CommandContext::new(temp.path());
        CompileCommand::new(context.clone(), CompileArgs::default())
            .execute(&mut MockUI::new())
            .unwrap();

        let mut ui = MockUI::new();
        let args = CompileArgs {
            stale_only: true,
            ..Default::default()
        };
        CompileCommand::new(context, args).execute(&mut ui).unwrap();

        assert!(ui.has_success("Compiled 0 of 2 templates (2 already fresh)"));
    }

    #[test]
    fn failures_are_reported_per_template() {
        let temp = project();
        fs::write(temp.path().join("views/broken.html"), "@section('a')").unwrap();
        let mut ui = MockUI::new();

        let args = CompileArgs {
            names: vec!["broken".to_string(), "layout".to_string()],
            ..Default::default()
        };
        let result = CompileCommand::new(CommandContext::new(temp.path()), args)
            .execute(&mut ui)
            .unwrap();

        assert_eq!(result.exit_code, 1);
        assert!(ui.has_error("broken"));
        assert!(ui.has_warning("Compiled 1 of 2 templates"));
    }
}
