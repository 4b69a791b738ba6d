//! Render command implementation.
//!
//! The `quire render` command renders one template with data from a file or
//! an inline JSON object and writes the result to stdout or a file.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::cli::args::RenderArgs;
use crate::error::{Result, ViewError};
use crate::ui::UserInterface;
use crate::view::StaticHost;

use super::context::CommandContext;
use super::dispatcher::{Command, CommandResult};

/// The render command implementation.
pub struct RenderCommand {
    context: CommandContext,
    args: RenderArgs,
}

impl RenderCommand {
    /// Create a new render command.
    pub fn new(context: CommandContext, args: RenderArgs) -> Self {
        Self { context, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RenderArgs {
        &self.args
    }

    fn host(&self) -> StaticHost {
        let host = StaticHost::new().authenticated(self.args.auth);
        let host = self
            .args
            .abilities
            .iter()
            .fold(host, |host, ability| host.ability(ability.as_str()));
        match &self.args.token {
            Some(token) => host.token(token.as_str()),
            None => host,
        }
    }

    fn data(&self) -> Result<Map<String, Value>> {
        let value = match (&self.args.data, &self.args.json) {
            (Some(path), _) => read_data_file(path)?,
            (None, Some(json)) => serde_json::from_str(json).map_err(|e| {
                ViewError::Other(anyhow::anyhow!("Invalid --json data: {}", e))
            })?,
            (None, None) => return Ok(Map::new()),
        };
        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(ViewError::Other(anyhow::anyhow!(
                "Template data must be an object, got {}",
                type_name(&other)
            ))),
        }
    }
}

/// Parse a data file as JSON, or YAML for `.yml`/`.yaml` files.
fn read_data_file(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    );
    let parsed = if is_yaml {
        serde_yaml::from_str(&content).map_err(anyhow::Error::from)
    } else {
        serde_json::from_str(&content).map_err(anyhow::Error::from)
    };
    parsed.map_err(|e| {
        ViewError::Other(anyhow::anyhow!(
            "Failed to parse data file {}: {}",
            path.display(),
            e
        ))
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Command for RenderCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let data = self.data()?;
        let mut engine = self.context.engine()?.with_host(self.host());

        let output = engine.render(&self.args.name, data)?;

        match &self.args.output {
            Some(path) => {
                fs::write(path, &output)?;
                ui.success(&format!("Rendered {} to {}", self.args.name, path.display()));
            }
            None => ui.content(&output),
        }

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use crate::view::RENDER_FAILURE;
    use tempfile::TempDir;

    fn project(templates: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        let views = temp.path().join("views");
        fs::create_dir_all(&views).unwrap();
        for (name, content) in templates {
            let path = views.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp
    }

    fn args(name: &str) -> RenderArgs {
        RenderArgs {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn renders_inline_json() {
        let temp = project(&[("pages/home.html", "<h1>{{ $title }}</h1>")]);
        let mut args = args("pages.home");
        args.json = Some(r#"{"title": "Fish & Chips"}"#.to_string());
        let mut ui = MockUI::new();

        let result = RenderCommand::new(CommandContext::new(temp.path()), args)
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert_eq!(ui.contents(), ["<h1>Fish &amp; Chips</h1>".to_string()]);
    }

    #[test]
    fn renders_yaml_data_file() {
        let temp = project(&[("home.html", "{{ $user.name }}")]);
        let data = temp.path().join("data.yml");
        fs::write(&data, "user:\n  name: Ada\n").unwrap();
        let mut args = args("home");
        args.data = Some(data);
        let mut ui = MockUI::new();

        RenderCommand::new(CommandContext::new(temp.path()), args)
            .execute(&mut ui)
            .unwrap();

        assert_eq!(ui.contents(), ["Ada".to_string()]);
    }

    #[test]
    fn non_object_data_is_rejected() {
        let temp = project(&[("home.html", "x")]);
        let mut args = args("home");
        args.json = Some("[1, 2]".to_string());
        let mut ui = MockUI::new();

        let err = RenderCommand::new(CommandContext::new(temp.path()), args)
            .execute(&mut ui)
            .unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn host_flags_reach_templates() {
        let temp = project(&[(
            "home.html",
            "@auth yes @else no @endauth|@can('edit') edit @endcan|{{ csrf_token() }}",
        )]);
        let mut args = args("home");
        args.auth = true;
        args.abilities = vec!["edit".to_string()];
        args.token = Some("tok".to_string());
        let mut ui = MockUI::new();

        RenderCommand::new(CommandContext::new(temp.path()), args)
            .execute(&mut ui)
            .unwrap();

        let out = &ui.contents()[0];
        assert!(out.contains("yes"));
        assert!(!out.contains("no"));
        assert!(out.contains("edit"));
        assert!(out.contains("tok"));
    }

    #[test]
    fn missing_template_renders_failure_markup() {
        let temp = project(&[]);
        let mut ui = MockUI::new();

        RenderCommand::new(CommandContext::new(temp.path()), args("missing"))
            .execute(&mut ui)
            .unwrap();

        assert_eq!(ui.contents(), [RENDER_FAILURE.to_string()]);
    }

    #[test]
    fn missing_template_in_debug_mode_is_error() {
        let temp = project(&[]);
        let mut ui = MockUI::new();

        let err = RenderCommand::new(
            CommandContext::new(temp.path()).with_view_debug(true),
            args("missing"),
        )
        .execute(&mut ui)
        .unwrap_err();

        assert!(matches!(err, ViewError::SourceNotFound { .. }));
    }

    #[test]
    fn writes_output_file() {
        let temp = project(&[("home.html", "Hello")]);
        let out = temp.path().join("out.html");
        let mut args = args("home");
        args.output = Some(out.clone());
        let mut ui = MockUI::new();

        RenderCommand::new(CommandContext::new(temp.path()), args)
            .execute(&mut ui)
            .unwrap();

        assert_eq!(fs::read_to_string(out).unwrap(), "Hello");
        assert!(ui.has_success("Rendered home"));
        assert!(ui.contents().is_empty());
    }
}
