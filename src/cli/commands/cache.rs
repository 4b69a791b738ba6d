//! Cache command implementation.
//!
//! Provides `quire cache list`, `quire cache clear`, etc.

use std::time::SystemTime;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use crate::cache::{format_age, parse_age, ArtifactInfo};
use crate::ui::{Prompt, UserInterface};
use crate::view::Engine;

use super::context::CommandContext;
use super::dispatcher::{Command, CommandResult};

/// Default age for `cache purge`.
pub const DEFAULT_MAX_AGE: &str = "7d";

/// Arguments for the cache command.
#[derive(Debug, Clone, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

/// Cache subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum CacheSubcommand {
    /// List cached artifacts.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Remove every artifact and the manifest.
    Clear {
        /// Don't prompt for confirmation.
        #[arg(short, long)]
        force: bool,
    },
    /// Remove the artifact of one template.
    Forget {
        /// Template name.
        name: String,
    },
    /// Remove artifacts older than an age.
    Purge {
        /// Maximum age, e.g. "30m", "24h", "7d".
        #[arg(long, default_value = DEFAULT_MAX_AGE)]
        max_age: String,
    },
    /// Show cache statistics.
    Stats,
}

/// The cache command implementation.
pub struct CacheCommand {
    context: CommandContext,
    args: CacheArgs,
}

impl CacheCommand {
    /// Create a new cache command.
    pub fn new(context: CommandContext, args: CacheArgs) -> Self {
        Self { context, args }
    }
}

impl Command for CacheCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> crate::error::Result<CommandResult> {
        let mut engine = self.context.engine()?;

        let exit_code = match &self.args.command {
            CacheSubcommand::List { json } => list_cache(&engine, *json, ui)?,
            CacheSubcommand::Clear { force } => clear_cache(&mut engine, *force, ui)?,
            CacheSubcommand::Forget { name } => forget(&mut engine, name, ui)?,
            CacheSubcommand::Purge { max_age } => purge(&mut engine, max_age, ui)?,
            CacheSubcommand::Stats => show_stats(&engine, ui)?,
        };

        Ok(if exit_code == 0 {
            CommandResult::success()
        } else {
            CommandResult::failure(exit_code)
        })
    }
}

fn age(info: &ArtifactInfo) -> Option<String> {
    let compiled = info.entry.compiled_at_time()?;
    let elapsed = chrono::Utc::now().signed_duration_since(compiled).to_std().ok()?;
    Some(format_age(elapsed))
}

fn list_cache(engine: &Engine, json: bool, ui: &mut dyn UserInterface) -> Result<i32> {
    let entries = engine.cache_entries()?;

    if json {
        let rows: Vec<_> = entries
            .iter()
            .map(|info| {
                json!({
                    "name": info.name,
                    "path": info.path,
                    "size": info.size,
                    "compiled_at": info.entry.compiled_at_time().map(|t| t.to_rfc3339()),
                    "dependencies": info.entry.dependencies,
                    "fresh": engine.freshness(&info.name).is_ok_and(|f| f.is_fresh()),
                })
            })
            .collect();
        ui.content(&serde_json::to_string_pretty(&rows)?);
        return Ok(0);
    }

    if entries.is_empty() {
        ui.message("Cache is empty");
        return Ok(0);
    }

    ui.message(&format!("{} cached artifacts:\n", entries.len()));

    for info in &entries {
        let status = match engine.freshness(&info.name) {
            Ok(freshness) if freshness.is_fresh() => "fresh".to_string(),
            Ok(_) => "stale".to_string(),
            Err(_) => "orphaned".to_string(),
        };
        let age = age(info).unwrap_or_else(|| "?".to_string());
        ui.message(&format!("  {} [{}] {} ago", info.name, status, age));

        if ui.output_mode().shows_details() {
            ui.message(&format!("    Path: {}", info.path.display()));
            if let Some(size) = info.size {
                ui.message(&format!("    Size: {} bytes", size));
            }
            if !info.entry.dependencies.is_empty() {
                ui.message(&format!(
                    "    Dependencies: {}",
                    info.entry.dependencies.join(", ")
                ));
            }
        }
    }

    Ok(0)
}

fn clear_cache(engine: &mut Engine, force: bool, ui: &mut dyn UserInterface) -> Result<i32> {
    let count = engine.cache_entries()?.len();
    if count == 0 {
        ui.message("Cache is already empty");
        return Ok(0);
    }

    if !force && ui.is_interactive() {
        let prompt = Prompt::new("clear_cache", format!("Clear {} cached artifacts?", count));
        if !ui.confirm(&prompt)? {
            ui.message("Cancelled");
            return Ok(0);
        }
    }

    let cleared = engine.clear_cache()?;
    ui.success(&format!("Cleared {} artifacts", cleared));

    Ok(0)
}

fn forget(engine: &mut Engine, name: &str, ui: &mut dyn UserInterface) -> Result<i32> {
    if engine.forget(name)? {
        ui.success(&format!("Forgot {}", name));
        Ok(0)
    } else {
        ui.warning(&format!("No cached artifact for {}", name));
        Ok(1)
    }
}

fn purge(engine: &mut Engine, max_age: &str, ui: &mut dyn UserInterface) -> Result<i32> {
    let max_age = parse_age(max_age)?;
    let removed = engine.purge(max_age)?;
    ui.success(&format!(
        "Purged {} artifacts older than {}",
        removed,
        format_age(max_age)
    ));
    Ok(0)
}

fn show_stats(engine: &Engine, ui: &mut dyn UserInterface) -> Result<i32> {
    let entries = engine.cache_entries()?;
    let total_size = engine.cache_size()?;
    let fresh_count = entries
        .iter()
        .filter(|info| engine.freshness(&info.name).is_ok_and(|f| f.is_fresh()))
        .count();
    let oldest = entries
        .iter()
        .filter_map(|info| info.entry.compiled_at_time())
        .min()
        .and_then(|t| SystemTime::from(t).elapsed().ok());

    ui.show_header("Cache Statistics");
    ui.message(&format!("  Total artifacts: {}", entries.len()));
    ui.message(&format!("  Fresh: {}", fresh_count));
    ui.message(&format!("  Stale: {}", entries.len() - fresh_count));
    ui.message(&format!("  Total size: {} bytes", total_size));
    if let Some(oldest) = oldest {
        ui.message(&format!("  Oldest: {} ago", format_age(oldest)));
    }
    ui.message(&format!("  Location: {}", engine.store().root().display()));

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, CommandContext) {
        let temp = TempDir::new().unwrap();
        let views = temp.path().join("views");
        fs::create_dir_all(&views).unwrap();
        fs::write(views.join("a.html"), "A").unwrap();
        fs::write(views.join("b.html"), "B @include('a')").unwrap();
        let context = CommandContext::new(temp.path());
        let mut engine = context.engine().unwrap();
        engine.compile("a").unwrap();
        engine.compile("b").unwrap();
        (temp, context)
    }

    fn run(context: &CommandContext, command: CacheSubcommand, ui: &mut MockUI) -> CommandResult {
        CacheCommand::new(context.clone(), CacheArgs { command })
            .execute(ui)
            .unwrap()
    }

    #[test]
    fn list_shows_entries() {
        let (_temp, context) = setup();
        let mut ui = MockUI::new();

        run(&context, CacheSubcommand::List { json: false }, &mut ui);

        assert!(ui.has_message("2 cached artifacts"));
        assert!(ui.has_message("a [fresh]"));
        assert!(ui.has_message("b [fresh]"));
    }

    #[test]
    fn list_json_includes_dependencies() {
        let (_temp, context) = setup();
        let mut ui = MockUI::new();

        run(&context, CacheSubcommand::List { json: true }, &mut ui);

        let rows: serde_json::Value = serde_json::from_str(&ui.contents()[0]).unwrap();
        let b = rows
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == "b")
            .unwrap();
        assert_eq!(b["dependencies"], json!(["a"]));
        assert_eq!(b["fresh"], true);
    }

    #[test]
    fn clear_with_force() {
        let (_temp, context) = setup();
        let mut ui = MockUI::new();

        run(&context, CacheSubcommand::Clear { force: true }, &mut ui);

        assert!(ui.has_success("Cleared 2 artifacts"));
        assert!(ui.prompts_shown().is_empty());
        assert!(context.engine().unwrap().cache_entries().unwrap().is_empty());
    }

    #[test]
    fn clear_declined_keeps_artifacts() {
        let (_temp, context) = setup();
        let mut ui = MockUI::new();
        ui.set_prompt_response("clear_cache", false);

        run(&context, CacheSubcommand::Clear { force: false }, &mut ui);

        assert!(ui.has_message("Cancelled"));
        assert_eq!(context.engine().unwrap().cache_entries().unwrap().len(), 2);
    }

    #[test]
    fn forget_one_template() {
        let (_temp, context) = setup();
        let mut ui = MockUI::new();

        let result = run(
            &context,
            CacheSubcommand::Forget { name: "a".to_string() },
            &mut ui,
        );
        assert!(result.success);

        let result = run(
            &context,
            CacheSubcommand::Forget { name: "a".to_string() },
            &mut ui,
        );
        assert_eq!(result.exit_code, 1);
        assert!(ui.has_warning("No cached artifact for a"));
    }

    #[test]
    fn purge_keeps_recent_artifacts() {
        let (_temp, context) = setup();
        let mut ui = MockUI::new();

        run(
            &context,
            CacheSubcommand::Purge {
                max_age: "1h".to_string(),
            },
            &mut ui,
        );

        assert!(ui.has_success("Purged 0 artifacts older than 1h"));
        assert_eq!(context.engine().unwrap().cache_entries().unwrap().len(), 2);
    }

    #[test]
    fn stats_summarize_cache() {
        let (_temp, context) = setup();
        let mut ui = MockUI::new();

        run(&context, CacheSubcommand::Stats, &mut ui);

        assert_eq!(ui.headers(), ["Cache Statistics".to_string()]);
        assert!(ui.has_message("Total artifacts: 2"));
        assert!(ui.has_message("Fresh: 2"));
    }
}
