//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::cache::CacheArgs;

/// Quire - compile and render view templates.
#[derive(Debug, Parser)]
#[command(name = "quire")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides default .quire/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Render in debug mode: always recompile and surface errors
    #[arg(long, global = true, env = "QUIRE_VIEW_DEBUG")]
    pub view_debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render a template to stdout or a file
    Render(RenderArgs),

    /// Compile templates and store their artifacts
    Compile(CompileArgs),

    /// Compile templates without writing artifacts
    Check(CheckArgs),

    /// Manage the artifact cache
    Cache(CacheArgs),

    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `render` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RenderArgs {
    /// Template name, e.g. `pages.home`
    pub name: String,

    /// Read template data from a JSON or YAML file
    #[arg(long, value_name = "FILE", conflicts_with = "json")]
    pub data: Option<PathBuf>,

    /// Template data as an inline JSON object
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Render as an authenticated user
    #[arg(long)]
    pub auth: bool,

    /// Grant an ability to the current user (repeatable)
    #[arg(long = "ability", value_name = "ABILITY")]
    pub abilities: Vec<String>,

    /// CSRF token exposed to templates
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,
}

/// Arguments for the `compile` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CompileArgs {
    /// Templates to compile (all templates when omitted)
    pub names: Vec<String>,

    /// Compile only templates whose artifact is stale
    #[arg(long)]
    pub stale_only: bool,
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {
    /// Templates to check (all templates when omitted)
    pub names: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `config` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
