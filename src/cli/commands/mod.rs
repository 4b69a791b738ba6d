//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Every command receives a
//! [`CommandContext`] that knows how to load configuration and build an
//! engine for the project.

pub mod cache;
pub mod check;
pub mod compile;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod render;

pub use context::CommandContext;
pub use dispatcher::{Command, CommandDispatcher, CommandResult};
