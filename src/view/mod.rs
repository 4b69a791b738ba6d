//! Rendering compiled templates.
//!
//! An [`Engine`] owns the resolver, the artifact store, the compiler and
//! the component registry. Each call to [`Engine::render`] starts a fresh
//! pass with empty sections and push buffers; nested includes and
//! components share that pass.

mod engine;
mod evaluator;
pub mod host;
mod loop_frame;
pub mod resolver;
mod state;

pub use engine::{Engine, EngineOptions, DEFAULT_EXTENSION, RENDER_FAILURE};
pub use evaluator::COMPONENT_FAILURE;
pub use host::{GuestHost, StaticHost, ViewHost};
pub use loop_frame::LoopFrame;
pub use resolver::{SourceRoot, TemplateResolver};
