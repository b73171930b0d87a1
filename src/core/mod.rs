// src/core/mod.rs
//! Rendering and writing: backends, the template engine and file output.

pub mod fs_ops;
pub mod html_format;
pub mod output_writer;
pub mod render_backend;
pub mod template_engine;

pub use fs_ops::FsOps;
pub use html_format::prettify_html;
pub use output_writer::{OutputWriter, PreSave, Verbatim};
pub use render_backend::{EngineRegistry, HandlebarsBackend, RenderBackend, RenderRequest};
pub use template_engine::{freeze, unfreeze, RenderedFile, TemplateEngine};
