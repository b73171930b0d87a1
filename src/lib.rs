//! Resume build pipeline: load and merge resume documents, resolve a theme,
//! expand output shorthand into per-format targets, render and write them.

pub mod build;
pub mod cli;
pub mod config;
pub mod core;
pub mod dates;
pub mod environment;
pub mod error;
pub mod events;
pub mod expand;
pub mod generator;
pub mod inspectors;
pub mod loader;
pub mod merge;
pub mod theme;
pub mod theme_resolver;
pub mod types;
pub mod utils;

pub use build::{build, build_async, BuildFailure, BuildOrchestrator, BuildOutput};
pub use config::{BuildOptions, CssMode, PdfEngine};
pub use dates::{CanonicalDate, DateNormalizer, DurationUnit};
pub use environment::Settings;
pub use error::{BuildError, BuildResult};
pub use events::{BuildEvent, BuildObserver, Notifier};
pub use expand::{FormatExpander, Target, TargetOutcome};
pub use loader::{Dialect, ResumeLoader};
pub use merge::ResumeMerger;
pub use theme::{FormatDescriptor, Theme};
pub use theme_resolver::ThemeResolver;
pub use types::Resume;
