// src/types/mod.rs
pub mod resume;

pub use resume::{ParseOptions, Resume, ResumeMeta};
