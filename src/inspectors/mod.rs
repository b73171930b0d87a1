// src/inspectors/mod.rs
//! Read-only analyses over a resume document

pub mod duration;
pub mod keywords;

pub use duration::DurationInspector;
pub use keywords::{KeywordCount, KeywordInspector};
