// src/expand.rs
//! Output-path shorthand to concrete per-format targets.

use crate::error::{BuildError, BuildResult};
use crate::theme::{FormatDescriptor, Theme};
use crate::utils::{requested_format, with_format_extension, ALL_FORMAT};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_OUTPUT_DIR: &str = "out";
pub const DEFAULT_OUTPUT_STEM: &str = "resume";

/// Settled state of a single target.
#[derive(Debug, Default)]
pub enum TargetOutcome {
    #[default]
    Pending,
    Generated { files: Vec<PathBuf> },
    /// Not attempted because an earlier target failed under fail-fast.
    Skipped,
    Failed(BuildError),
}

impl TargetOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TargetOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&BuildError> {
        match self {
            TargetOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// One output file paired with the format that produces it.
#[derive(Debug)]
pub struct Target {
    pub file: PathBuf,
    pub format: FormatDescriptor,
    pub outcome: TargetOutcome,
}

impl Target {
    pub fn format_name(&self) -> &str {
        &self.format.out_format
    }
}

pub struct FormatExpander;

impl FormatExpander {
    pub fn default_destination(output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{DEFAULT_OUTPUT_STEM}.{ALL_FORMAT}"))
    }

    /// Add the template-free formats: json and yml always, png when html is present.
    pub fn add_freebie_formats(theme: &mut Theme) {
        let mut added = Vec::new();
        if !theme.has_format("json") {
            theme
                .formats
                .insert("json".into(), FormatDescriptor::freebie("json", "JSON", "json"));
            added.push("json");
        }
        if !theme.has_format("yml") {
            theme
                .formats
                .insert("yml".into(), FormatDescriptor::freebie("yml", "YAML", "yml"));
            added.push("yml");
        }
        if theme.has_format("html") && !theme.has_format("png") {
            theme
                .formats
                .insert("png".into(), FormatDescriptor::freebie("png", "PNG", "png"));
            added.push("png");
        }
        if !added.is_empty() {
            debug!("Added freebie formats to {}: {}", theme.name, added.join(", "));
        }
    }

    /// Find the descriptor for a requested extension, by format name or declared extension.
    pub fn find_format<'t>(theme: &'t Theme, ext: &str) -> Option<&'t FormatDescriptor> {
        theme
            .get_format(ext)
            .or_else(|| theme.formats.values().find(|f| f.ext == ext))
    }

    /// Fail with every requested format the theme cannot produce.
    pub fn verify_outputs(destinations: &[PathBuf], theme: &Theme) -> BuildResult<()> {
        let mut invalid: Vec<String> = Vec::new();
        for dest in destinations {
            let format = requested_format(dest);
            if format != ALL_FORMAT
                && Self::find_format(theme, &format).is_none()
                && !invalid.contains(&format)
            {
                invalid.push(format);
            }
        }

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(BuildError::InvalidFormat {
                theme: theme.name.clone(),
                formats: invalid,
            })
        }
    }

    /// Expand destinations into targets. Assumes `verify_outputs` passed.
    pub fn expand(destinations: &[PathBuf], theme: &Theme) -> Vec<Target> {
        let mut targets = Vec::new();
        for dest in destinations {
            let format = requested_format(dest);
            if format == ALL_FORMAT {
                for descriptor in theme.formats.values() {
                    targets.push(Target {
                        file: with_format_extension(dest, &descriptor.ext),
                        format: descriptor.clone(),
                        outcome: TargetOutcome::Pending,
                    });
                }
            } else if let Some(descriptor) = Self::find_format(theme, &format) {
                targets.push(Target {
                    file: dest.clone(),
                    format: descriptor.clone(),
                    outcome: TargetOutcome::Pending,
                });
            }
        }

        info!(
            "Expanded {} destination(s) into {} target(s)",
            destinations.len(),
            targets.len()
        );
        targets
    }
}
