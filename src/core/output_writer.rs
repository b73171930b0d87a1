// src/core/output_writer.rs
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::template_engine::RenderedFile;
use crate::core::FsOps;
use crate::events::{BuildEvent, Notifier};
use crate::theme::{FormatDescriptor, TemplateAction, TemplateFile};

/// Hook run on rendered text before it is written; `None` skips the file.
pub trait PreSave {
    fn pre_save(&self, template: &TemplateFile, text: String) -> Option<String>;
}

/// Writes rendered files unchanged.
pub struct Verbatim;

impl PreSave for Verbatim {
    fn pre_save(&self, _: &TemplateFile, text: String) -> Option<String> {
        Some(text)
    }
}

pub struct OutputWriter<'a> {
    notifier: &'a Notifier,
}

impl<'a> OutputWriter<'a> {
    pub fn new(notifier: &'a Notifier) -> Self {
        Self { notifier }
    }

    /// Persist every file in order. Returns the paths actually written.
    pub fn write_all(&self, files: Vec<RenderedFile>, hook: &dyn PreSave) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(files.len());

        for file in files {
            if let Some(parent) = file.dest.parent() {
                FsOps::ensure_dir_exists(parent)?;
            }

            match (file.template.action, file.content) {
                (TemplateAction::Copy, _) | (_, None) => {
                    self.before(&file.dest);
                    FsOps::copy_file(&file.template.path, &file.dest)?;
                }
                (TemplateAction::Transform, Some(text)) => {
                    let Some(text) = hook.pre_save(&file.template, text) else {
                        debug!("Skipped writing {}", file.dest.display());
                        continue;
                    };
                    self.before(&file.dest);
                    FsOps::write_file_safe(&file.dest, text.as_bytes())?;
                }
            }

            self.notifier.stat(BuildEvent::AfterWrite {
                file: file.dest.clone(),
            });
            written.push(file.dest);
        }

        Ok(written)
    }

    /// Write a single generated payload (freebie formats, converted binaries).
    pub fn write_bytes(&self, dest: &Path, content: &[u8]) -> Result<PathBuf> {
        self.before(dest);
        FsOps::write_file_safe(dest, content)?;
        self.notifier.stat(BuildEvent::AfterWrite {
            file: dest.to_path_buf(),
        });
        Ok(dest.to_path_buf())
    }

    /// Create the symlinks a format declares, relative to `out_folder`.
    pub fn link(&self, format: &FormatDescriptor, theme_root: &Path, out_folder: &Path) -> Result<()> {
        for (location, target) in &format.symlinks {
            let link = out_folder.join(location);
            let target = crate::utils::normalize_path(theme_root, target);
            FsOps::recreate_symlink(&target, &link)?;
        }
        Ok(())
    }

    fn before(&self, dest: &Path) {
        self.notifier.stat(BuildEvent::BeforeWrite {
            file: dest.to_path_buf(),
        });
    }
}
