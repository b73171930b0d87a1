// src/environment.rs
use crate::config::{BuildOptions, PdfEngine};
use crate::dates::DateNormalizer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const SETTINGS_FILE: &str = "cvbuild.yaml";
pub const THEME_ENV: &str = "CVBUILD_THEME";
pub const OUTPUT_DIR_ENV: &str = "CVBUILD_OUTPUT_DIR";
pub const PDF_ENGINE_ENV: &str = "CVBUILD_PDF_ENGINE";

/// Defaults read from `cvbuild.yaml` and the environment; seeds [`BuildOptions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub theme_dirs: Vec<PathBuf>,
    pub pdf_engine: Option<PdfEngine>,
    /// Fixed current date, e.g. "2018-06-01".
    pub now: Option<String>,
}

impl Settings {
    /// Load `cvbuild.yaml` from `dir` when present, then apply environment overrides.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        let mut settings = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(theme) = var(THEME_ENV).filter(|t| !t.trim().is_empty()) {
            self.theme = Some(theme);
        }
        if let Some(dir) = var(OUTPUT_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(engine) = var(PDF_ENGINE_ENV) {
            self.pdf_engine = Some(
                engine
                    .parse()
                    .with_context(|| format!("Invalid {}", PDF_ENGINE_ENV))?,
            );
        }
        Ok(())
    }

    /// Layer these settings under explicit options.
    pub fn apply_to(&self, mut opts: BuildOptions) -> Result<BuildOptions> {
        if let Some(theme) = &self.theme {
            opts.theme = theme.clone();
        }
        if let Some(dir) = &self.output_dir {
            opts.output_dir = dir.clone();
        }
        if let Some(engine) = self.pdf_engine {
            opts.pdf = engine;
        }
        opts.theme_dirs.extend(self.theme_dirs.iter().cloned());
        if let Some(now) = &self.now {
            opts.now = Some(
                DateNormalizer::new()
                    .normalize(Some(now.as_str()))
                    .with_context(|| format!("Invalid 'now' setting: {}", now))?,
            );
        }
        Ok(opts)
    }
}
