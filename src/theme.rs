// src/theme.rs
//! Theme packages: a directory holding `package.json` and a `manifest.toml` that
//! declares one template set per output format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PACKAGE_FILE: &str = "package.json";
pub const MANIFEST_FILE: &str = "manifest.toml";
pub const DEFAULT_ENGINE: &str = "handlebars";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateAction {
    #[default]
    Transform,
    Copy,
}

#[derive(Debug, Clone, Deserialize)]
struct PackageDescriptor {
    name: String,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThemeManifest {
    name: Option<String>,
    engine: Option<String>,
    #[serde(default)]
    partials: Vec<PartialDecl>,
    #[serde(default)]
    formats: BTreeMap<String, FormatDecl>,
}

#[derive(Debug, Deserialize)]
struct PartialDecl {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FormatDecl {
    title: Option<String>,
    ext: Option<String>,
    #[serde(default)]
    files: Vec<FileDecl>,
    #[serde(default)]
    symlinks: BTreeMap<PathBuf, PathBuf>,
}

#[derive(Debug, Deserialize)]
struct FileDecl {
    path: PathBuf,
    output: Option<PathBuf>,
    #[serde(default)]
    action: TemplateAction,
    #[serde(default)]
    primary: bool,
    ext: Option<String>,
}

/// One file of a format's template set.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateFile {
    /// Absolute source path inside the theme.
    pub path: PathBuf,
    /// Output path relative to the destination folder (ignored for the primary file).
    pub output: PathBuf,
    pub action: TemplateAction,
    pub ext: String,
    pub primary: bool,
    /// Template text, loaded for `transform` files only.
    #[serde(skip)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatDescriptor {
    pub out_format: String,
    pub title: String,
    pub ext: String,
    pub files: Vec<TemplateFile>,
    /// Link location (relative to the output folder) to target (relative to the theme root).
    pub symlinks: BTreeMap<PathBuf, PathBuf>,
    /// Synthesized without a theme template.
    pub freebie: bool,
}

impl FormatDescriptor {
    pub fn freebie(out_format: &str, title: &str, ext: &str) -> Self {
        Self {
            out_format: out_format.to_string(),
            title: title.to_string(),
            ext: ext.to_string(),
            files: Vec::new(),
            symlinks: BTreeMap::new(),
            freebie: true,
        }
    }

    pub fn primary(&self) -> Option<&TemplateFile> {
        self.files.iter().find(|f| f.primary)
    }
}

#[derive(Debug, Clone)]
pub struct Partial {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub version: Option<String>,
    pub root: PathBuf,
    pub engine: String,
    pub partials: Vec<Partial>,
    pub formats: BTreeMap<String, FormatDescriptor>,
}

impl Theme {
    /// Load a theme from its root directory.
    pub fn open(root: &Path) -> Result<Self> {
        let package_path = root.join(PACKAGE_FILE);
        let package: PackageDescriptor = serde_json::from_str(
            &fs::read_to_string(&package_path)
                .with_context(|| format!("Failed to read {}", package_path.display()))?,
        )
        .with_context(|| format!("Failed to parse {}", package_path.display()))?;

        let manifest_path = root.join(MANIFEST_FILE);
        let content = fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read theme manifest: {}", manifest_path.display()))?;
        let manifest: ThemeManifest = toml::from_str(&content)
            .with_context(|| format!("Failed to parse theme manifest: {}", manifest_path.display()))?;

        let mut formats = BTreeMap::new();
        for (name, decl) in manifest.formats {
            let format = Self::load_format(root, &name, decl)
                .with_context(|| format!("Invalid format '{}' in {}", name, manifest_path.display()))?;
            debug!("Theme format {} with {} file(s)", name, format.files.len());
            formats.insert(name, format);
        }

        let theme = Self {
            name: manifest.name.unwrap_or(package.name),
            version: package.version,
            root: root.to_path_buf(),
            engine: manifest.engine.unwrap_or_else(|| DEFAULT_ENGINE.to_string()),
            partials: manifest
                .partials
                .into_iter()
                .map(|p| Partial {
                    name: p.name,
                    path: root.join(p.path),
                })
                .collect(),
            formats,
        };

        info!(
            "Loaded theme {} ({} formats) from {}",
            theme.name,
            theme.formats.len(),
            root.display()
        );
        Ok(theme)
    }

    fn load_format(root: &Path, name: &str, decl: FormatDecl) -> Result<FormatDescriptor> {
        let ext = decl.ext.unwrap_or_else(|| name.to_string());
        let mut files = Vec::with_capacity(decl.files.len());

        for file in decl.files {
            let path = root.join(&file.path);
            let output = file
                .output
                .unwrap_or_else(|| default_output_path(&file.path));
            let file_ext = file
                .ext
                .or_else(|| crate::utils::path_extension(&output))
                .unwrap_or_default();
            let data = match file.action {
                TemplateAction::Transform => Some(
                    fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read template: {}", path.display()))?,
                ),
                TemplateAction::Copy => {
                    if !path.exists() {
                        anyhow::bail!("Theme file not found: {}", path.display());
                    }
                    None
                }
            };

            files.push(TemplateFile {
                path,
                output,
                action: file.action,
                ext: file_ext,
                primary: file.primary,
                data,
            });
        }

        // Without an explicit primary, the first transform of the format's own
        // extension (or failing that, the first transform) is the primary file.
        if !files.iter().any(|f| f.primary) {
            let idx = files
                .iter()
                .position(|f| f.action == TemplateAction::Transform && f.ext == ext)
                .or_else(|| files.iter().position(|f| f.action == TemplateAction::Transform));
            if let Some(idx) = idx {
                files[idx].primary = true;
            }
        }

        Ok(FormatDescriptor {
            out_format: name.to_string(),
            title: decl.title.unwrap_or_else(|| name.to_uppercase()),
            ext,
            files,
            symlinks: decl.symlinks,
            freebie: false,
        })
    }

    pub fn has_format(&self, format: &str) -> bool {
        self.formats.contains_key(format)
    }

    pub fn get_format(&self, format: &str) -> Option<&FormatDescriptor> {
        self.formats.get(format)
    }

    pub fn format_names(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }
}

/// "src/resume.html.hbs" becomes "resume.html"; other names keep their file name.
fn default_output_path(template: &Path) -> PathBuf {
    let file_name = template
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    PathBuf::from(
        file_name
            .strip_suffix(".hbs")
            .or_else(|| file_name.strip_suffix(".handlebars"))
            .unwrap_or(&file_name),
    )
}
