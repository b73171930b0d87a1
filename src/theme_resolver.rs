// src/theme_resolver.rs
use crate::error::{BuildError, BuildResult};
use crate::theme::{Theme, PACKAGE_FILE};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

pub const THEME_PREFIX: &str = "jsonresume-theme-";
pub const DEFAULT_THEME: &str = "jsonresume-theme-modern";
const NODE_MODULES: &str = "node_modules";
const NPM_PROTOCOL: &str = "npm:";

/// Short names that map onto a published theme package.
const THEME_ALIASES: &[(&str, &str)] = &[
    ("modern", "jsonresume-theme-modern"),
    ("classy", "jsonresume-theme-classy"),
    ("sceptile", "jsonresume-theme-sceptile"),
    ("boilerplate", "jsonresume-theme-boilerplate"),
];

fn bare_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid regex"))
}

/// Turns a user-supplied theme identifier into an on-disk theme package.
#[derive(Debug, Clone)]
pub struct ThemeResolver {
    cwd: PathBuf,
    search_dirs: Vec<PathBuf>,
}

impl ThemeResolver {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            search_dirs: Vec::new(),
        }
    }

    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Candidate identifiers in the order they are tried, without duplicates.
    pub fn candidates(name: &str) -> Vec<String> {
        let cleaned = name.trim();
        let verbatim = match cleaned.get(..NPM_PROTOCOL.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(NPM_PROTOCOL) => {
                cleaned[NPM_PROTOCOL.len()..].to_string()
            }
            _ => cleaned.to_string(),
        };
        let mut out = vec![verbatim.clone()];

        if let Some((_, full)) = THEME_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(&verbatim))
        {
            out.push(full.to_string());
        }

        let lower = verbatim.to_lowercase();
        if bare_name_re().is_match(&lower) && !lower.starts_with(THEME_PREFIX) {
            out.push(format!("{THEME_PREFIX}{lower}"));
        }

        let mut seen = std::collections::HashSet::new();
        out.retain(|c| !c.is_empty() && seen.insert(c.clone()));
        out
    }

    /// Locate the theme root; the first candidate that resolves wins.
    pub fn resolve(&self, name: &str) -> BuildResult<PathBuf> {
        let requested = name.trim();
        for candidate in Self::candidates(requested) {
            if let Some(root) = self.locate(&candidate) {
                info!("Resolved theme '{}' to {}", requested, root.display());
                return Ok(root);
            }
            debug!("Theme candidate '{}' not found", candidate);
        }
        warn!("Theme '{}' could not be resolved", requested);
        Err(BuildError::ThemeNotFound(requested.to_string()))
    }

    /// Resolve and load, wrapping load failures with the path that was attempted.
    pub fn load(&self, name: &str) -> BuildResult<Theme> {
        let root = self.resolve(name)?;
        Theme::open(&root).map_err(|source| BuildError::ThemeLoad {
            attempted: root,
            source,
        })
    }

    fn locate(&self, candidate: &str) -> Option<PathBuf> {
        let direct = self.cwd.join(candidate);
        if is_theme_root(&direct) {
            return Some(direct);
        }

        for ancestor in self.cwd.ancestors() {
            let installed = ancestor.join(NODE_MODULES).join(candidate);
            if is_theme_root(&installed) {
                return Some(installed);
            }
        }

        self.search_dirs.iter().find_map(|dir| {
            [dir.join(candidate), dir.join(NODE_MODULES).join(candidate)]
                .into_iter()
                .find(|p| is_theme_root(p))
        })
    }
}

fn is_theme_root(path: &Path) -> bool {
    path.is_dir() && path.join(PACKAGE_FILE).is_file()
}
