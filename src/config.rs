// src/config.rs
use crate::dates::CanonicalDate;
use crate::events::{BuildObserver, Notifier};
use crate::expand::DEFAULT_OUTPUT_DIR;
use crate::theme_resolver::DEFAULT_THEME;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// How theme CSS reaches the HTML output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CssMode {
    /// Inline the stylesheet into the page; no standalone CSS file is written.
    #[default]
    Embed,
    /// Write CSS files next to the page and link them.
    Link,
}

/// External program used to turn HTML into PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PdfEngine {
    #[default]
    Wkhtmltopdf,
    Weasyprint,
    None,
}

impl PdfEngine {
    pub fn command(&self) -> Option<&'static str> {
        match self {
            PdfEngine::Wkhtmltopdf => Some("wkhtmltopdf"),
            PdfEngine::Weasyprint => Some("weasyprint"),
            PdfEngine::None => None,
        }
    }
}

impl FromStr for PdfEngine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wkhtmltopdf" | "wkhtml" => Ok(PdfEngine::Wkhtmltopdf),
            "weasyprint" => Ok(PdfEngine::Weasyprint),
            "none" | "" => Ok(PdfEngine::None),
            other => anyhow::bail!("Unknown PDF engine: {}", other),
        }
    }
}

/// Per-invocation build options. Built once, read-only for the rest of the build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub theme: String,
    pub privatize: bool,
    pub prettify: bool,
    pub noescape: bool,
    pub css: CssMode,
    pub pdf: PdfEngine,
    pub freeze_breaks: bool,
    /// Fail fast: stop generating once any target fails.
    pub assert: bool,
    pub now: Option<CanonicalDate>,
    pub theme_dirs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub root_dir: PathBuf,
    pub notifier: Notifier,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self {
            theme: DEFAULT_THEME.to_string(),
            privatize: false,
            prettify: true,
            noescape: false,
            css: CssMode::Embed,
            pdf: PdfEngine::Wkhtmltopdf,
            freeze_breaks: false,
            assert: false,
            now: None,
            theme_dirs: Vec::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            root_dir: current_dir,
            notifier: Notifier::default(),
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    pub fn with_privatize(mut self, privatize: bool) -> Self {
        self.privatize = privatize;
        self
    }

    pub fn with_prettify(mut self, prettify: bool) -> Self {
        self.prettify = prettify;
        self
    }

    pub fn with_noescape(mut self, noescape: bool) -> Self {
        self.noescape = noescape;
        self
    }

    pub fn with_css(mut self, css: CssMode) -> Self {
        self.css = css;
        self
    }

    pub fn with_pdf(mut self, pdf: PdfEngine) -> Self {
        self.pdf = pdf;
        self
    }

    pub fn with_freeze_breaks(mut self, freeze: bool) -> Self {
        self.freeze_breaks = freeze;
        self
    }

    pub fn with_assert(mut self, assert: bool) -> Self {
        self.assert = assert;
        self
    }

    pub fn with_now(mut self, now: CanonicalDate) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_theme_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.theme_dirs = dirs;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_root_dir(mut self, dir: PathBuf) -> Self {
        self.root_dir = dir;
        self
    }

    pub fn with_observer(mut self, observer: impl BuildObserver + 'static) -> Self {
        let mut observers = self.notifier.observers().to_vec();
        observers.push(Arc::new(observer));
        self.notifier = Notifier::new(observers);
        self
    }

    /// Resolve a possibly relative path against the build's root directory.
    pub fn absolute_path(&self, path: &std::path::Path) -> PathBuf {
        crate::utils::normalize_path(&self.root_dir, path)
    }

    pub fn output_dir_absolute(&self) -> PathBuf {
        self.absolute_path(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BuildEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_defaults() {
        let opts = BuildOptions::new();
        assert_eq!(opts.theme, "jsonresume-theme-modern");
        assert!(opts.prettify);
        assert!(!opts.assert);
        assert_eq!(opts.css, CssMode::Embed);
        assert_eq!(opts.output_dir, PathBuf::from("out"));
        assert!(opts.notifier.is_empty());
    }

    #[test]
    fn test_builder_and_paths() {
        let opts = BuildOptions::new()
            .with_theme("classy")
            .with_root_dir(PathBuf::from("/work"))
            .with_output_dir(PathBuf::from("dist"))
            .with_pdf(PdfEngine::None);
        assert_eq!(opts.theme, "classy");
        assert_eq!(opts.output_dir_absolute(), PathBuf::from("/work/dist"));
        assert_eq!(opts.pdf.command(), None);
    }

    #[test]
    fn test_observers_accumulate() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        let opts = BuildOptions::new()
            .with_observer(|_: &BuildEvent| {
                HITS.fetch_add(1, Ordering::SeqCst);
            })
            .with_observer(|_: &BuildEvent| {
                HITS.fetch_add(10, Ordering::SeqCst);
            });
        opts.notifier.stat(BuildEvent::AfterMerge);
        assert_eq!(HITS.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_pdf_engine_from_str() {
        assert_eq!("WeasyPrint".parse::<PdfEngine>().unwrap(), PdfEngine::Weasyprint);
        assert_eq!("none".parse::<PdfEngine>().unwrap(), PdfEngine::None);
        assert!("princexml".parse::<PdfEngine>().is_err());
    }
}
