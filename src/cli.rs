// src/cli.rs
use crate::build::{build_async, BuildFailure, BuildOutput};
use crate::config::{BuildOptions, CssMode, PdfEngine};
use crate::dates::DateNormalizer;
use crate::environment::Settings;
use crate::events::BuildEvent;
use crate::expand::TargetOutcome;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Separator accepted between sources and destinations: `build a.json TO out/cv.all`.
const TO_KEYWORD: &str = "TO";

#[derive(Parser)]
#[command(name = "cvbuild")]
#[command(about = "Render resume documents through themes into HTML, PDF, text and more")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build resume sources into one or more output files
    Build(BuildArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Source resumes, optionally followed by TO and destinations
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,

    /// Destination files; `.all` or no extension means every theme format
    #[arg(long = "to", short = 'o', num_args = 1..)]
    pub destinations: Vec<PathBuf>,

    /// Theme path, alias or package name
    #[arg(long, short = 't')]
    pub theme: Option<String>,

    #[arg(long, value_enum)]
    pub pdf: Option<PdfEngine>,

    #[arg(long, value_enum, default_value_t = CssMode::Embed)]
    pub css: CssMode,

    /// Leave generated HTML untouched
    #[arg(long)]
    pub no_prettify: bool,

    /// Disable template escaping
    #[arg(long)]
    pub noescape: bool,

    /// Drop entries and fields marked private
    #[arg(long, short = 'p')]
    pub private: bool,

    /// Stop at the first failed target
    #[arg(long, short = 'a')]
    pub assert: bool,

    #[arg(long)]
    pub freeze_breaks: bool,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Extra directories searched for themes
    #[arg(long = "theme-dir")]
    pub theme_dirs: Vec<PathBuf>,

    /// Fixed current date for reproducible output
    #[arg(long)]
    pub now: Option<String>,
}

impl BuildArgs {
    /// Split `sources` on a literal TO, merging anything after it into the destinations.
    pub fn split_paths(&self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut sources = self.sources.clone();
        let mut destinations = Vec::new();
        if let Some(idx) = sources.iter().position(|p| p.as_os_str() == TO_KEYWORD) {
            destinations = sources.split_off(idx + 1);
            sources.truncate(idx);
        }
        destinations.extend(self.destinations.iter().cloned());
        (sources, destinations)
    }

    pub fn to_options(&self, settings: &Settings) -> Result<BuildOptions> {
        let mut opts = settings.apply_to(BuildOptions::new())?;
        if let Some(theme) = &self.theme {
            opts = opts.with_theme(theme.clone());
        }
        if let Some(pdf) = self.pdf {
            opts = opts.with_pdf(pdf);
        }
        if let Some(dir) = &self.output_dir {
            opts = opts.with_output_dir(dir.clone());
        }
        if let Some(now) = &self.now {
            let date = DateNormalizer::new()
                .normalize(Some(now.as_str()))
                .with_context(|| format!("Invalid --now value: {}", now))?;
            opts = opts.with_now(date);
        }
        opts.theme_dirs.extend(self.theme_dirs.iter().cloned());

        Ok(opts
            .with_css(self.css)
            .with_prettify(!self.no_prettify)
            .with_noescape(self.noescape)
            .with_privatize(self.private)
            .with_assert(self.assert)
            .with_freeze_breaks(self.freeze_breaks)
            .with_observer(log_event))
    }
}

fn log_event(event: &BuildEvent) {
    match event {
        BuildEvent::BeforeGenerate { format, file } => {
            info!("Generating {} resume: {}", format.to_uppercase(), file.display())
        }
        BuildEvent::AfterTheme { theme, root } => {
            info!("Applying {} theme from {}", theme, root.display())
        }
        other => debug!("{:?}", other),
    }
}

fn report(output: &BuildOutput) {
    for target in &output.targets {
        match &target.outcome {
            TargetOutcome::Generated { files } if files.is_empty() => {
                warn!("{}: nothing written", target.file.display())
            }
            TargetOutcome::Generated { .. } => info!("{}: ok", target.file.display()),
            TargetOutcome::Skipped => warn!("{}: skipped", target.file.display()),
            TargetOutcome::Failed(err) => error!("{}: {}", target.file.display(), err),
            TargetOutcome::Pending => {}
        }
    }
}

/// Returns whether the build succeeded.
pub async fn handle_command(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Build(args) => {
            let root = std::env::current_dir().context("Failed to get current directory")?;
            let settings = Settings::load(&root)?;
            let options = args.to_options(&settings)?;
            let (sources, destinations) = args.split_paths();

            match build_async(sources, destinations, options).await {
                Ok(output) => {
                    report(&output);
                    info!("Built {} file(s) for {}", output.files().len(), output.theme);
                    Ok(true)
                }
                Err(BuildFailure::Targets(output)) => {
                    report(&output);
                    Ok(false)
                }
                Err(BuildFailure::Aborted(err)) => {
                    let code = err.code();
                    error!("Build failed ({}): {:#}", code, anyhow::Error::new(err));
                    Ok(false)
                }
            }
        }
    }
}
