// src/build.rs
//! The build verb: sources in, rendered targets out.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::config::BuildOptions;
use crate::core::{EngineRegistry, RenderBackend};
use crate::error::BuildError;
use crate::events::{BuildEvent, Notifier};
use crate::expand::{FormatExpander, Target, TargetOutcome};
use crate::generator::{GenerateContext, Generator, GeneratorRegistry};
use crate::loader::ResumeLoader;
use crate::merge::ResumeMerger;
use crate::theme::Theme;
use crate::theme_resolver::ThemeResolver;
use crate::types::{ParseOptions, Resume};
use crate::utils::same_file;

const CMD: &str = "build";

/// A settled build: the normalized resume and every target with its outcome.
#[derive(Debug)]
pub struct BuildOutput {
    pub resume: Resume,
    pub theme: String,
    pub targets: Vec<Target>,
}

impl BuildOutput {
    pub fn failed(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter().filter(|t| t.outcome.is_failed())
    }

    pub fn has_errors(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Every file written across all targets.
    pub fn files(&self) -> Vec<&Path> {
        self.targets
            .iter()
            .filter_map(|t| match &t.outcome {
                TargetOutcome::Generated { files } => Some(files),
                _ => None,
            })
            .flatten()
            .map(PathBuf::as_path)
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum BuildFailure {
    /// Nothing was generated.
    #[error(transparent)]
    Aborted(#[from] BuildError),

    #[error("{} of {} target(s) failed", .0.failed().count(), .0.targets.len())]
    Targets(BuildOutput),
}

impl BuildFailure {
    /// The blocking error, or the first failed target's error.
    pub fn first_error(&self) -> Option<&BuildError> {
        match self {
            BuildFailure::Aborted(err) => Some(err),
            BuildFailure::Targets(output) => output.failed().find_map(|t| t.outcome.error()),
        }
    }
}

/// Runs builds with a fixed set of rendering backends and generators.
#[derive(Debug, Clone, Default)]
pub struct BuildOrchestrator {
    engines: EngineRegistry,
    generators: GeneratorRegistry,
}

impl BuildOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, backend: impl RenderBackend + 'static) -> Self {
        self.engines.register(backend);
        self
    }

    pub fn with_generator(mut self, generator: impl Generator + 'static) -> Self {
        self.generators.register(generator);
        self
    }

    pub fn build<S, D>(
        &self,
        sources: &[S],
        destinations: &[D],
        options: &BuildOptions,
    ) -> Result<BuildOutput, BuildFailure>
    where
        S: AsRef<Path>,
        D: AsRef<Path>,
    {
        let span = info_span!("build", theme = %options.theme);
        let _guard = span.enter();
        let notifier = &options.notifier;
        notifier.stat(BuildEvent::Begin { cmd: CMD.into() });

        let result = self.run(sources, destinations, options);
        match &result {
            Ok(output) => info!(
                "Build finished: {} target(s), {} file(s)",
                output.targets.len(),
                output.files().len()
            ),
            Err(BuildFailure::Aborted(err)) => {
                error!("Build aborted: {}", err);
                notifier.stat(BuildEvent::Error {
                    code: err.code(),
                    message: err.to_string(),
                });
            }
            Err(failure) => warn!("Build finished with errors: {}", failure),
        }

        notifier.stat(BuildEvent::End { cmd: CMD.into() });
        result
    }

    fn run<S, D>(
        &self,
        sources: &[S],
        destinations: &[D],
        options: &BuildOptions,
    ) -> Result<BuildOutput, BuildFailure>
    where
        S: AsRef<Path>,
        D: AsRef<Path>,
    {
        let notifier = &options.notifier;
        let (sources, destinations) = collect_paths(sources, destinations, options)?;

        let mut sheets = Vec::with_capacity(sources.len());
        for loaded in ResumeLoader::new(notifier).load(&sources) {
            sheets.push(loaded?.json);
        }

        notifier.stat(BuildEvent::BeforeMerge {
            count: sheets.len(),
        });
        let merged = ResumeMerger::merge(sheets).ok_or(BuildError::ResumeNotFound)?;
        notifier.stat(BuildEvent::AfterMerge);

        let mut theme = self.load_theme(options)?;
        FormatExpander::add_freebie_formats(&mut theme);
        let backend = self.engines.get(&theme.engine).map_err(|err| BuildError::ThemeLoad {
            attempted: theme.root.clone(),
            source: err.into(),
        })?;

        notifier.stat(BuildEvent::VerifyOutputs {
            targets: destinations.clone(),
        });
        FormatExpander::verify_outputs(&destinations, &theme)?;

        let mut resume = Resume::from_json(
            merged,
            &ParseOptions {
                privatize: options.privatize,
                now: options.now,
                ..ParseOptions::default()
            },
        );
        resume.meta_mut().file = sources.first().cloned();

        let mut targets = FormatExpander::expand(&destinations, &theme);

        notifier.stat(BuildEvent::ApplyTheme {
            theme: theme.name.clone(),
        });
        {
            let ctx = GenerateContext {
                resume: &resume,
                theme: &theme,
                options,
                backend,
            };
            self.generate_all(&ctx, &mut targets, notifier);
        }

        let output = BuildOutput {
            theme: theme.name.clone(),
            resume,
            targets,
        };
        if output.has_errors() {
            Err(BuildFailure::Targets(output))
        } else {
            Ok(output)
        }
    }

    fn load_theme(&self, options: &BuildOptions) -> Result<Theme, BuildError> {
        options.notifier.stat(BuildEvent::BeforeTheme {
            theme: options.theme.clone(),
        });
        let search_dirs = options
            .theme_dirs
            .iter()
            .map(|d| options.absolute_path(d))
            .collect();
        let theme = ThemeResolver::new(&options.root_dir)
            .with_search_dirs(search_dirs)
            .load(&options.theme)?;
        options.notifier.stat(BuildEvent::AfterTheme {
            theme: theme.name.clone(),
            root: theme.root.clone(),
        });
        Ok(theme)
    }

    fn generate_all(&self, ctx: &GenerateContext<'_>, targets: &mut [Target], notifier: &Notifier) {
        let mut has_error = false;

        for target in targets.iter_mut() {
            if has_error && ctx.options.assert {
                debug!("Skipping {} after an earlier failure", target.file.display());
                target.outcome = TargetOutcome::Skipped;
                continue;
            }

            let format = target.format_name().to_string();
            notifier.stat(BuildEvent::BeforeGenerate {
                format: format.clone(),
                file: target.file.clone(),
            });

            let generator = self.generators.for_format(&format);
            let result = generator.generate(ctx, &target.format, &target.file);

            notifier.stat(BuildEvent::AfterGenerate {
                format: format.clone(),
                file: target.file.clone(),
                error: result.as_ref().err().map(ToString::to_string),
            });

            target.outcome = match result {
                Ok(files) => {
                    info!("Generated {} ({} file(s))", target.file.display(), files.len());
                    TargetOutcome::Generated { files }
                }
                Err(err) => {
                    has_error = true;
                    warn!("Failed to generate {}: {}", target.file.display(), err);
                    notifier.stat(BuildEvent::Error {
                        code: err.code(),
                        message: err.to_string(),
                    });
                    TargetOutcome::Failed(err)
                }
            };
        }
    }
}

/// Resolve sources and destinations against the root directory, applying the
/// destination defaults and refusing to overwrite a source.
fn collect_paths<S, D>(
    sources: &[S],
    destinations: &[D],
    options: &BuildOptions,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>), BuildError>
where
    S: AsRef<Path>,
    D: AsRef<Path>,
{
    let mut sources: Vec<PathBuf> = sources
        .iter()
        .map(|s| options.absolute_path(s.as_ref()))
        .collect();
    let mut destinations: Vec<PathBuf> = destinations
        .iter()
        .map(|d| options.absolute_path(d.as_ref()))
        .collect();

    if sources.is_empty() {
        return Err(BuildError::ResumeNotFound);
    }

    if destinations.is_empty() {
        if sources.len() >= 2 {
            // `build a.json b.json out/resume.all` written without a separator
            destinations.extend(sources.pop());
        } else {
            destinations.push(FormatExpander::default_destination(
                &options.output_dir_absolute(),
            ));
        }
    }

    if let Some(clash) = destinations
        .iter()
        .find(|d| sources.iter().any(|s| same_file(s, d)))
    {
        return Err(BuildError::InputOutputParity {
            file: clash.clone(),
        });
    }

    debug!(
        "Building {} source(s) into {} destination(s)",
        sources.len(),
        destinations.len()
    );
    Ok((sources, destinations))
}

/// Build with the default backends and generators.
pub fn build<S, D>(
    sources: &[S],
    destinations: &[D],
    options: &BuildOptions,
) -> Result<BuildOutput, BuildFailure>
where
    S: AsRef<Path>,
    D: AsRef<Path>,
{
    BuildOrchestrator::default().build(sources, destinations, options)
}

/// Run a build on the blocking pool; the outcome settles exactly once.
pub async fn build_async(
    sources: Vec<PathBuf>,
    destinations: Vec<PathBuf>,
    options: BuildOptions,
) -> Result<BuildOutput, BuildFailure> {
    let handle = tokio::task::spawn_blocking(move || build(&sources, &destinations, &options));
    match handle.await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(BuildFailure::Aborted(BuildError::Generate {
            file: PathBuf::new(),
            source: anyhow::Error::new(err).context("Build task was cancelled"),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::CanonicalDate;
    use crate::theme::tests::write_theme;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const TEXT_THEME: &str = r#"
[formats.txt]
[[formats.txt.files]]
path = "src/resume.txt.hbs"

[formats.md]
[[formats.md.files]]
path = "src/resume.md.hbs"
"#;

    fn workspace() -> (TempDir, BuildOptions) {
        let dir = TempDir::new().unwrap();
        let root = write_theme(dir.path(), "jsonresume-theme-plain", TEXT_THEME);
        fs::write(root.join("src/resume.md.hbs"), "# {{r.basics.name}}\n").unwrap();
        fs::write(
            dir.path().join("resume.json"),
            r#"{ "basics": { "name": "Jane Doe", "label": "Engineer" } }"#,
        )
        .unwrap();
        let options = BuildOptions::new()
            .with_theme("plain")
            .with_root_dir(dir.path().to_path_buf())
            .with_now(CanonicalDate::from_ymd(2018, 6, 1).unwrap());
        (dir, options)
    }

    #[test]
    fn test_collect_paths_defaults() {
        let (dir, options) = workspace();
        let (s, d) = collect_paths(&["resume.json"], &[] as &[&str], &options).unwrap();
        assert_eq!(s, vec![dir.path().join("resume.json")]);
        assert_eq!(d, vec![dir.path().join("out/resume.all")]);

        let (s, d) = collect_paths(&["a.json", "b.json", "out/cv.txt"], &[] as &[&str], &options)
            .unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(d, vec![dir.path().join("out/cv.txt")]);
    }

    #[test]
    fn test_no_sources_and_parity_abort() {
        let (_dir, options) = workspace();
        assert!(matches!(
            collect_paths(&[] as &[&str], &["out/x.txt"], &options),
            Err(BuildError::ResumeNotFound)
        ));
        assert!(matches!(
            collect_paths(&["resume.json"], &["resume.json"], &options),
            Err(BuildError::InputOutputParity { .. })
        ));
    }

    #[test]
    fn test_build_all_formats() {
        let (dir, options) = workspace();
        let output = build(&["resume.json"], &["out/resume.all"], &options).unwrap();

        let names: Vec<_> = output.targets.iter().map(|t| t.format_name().to_string()).collect();
        assert_eq!(names, vec!["json", "md", "txt", "yml"]);
        assert_eq!(output.files().len(), 4);
        assert_eq!(
            fs::read_to_string(dir.path().join("out/resume.txt")).unwrap(),
            "Jane Doe\nEngineer\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("out/resume.md")).unwrap(),
            "# Jane Doe\n"
        );
        assert_eq!(output.resume.name(), Some("Jane Doe"));
    }

    #[test]
    fn test_unregistered_engine_is_a_theme_load_error() {
        let (dir, options) = workspace();
        let manifest = dir.path().join("jsonresume-theme-plain/manifest.toml");
        let text = fs::read_to_string(&manifest).unwrap();
        fs::write(&manifest, format!("engine = \"underscore\"\n{text}")).unwrap();

        match build(&["resume.json"], &[] as &[&str], &options).unwrap_err() {
            BuildFailure::Aborted(BuildError::ThemeLoad { source, .. }) => {
                assert!(source.to_string().contains("underscore"))
            }
            other => panic!("unexpected failure: {other}"),
        }
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_target_failure_is_contained_unless_asserting() {
        let (dir, options) = workspace();
        fs::write(
            dir.path().join("jsonresume-theme-plain/src/resume.md.hbs"),
            "{{#if r.basics.name}}unterminated",
        )
        .unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let options = options.with_observer(move |e: &BuildEvent| {
            if let BuildEvent::Error { code, .. } = e {
                sink.lock().unwrap().push(*code);
            }
        });

        let failure = build(&["resume.json"], &["out/resume.all"], &options).unwrap_err();
        let BuildFailure::Targets(output) = &failure else {
            panic!("expected per-target failure");
        };
        assert_eq!(output.failed().count(), 1);
        assert!(dir.path().join("out/resume.txt").exists());
        assert!(dir.path().join("out/resume.yml").exists());
        assert_eq!(failure.first_error().map(BuildError::code), Some("compileTemplate"));
        assert_eq!(*events.lock().unwrap(), vec!["compileTemplate"]);

        let asserting = options.with_assert(true);
        let BuildFailure::Targets(output) = build(&["resume.json"], &["out/again.all"], &asserting)
            .unwrap_err()
        else {
            panic!("expected per-target failure");
        };
        let skipped = output
            .targets
            .iter()
            .filter(|t| matches!(t.outcome, TargetOutcome::Skipped))
            .count();
        assert_eq!(skipped, 2);
        assert!(!dir.path().join("out/again.txt").exists());
    }

    #[tokio::test]
    async fn test_build_async_settles_once() {
        let (dir, options) = workspace();
        let output = build_async(
            vec![PathBuf::from("resume.json")],
            vec![PathBuf::from("out/async.txt")],
            options,
        )
        .await
        .unwrap();
        assert_eq!(output.targets.len(), 1);
        assert!(dir.path().join("out/async.txt").exists());
    }
}
