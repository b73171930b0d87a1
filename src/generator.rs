// src/generator.rs
//! Per-format generators, selected by output format name.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::{BuildOptions, CssMode};
use crate::core::{
    prettify_html, FsOps, OutputWriter, PreSave, RenderBackend, TemplateEngine, Verbatim,
};
use crate::error::{BuildError, BuildResult};
use crate::events::BuildEvent;
use crate::theme::{FormatDescriptor, TemplateAction, TemplateFile, Theme};
use crate::types::Resume;

/// What every generator sees for the current build.
pub struct GenerateContext<'a> {
    pub resume: &'a Resume,
    pub theme: &'a Theme,
    pub options: &'a BuildOptions,
    pub backend: Arc<dyn RenderBackend>,
}

impl GenerateContext<'_> {
    fn engine(&self) -> TemplateEngine<'_> {
        TemplateEngine::new(
            self.backend.clone(),
            self.theme,
            self.options,
            &self.options.notifier,
        )
    }

    fn writer(&self) -> OutputWriter<'_> {
        OutputWriter::new(&self.options.notifier)
    }
}

pub trait Generator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce `file` (plus any auxiliary files); returns every path written.
    fn generate(
        &self,
        ctx: &GenerateContext<'_>,
        format: &FormatDescriptor,
        file: &Path,
    ) -> BuildResult<Vec<PathBuf>>;
}

fn generate_error(file: &Path) -> impl FnOnce(anyhow::Error) -> BuildError + '_ {
    move |source| BuildError::Generate {
        file: file.to_path_buf(),
        source,
    }
}

/// Render the theme templates and write them through `hook`, then link.
fn render_and_write(
    ctx: &GenerateContext<'_>,
    format: &FormatDescriptor,
    file: &Path,
    hook: &dyn PreSave,
) -> BuildResult<Vec<PathBuf>> {
    if format.files.is_empty() {
        warn!("Format {} declares no templates; nothing to write", format.out_format);
        return Ok(Vec::new());
    }

    let rendered = ctx.engine().transform(ctx.resume, format, file)?;
    let writer = ctx.writer();
    let written = writer
        .write_all(rendered, hook)
        .map_err(generate_error(file))?;

    let out_folder = file.parent().unwrap_or_else(|| Path::new("."));
    writer
        .link(format, &ctx.theme.root, out_folder)
        .map_err(generate_error(file))?;
    Ok(written)
}

/// Any templated format without a dedicated generator (txt, md, doc, tex, ...).
pub struct TemplateGenerator;

impl Generator for TemplateGenerator {
    fn name(&self) -> &'static str {
        "template"
    }

    fn generate(
        &self,
        ctx: &GenerateContext<'_>,
        format: &FormatDescriptor,
        file: &Path,
    ) -> BuildResult<Vec<PathBuf>> {
        render_and_write(ctx, format, file, &Verbatim)
    }
}

/// Pre-save hook for HTML: re-indents markup and holds back CSS that gets inlined.
pub struct HtmlPreSave {
    pub prettify: bool,
    pub css: CssMode,
}

impl HtmlPreSave {
    pub fn from_options(options: &BuildOptions) -> Self {
        Self {
            prettify: options.prettify,
            css: options.css,
        }
    }
}

impl PreSave for HtmlPreSave {
    fn pre_save(&self, template: &TemplateFile, text: String) -> Option<String> {
        if template.ext == "css" {
            return match self.css {
                CssMode::Embed => None,
                CssMode::Link => Some(text),
            };
        }
        Some(if self.prettify { prettify_html(&text) } else { text })
    }
}

pub struct HtmlGenerator;

impl Generator for HtmlGenerator {
    fn name(&self) -> &'static str {
        "html"
    }

    fn generate(
        &self,
        ctx: &GenerateContext<'_>,
        format: &FormatDescriptor,
        file: &Path,
    ) -> BuildResult<Vec<PathBuf>> {
        render_and_write(ctx, format, file, &HtmlPreSave::from_options(ctx.options))
    }
}

/// Render the HTML flavour of the resume into a scratch directory.
/// Returns the directory (kept alive by the caller) and the page path.
fn render_html_scratch(
    ctx: &GenerateContext<'_>,
    format: &FormatDescriptor,
    file: &Path,
) -> BuildResult<(TempDir, PathBuf)> {
    let source = if format.files.is_empty() {
        ctx.theme.get_format("html").ok_or_else(|| BuildError::Generate {
            file: file.to_path_buf(),
            source: anyhow::anyhow!(
                "Theme {} has no HTML templates to render {} from",
                ctx.theme.name,
                format.out_format
            ),
        })?
    } else {
        format
    };

    let scratch = tempfile::tempdir()
        .context("Failed to create scratch directory")
        .map_err(generate_error(file))?;
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "resume".to_string());
    let page = scratch.path().join(format!("{stem}.html"));

    let hook = HtmlPreSave::from_options(ctx.options);
    for rendered in ctx.engine().transform(ctx.resume, source, &page)? {
        let written = match (rendered.template.action, rendered.content) {
            (TemplateAction::Transform, Some(text)) => match hook.pre_save(&rendered.template, text) {
                Some(text) => FsOps::write_file_safe(&rendered.dest, text.as_bytes()),
                None => Ok(()),
            },
            _ => FsOps::copy_file(&rendered.template.path, &rendered.dest),
        };
        written.map_err(generate_error(file))?;
    }
    Ok((scratch, page))
}

fn run_converter(mut cmd: Command, program: &str) -> Result<()> {
    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute {} command", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        anyhow::bail!(
            "{} conversion failed: stderr={}, stdout={}",
            program,
            stderr,
            stdout
        );
    }
    Ok(())
}

/// Converts an HTML page to `file` with an external program.
fn convert_html(
    ctx: &GenerateContext<'_>,
    program: &str,
    args: &[&str],
    page: &Path,
    file: &Path,
) -> BuildResult<Vec<PathBuf>> {
    let notifier = &ctx.options.notifier;
    notifier.stat(BuildEvent::BeforeWrite {
        file: file.to_path_buf(),
    });

    let converted = file
        .parent()
        .map_or(Ok(()), FsOps::ensure_dir_exists)
        .and_then(|_| {
            let mut cmd = Command::new(program);
            cmd.args(args).arg(page).arg(file);
            run_converter(cmd, program)
        });
    converted.map_err(generate_error(file))?;

    notifier.stat(BuildEvent::AfterWrite {
        file: file.to_path_buf(),
    });
    info!("Converted {} to {}", page.display(), file.display());
    Ok(vec![file.to_path_buf()])
}

pub struct PdfGenerator;

impl Generator for PdfGenerator {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn generate(
        &self,
        ctx: &GenerateContext<'_>,
        format: &FormatDescriptor,
        file: &Path,
    ) -> BuildResult<Vec<PathBuf>> {
        let Some(program) = ctx.options.pdf.command() else {
            info!("PDF engine disabled; skipping {}", file.display());
            return Ok(Vec::new());
        };

        let (_scratch, page) = render_html_scratch(ctx, format, file)?;
        let args: &[&str] = match program {
            "wkhtmltopdf" => &["--quiet", "--enable-local-file-access"],
            _ => &[],
        };
        convert_html(ctx, program, args, &page, file)
    }
}

pub struct PngGenerator;

impl Generator for PngGenerator {
    fn name(&self) -> &'static str {
        "png"
    }

    fn generate(
        &self,
        ctx: &GenerateContext<'_>,
        format: &FormatDescriptor,
        file: &Path,
    ) -> BuildResult<Vec<PathBuf>> {
        let (_scratch, page) = render_html_scratch(ctx, format, file)?;
        convert_html(
            ctx,
            "wkhtmltoimage",
            &["--quiet", "--enable-local-file-access"],
            &page,
            file,
        )
    }
}

/// The resume itself as JSON, internal keys removed.
pub struct JsonGenerator;

impl Generator for JsonGenerator {
    fn name(&self) -> &'static str {
        "json"
    }

    fn generate(
        &self,
        ctx: &GenerateContext<'_>,
        format: &FormatDescriptor,
        file: &Path,
    ) -> BuildResult<Vec<PathBuf>> {
        if !format.files.is_empty() {
            return TemplateGenerator.generate(ctx, format, file);
        }
        let written = ctx
            .writer()
            .write_bytes(file, ctx.resume.stringify().as_bytes())
            .map_err(generate_error(file))?;
        Ok(vec![written])
    }
}

pub struct YamlGenerator;

impl Generator for YamlGenerator {
    fn name(&self) -> &'static str {
        "yml"
    }

    fn generate(
        &self,
        ctx: &GenerateContext<'_>,
        format: &FormatDescriptor,
        file: &Path,
    ) -> BuildResult<Vec<PathBuf>> {
        if !format.files.is_empty() {
            return TemplateGenerator.generate(ctx, format, file);
        }
        let yaml = serde_yaml::to_string(&ctx.resume.to_value())
            .context("Failed to serialize resume as YAML")
            .map_err(generate_error(file))?;
        let written = ctx
            .writer()
            .write_bytes(file, yaml.as_bytes())
            .map_err(generate_error(file))?;
        Ok(vec![written])
    }
}

/// Format name to generator, with the template generator as fallback.
#[derive(Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn Generator>>,
    fallback: Arc<dyn Generator>,
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            generators: HashMap::new(),
            fallback: Arc::new(TemplateGenerator),
        };
        registry.register(HtmlGenerator);
        registry.register(PdfGenerator);
        registry.register(PngGenerator);
        registry.register(JsonGenerator);
        registry.register(YamlGenerator);
        registry
    }
}

impl GeneratorRegistry {
    pub fn register(&mut self, generator: impl Generator + 'static) {
        self.generators
            .insert(generator.name().to_string(), Arc::new(generator));
    }

    pub fn for_format(&self, format: &str) -> Arc<dyn Generator> {
        self.generators
            .get(format)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.generators.keys().collect();
        names.sort();
        f.debug_struct("GeneratorRegistry")
            .field("generators", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PdfEngine;
    use crate::core::HandlebarsBackend;
    use crate::expand::FormatExpander;
    use crate::theme::tests::{write_theme, MANIFEST};
    use crate::types::ParseOptions;
    use serde_json::json;
    use std::fs;

    fn fixture(dir: &Path) -> (Theme, Resume) {
        let root = write_theme(dir, "jsonresume-theme-fixture", MANIFEST);
        let mut theme = Theme::open(&root).unwrap();
        FormatExpander::add_freebie_formats(&mut theme);
        let resume = Resume::from_json(
            json!({ "basics": { "name": "Jane Doe", "label": "Engineer" } }),
            &ParseOptions::default(),
        );
        (theme, resume)
    }

    #[test]
    fn test_html_pre_save_prettifies_pages() {
        let page = TemplateFile {
            path: PathBuf::from("resume.html.hbs"),
            output: PathBuf::from("resume.html"),
            action: TemplateAction::Transform,
            ext: "html".to_string(),
            primary: true,
            data: None,
        };
        let markup = "<html><body><div><p>Hi</p></div></body></html>";
        let pretty = HtmlPreSave {
            prettify: true,
            css: CssMode::Embed,
        };
        assert_eq!(
            pretty.pre_save(&page, markup.into()).as_deref(),
            Some("<html>\n  <body>\n    <div>\n      <p>Hi</p>\n    </div>\n  </body>\n</html>\n")
        );
        let raw = HtmlPreSave {
            prettify: false,
            css: CssMode::Embed,
        };
        assert_eq!(raw.pre_save(&page, markup.into()).as_deref(), Some(markup));
    }

    #[test]
    fn test_html_pre_save_holds_back_embedded_css() {
        let css = TemplateFile {
            path: PathBuf::from("style.css"),
            output: PathBuf::from("style.css"),
            action: TemplateAction::Transform,
            ext: "css".to_string(),
            primary: false,
            data: None,
        };
        let embed = HtmlPreSave {
            prettify: true,
            css: CssMode::Embed,
        };
        assert_eq!(embed.pre_save(&css, "h1{}".into()), None);
        let link = HtmlPreSave {
            prettify: true,
            css: CssMode::Link,
        };
        assert_eq!(link.pre_save(&css, "h1{}".into()).as_deref(), Some("h1{}"));
    }

    #[test]
    fn test_registry_falls_back_to_templates() {
        let registry = GeneratorRegistry::default();
        assert_eq!(registry.for_format("html").name(), "html");
        assert_eq!(registry.for_format("yml").name(), "yml");
        assert_eq!(registry.for_format("txt").name(), "template");
    }

    #[test]
    fn test_html_generator_writes_page_and_assets() {
        let dir = tempfile::tempdir().unwrap();
        let (theme, resume) = fixture(dir.path());
        let options = BuildOptions::new();
        let ctx = GenerateContext {
            resume: &resume,
            theme: &theme,
            options: &options,
            backend: Arc::new(HandlebarsBackend),
        };
        let out = dir.path().join("out/resume.html");
        let written = HtmlGenerator
            .generate(&ctx, theme.get_format("html").unwrap(), &out)
            .unwrap();

        assert_eq!(written, vec![out.clone(), dir.path().join("out/assets/logo.svg")]);
        assert!(!dir.path().join("out/style.css").exists());
        let page = fs::read_to_string(&out).unwrap();
        assert!(page.contains("h1 { color: #333; }"));
        assert!(page.contains("<h1>Jane Doe</h1>"));
    }

    #[test]
    fn test_freebies_write_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let (theme, resume) = fixture(dir.path());
        let options = BuildOptions::new();
        let ctx = GenerateContext {
            resume: &resume,
            theme: &theme,
            options: &options,
            backend: Arc::new(HandlebarsBackend),
        };

        let json_out = dir.path().join("out/resume.json");
        JsonGenerator
            .generate(&ctx, theme.get_format("json").unwrap(), &json_out)
            .unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_out).unwrap()).unwrap();
        assert_eq!(parsed["basics"]["name"], "Jane Doe");
        assert!(parsed["basics"].get("computed").is_none());

        let yml_out = dir.path().join("out/resume.yml");
        YamlGenerator
            .generate(&ctx, theme.get_format("yml").unwrap(), &yml_out)
            .unwrap();
        assert!(fs::read_to_string(&yml_out).unwrap().contains("name: Jane Doe"));
    }

    #[test]
    fn test_pdf_is_skipped_without_engine() {
        let dir = tempfile::tempdir().unwrap();
        let (theme, resume) = fixture(dir.path());
        let options = BuildOptions::new().with_pdf(PdfEngine::None);
        let ctx = GenerateContext {
            resume: &resume,
            theme: &theme,
            options: &options,
            backend: Arc::new(HandlebarsBackend),
        };
        let pdf = FormatDescriptor::freebie("pdf", "PDF", "pdf");
        let out = dir.path().join("out/resume.pdf");
        assert!(PdfGenerator.generate(&ctx, &pdf, &out).unwrap().is_empty());
        assert!(!out.exists());
    }
}
