// src/core/render_backend.rs
//! Pluggable rendering backends, looked up by the engine name a theme declares.

use anyhow::Context as _;
use handlebars::{
    no_escape, Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    Template,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::BuildOptions;
use crate::dates::{CanonicalDate, DateNormalizer};
use crate::error::{BuildError, BuildResult};
use crate::theme::{FormatDescriptor, Partial};

/// Everything a backend needs to render one template.
pub struct RenderRequest<'a> {
    /// Resume pre-escaped for the destination format.
    pub resume: &'a Value,
    /// Resume exactly as normalized.
    pub raw: &'a Value,
    pub template: &'a str,
    pub format: &'a FormatDescriptor,
    pub options: &'a BuildOptions,
    pub partials: &'a [Partial],
    /// Transformed CSS captured earlier in the same format, if any.
    pub css: Option<&'a str>,
    pub head_fragment: Option<&'a str>,
}

pub trait RenderBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render a theme template against the full context.
    fn generate(&self, request: &RenderRequest<'_>) -> BuildResult<String>;

    /// Render a template with nothing but `data` as its context.
    fn generate_simple(&self, data: &Value, template: &str) -> BuildResult<String>;
}

/// Engine name to backend.
#[derive(Clone)]
pub struct EngineRegistry {
    backends: HashMap<String, Arc<dyn RenderBackend>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(HandlebarsBackend);
        registry
    }
}

impl EngineRegistry {
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    pub fn register(&mut self, backend: impl RenderBackend + 'static) {
        debug!("Registered render backend: {}", backend.name());
        self.backends
            .insert(backend.name().to_string(), Arc::new(backend));
    }

    pub fn get(&self, engine: &str) -> BuildResult<Arc<dyn RenderBackend>> {
        self.backends
            .get(&engine.to_lowercase())
            .cloned()
            .ok_or_else(|| BuildError::UnregisteredEngine(engine.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

pub struct HandlebarsBackend;

const TEMPLATE_NAME: &str = "resume";

impl HandlebarsBackend {
    fn engine(noescape: bool, now: Option<CanonicalDate>) -> Handlebars<'static> {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(false);
        if noescape {
            hb.register_escape_fn(no_escape);
        }
        hb.register_helper("lower", Box::new(lower_helper));
        hb.register_helper("upper", Box::new(upper_helper));
        hb.register_helper("link", Box::new(link_helper));
        hb.register_helper(
            "formatDate",
            Box::new(FormatDate(DateNormalizer::from_option(now))),
        );
        hb
    }

    fn compile(hb: &mut Handlebars<'static>, template: &str) -> BuildResult<()> {
        let compiled = Template::compile(template).map_err(|e| BuildError::TemplateCompile {
            source: e.into(),
        })?;
        hb.register_template(TEMPLATE_NAME, compiled);
        Ok(())
    }

    fn invoke(hb: &Handlebars<'static>, data: &Value) -> BuildResult<String> {
        hb.render(TEMPLATE_NAME, data)
            .map_err(|e| BuildError::TemplateInvoke { source: e.into() })
    }
}

impl RenderBackend for HandlebarsBackend {
    fn name(&self) -> &'static str {
        "handlebars"
    }

    fn generate(&self, request: &RenderRequest<'_>) -> BuildResult<String> {
        let mut hb = Self::engine(request.options.noescape, request.options.now);

        for partial in request.partials {
            let source = fs::read_to_string(&partial.path)
                .with_context(|| format!("Failed to read partial: {}", partial.path.display()))
                .map_err(|source| BuildError::TemplateCompile { source })?;
            hb.register_partial(&partial.name, source)
                .map_err(|e| BuildError::TemplateCompile { source: e.into() })?;
            trace!("Registered partial {}", partial.name);
        }

        Self::compile(&mut hb, request.template)?;

        let data = json!({
            "r": request.resume,
            "RAW": request.raw,
            "format": request.format.out_format,
            "filt": {},
            "engine": self.name(),
            "opts": {
                "prettify": request.options.prettify,
                "css": request.options.css,
                "noescape": request.options.noescape,
                "private": request.options.privatize,
            },
            "results": request.format.files,
            "css": request.css,
            "headFragment": request.head_fragment.unwrap_or_default(),
        });

        Self::invoke(&hb, &data)
    }

    fn generate_simple(&self, data: &Value, template: &str) -> BuildResult<String> {
        let mut hb = Self::engine(false, None);
        Self::compile(&mut hb, template)?;
        Self::invoke(&hb, data)
    }
}

fn param_str(h: &Helper, idx: usize) -> String {
    h.param(idx)
        .map(|p| match p.value() {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_str(h, 0).to_lowercase())?;
    Ok(())
}

fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_str(h, 0).to_uppercase())?;
    Ok(())
}

/// `{{link url text}}`: an anchor when a URL is present, the bare text otherwise.
fn link_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let url = param_str(h, 0);
    let text = match param_str(h, 1) {
        t if t.is_empty() => url.clone(),
        t => t,
    };
    if url.is_empty() {
        out.write(&text)?;
    } else {
        out.write(&format!("<a href=\"{}\">{}</a>", url, text))?;
    }
    Ok(())
}

/// `{{formatDate date "%b %Y"}}`; unparseable input is written unchanged.
///
/// Carries the build's normalizer so "present" honours a pinned current date.
struct FormatDate(DateNormalizer);

impl HelperDef for FormatDate {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        format_date(h, &self.0, out)
    }
}

fn format_date(h: &Helper, normalizer: &DateNormalizer, out: &mut dyn Output) -> HelperResult {
    let text = param_str(h, 0);
    let pattern = match param_str(h, 1) {
        p if p.is_empty() => "%b %Y".to_string(),
        p => p,
    };
    if text.trim().is_empty() {
        return Ok(());
    }
    let mut formatted = String::new();
    match normalizer.probe(Some(text.as_str())) {
        // an invalid strftime pattern surfaces as a fmt error, not a panic
        Some(d) if write!(formatted, "{}", d.as_naive().format(&pattern)).is_ok() => {
            out.write(&formatted)?
        }
        _ => out.write(&text)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::FormatDescriptor;

    fn request<'a>(
        resume: &'a Value,
        template: &'a str,
        format: &'a FormatDescriptor,
        options: &'a BuildOptions,
    ) -> RenderRequest<'a> {
        RenderRequest {
            resume,
            raw: resume,
            template,
            format,
            options,
            partials: &[],
            css: Some("h1{}"),
            head_fragment: None,
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = EngineRegistry::default();
        assert_eq!(registry.names(), vec!["handlebars"]);
        assert!(registry.get("Handlebars").is_ok());
        match registry.get("underscore") {
            Err(BuildError::UnregisteredEngine(name)) => assert_eq!(name, "underscore"),
            _ => panic!("expected UnregisteredEngine"),
        }
    }

    #[test]
    fn test_generate_exposes_context() {
        let resume = json!({ "basics": { "name": "Jane <Doe>" } });
        let format = FormatDescriptor::freebie("html", "HTML", "html");
        let options = BuildOptions::new();
        let out = HandlebarsBackend
            .generate(&request(
                &resume,
                "{{format}}|{{r.basics.name}}|{{{RAW.basics.name}}}|{{{css}}}|{{upper format}}",
                &format,
                &options,
            ))
            .unwrap();
        assert_eq!(out, "html|Jane &lt;Doe&gt;|Jane <Doe>|h1{}|HTML");
    }

    #[test]
    fn test_noescape_option() {
        let resume = json!({ "basics": { "name": "A & B" } });
        let format = FormatDescriptor::freebie("txt", "TXT", "txt");
        let options = BuildOptions::new().with_noescape(true);
        let out = HandlebarsBackend
            .generate(&request(&resume, "{{r.basics.name}}", &format, &options))
            .unwrap();
        assert_eq!(out, "A & B");
    }

    #[test]
    fn test_compile_and_invoke_failures_are_distinguished() {
        let data = json!({});
        let err = HandlebarsBackend
            .generate_simple(&data, "{{#each r.work}}unterminated")
            .unwrap_err();
        assert_eq!(err.code(), "compileTemplate");

        let err = HandlebarsBackend
            .generate_simple(&data, "{{nosuchhelper 1}}")
            .unwrap_err();
        assert_eq!(err.code(), "invokeTemplate");
    }

    #[test]
    fn test_helpers() {
        let data = json!({ "url": "https://example.com", "d": "2015-03" });
        let out = HandlebarsBackend
            .generate_simple(&data, "{{{link url \"site\"}}} {{{link \"\" \"plain\"}}} {{formatDate d \"%Y/%m\"}}")
            .unwrap();
        assert_eq!(out, "<a href=\"https://example.com\">site</a> plain 2015/03");
    }

    #[test]
    fn test_format_date_uses_pinned_now() {
        let resume = json!({ "work": [{ "endDate": "present" }] });
        let format = FormatDescriptor::freebie("txt", "TXT", "txt");
        let options = BuildOptions::new().with_now(CanonicalDate::from_ymd(2018, 6, 15).unwrap());
        let out = HandlebarsBackend
            .generate(&request(
                &resume,
                "{{formatDate \"present\" \"%Y-%m\"}}|{{formatDate r.work.[0].endDate \"%b %Y\"}}",
                &format,
                &options,
            ))
            .unwrap();
        assert_eq!(out, "2018-06|Jun 2018");
    }
}
