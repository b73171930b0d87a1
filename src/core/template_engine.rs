// src/core/template_engine.rs
//! Renders a target's template set through the theme's rendering backend.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::BuildOptions;
use crate::core::render_backend::{RenderBackend, RenderRequest};
use crate::error::BuildResult;
use crate::events::{BuildEvent, Notifier};
use crate::theme::{FormatDescriptor, TemplateAction, TemplateFile, Theme};
use crate::types::Resume;

pub const FROZEN_NEWLINE: &str = "&newl;";
pub const FROZEN_RETURN: &str = "&retn;";
/// Stands for a literal `&` that would otherwise start one of the tokens.
pub const FROZEN_AMP: &str = "&ampf;";

const CSS_EXT: &str = "css";
const MARKDOWN_FORMATS: &[&str] = &["html", "pdf", "png"];
const XML_FORMATS: &[&str] = &["doc", "docx", "odt", "xml", "rtf"];

fn starts_with_token(text: &str) -> Option<&'static str> {
    [FROZEN_NEWLINE, FROZEN_RETURN, FROZEN_AMP]
        .into_iter()
        .find(|token| text.starts_with(token))
}

/// Replace line breaks with placeholder tokens. Token text already present in
/// `text` is escaped so [`unfreeze`] restores it exactly.
pub fn freeze(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, c) in text.char_indices() {
        match c {
            '\n' => out.push_str(FROZEN_NEWLINE),
            '\r' => out.push_str(FROZEN_RETURN),
            '&' if starts_with_token(&text[idx..]).is_some() => out.push_str(FROZEN_AMP),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of [`freeze`].
pub fn unfreeze(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let (replacement, consumed) = match starts_with_token(tail) {
            Some(FROZEN_NEWLINE) => ("\n", FROZEN_NEWLINE.len()),
            Some(FROZEN_RETURN) => ("\r", FROZEN_RETURN.len()),
            Some(token) => ("&", token.len()),
            None => ("&", 1),
        };
        out.push_str(replacement);
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

/// One output of a format's template set, ready to be written.
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub template: TemplateFile,
    pub dest: PathBuf,
    /// Rendered text; `None` for files copied verbatim.
    pub content: Option<String>,
}

pub struct TemplateEngine<'a> {
    backend: Arc<dyn RenderBackend>,
    theme: &'a Theme,
    options: &'a BuildOptions,
    notifier: &'a Notifier,
}

impl<'a> TemplateEngine<'a> {
    pub fn new(
        backend: Arc<dyn RenderBackend>,
        theme: &'a Theme,
        options: &'a BuildOptions,
        notifier: &'a Notifier,
    ) -> Self {
        Self {
            backend,
            theme,
            options,
            notifier,
        }
    }

    /// CSS templates first; everything else keeps its declared order.
    pub fn ordered(files: &[TemplateFile]) -> Vec<&TemplateFile> {
        let mut ordered: Vec<&TemplateFile> = files.iter().collect();
        ordered.sort_by_key(|f| f.ext != CSS_EXT);
        ordered
    }

    /// The resume as templates of `format` should see it.
    pub fn prepare_resume(resume: &Resume, format: &str) -> Value {
        if MARKDOWN_FORMATS.contains(&format) {
            resume.markdownify()
        } else if XML_FORMATS.contains(&format) {
            resume.xmlify()
        } else {
            resume.json().clone()
        }
    }

    /// Render every file of `format` for an output whose primary file is `file`.
    pub fn transform(
        &self,
        resume: &Resume,
        format: &FormatDescriptor,
        file: &Path,
    ) -> BuildResult<Vec<RenderedFile>> {
        let escaped = Self::prepare_resume(resume, &format.out_format);
        let raw = resume.json();
        let out_folder = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let head_fragment = self.head_fragment(&format.out_format);

        let mut css: Option<String> = None;
        let mut rendered = Vec::with_capacity(format.files.len());

        for template in Self::ordered(&format.files) {
            let dest = if template.primary {
                file.to_path_buf()
            } else {
                out_folder.join(&template.output)
            };

            let content = match (template.action, template.data.as_deref()) {
                (TemplateAction::Transform, Some(text)) => {
                    let source = if self.options.freeze_breaks {
                        freeze(text)
                    } else {
                        text.to_string()
                    };
                    let request = RenderRequest {
                        resume: &escaped,
                        raw,
                        template: &source,
                        format,
                        options: self.options,
                        partials: &self.theme.partials,
                        css: css.as_deref(),
                        head_fragment: head_fragment.as_deref(),
                    };
                    let output = self.backend.generate(&request)?;
                    let output = if self.options.freeze_breaks {
                        unfreeze(&output)
                    } else {
                        output
                    };

                    if template.ext == CSS_EXT {
                        css.get_or_insert_with(String::new).push_str(&output);
                    }
                    trace!("Transformed {} ({} bytes)", template.path.display(), output.len());
                    Some(output)
                }
                _ => None,
            };

            self.notifier.stat(BuildEvent::AfterTransform {
                format: format.out_format.clone(),
                template: template.path.clone(),
            });

            rendered.push(RenderedFile {
                template: template.clone(),
                dest,
                content,
            });
        }

        debug!(
            "Rendered {} file(s) for format {}",
            rendered.len(),
            format.out_format
        );
        Ok(rendered)
    }

    fn head_fragment(&self, format: &str) -> Option<String> {
        (format == "html").then(|| {
            format!(
                "<meta name=\"generator\" content=\"cvbuild {} ({})\">",
                env!("CARGO_PKG_VERSION"),
                self.theme.name
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::render_backend::HandlebarsBackend;
    use crate::types::ParseOptions;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_freeze_roundtrip_is_lossless() {
        let text = "line one\r\nline two\n\n  {{r.basics.name}}\rend";
        let frozen = freeze(text);
        assert!(!frozen.contains('\n') && !frozen.contains('\r'));
        assert_eq!(unfreeze(&frozen), text);
    }

    #[test]
    fn test_freeze_keeps_literal_tokens() {
        let text = "a&newl;b\n&retn;&ampf;&&amp; end&";
        let frozen = freeze(text);
        assert_eq!(frozen, "a&ampf;newl;b&newl;&ampf;retn;&ampf;ampf;&&amp; end&");
        assert_eq!(unfreeze(&frozen), text);
    }

    fn file(path: &str, ext: &str, primary: bool) -> TemplateFile {
        TemplateFile {
            path: PathBuf::from(path),
            output: PathBuf::from(path),
            action: TemplateAction::Transform,
            ext: ext.to_string(),
            primary,
            data: None,
        }
    }

    #[test]
    fn test_css_is_ordered_first_and_stable() {
        let files = vec![
            file("a.html", "html", true),
            file("one.css", "css", false),
            file("b.js", "js", false),
            file("two.css", "css", false),
        ];
        let names: Vec<_> = TemplateEngine::ordered(&files)
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["one.css", "two.css", "a.html", "b.js"]);
    }

    #[test]
    fn test_transform_captures_css_and_notifies() {
        let dir = TempDir::new().unwrap();
        let root = crate::theme::tests::write_theme(
            dir.path(),
            "t",
            crate::theme::tests::MANIFEST,
        );
        let theme = Theme::open(&root).unwrap();
        let format = theme.get_format("html").unwrap().clone();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = BuildOptions::new().with_observer(move |e: &BuildEvent| {
            if let BuildEvent::AfterTransform { template, .. } = e {
                sink.lock().unwrap().push(template.clone());
            }
        });
        let engine = TemplateEngine::new(
            Arc::new(HandlebarsBackend),
            &theme,
            &options,
            &options.notifier,
        );

        let resume = Resume::from_json(
            json!({ "basics": { "name": "Jane *Doe*" } }),
            &ParseOptions::default(),
        );
        let out = dir.path().join("out/resume.html");
        let rendered = engine.transform(&resume, &format, &out).unwrap();

        assert_eq!(rendered.len(), 3);
        assert_eq!(rendered[0].dest, dir.path().join("out/style.css"));
        let page = rendered[1].content.as_deref().unwrap();
        assert_eq!(rendered[1].dest, out);
        assert!(page.contains("<style>h1 { color: #333; }"));
        assert!(page.contains("<h1>Jane <em>Doe</em></h1>"));
        assert_eq!(rendered[2].dest, dir.path().join("out/assets/logo.svg"));
        assert!(rendered[2].content.is_none());
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_prepare_resume_escapes_per_format() {
        let resume = Resume::from_json(
            json!({ "basics": { "name": "R&D **lead**" } }),
            &ParseOptions::default(),
        );
        let html = TemplateEngine::prepare_resume(&resume, "html");
        assert_eq!(html["basics"]["name"], "R&amp;D <strong>lead</strong>");
        let doc = TemplateEngine::prepare_resume(&resume, "doc");
        assert_eq!(doc["basics"]["name"], "R&amp;D **lead**");
        let txt = TemplateEngine::prepare_resume(&resume, "txt");
        assert_eq!(txt["basics"]["name"], "R&D **lead**");
    }
}
