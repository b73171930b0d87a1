// src/loader.rs
//! Reading resume documents from disk and bringing them to the canonical dialect.

use crate::error::{BuildError, BuildResult};
use crate::events::{BuildEvent, Notifier};
use crate::types::resume::starter;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    Jrs,
    Fresh,
    Unknown,
}

/// Identify the schema dialect of a parsed document.
pub fn detect_dialect(rez: &Value) -> Dialect {
    let Some(obj) = rez.as_object() else {
        return Dialect::Unknown;
    };

    if let Some(tag) = obj.get("meta").and_then(|m| m.get("format")).and_then(Value::as_str) {
        let tag = tag.trim().to_lowercase();
        if tag.starts_with("fresh") {
            return Dialect::Fresh;
        }
        if matches!(tag.as_str(), "jrs" | "jsonresume" | "json-resume") || tag.starts_with("jrs@") {
            return Dialect::Jrs;
        }
        debug!("Unrecognized format tag '{}', falling back to structure", tag);
    }

    if obj.contains_key("basics") {
        Dialect::Jrs
    } else if ["info", "employment", "service", "projects"]
        .iter()
        .any(|k| obj.contains_key(*k))
    {
        Dialect::Fresh
    } else {
        Dialect::Unknown
    }
}

/// One successfully loaded source document, already in the canonical dialect.
#[derive(Debug, Clone)]
pub struct LoadedSheet {
    pub file: PathBuf,
    pub json: Value,
    pub dialect: Dialect,
    pub was_converted: bool,
}

pub struct ResumeLoader<'a> {
    notifier: &'a Notifier,
}

impl<'a> ResumeLoader<'a> {
    pub fn new(notifier: &'a Notifier) -> Self {
        Self { notifier }
    }

    /// Load every path, one result per path. Failures do not stop later loads.
    pub fn load<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<BuildResult<LoadedSheet>> {
        paths.iter().map(|p| self.load_one(p.as_ref())).collect()
    }

    pub fn load_one(&self, path: &Path) -> BuildResult<LoadedSheet> {
        self.notifier.stat(BuildEvent::BeforeRead {
            file: path.to_path_buf(),
        });

        let bytes = std::fs::read(path).map_err(|source| BuildError::ReadError {
            file: path.to_path_buf(),
            source,
        })?;
        let raw = String::from_utf8_lossy(&bytes).into_owned();

        self.notifier.stat(BuildEvent::AfterRead {
            file: path.to_path_buf(),
            bytes: bytes.len(),
        });

        let parsed: Value = serde_json::from_str(&raw).map_err(|source| BuildError::ParseError {
            file: path.to_path_buf(),
            raw: raw.clone(),
            source,
        })?;

        let sheet = ensure_jrs(parsed, path)?;
        info!(
            "Loaded resume {} ({:?}{})",
            path.display(),
            sheet.dialect,
            if sheet.was_converted { ", converted" } else { "" }
        );
        Ok(sheet)
    }
}

/// Bring a parsed document to the canonical dialect.
fn ensure_jrs(json: Value, file: &Path) -> BuildResult<LoadedSheet> {
    let unknown = || BuildError::UnknownSchema {
        file: file.to_path_buf(),
    };

    let dialect = detect_dialect(&json);
    match dialect {
        Dialect::Jrs => Ok(LoadedSheet {
            file: file.to_path_buf(),
            json: ensure_meta(json),
            dialect,
            was_converted: false,
        }),
        Dialect::Fresh => Ok(LoadedSheet {
            file: file.to_path_buf(),
            json: fresh_to_jrs(&json),
            dialect,
            was_converted: true,
        }),
        // An empty object is a valid, minimal document.
        Dialect::Unknown if json.as_object().is_some_and(Map::is_empty) => Ok(LoadedSheet {
            file: file.to_path_buf(),
            json: starter(),
            dialect: Dialect::Jrs,
            was_converted: false,
        }),
        Dialect::Unknown => Err(unknown()),
    }
}

/// Fill in a blank `meta.format` on documents that carry a meta block.
fn ensure_meta(mut json: Value) -> Value {
    if let Some(meta) = json.get_mut("meta").and_then(Value::as_object_mut) {
        let blank = meta
            .get("format")
            .and_then(Value::as_str)
            .map_or(true, |f| f.trim().is_empty());
        if blank {
            meta.insert("format".to_string(), json!("JRS@1.0"));
        }
    }
    json
}

/// Copy `src[from]` into `dst[to]` for each pair present in `src`.
fn pick(src: &Value, dst: &mut Map<String, Value>, pairs: &[(&str, &str)]) {
    for (from, to) in pairs {
        if let Some(value) = src.get(*from).filter(|v| !v.is_null()) {
            dst.insert(to.to_string(), value.clone());
        }
    }
}

fn map_history(
    src: &Value,
    path: &str,
    pairs: &[(&str, &str)],
    extra: impl Fn(&Value, &mut Map<String, Value>),
) -> Value {
    let items = src.pointer(path).and_then(Value::as_array);
    Value::Array(
        items
            .into_iter()
            .flatten()
            .map(|item| {
                let mut out = Map::new();
                pick(item, &mut out, pairs);
                extra(item, &mut out);
                Value::Object(out)
            })
            .collect(),
    )
}

const START_END: &[(&str, &str)] = &[("start", "startDate"), ("end", "endDate")];

fn with(base: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
    base.iter().chain(START_END).copied().collect()
}

/// Convert a FRESH document into the JSON Resume dialect.
fn fresh_to_jrs(fresh: &Value) -> Value {
    let mut basics = Map::new();
    pick(fresh, &mut basics, &[("name", "name")]);
    if let Some(info) = fresh.get("info") {
        pick(
            info,
            &mut basics,
            &[("label", "label"), ("brief", "summary"), ("image", "image")],
        );
    }
    if let Some(contact) = fresh.get("contact") {
        pick(
            contact,
            &mut basics,
            &[("email", "email"), ("phone", "phone"), ("website", "website")],
        );
    }
    if let Some(location) = fresh.get("location") {
        let mut loc = Map::new();
        pick(
            location,
            &mut loc,
            &[
                ("address", "address"),
                ("city", "city"),
                ("region", "region"),
                ("code", "postalCode"),
                ("country", "countryCode"),
            ],
        );
        basics.insert("location".to_string(), Value::Object(loc));
    }
    basics.insert(
        "profiles".to_string(),
        map_history(
            fresh,
            "/social",
            &[("network", "network"), ("user", "username"), ("url", "url")],
            |_, _| {},
        ),
    );

    let work = map_history(
        fresh,
        "/employment/history",
        &with(&[
            ("employer", "company"),
            ("position", "position"),
            ("url", "website"),
            ("summary", "summary"),
            ("highlights", "highlights"),
        ]),
        |_, _| {},
    );
    let education = map_history(
        fresh,
        "/education/history",
        &with(&[
            ("institution", "institution"),
            ("area", "area"),
            ("studyType", "studyType"),
            ("grade", "gpa"),
            ("curriculum", "courses"),
        ]),
        |_, _| {},
    );
    let volunteer = map_history(
        fresh,
        "/service/history",
        &with(&[
            ("organization", "organization"),
            ("position", "position"),
            ("url", "website"),
            ("summary", "summary"),
            ("highlights", "highlights"),
        ]),
        |_, _| {},
    );
    let projects = map_history(
        fresh,
        "/projects",
        &with(&[
            ("title", "name"),
            ("description", "description"),
            ("summary", "description"),
            ("url", "url"),
            ("highlights", "highlights"),
        ]),
        |_, _| {},
    );
    let awards = map_history(
        fresh,
        "/recognition",
        &[("title", "title"), ("date", "date"), ("from", "awarder"), ("summary", "summary")],
        |_, _| {},
    );
    let publications = map_history(
        fresh,
        "/writing",
        &[("title", "name"), ("date", "releaseDate"), ("url", "website"), ("summary", "summary")],
        |item, out| {
            let publisher = item
                .get("publisher")
                .map(|p| p.get("name").cloned().unwrap_or_else(|| p.clone()));
            if let Some(publisher) = publisher {
                out.insert("publisher".to_string(), publisher);
            }
        },
    );
    let languages = map_history(
        fresh,
        "/languages",
        &[("language", "language"), ("level", "fluency")],
        |_, _| {},
    );
    let interests = map_history(
        fresh,
        "/interests",
        &[("name", "name"), ("keywords", "keywords")],
        |_, _| {},
    );
    let skills = map_history(
        fresh,
        "/skills/sets",
        &[("name", "name"), ("level", "level"), ("skills", "keywords")],
        |_, _| {},
    );

    json!({
        "basics": basics,
        "work": work,
        "education": education,
        "volunteer": volunteer,
        "projects": projects,
        "awards": awards,
        "publications": publications,
        "languages": languages,
        "interests": interests,
        "skills": skills,
        "meta": { "format": "JRS@1.0" }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_detect_dialect() {
        assert_eq!(detect_dialect(&json!({ "meta": { "format": "FRESH@0.6.0" } })), Dialect::Fresh);
        assert_eq!(detect_dialect(&json!({ "meta": { "format": "jrs@1.0" } })), Dialect::Jrs);
        assert_eq!(detect_dialect(&json!({ "basics": {} })), Dialect::Jrs);
        assert_eq!(detect_dialect(&json!({ "employment": {} })), Dialect::Fresh);
        assert_eq!(detect_dialect(&json!({ "hobbies": [] })), Dialect::Unknown);
        assert_eq!(detect_dialect(&json!([1, 2])), Dialect::Unknown);
    }

    #[test]
    fn test_load_reports_each_failure_kind() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "good.json", r#"{ "basics": { "name": "Jane" } }"#);
        let broken = write(&dir, "broken.json", "{ \"basics\": ");
        let empty = write(&dir, "empty.json", "");
        let odd = write(&dir, "odd.json", r#"{ "hobbies": ["chess"] }"#);
        let missing = dir.path().join("missing.json");

        let notifier = Notifier::default();
        let results = ResumeLoader::new(&notifier).load(&[&good, &broken, &empty, &odd, &missing]);
        assert_eq!(results.len(), 5);

        assert_eq!(results[0].as_ref().unwrap().json["basics"]["name"], "Jane");
        match &results[1] {
            Err(BuildError::ParseError { raw, .. }) => assert_eq!(raw, "{ \"basics\": "),
            other => panic!("expected parse error, got {other:?}"),
        }
        match &results[2] {
            Err(BuildError::ParseError { raw, .. }) => assert!(raw.is_empty()),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(matches!(results[3], Err(BuildError::UnknownSchema { .. })));
        assert!(matches!(results[4], Err(BuildError::ReadError { .. })));
    }

    #[test]
    fn test_empty_object_is_a_default_document() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "blank.json", "{}");
        let sheet = ResumeLoader::new(&Notifier::default()).load_one(&path).unwrap();
        assert_eq!(sheet.dialect, Dialect::Jrs);
        assert_eq!(sheet.json["meta"]["format"], "JRS@1.0");
        assert!(sheet.json["work"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_fresh_document_is_converted() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "fresh.json",
            r#"{
                "name": "Jane Fullstacker",
                "meta": { "format": "FRESH@0.6.0" },
                "contact": { "email": "jane@example.com" },
                "employment": { "history": [
                    { "employer": "Acme", "position": "Engineer", "start": "2013-10", "end": "2016" }
                ] },
                "skills": { "sets": [ { "name": "Web", "skills": ["HTML", "CSS"] } ] }
            }"#,
        );
        let sheet = ResumeLoader::new(&Notifier::default()).load_one(&path).unwrap();
        assert!(sheet.was_converted);
        assert_eq!(sheet.json["basics"]["name"], "Jane Fullstacker");
        assert_eq!(sheet.json["basics"]["email"], "jane@example.com");
        assert_eq!(sheet.json["work"][0]["company"], "Acme");
        assert_eq!(sheet.json["work"][0]["startDate"], "2013-10");
        assert_eq!(sheet.json["skills"][0]["keywords"], json!(["HTML", "CSS"]));
        assert_eq!(detect_dialect(&sheet.json), Dialect::Jrs);
    }

    #[test]
    fn test_blank_meta_format_is_filled() {
        let json = ensure_meta(json!({ "basics": {}, "meta": { "format": " " } }));
        assert_eq!(json["meta"]["format"], "JRS@1.0");
        let untouched = ensure_meta(json!({ "basics": {} }));
        assert!(untouched.get("meta").is_none());
    }
}
