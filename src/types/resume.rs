// src/types/resume.rs
//! The canonical (JSON Resume) document plus the internal metadata the build
//! attaches to it.

use crate::dates::{CanonicalDate, DateNormalizer, DurationUnit};
use crate::inspectors::{DurationInspector, KeywordInspector};
use crate::merge::deep_merge;
use chrono::NaiveDate;
use pulldown_cmark::{html, Parser};
use serde_json::{json, Map, Value};
use std::cmp::Reverse;
use std::path::PathBuf;

/// Keys stripped from serialized output. They only exist on a normalized resume.
const STRINGIFY_EXCLUDE_KEYS: &[&str] = &[
    "imp",
    "warnings",
    "computed",
    "filt",
    "ctrl",
    "index",
    "safeStartDate",
    "safeEndDate",
    "safeDate",
    "safeReleaseDate",
    "result",
    "isModified",
    "htmlPreview",
    "display_progress_bar",
];

/// Fields that are never run through Markdown: links, contact details and dates.
const MARKDOWN_SKIP_KEYS: &[&str] = &[
    "url",
    "website",
    "email",
    "phone",
    "image",
    "picture",
    "network",
    "username",
    "countryCode",
    "postalCode",
    "startDate",
    "endDate",
    "date",
    "releaseDate",
    "safeStartDate",
    "safeEndDate",
    "safeDate",
    "safeReleaseDate",
    "format",
];

/// Collections normalized with a start/end date pair.
const RANGED_COLLECTIONS: &[&str] = &["work", "education", "volunteer"];

/// The empty canonical document every resume is layered over.
pub fn starter() -> Value {
    json!({
        "basics": {
            "name": "",
            "label": "",
            "email": "",
            "phone": "",
            "website": "",
            "summary": "",
            "location": {
                "address": "",
                "postalCode": "",
                "city": "",
                "countryCode": "",
                "region": ""
            },
            "profiles": []
        },
        "work": [],
        "volunteer": [],
        "education": [],
        "awards": [],
        "publications": [],
        "skills": [],
        "languages": [],
        "interests": [],
        "references": [],
        "meta": { "format": "JRS@1.0" }
    })
}

/// Internal-only metadata. Never serialized with the resume.
#[derive(Debug, Clone, Default)]
pub struct ResumeMeta {
    pub file: Option<PathBuf>,
    pub raw: Option<String>,
    pub title: Option<String>,
    pub processed: bool,
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub privatize: bool,
    pub dates: bool,
    pub sort: bool,
    pub compute: bool,
    pub title: Option<String>,
    pub now: Option<CanonicalDate>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            privatize: false,
            dates: true,
            sort: true,
            compute: true,
            title: None,
            now: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resume {
    json: Value,
    imp: ResumeMeta,
    now: Option<CanonicalDate>,
}

impl Default for Resume {
    fn default() -> Self {
        Self::new()
    }
}

impl Resume {
    pub fn new() -> Self {
        Self {
            json: Value::Object(Map::new()),
            imp: ResumeMeta::default(),
            now: None,
        }
    }

    /// Build a normalized resume from raw JSON.
    pub fn from_json(rep: Value, opts: &ParseOptions) -> Self {
        let mut rez = Self::new();
        rez.parse_json(rep, opts);
        rez
    }

    /// Parse resume text, keeping it as the raw source.
    pub fn parse_str(text: &str, opts: &ParseOptions) -> Result<Self, serde_json::Error> {
        let rep: Value = serde_json::from_str(text)?;
        let mut rez = Self::new();
        rez.imp.raw = Some(text.to_string());
        rez.parse_json(rep, opts);
        Ok(rez)
    }

    /// Layer `rep` over the starter defaults and this resume, then normalize.
    ///
    /// Metadata (raw text, title) is only captured the first time; calling this
    /// again on a processed resume recomputes derived fields in place.
    pub fn parse_json(&mut self, rep: Value, opts: &ParseOptions) -> &mut Self {
        let rep = if opts.privatize { scrub(rep) } else { rep };

        let mut merged = starter();
        deep_merge(&mut merged, &strip_internal(&self.json));
        deep_merge(&mut merged, &rep);
        self.json = merged;
        self.now = opts.now.or(self.now);

        if !self.imp.processed {
            self.imp.title = opts
                .title
                .clone()
                .or_else(|| self.imp.title.clone())
                .or_else(|| self.name().map(str::to_string));
            if self.imp.raw.is_none() {
                self.imp.raw = Some(rep.to_string());
            }
            self.imp.processed = true;
        }

        if opts.dates {
            self.parse_dates();
        }
        if opts.sort {
            self.sort();
        }
        if opts.compute {
            let computed = json!({
                "numYears": self.duration(DurationUnit::Years),
                "keywords": self.keywords(),
            });
            if let Some(basics) = self.json.get_mut("basics").and_then(Value::as_object_mut) {
                basics.insert("computed".to_string(), computed);
            }
        }
        self
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    pub fn meta(&self) -> &ResumeMeta {
        &self.imp
    }

    pub fn meta_mut(&mut self) -> &mut ResumeMeta {
        &mut self.imp
    }

    pub fn name(&self) -> Option<&str> {
        self.json
            .pointer("/basics/name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
    }

    pub fn normalizer(&self) -> DateNormalizer {
        DateNormalizer::from_option(self.now)
    }

    /// Pretty JSON without any internal keys.
    pub fn stringify(&self) -> String {
        serde_json::to_string_pretty(&strip_internal(&self.json)).unwrap_or_default()
    }

    /// The serializable document, internal keys removed.
    pub fn to_value(&self) -> Value {
        strip_internal(&self.json)
    }

    /// Deep copy, normalized independently of the original.
    pub fn dupe(&self) -> Resume {
        let opts = ParseOptions {
            now: self.now,
            ..ParseOptions::default()
        };
        let mut copy = Resume::new();
        copy.imp.raw = Some(self.stringify());
        copy.imp.file = self.imp.file.clone();
        copy.parse_json(self.to_value(), &opts);
        copy
    }

    pub fn keywords(&self) -> Vec<String> {
        KeywordInspector::keywords(&self.json)
    }

    pub fn duration(&self, unit: DurationUnit) -> i64 {
        let normalizer = self.normalizer();
        DurationInspector::new(&normalizer).run(&self.json, "work", "startDate", "endDate", unit)
    }

    pub fn has_profile(&self, network: &str) -> bool {
        let network = network.trim().to_lowercase();
        self.json
            .pointer("/basics/profiles")
            .and_then(Value::as_array)
            .is_some_and(|profiles| {
                profiles.iter().any(|p| {
                    p.get("network")
                        .and_then(Value::as_str)
                        .is_some_and(|n| n.trim().to_lowercase() == network)
                })
            })
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        let skill = skill.trim().to_lowercase();
        self.keywords()
            .iter()
            .any(|kw| kw.trim().to_lowercase() == skill)
    }

    /// The document with prose fields expanded from Markdown to inline HTML.
    pub fn markdownify(&self) -> Value {
        transform_strings(&self.json, None, &|text| markdown_inline(text))
    }

    /// The document with every string XML-escaped.
    pub fn xmlify(&self) -> Value {
        transform_strings(&self.json, None, &|text| xml_escape(text))
    }

    fn parse_dates(&mut self) {
        let normalizer = self.normalizer();
        let probe = |value: &Value| -> Value {
            let text = value.as_str().map(str::to_string).or_else(|| match value {
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            normalizer
                .probe(text.as_deref())
                .map(|d| Value::String(d.to_iso()))
                .unwrap_or(Value::Null)
        };

        let mut stamp = |coll: &str, pairs: &[(&str, &str)]| {
            if let Some(items) = self.json.get_mut(coll).and_then(Value::as_array_mut) {
                for item in items.iter_mut().filter_map(Value::as_object_mut) {
                    for (field, safe) in pairs {
                        if let Some(value) = item.get(*field).map(&probe) {
                            item.insert(safe.to_string(), value);
                        }
                    }
                }
            }
        };

        for coll in RANGED_COLLECTIONS {
            stamp(coll, &[("startDate", "safeStartDate"), ("endDate", "safeEndDate")]);
        }
        stamp("awards", &[("date", "safeDate")]);
        stamp("publications", &[("releaseDate", "safeReleaseDate")]);
    }

    /// Sort dated collections newest first. Undated entries keep their relative
    /// order after the dated ones.
    fn sort(&mut self) {
        let mut sort_by = |coll: &str, safe_key: &str| {
            if let Some(items) = self.json.get_mut(coll).and_then(Value::as_array_mut) {
                items.sort_by_key(|item| Reverse(safe_date(item, safe_key)));
            }
        };
        for coll in RANGED_COLLECTIONS {
            sort_by(coll, "safeStartDate");
        }
        sort_by("awards", "safeDate");
        sort_by("publications", "safeReleaseDate");
    }
}

fn safe_date(item: &Value, key: &str) -> Option<CanonicalDate> {
    item.get(key)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .map(CanonicalDate::from)
}

fn strip_internal(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !STRINGIFY_EXCLUDE_KEYS.contains(&key.trim()))
                .map(|(key, v)| (key.clone(), strip_internal(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_internal).collect()),
        other => other.clone(),
    }
}

/// Remove entries and fields flagged `"private": true`.
fn scrub(value: Value) -> Value {
    let is_private = |v: &Value| v.get("private").and_then(Value::as_bool) == Some(true);
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, v)| key != "private" && !is_private(v))
                .map(|(key, v)| (key, scrub(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !is_private(v))
                .map(scrub)
                .collect(),
        ),
        other => other,
    }
}

fn transform_strings(value: &Value, key: Option<&str>, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => match key {
            Some(k) if MARKDOWN_SKIP_KEYS.contains(&k) => value.clone(),
            _ => Value::String(f(s)),
        },
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| transform_strings(v, key, f)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), transform_strings(v, Some(k), f)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Markdown to HTML with the wrapping paragraph removed, for inline use.
pub fn markdown_inline(text: &str) -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new(text));
    let trimmed = out.trim();
    let inner = trimmed
        .strip_prefix("<p>")
        .and_then(|s| s.strip_suffix("</p>"))
        .filter(|s| !s.contains("<p>"))
        .unwrap_or(trimmed);
    inner.to_string()
}

pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
