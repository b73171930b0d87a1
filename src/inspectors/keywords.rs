// src/inspectors/keywords.rs
use regex::RegexBuilder;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Keys whose values are internal and never searched for keywords.
const SEARCH_FILTERS: &[&str] = &[
    "imp",
    "computed",
    "safeStartDate",
    "safeEndDate",
    "safeDate",
    "safeReleaseDate",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordCount {
    pub name: String,
    pub count: usize,
}

pub struct KeywordInspector;

impl KeywordInspector {
    /// Unique skill keywords in first-seen order.
    pub fn keywords(rez: &Value) -> Vec<String> {
        let mut seen = HashSet::new();
        rez.get("skills")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|skill| skill.get("keywords").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_str)
            .filter(|kw| seen.insert(kw.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Count how often each skill keyword appears in the resume text.
    ///
    /// A keyword is only counted when delimited by whitespace, commas, periods or
    /// the text boundaries, and longer keywords containing it are masked first so
    /// "C" does not match inside "C++".
    pub fn run(rez: &Value) -> Vec<KeywordCount> {
        let all = Self::keywords(rez);
        let mut searchable = String::new();
        collect_text(rez, &mut searchable);

        let mut by_length = all.clone();
        by_length.sort_by(|a, b| b.len().cmp(&a.len()));

        all.iter()
            .map(|kw| {
                let mut masked = searchable.clone();
                for longer in &by_length {
                    if longer != kw && longer.to_lowercase().contains(&kw.to_lowercase()) {
                        if let Ok(re) = RegexBuilder::new(&regex::escape(longer))
                            .case_insensitive(true)
                            .build()
                        {
                            masked = re
                                .replace_all(&masked, "\u{0}".repeat(longer.len()).as_str())
                                .into_owned();
                        }
                    }
                }

                let pattern = format!(r"(?:^|\s+|[.,]+){}(?:$|\s+|[.,]+)", regex::escape(kw));
                let count = RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| re.find_iter(&masked).count())
                    .unwrap_or(0);

                KeywordCount {
                    name: kw.clone(),
                    count,
                }
            })
            .collect()
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push(' ');
            out.push_str(s);
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| !SEARCH_FILTERS.contains(&key.as_str()))
            .for_each(|(_, v)| collect_text(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keywords_are_unique() {
        let rez = json!({
            "skills": [
                { "name": "Web", "keywords": ["JavaScript", "HTML", "CSS"] },
                { "name": "Backend", "keywords": ["Node.js", "JavaScript", "Python"] }
            ]
        });
        assert_eq!(
            KeywordInspector::keywords(&rez),
            vec!["JavaScript", "HTML", "CSS", "Node.js", "Python"]
        );
        assert!(KeywordInspector::keywords(&json!({ "skills": [] })).is_empty());
    }

    #[test]
    fn test_counts_do_not_match_inside_longer_keywords() {
        let rez = json!({
            "basics": { "summary": "Wrote C and C++ daily. More C++, some Rust." },
            "skills": [{ "keywords": ["C", "C++", "Rust"] }]
        });
        let counts = KeywordInspector::run(&rez);
        let count = |name: &str| counts.iter().find(|c| c.name == name).map(|c| c.count);
        // The skill list itself is part of the searched text.
        assert_eq!(count("C"), Some(2));
        assert_eq!(count("C++"), Some(3));
        assert_eq!(count("Rust"), Some(2));
    }
}
