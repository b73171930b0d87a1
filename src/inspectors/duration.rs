// src/inspectors/duration.rs
use crate::dates::{CanonicalDate, DateNormalizer, DurationUnit};
use serde_json::Value;
use tracing::warn;

/// Computes elapsed time across a dated collection such as `work`.
///
/// The span runs from the earliest date to the latest date found in the
/// collection. Gaps and overlaps between entries are not accounted for.
pub struct DurationInspector<'a> {
    normalizer: &'a DateNormalizer,
}

impl<'a> DurationInspector<'a> {
    pub fn new(normalizer: &'a DateNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn run(
        &self,
        rez: &Value,
        coll_key: &str,
        start_key: &str,
        end_key: &str,
        unit: DurationUnit,
    ) -> i64 {
        let Some(history) = lookup(rez, coll_key).and_then(Value::as_array) else {
            return 0;
        };

        let mut dates: Vec<CanonicalDate> = Vec::new();
        for entry in history {
            let start = date_text(entry, start_key);
            let end = date_text(entry, end_key);
            if start.is_none() && end.is_none() {
                continue;
            }

            // An entry without an end is ongoing.
            let end = end.unwrap_or_else(|| "current".to_string());
            for text in start.iter().chain(std::iter::once(&end)) {
                match self.normalizer.probe(Some(text)) {
                    Some(date) => dates.push(date),
                    None => warn!("Skipping unparseable date '{}' in {}", text, coll_key),
                }
            }
        }

        match (dates.iter().min(), dates.iter().max()) {
            (Some(first), Some(last)) => first.diff(last, unit),
            _ => 0,
        }
    }
}

/// Dotted-path lookup ("basics.location") into a JSON document.
fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(value, |current, key| current.get(key))
}

/// The non-blank text of a date field, if any.
fn date_text(entry: &Value, key: &str) -> Option<String> {
    let text = match entry.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
