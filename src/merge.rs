// src/merge.rs
use serde_json::Value;
use tracing::debug;

/// Recursively layer `source` over `target`. Objects merge key by key; arrays
/// and scalars from `source` replace whatever `target` held.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                let nested = value.is_object() && dst.get(key).is_some_and(Value::is_object);
                match dst.get_mut(key) {
                    Some(existing) if nested => deep_merge(existing, value),
                    _ => {
                        dst.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (dst, src) => *dst = src.clone(),
    }
}

/// Combines several raw resume documents into one.
pub struct ResumeMerger;

impl ResumeMerger {
    /// Merge right-to-left: later documents supply defaults, earlier documents win.
    /// Returns `None` for an empty list; a single document passes through as is.
    pub fn merge(sheets: Vec<Value>) -> Option<Value> {
        let count = sheets.len();
        let merged = sheets.into_iter().rev().reduce(|mut defaults, sheet| {
            deep_merge(&mut defaults, &sheet);
            defaults
        });
        if count > 1 {
            debug!("Merged {} resume documents", count);
        }
        merged
    }
}
