// src/dates.rs
//! Date normalization for resume fields.
//!
//! Resume dates arrive as loosely formatted text ("2015", "2015-03", "Mar 2015",
//! "present", ...). Everything is reduced to a [`CanonicalDate`] so that entries
//! can be compared, sorted and subtracted.

use crate::error::{BuildError, BuildResult};
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

/// Environment variable that pins "now" for reproducible builds.
pub const NOW_ENV: &str = "HMR_NOW";

/// A normalized calendar date. Equal instants compare equal regardless of the
/// text they were parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalDate(NaiveDate);

impl CanonicalDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    pub fn to_iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Whole units elapsed from `self` to `later`, truncated toward zero.
    pub fn diff(&self, later: &CanonicalDate, unit: DurationUnit) -> i64 {
        match unit {
            DurationUnit::Days => (later.0 - self.0).num_days(),
            DurationUnit::Months => month_diff(&self.0, &later.0),
            DurationUnit::Years => month_diff(&self.0, &later.0) / 12,
        }
    }
}

impl fmt::Display for CanonicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iso())
    }
}

impl From<NaiveDate> for CanonicalDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[default]
    Years,
    Months,
    Days,
}

fn month_diff(from: &NaiveDate, to: &NaiveDate) -> i64 {
    let mut months = (to.year() as i64 - from.year() as i64) * 12
        + (to.month() as i64 - from.month() as i64);
    if months > 0 && to.day() < from.day() {
        months -= 1;
    } else if months < 0 && to.day() > from.day() {
        months += 1;
    }
    months
}

struct Patterns {
    present: Regex,
    month_year: Regex,
    year_month: Regex,
    year_only: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        present: Regex::new(r"^(present|now|current)$").expect("valid regex"),
        month_year: Regex::new(r"^\D+\s+\d{4}$").expect("valid regex"),
        year_month: Regex::new(r"^(\d{4})-(\d{1,2})$").expect("valid regex"),
        year_only: Regex::new(r"^\d{4}$").expect("valid regex"),
    })
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Resolve a month name or abbreviation ("Mar", "march", "Sept") to 1..=12.
pub fn month_index(name: &str) -> Option<u32> {
    let name = name.trim().trim_end_matches('.').to_lowercase();
    if name == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|m| *m == name || (name.len() == 3 && m.starts_with(name.as_str())))
        .map(|idx| idx as u32 + 1)
}

/// True for absent, blank or "present"/"now"/"current" values.
pub fn is_current(text: Option<&str>) -> bool {
    match text {
        None => true,
        Some(t) => {
            let t = t.trim().to_lowercase();
            t.is_empty() || patterns().present.is_match(&t)
        }
    }
}

/// Parses date text into [`CanonicalDate`] values.
///
/// "Now" is either pinned at construction or read from [`NOW_ENV`] on every call,
/// so a test can change the variable between two normalizations.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateNormalizer {
    fixed_now: Option<CanonicalDate>,
}

impl DateNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_now(now: CanonicalDate) -> Self {
        Self {
            fixed_now: Some(now),
        }
    }

    pub fn from_option(now: Option<CanonicalDate>) -> Self {
        Self { fixed_now: now }
    }

    pub fn now(&self) -> CanonicalDate {
        self.now_with(|key| std::env::var(key).ok())
    }

    fn now_with(&self, var: impl Fn(&str) -> Option<String>) -> CanonicalDate {
        if let Some(now) = self.fixed_now {
            return now;
        }
        if let Some(value) = var(NOW_ENV) {
            match parse_concrete(value.trim()) {
                Some(date) => return date,
                None => warn!("Ignoring unparseable {}: {}", NOW_ENV, value),
            }
        }
        CanonicalDate(Local::now().date_naive())
    }

    /// Normalize a date value, failing with [`BuildError::InvalidDate`] when no rule
    /// applies.
    pub fn normalize(&self, text: Option<&str>) -> BuildResult<CanonicalDate> {
        self.probe(text)
            .ok_or_else(|| BuildError::InvalidDate(text.unwrap_or_default().to_string()))
    }

    /// Non-throwing variant of [`normalize`](Self::normalize).
    pub fn probe(&self, text: Option<&str>) -> Option<CanonicalDate> {
        if is_current(text) {
            return Some(self.now());
        }
        parse_concrete(text?.trim())
    }
}

fn parse_concrete(trimmed: &str) -> Option<CanonicalDate> {
    let p = patterns();
    let lower = trimmed.to_lowercase();

    if p.month_year.is_match(&lower) {
        let parts: Vec<&str> = lower.split_whitespace().collect();
        if let [month, year] = parts.as_slice() {
            if let (Some(month), Ok(year)) = (month_index(month), year.parse::<i32>()) {
                return CanonicalDate::from_ymd(year, month, 1);
            }
        }
    }

    if let Some(caps) = p.year_month.captures(&lower) {
        let year = caps[1].parse::<i32>().ok()?;
        let month = caps[2].parse::<u32>().ok()?;
        return CanonicalDate::from_ymd(year, month, 1);
    }

    if p.year_only.is_match(&lower) {
        let year = lower.parse::<i32>().ok()?;
        return CanonicalDate::from_ymd(year, 1, 1);
    }

    parse_generic(trimmed)
}

fn parse_generic(text: &str) -> Option<CanonicalDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(CanonicalDate(dt.date_naive()));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(CanonicalDate(dt.date()));
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(CanonicalDate(date));
        }
    }
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|dt| CanonicalDate(dt.date_naive()))
}
