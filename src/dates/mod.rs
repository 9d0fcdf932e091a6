pub mod fuzzy;

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)(?:st|nd|rd|th)\b").unwrap());

// "Saturday 30th December, 2023" / "wednesday 1 january 2023"
static TITLE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\w+day)\s+(\d+)(?:st|nd|rd|th)?\s+(\w+),?\s+(\d{4})").unwrap()
});

/// Infers calendar dates from post titles, tracking every title that
/// defeats all strategies.
///
/// Three strategies run in order, first success wins: fuzzy parse of the
/// ordinal-stripped title, strict weekday/day/month/year pattern on the
/// original, fuzzy parse of the original. No strategy error ever escapes
/// `infer`; the caller always gets an outcome.
pub struct DateInference {
    failed: Vec<String>,
}

impl DateInference {
    pub fn new() -> Self {
        Self { failed: Vec::new() }
    }

    pub fn infer(&mut self, title: &str) -> Option<NaiveDate> {
        if title.is_empty() {
            return None;
        }

        let cleaned = strip_ordinal_suffixes(title);
        if let Some(date) = fuzzy::parse(&cleaned) {
            return Some(date);
        }
        if let Some(date) = strict_title_date(title) {
            return Some(date);
        }
        if let Some(date) = fuzzy::parse(title) {
            return Some(date);
        }

        warn!("Failed to parse date from title: {}", title);
        self.failed.push(title.to_string());
        None
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// Titles that failed every strategy, in call order.
    pub fn failed_titles(&self) -> &[String] {
        &self.failed
    }

    /// Percentage of attempts that yielded a date, 0.0 for an empty batch.
    pub fn success_rate(&self, total_attempts: usize) -> f64 {
        if total_attempts == 0 {
            return 0.0;
        }
        let successes = total_attempts - self.failed.len();
        successes as f64 * 100.0 / total_attempts as f64
    }
}

impl Default for DateInference {
    fn default() -> Self {
        Self::new()
    }
}

/// "30th" -> "30". Ordinal suffixes are only stripped at a word boundary,
/// so "3rdParty" stays intact.
fn strip_ordinal_suffixes(text: &str) -> String {
    ORDINAL_RE.replace_all(text, "$1").into_owned()
}

/// Strict pattern: weekday token, day with optional ordinal, month name,
/// optional comma, 4-digit year. The reconstructed compact date is parsed
/// against the full month-name format, then the abbreviated one; chrono's
/// calendar validation rejects impossible dates either way.
fn strict_title_date(title: &str) -> Option<NaiveDate> {
    let caps = TITLE_DATE_RE.captures(title)?;
    let compact = format!("{} {} {}", &caps[2], &caps[3], &caps[4]);
    NaiveDate::parse_from_str(&compact, "%d %B %Y")
        .or_else(|_| NaiveDate::parse_from_str(&compact, "%d %b %Y"))
        .ok()
}
