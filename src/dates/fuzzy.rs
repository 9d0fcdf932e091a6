use chrono::{Datelike, Local, NaiveDate};

/// Extract a date from free text containing extraneous non-date words.
///
/// Missing components default to today's date, so a title carrying only a
/// bare day number still yields a date. Callers that need a clean failure
/// for such titles must not rely on this layer.
pub fn parse(text: &str) -> Option<NaiveDate> {
    parse_with_default(text, Local::now().date_naive())
}

/// Fuzzy parse with an explicit default for missing components.
///
/// Tokens are scanned left to right: month names fill the month slot,
/// 4-digit numerals the year slot, numerals 1-31 (with or without an
/// ordinal suffix) the day slot. Unknown words are skipped. A numeral that
/// fits no open slot, or a second month name, invalidates the whole parse.
pub fn parse_with_default(text: &str, default: NaiveDate) -> Option<NaiveDate> {
    let mut day: Option<u32> = None;
    let mut month: Option<u32> = None;
    let mut year: Option<i32> = None;

    for token in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
            let suffix = token[digits.len()..].to_ascii_lowercase();
            if !matches!(suffix.as_str(), "" | "st" | "nd" | "rd" | "th") {
                // "3rdParty" style token: digits fused into a word, not a numeral
                continue;
            }
            let Ok(value) = digits.parse::<u64>() else {
                return None;
            };
            if digits.len() == 4 && (1000..=9999).contains(&value) {
                if year.is_some() {
                    return None;
                }
                year = Some(value as i32);
            } else if (1..=31).contains(&value) && day.is_none() {
                day = Some(value as u32);
            } else {
                return None;
            }
            continue;
        }

        if let Some(m) = month_token(&token.to_ascii_lowercase()) {
            if month.is_some() {
                return None;
            }
            month = Some(m);
        }
        // Weekday names and any other words are tolerated noise.
    }

    if day.is_none() && month.is_none() && year.is_none() {
        return None;
    }

    NaiveDate::from_ymd_opt(
        year.unwrap_or_else(|| default.year()),
        month.unwrap_or_else(|| default.month()),
        day.unwrap_or_else(|| default.day()),
    )
}

fn month_token(token: &str) -> Option<u32> {
    match token {
        "jan" | "january" => Some(1),
        "feb" | "february" => Some(2),
        "mar" | "march" => Some(3),
        "apr" | "april" => Some(4),
        "may" => Some(5),
        "jun" | "june" => Some(6),
        "jul" | "july" => Some(7),
        "aug" | "august" => Some(8),
        "sep" | "sept" | "september" => Some(9),
        "oct" | "october" => Some(10),
        "nov" | "november" => Some(11),
        "dec" | "december" => Some(12),
        _ => None,
    }
}
