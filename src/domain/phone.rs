use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;

// Egyptian mobile (01[0125]xxxxxxxx) and Cairo landline (02xxxxxxxx), with or without +20.
static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\+20|0)(?:1[0125]|2)\d{8}").unwrap());

// A match glued to other digits is a slice of some longer id, not a phone number.
fn is_digit_bounded(page: &str, start: usize, end: usize) -> bool {
    let before = page[..start].chars().next_back();
    let after = page[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

pub fn extract_phone_numbers(page: &str) -> Vec<String> {
    PHONE_REGEX
        .find_iter(page)
        .filter(|m| is_digit_bounded(page, m.start(), m.end()))
        .map(|m| normalize_phone(m.as_str()))
        .unique()
        .sorted_by_key(|number| !is_mobile(number))
        .collect()
}

pub fn normalize_phone(raw: &str) -> String {
    match raw.strip_prefix("+20") {
        Some(rest) => format!("0{}", rest),
        None => raw.to_string(),
    }
}

pub fn is_mobile(number: &str) -> bool {
    normalize_phone(number).starts_with("01")
}

pub fn is_valid_phone(number: &str) -> bool {
    PHONE_REGEX
        .find(number)
        .is_some_and(|m| m.start() == 0 && m.end() == number.len())
}
