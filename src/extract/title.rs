// src/extract/title.rs

//! Vehicle title parsing: `"2019 Tesla Model 3 Long Range"` → year, make, model, trim.

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::document::collapse_whitespace;
use crate::extract::normalize::normalize_year;

/// Canonical makes; multi-word names before their prefixes.
const MAKES: &[&str] = &[
    "Acura", "Alfa Romeo", "Aston Martin", "Audi", "Bentley", "BMW", "Buick", "Cadillac",
    "Chevrolet", "Chrysler", "Dodge", "Fiat", "Fisker", "Ford", "Genesis", "GMC", "Honda",
    "Hyundai", "Infiniti", "Jaguar", "Jeep", "Kia", "Land Rover", "Lexus", "Lincoln", "Lucid",
    "Maserati", "Mazda", "Mercedes-Benz", "Mini", "Mitsubishi", "Nissan", "Polestar", "Porsche",
    "Ram", "Rivian", "Subaru", "Tesla", "Toyota", "Volkswagen", "Volvo",
];

/// Spellings that map to a canonical make.
const ALIASES: &[(&str, &str)] = &[
    ("Chevy", "Chevrolet"),
    ("VW", "Volkswagen"),
    ("Mercedes Benz", "Mercedes-Benz"),
    ("Mercedes", "Mercedes-Benz"),
    ("Land-Rover", "Land Rover"),
    ("Range Rover", "Land Rover"),
    ("Alfa", "Alfa Romeo"),
];

const CONDITION_WORDS: &[&str] = &[
    "new", "used", "certified", "pre-owned", "preowned", "cpo", "demo",
];

static TITLE_CUT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s+[|–—-]\s+").ok());
static MODEL_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]{1,3}|[A-Z]|Series|Class)$").ok());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTitle {
    pub year: Option<i32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub trim: Option<String>,
}

pub fn parse_title(raw: &str) -> ParsedTitle {
    let mut title = collapse_whitespace(raw);
    if let Some(m) = TITLE_CUT.as_ref().and_then(|re| re.find(&title)) {
        title.truncate(m.start());
    }

    let mut tokens: Vec<&str> = title.split(' ').filter(|t| !t.is_empty()).collect();
    while tokens
        .first()
        .is_some_and(|t| CONDITION_WORDS.contains(&t.to_ascii_lowercase().as_str()))
    {
        tokens.remove(0);
    }

    let mut parsed = ParsedTitle::default();
    let year_pos = tokens
        .iter()
        .position(|t| t.len() == 4 && normalize_year(t).is_some());
    if let Some(pos) = year_pos {
        parsed.year = normalize_year(tokens[pos]);
    }

    let search_from = year_pos.map_or(0, |p| p + 1);
    let (make, model_start) = match find_make(&tokens, search_from) {
        Some((make, end)) => (Some(make), end),
        // Unknown make: trust the word after the year.
        None if year_pos.is_some() && search_from < tokens.len() => {
            (Some(tokens[search_from].to_string()), search_from + 1)
        }
        None => (None, tokens.len()),
    };
    parsed.make = make;

    let rest = &tokens[model_start.min(tokens.len())..];
    if let Some((first, tail)) = rest.split_first() {
        let mut model = (*first).to_string();
        let mut trim_tokens = tail;
        if let Some((next, after)) = tail.split_first() {
            if MODEL_SUFFIX.as_ref().is_some_and(|re| re.is_match(next)) {
                model = format!("{model} {next}");
                trim_tokens = after;
            }
        }
        parsed.model = Some(model);
        if !trim_tokens.is_empty() {
            parsed.trim = Some(trim_tokens.join(" "));
        }
    }
    parsed
}

/// Find a known make starting at or after `from`; returns the canonical make
/// and the index of the first token after it.
fn find_make(tokens: &[&str], from: usize) -> Option<(String, usize)> {
    for start in from..tokens.len() {
        for width in [3, 2, 1] {
            let end = start + width;
            if end > tokens.len() {
                continue;
            }
            let candidate = tokens[start..end].join(" ");
            if let Some(make) = canonical_make(&candidate) {
                return Some((make.to_string(), end));
            }
        }
    }
    None
}

/// Canonical spelling for a make or one of its aliases.
pub fn canonical_make(name: &str) -> Option<&'static str> {
    let name = name.trim();
    MAKES
        .iter()
        .copied()
        .find(|m| m.eq_ignore_ascii_case(name))
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                .map(|(_, make)| *make)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert!(TITLE_CUT.is_some());
        assert!(MODEL_SUFFIX.is_some());
    }

    #[test]
    fn test_full_title() {
        let t = parse_title("2019 Tesla Model 3 Long Range AWD");
        assert_eq!(t.year, Some(2019));
        assert_eq!(t.make.as_deref(), Some("Tesla"));
        assert_eq!(t.model.as_deref(), Some("Model 3"));
        assert_eq!(t.trim.as_deref(), Some("Long Range AWD"));
    }

    #[test]
    fn test_condition_prefix_and_site_suffix() {
        let t = parse_title("Certified Pre-Owned 2021 Chevy Bolt EV LT | Metro Motors");
        assert_eq!(t.year, Some(2021));
        assert_eq!(t.make.as_deref(), Some("Chevrolet"));
        assert_eq!(t.model.as_deref(), Some("Bolt"));
        assert_eq!(t.trim.as_deref(), Some("EV LT"));
    }

    #[test]
    fn test_multi_word_make() {
        let t = parse_title("Used 2020 Land Rover Defender 110 SE");
        assert_eq!(t.make.as_deref(), Some("Land Rover"));
        assert_eq!(t.model.as_deref(), Some("Defender 110"));
        assert_eq!(t.trim.as_deref(), Some("SE"));

        let t = parse_title("2018 Mercedes Benz C Class C300");
        assert_eq!(t.make.as_deref(), Some("Mercedes-Benz"));
        assert_eq!(t.model.as_deref(), Some("C Class"));
    }

    #[test]
    fn test_unknown_make_after_year() {
        let t = parse_title("2022 Vinfast VF8 Plus");
        assert_eq!(t.make.as_deref(), Some("Vinfast"));
        assert_eq!(t.model.as_deref(), Some("VF8"));
    }

    #[test]
    fn test_no_year_no_make() {
        assert_eq!(parse_title("Great deal on a car"), ParsedTitle::default());
        assert_eq!(parse_title(""), ParsedTitle::default());
    }

    #[test]
    fn test_canonical_make() {
        assert_eq!(canonical_make("vw"), Some("Volkswagen"));
        assert_eq!(canonical_make("TESLA"), Some("Tesla"));
        assert_eq!(canonical_make("Yugo"), None);
    }
}
