// src/extract/value.rs

//! Value extraction: label:value pairing with a regex fallback.

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::document::{NodeFilter, TextDocument, collapse_whitespace};
use crate::extract::keywords::{Field, KeywordTable};
use crate::extract::locator::{find_word, locate};

/// How a fallback pattern reports its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    /// First match only (capture group 1 if present)
    First,
    /// Every distinct match in document order, joined with `" | "`
    AllHits,
}

/// Document-wide patterns, one per field. Colors intentionally have none.
const FALLBACK_PATTERNS: &[(Field, &str, ScanMode)] = &[
    (
        Field::Price,
        r"\$\s*(?:[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)(?:\.[0-9]{2})?",
        ScanMode::First,
    ),
    (
        Field::Msrp,
        r"(?i)\b(?:msrp|sticker\s+price|retail\s+price)\s*[:\-]?\s*(\$\s*[0-9][0-9,]*(?:\.[0-9]{2})?)",
        ScanMode::First,
    ),
    (
        Field::SalePrice,
        r"(?i)\b(?:(?:sale|internet|our|dealer|special|your)\s+price|e-?price)\s*[:\-]?\s*(\$\s*[0-9][0-9,]*(?:\.[0-9]{2})?)",
        ScanMode::First,
    ),
    (
        Field::TotalPrice,
        r"(?i)\b(?:(?:total|final|otd)\s+price|out[-\s]the[-\s]door(?:\s+price)?)\s*[:\-]?\s*(\$\s*[0-9][0-9,]*(?:\.[0-9]{2})?)",
        ScanMode::First,
    ),
    (Field::Vin, r"\b([A-HJ-NPR-Z0-9]{17})\b", ScanMode::First),
    (
        Field::StockNumber,
        r"(?i)\b(?:stock|stk)\s*(?:#|number|no\.?)\s*:?\s*([a-z0-9][a-z0-9-]*)",
        ScanMode::First,
    ),
    (
        Field::Mileage,
        r"(?i)\b((?:[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)\s*(?:miles|mile|mi|kilometers|kilometres|km)\b)",
        ScanMode::First,
    ),
    (
        Field::Condition,
        r"(?i)\b(?:certified\s+pre[-\s]?owned|cpo|pre[-\s]?owned|used|new)\b",
        ScanMode::AllHits,
    ),
    (
        Field::FuelType,
        r"(?i)\b(?:plug[-\s]?in(?:\s+hybrid)?|phev|hybrid|battery[-\s]electric|bev|electric|ev|gas(?:oline)?|diesel|flex[-\s]?fuel)\b",
        ScanMode::AllHits,
    ),
    (
        Field::Availability,
        r"(?i)\b(?:sold|out\s+of\s+stock|reserved|sale\s+pending|in[-\s]transit|on\s+the\s+way|arriving\s+soon|in\s+stock|available)\b",
        ScanMode::AllHits,
    ),
    (
        Field::Drivetrain,
        r"(?i)\b(awd|fwd|rwd|4wd|4x4|(?:all|front|rear|four)[-\s]wheel\s+drive)\b",
        ScanMode::First,
    ),
    (
        Field::Transmission,
        r"(?i)\b((?:[0-9]{1,2}|single)[-\s]speed\s+(?:automatic|manual)|automatic|manual|cvt|dual[-\s]clutch)\b",
        ScanMode::First,
    ),
    (
        Field::BodyStyle,
        r"(?i)\b(sedan|suv|sport\s+utility|crossover|hatchback|coupe|convertible|wagon|minivan|pickup|truck)\b",
        ScanMode::First,
    ),
];

static COMPILED: LazyLock<Vec<(Field, Regex, ScanMode)>> = LazyLock::new(|| {
    FALLBACK_PATTERNS
        .iter()
        .filter_map(|(field, pattern, mode)| {
            Regex::new(pattern).ok().map(|re| (*field, re, *mode))
        })
        .collect()
});

/// Extract the raw value text for `field`.
///
/// Tries, in order: the label node's own text after the label, the label's
/// next sibling, then a document-wide pattern scan.
pub fn extract_value<D: TextDocument>(
    document: &D,
    table: &KeywordTable,
    field: Field,
) -> Option<String> {
    extract_labeled(document, table, field).or_else(|| scan_fallback(document, field))
}

/// Label:value pairing only (no pattern scan).
pub fn extract_labeled<D: TextDocument>(
    document: &D,
    table: &KeywordTable,
    field: Field,
) -> Option<String> {
    locate(document, table, field, &NodeFilter::default())
        .into_iter()
        .find_map(|candidate| {
            let own_text = document.node_text(candidate.node);
            strip_label(&own_text, candidate.keyword).or_else(|| {
                document
                    .next_sibling_text(candidate.node)
                    .map(|t| clean_value(&t))
                    .filter(|t| !t.is_empty())
            })
        })
}

/// Document-wide pattern scan for `field`.
pub fn scan_fallback<D: TextDocument>(document: &D, field: Field) -> Option<String> {
    let (_, regex, mode) = COMPILED.iter().find(|(f, _, _)| *f == field)?;
    let text = document.text();

    match mode {
        ScanMode::First => {
            let caps = regex.captures(text)?;
            let m = caps.get(1).or_else(|| caps.get(0))?;
            Some(collapse_whitespace(m.as_str()))
        }
        ScanMode::AllHits => {
            let mut hits: Vec<String> = Vec::new();
            for m in regex.find_iter(text) {
                let hit = collapse_whitespace(m.as_str());
                if !hits.iter().any(|h| h.eq_ignore_ascii_case(&hit)) {
                    hits.push(hit);
                }
            }
            (!hits.is_empty()).then(|| hits.join(" | "))
        }
    }
}

/// Text following `keyword` inside `text`, without leading separators.
fn strip_label(text: &str, keyword: &str) -> Option<String> {
    let start = find_word(text, keyword)?;
    let residual = clean_value(&text[start + keyword.trim().len()..]);
    (!residual.is_empty()).then_some(residual)
}

fn clean_value(s: &str) -> String {
    s.trim_start_matches(|c: char| c == ':' || c == '-' || c == '–' || c.is_whitespace())
        .trim()
        .to_string()
}
