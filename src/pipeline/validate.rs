// src/pipeline/validate.rs

//! Sanity checks on assembled listings.
//!
//! Errors drop a listing from the run; warnings are only counted. Runs after
//! scraping and before dedup, so a bad duplicate cannot displace a good one.

use std::collections::BTreeMap;

use chrono::{Datelike, Utc};

use crate::extract::normalize::normalize_vin;
use crate::models::{CarListing, NewUsed};

pub const MIN_PRICE: f64 = 5_000.0;
pub const MAX_PRICE: f64 = 250_000.0;
/// Odometer ceiling in miles
pub const MAX_MILEAGE: u32 = 300_000;
/// New vehicles above this many miles get a warning
pub const NEW_MILEAGE_WARNING: u32 = 500;
/// Model years this far past the current one are rejected
const FUTURE_YEARS: i32 = 2;

/// Words that mark test or placeholder data when they appear as a token.
const PLACEHOLDER_WORDS: &[&str] = &["test", "example", "sample", "placeholder", "demo", "abc123"];
/// Filler runs that mark placeholder data anywhere in a value.
const PLACEHOLDER_RUNS: &[&str] = &["xxx", "zzz", "000000", "999999"];

/// Problems found on one listing, as short codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
    pub errors: Vec<&'static str>,
    pub warnings: Vec<&'static str>,
}

impl Findings {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Counts for a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Occurrences per error code
    pub errors: BTreeMap<&'static str, usize>,
    /// Occurrences per warning code
    pub warnings: BTreeMap<&'static str, usize>,
}

/// Check one listing.
pub fn check(listing: &CarListing) -> Findings {
    let mut f = Findings::default();

    if is_unknown(&listing.make) {
        f.errors.push("make");
    }
    if is_unknown(&listing.model) {
        f.errors.push("model");
    }
    if listing
        .year
        .is_some_and(|y| y > Utc::now().year() + FUTURE_YEARS)
    {
        f.errors.push("year");
    }
    match listing.effective_price() {
        Some(p) if !(MIN_PRICE..=MAX_PRICE).contains(&p) => f.errors.push("price"),
        Some(_) => {}
        None => f.warnings.push("price_missing"),
    }
    if !is_http(&listing.vehicle_url) {
        f.errors.push("vehicle_url");
    }
    if !is_http(&listing.dealer_website) {
        f.errors.push("dealer_website");
    }
    if listing.dealer_name.trim().is_empty() {
        f.errors.push("dealer_name");
    }

    let miles = listing.mileage_in_miles();
    if miles.is_some_and(|m| m > MAX_MILEAGE) {
        f.errors.push("mileage");
    }
    if listing.new_used == NewUsed::New && miles.is_some_and(|m| m > NEW_MILEAGE_WARNING) {
        f.warnings.push("new_mileage");
    }
    if listing
        .vin
        .as_deref()
        .is_some_and(|v| normalize_vin(v).is_none())
    {
        f.warnings.push("vin");
    }

    let identity = [
        Some(listing.make.as_str()),
        Some(listing.model.as_str()),
        listing.trim.as_deref(),
        Some(listing.dealer_name.as_str()),
        listing.vin.as_deref(),
        listing.stock_number.as_deref(),
        listing.exterior_color.as_deref(),
    ];
    if identity.into_iter().flatten().any(is_placeholder) {
        f.errors.push("placeholder");
    }
    f
}

/// Keep the valid listings, in input order.
pub fn validate(listings: Vec<CarListing>) -> (Vec<CarListing>, ValidationReport) {
    let mut report = ValidationReport {
        total: listings.len(),
        ..Default::default()
    };

    let kept: Vec<CarListing> = listings
        .into_iter()
        .filter(|listing| {
            let findings = check(listing);
            for code in &findings.errors {
                *report.errors.entry(*code).or_default() += 1;
            }
            for code in &findings.warnings {
                *report.warnings.entry(*code).or_default() += 1;
            }
            if !findings.is_valid() {
                log::debug!(
                    "Invalid listing {} ({}): {}",
                    listing.display_name(),
                    listing.vehicle_url,
                    findings.errors.join(", ")
                );
            }
            findings.is_valid()
        })
        .collect();

    report.valid = kept.len();
    report.invalid = report.total - report.valid;
    log::info!(
        "Validation kept {} of {} listings ({} invalid)",
        report.valid,
        report.total,
        report.invalid
    );
    for (code, count) in &report.errors {
        log::info!("  {code}: {count}");
    }
    (kept, report)
}

fn is_unknown(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("unknown")
}

fn is_http(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    PLACEHOLDER_RUNS.iter().any(|run| lower.contains(run))
        || lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| PLACEHOLDER_WORDS.contains(&token))
}
