// src/extract/normalize.rs

//! Normalizers turning raw extracted text into typed values.
//!
//! Every function here is pure. Classification normalizers are driven by
//! ordered `(pattern, value)` rule lists where the first matching rule wins,
//! so precedence (certified before used, plug-in before hybrid, sold before
//! available) is visible in the tables themselves.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;

use crate::extract::document::collapse_whitespace;
use crate::models::{FuelType, MileageUnit, NewUsed, StockStatus};

pub const CONDITION_RULES: &[(&str, NewUsed)] = &[
    (
        r"(?i)certified\s+pre[-\s]?owned|\bcpo\b|\bc\.p\.o\b|\bcertified\b",
        NewUsed::Cpo,
    ),
    (r"(?i)\bused\b|\bpre[-\s]?owned\b", NewUsed::Used),
    (r"(?i)\bnew\b", NewUsed::New),
];

pub const FUEL_RULES: &[(&str, FuelType)] = &[
    (r"(?i)\bplug[-\s]?in\b|\bphev\b", FuelType::PlugInHybrid),
    (r"(?i)\bhybrid\b|\bhev\b", FuelType::Hybrid),
    (
        r"(?i)battery[-\s]electric|\bbev\b|\belectric\b|\bev\b|zero[-\s]emission",
        FuelType::Electric,
    ),
    (
        r"(?i)\bgas(?:oline)?\b|\bdiesel\b|flex[-\s]?fuel|\bpetrol\b|\bunleaded\b",
        FuelType::Gas,
    ),
];

pub const AVAILABILITY_RULES: &[(&str, StockStatus)] = &[
    (r"(?i)\bsold\b|\bout\s+of\s+stock\b", StockStatus::Sold),
    (
        r"(?i)\breserved\b|\bsale\s+pending\b|\bpending\s+sale\b|\bdeposit\s+taken\b",
        StockStatus::Reserved,
    ),
    (
        r"(?i)in[-\s]transit|on\s+the\s+way|arriving\s+soon|coming\s+soon|in\s+production|\bpre[-\s]?order\b|\bback[-\s]?order\b",
        StockStatus::InTransit,
    ),
    (
        r"(?i)\bin[-\s]stock\b|\bavailable\b|\bon\s+(?:the\s+)?lot\b",
        StockStatus::Available,
    ),
];

pub const DRIVETRAIN_RULES: &[(&str, &str)] = &[
    (
        r"(?i)\bawd\b|all[-\s]wheel|\bxdrive\b|\b4matic\b|\b4motion\b|\bquattro\b|\bdual[-\s]motor\b",
        "AWD",
    ),
    (r"(?i)\b4wd\b|\b4x4\b|four[-\s]wheel", "4WD"),
    (r"(?i)\bfwd\b|front[-\s]wheel", "FWD"),
    (r"(?i)\brwd\b|rear[-\s]wheel", "RWD"),
];

const PRICE_NOTE_PATTERN: &str = r"(?i)\b(?:call|contact|ask|request|inquire)\b[^.$]{0,30}\b(?:price|pricing|quote)\b|\bprice\s+on\s+request\b";

/// Compiled rule list; a pattern that fails to compile is dropped.
struct Rules<T>(Vec<(Regex, T)>);

impl<T: Copy> Rules<T> {
    fn compile(table: &[(&str, T)]) -> Self {
        Self(
            table
                .iter()
                .filter_map(|(pattern, value)| Regex::new(pattern).ok().map(|re| (re, *value)))
                .collect(),
        )
    }

    fn first_match(&self, text: &str) -> Option<T> {
        self.0
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, value)| *value)
    }
}

static CONDITION: LazyLock<Rules<NewUsed>> = LazyLock::new(|| Rules::compile(CONDITION_RULES));
static FUEL: LazyLock<Rules<FuelType>> = LazyLock::new(|| Rules::compile(FUEL_RULES));
static AVAILABILITY: LazyLock<Rules<StockStatus>> =
    LazyLock::new(|| Rules::compile(AVAILABILITY_RULES));
static DRIVETRAIN: LazyLock<Rules<&'static str>> =
    LazyLock::new(|| Rules::compile(DRIVETRAIN_RULES));

static DOLLAR_AMOUNT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?P<neg>[-−(]\s*)?\$\s*(?P<neg2>-\s*)?(?P<int>[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)(?P<frac>\.[0-9]{1,2})?").ok()
});
static BARE_AMOUNT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?P<neg>[-−]\s*)?\b(?P<int>[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)(?P<frac>\.[0-9]{1,2})?").ok()
});
static PRICE_NOTE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(PRICE_NOTE_PATTERN).ok());
static MILEAGE_UNIT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(kilomet(?:er|re)s?|kms?|miles?|mi)\b").ok()
});
static YEAR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b(?:19|20)[0-9]{2}\b").ok());

/// Result of price normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPrice {
    pub amount: Option<f64>,
    /// Verbatim non-numeric text such as "Call for price"
    pub note: Option<String>,
}

/// Parse a price such as `$12,345`, `12345.00` or `Call for price`.
pub fn normalize_price(raw: &str) -> ParsedPrice {
    let text = collapse_whitespace(raw);
    if text.is_empty() {
        return ParsedPrice::default();
    }

    let dollar = DOLLAR_AMOUNT.as_ref().and_then(|re| re.captures(&text));
    let is_note = !text.chars().any(|c| c.is_ascii_digit())
        || (dollar.is_none() && PRICE_NOTE.as_ref().is_some_and(|re| re.is_match(&text)));
    if is_note {
        return ParsedPrice {
            amount: None,
            note: Some(text),
        };
    }

    let caps = dollar.or_else(|| BARE_AMOUNT.as_ref().and_then(|re| re.captures(&text)));
    let amount = caps.and_then(|c| {
        if c.name("neg").is_some() || c.name("neg2").is_some() {
            return None;
        }
        let int = c.name("int")?.as_str().replace(',', "");
        let frac = c.name("frac").map_or("", |m| m.as_str());
        format!("{int}{frac}").parse::<f64>().ok()
    });

    ParsedPrice {
        amount: amount.filter(|v| v.is_finite() && *v >= 0.0),
        note: None,
    }
}

/// Detect a "call for price" style phrase in free text.
pub fn find_price_note(text: &str) -> Option<String> {
    PRICE_NOTE
        .as_ref()?
        .find(text)
        .map(|m| collapse_whitespace(m.as_str()))
}

/// Accept a VIN only if it is exactly 17 uppercase alphanumerics without I, O or Q.
pub fn normalize_vin(raw: &str) -> Option<String> {
    let vin = raw.trim();
    let valid = vin.len() == 17
        && vin.bytes().all(|b| {
            (b.is_ascii_uppercase() || b.is_ascii_digit()) && !matches!(b, b'I' | b'O' | b'Q')
        });
    valid.then(|| vin.to_string())
}

/// Parse the leading digit run of a mileage string and infer its unit.
pub fn normalize_mileage(raw: &str) -> Option<(u32, MileageUnit)> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    if raw[..start].trim_end().ends_with(['-', '−']) {
        return None;
    }

    let rest = &raw[start..];
    let digits: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    let value = digits.parse::<u32>().ok()?;

    // Unit search starts after the number so `12000km` still has a word boundary
    let tail = rest.trim_start_matches(|c: char| c.is_ascii_digit() || c == ',');
    let unit = MILEAGE_UNIT
        .as_ref()
        .and_then(|re| re.captures(tail))
        .and_then(|c| c.get(1))
        .map_or(MileageUnit::Mi, |m| {
            if m.as_str().to_ascii_lowercase().starts_with('k') {
                MileageUnit::Km
            } else {
                MileageUnit::Mi
            }
        });
    Some((value, unit))
}

pub fn normalize_condition(raw: &str) -> NewUsed {
    CONDITION.first_match(raw).unwrap_or_default()
}

pub fn normalize_fuel_type(raw: &str) -> FuelType {
    FUEL.first_match(raw).unwrap_or_default()
}

pub fn normalize_availability(raw: &str) -> StockStatus {
    AVAILABILITY.first_match(raw).unwrap_or_default()
}

/// Canonical drivetrain code (`AWD`, `4WD`, `FWD`, `RWD`).
pub fn normalize_drivetrain(raw: &str) -> Option<String> {
    DRIVETRAIN.first_match(raw).map(str::to_string)
}

/// Color from label:value pairing. Overlong text is not a color.
pub fn normalize_color(raw: &str) -> Option<String> {
    normalize_short_text(raw, 40)
}

/// First identifier-looking token of a stock number value.
pub fn normalize_stock_number(raw: &str) -> Option<String> {
    let token: String = raw
        .trim()
        .trim_start_matches(['#', ':'])
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let token = token.trim_matches('-');
    (token.len() >= 2 && token.len() <= 24).then(|| token.to_string())
}

/// Four-digit model year within 1900..=next year.
pub fn normalize_year(raw: &str) -> Option<i32> {
    let m = YEAR.as_ref()?.find(raw)?;
    let year: i32 = m.as_str().parse().ok()?;
    (1900..=Utc::now().year() + 1).contains(&year).then_some(year)
}

/// Whitespace-collapsed text of bounded length, trailing separators removed.
pub fn normalize_short_text(raw: &str, max_chars: usize) -> Option<String> {
    let text = collapse_whitespace(raw);
    let text = text.trim_matches(|c: char| matches!(c, ':' | '-' | ',' | '|' | ';') || c.is_whitespace());
    (!text.is_empty() && text.chars().count() <= max_chars).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_tables_compile() {
        assert_eq!(CONDITION.0.len(), CONDITION_RULES.len());
        assert_eq!(FUEL.0.len(), FUEL_RULES.len());
        assert_eq!(AVAILABILITY.0.len(), AVAILABILITY_RULES.len());
        assert_eq!(DRIVETRAIN.0.len(), DRIVETRAIN_RULES.len());
        assert!(DOLLAR_AMOUNT.is_some());
        assert!(BARE_AMOUNT.is_some());
        assert!(PRICE_NOTE.is_some());
        assert!(MILEAGE_UNIT.is_some());
        assert!(YEAR.is_some());
    }

    #[test]
    fn test_price_formats() {
        for raw in ["$12,345", "12345.00", "$ 12,345.00", "Internet Price $12,345"] {
            assert_eq!(normalize_price(raw).amount, Some(12345.0), "{raw}");
        }
        assert_eq!(normalize_price("$38,990").amount, Some(38990.0));
        assert_eq!(normalize_price("$1,234,567").amount, Some(1234567.0));
    }

    #[test]
    fn test_price_note_preserved() {
        let parsed = normalize_price("Call for price");
        assert_eq!(parsed.amount, None);
        assert_eq!(parsed.note.as_deref(), Some("Call for price"));

        let parsed = normalize_price("Call 555-0100 for pricing");
        assert_eq!(parsed.amount, None);
        assert!(parsed.note.is_some());
    }

    #[test]
    fn test_price_rejects_negative_and_empty() {
        assert_eq!(normalize_price("-$500").amount, None);
        assert_eq!(normalize_price("$-500").amount, None);
        assert_eq!(normalize_price("($500)").amount, None);
        assert_eq!(normalize_price("   "), ParsedPrice::default());
    }

    #[test]
    fn test_find_price_note() {
        assert_eq!(
            find_price_note("Great car. Call for Price today").as_deref(),
            Some("Call for Price")
        );
        assert_eq!(find_price_note("Price: $10,000"), None);
    }

    #[test]
    fn test_vin_valid_returned_unchanged() {
        for vin in ["5YJ3E1EA1KF123456", "1HGCM82633A004352", "WBA3A5C55DF123456"] {
            assert_eq!(normalize_vin(vin).as_deref(), Some(vin));
        }
    }

    #[test]
    fn test_vin_invalid_rejected() {
        assert_eq!(normalize_vin("5YJ3E1EA1KF12345"), None); // 16
        assert_eq!(normalize_vin("5YJ3E1EA1KF1234567"), None); // 18
        assert_eq!(normalize_vin("5YJ3E1EA1KF12345I"), None);
        assert_eq!(normalize_vin("5YJ3E1EA1KF12345O"), None);
        assert_eq!(normalize_vin("5YJ3E1EA1KF12345Q"), None);
        assert_eq!(normalize_vin("5yj3e1ea1kf123456"), None);
        assert_eq!(normalize_vin("5YJ3E1EA1KF 23456"), None);
        assert_eq!(normalize_vin(""), None);
    }

    #[test]
    fn test_mileage() {
        assert_eq!(normalize_mileage("45,230 mi"), Some((45230, MileageUnit::Mi)));
        assert_eq!(normalize_mileage("12000 km"), Some((12000, MileageUnit::Km)));
        assert_eq!(normalize_mileage("500"), Some((500, MileageUnit::Mi)));
        assert_eq!(normalize_mileage("8 kilometers"), Some((8, MileageUnit::Km)));
        assert_eq!(normalize_mileage("12 miles"), Some((12, MileageUnit::Mi)));
        assert_eq!(normalize_mileage("12000km"), Some((12000, MileageUnit::Km)));
        assert_eq!(normalize_mileage("Odometer 45,000KM"), Some((45000, MileageUnit::Km)));
        assert_eq!(normalize_mileage("8,500mi"), Some((8500, MileageUnit::Mi)));
        assert_eq!(normalize_mileage("N/A"), None);
        assert_eq!(normalize_mileage("-5 mi"), None);
    }

    #[test]
    fn test_condition_precedence() {
        assert_eq!(
            normalize_condition("Certified Pre-Owned | Used"),
            NewUsed::Cpo
        );
        assert_eq!(normalize_condition("Used"), NewUsed::Used);
        assert_eq!(normalize_condition("Pre-Owned"), NewUsed::Used);
        assert_eq!(normalize_condition("CPO"), NewUsed::Cpo);
        assert_eq!(normalize_condition("Brand New"), NewUsed::New);
        assert_eq!(normalize_condition("Excellent"), NewUsed::Unknown);
    }

    #[test]
    fn test_fuel_type_plug_in_before_hybrid() {
        assert_eq!(normalize_fuel_type("Plug-In Hybrid"), FuelType::PlugInHybrid);
        assert_eq!(normalize_fuel_type("PHEV"), FuelType::PlugInHybrid);
        assert_eq!(normalize_fuel_type("Hybrid Electric"), FuelType::Hybrid);
        assert_eq!(normalize_fuel_type("Battery Electric"), FuelType::Electric);
        assert_eq!(normalize_fuel_type("EV"), FuelType::Electric);
        assert_eq!(normalize_fuel_type("Gasoline"), FuelType::Gas);
        assert_eq!(normalize_fuel_type("Diesel"), FuelType::Gas);
        assert_eq!(normalize_fuel_type("Hydrogen"), FuelType::Unknown);
    }

    #[test]
    fn test_availability_negative_signals_win() {
        assert_eq!(normalize_availability("In Stock | Sold"), StockStatus::Sold);
        assert_eq!(
            normalize_availability("Available | Reserved"),
            StockStatus::Reserved
        );
        assert_eq!(normalize_availability("In Stock"), StockStatus::Available);
        assert_eq!(normalize_availability("In Transit"), StockStatus::InTransit);
        assert_eq!(normalize_availability("Out Of Stock"), StockStatus::Sold);
        assert_eq!(normalize_availability("Call us"), StockStatus::Unknown);
    }

    #[test]
    fn test_drivetrain() {
        assert_eq!(normalize_drivetrain("All-Wheel Drive").as_deref(), Some("AWD"));
        assert_eq!(normalize_drivetrain("xDrive").as_deref(), Some("AWD"));
        assert_eq!(normalize_drivetrain("4x4").as_deref(), Some("4WD"));
        assert_eq!(normalize_drivetrain("Front Wheel Drive").as_deref(), Some("FWD"));
        assert_eq!(normalize_drivetrain("RWD").as_deref(), Some("RWD"));
        assert_eq!(normalize_drivetrain("Automatic"), None);
    }

    #[test]
    fn test_colors_and_short_text() {
        assert_eq!(normalize_color("  Pearl   White ").as_deref(), Some("Pearl White"));
        assert_eq!(normalize_color(&"x".repeat(60)), None);
        assert_eq!(normalize_color(" - "), None);
    }

    #[test]
    fn test_stock_number() {
        assert_eq!(normalize_stock_number("A12345").as_deref(), Some("A12345"));
        assert_eq!(normalize_stock_number("# P-7781 VIN").as_deref(), Some("P-7781"));
        assert_eq!(normalize_stock_number("x"), None);
    }

    #[test]
    fn test_year() {
        assert_eq!(normalize_year("2019 Tesla Model 3"), Some(2019));
        assert_eq!(normalize_year("1899"), None);
        assert_eq!(normalize_year("3019"), None);
        assert_eq!(normalize_year(&format!("{}", Utc::now().year() + 5)), None);
    }
}
