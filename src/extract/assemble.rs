// src/extract/assemble.rs

//! Vehicle record assembly from a parsed detail page.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use scraper::Selector;

use crate::extract::document::{HtmlPage, TextDocument, collapse_whitespace};
use crate::extract::keywords::{Field, KeywordTable};
use crate::extract::normalize::{
    find_price_note, normalize_availability, normalize_color, normalize_condition,
    normalize_drivetrain, normalize_fuel_type, normalize_mileage, normalize_price,
    normalize_short_text, normalize_stock_number, normalize_vin, normalize_year,
};
use crate::extract::structured::{StructuredVehicle, extract_structured};
use crate::extract::title::{ParsedTitle, canonical_make, parse_title};
use crate::extract::value::{extract_labeled, scan_fallback};
use crate::models::{CarListing, Config, Dealership, ScraperConfig};

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".avif"];
const IMAGE_NOISE: &[&str] = &["logo", "icon", "sprite", "placeholder", "badge"];
const MIN_DESCRIPTION_CHARS: usize = 50;
const MAX_DESCRIPTION_CHARS: usize = 4000;
const MAX_FEATURE_CHARS: usize = 100;

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

static H1: LazyLock<Option<Selector>> = LazyLock::new(|| selector("h1"));
static TITLE: LazyLock<Option<Selector>> = LazyLock::new(|| selector("title"));
static IMAGES: LazyLock<Option<Selector>> = LazyLock::new(|| selector("img"));
static FEATURE_ITEMS: LazyLock<Option<Selector>> = LazyLock::new(|| {
    selector(
        r#"[class*="feature"] li, [class*="option"] li, [class*="equipment"] li, [id*="feature"] li"#,
    )
});
static DESCRIPTION: LazyLock<Option<Selector>> = LazyLock::new(|| {
    selector(r#"[itemprop="description"], #description, [class*="description"], [class*="comments"]"#)
});

/// Builds a [`CarListing`] from one detail page.
///
/// The keyword table is shared read-only across all detail pages of a run.
#[derive(Debug, Clone)]
pub struct ListingAssembler {
    keywords: Arc<KeywordTable>,
    max_images: usize,
    max_features: usize,
}

impl ListingAssembler {
    pub fn new(keywords: Arc<KeywordTable>) -> Self {
        Self {
            keywords,
            max_images: 10,
            max_features: 20,
        }
    }

    pub fn from_config(keywords: Arc<KeywordTable>, config: &ScraperConfig) -> Self {
        Self {
            keywords,
            max_images: config.max_images,
            max_features: config.max_features,
        }
    }

    /// Assembler for a run: configured label overrides and caps.
    pub fn for_config(config: &Config) -> Self {
        Self::from_config(
            Arc::new(KeywordTable::with_overrides(&config.keywords)),
            &config.scraper,
        )
    }

    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    /// Assemble a listing, or `None` when the page carries no identifiable
    /// vehicle (neither make nor model).
    ///
    /// `fallback_title` is the title seen on the list page, used when the
    /// detail page has no usable heading.
    pub fn assemble(
        &self,
        page: &HtmlPage,
        dealer: &Dealership,
        fallback_title: Option<&str>,
    ) -> Option<CarListing> {
        let structured = extract_structured(page);
        if page.is_blank() && structured.is_empty() {
            return None;
        }

        let title = self.title(page, &structured, fallback_title);
        let make = structured
            .brand
            .as_deref()
            .map(|b| canonical_make(b).map_or_else(|| b.to_string(), str::to_string))
            .or(title.make);
        let model = structured.model.clone().or(title.model);
        if make.is_none() && model.is_none() {
            log::debug!("No vehicle identity on {}", page.url_str());
            return None;
        }

        let mut listing = CarListing::new(
            &dealer.name,
            &dealer.base_url,
            page.url_str(),
            make.unwrap_or_else(|| "Unknown".to_string()),
            model.unwrap_or_else(|| "Unknown".to_string()),
        );
        listing.year = structured
            .year
            .as_deref()
            .and_then(normalize_year)
            .or(title.year);
        listing.trim = title.trim;

        listing.vin = self.resolve(page, structured.vin.as_deref(), Field::Vin, normalize_vin);
        listing.stock_number =
            self.resolve(page, None, Field::StockNumber, normalize_stock_number);
        if let Some((miles, units)) = self.resolve(
            page,
            structured.mileage.as_deref(),
            Field::Mileage,
            normalize_mileage,
        ) {
            listing.mileage = Some(miles);
            listing.mileage_units = units;
        }

        listing.new_used = self
            .classify(page, structured.condition.as_deref(), Field::Condition, |s| {
                Some(normalize_condition(s)).filter(|v| v.is_known())
            })
            .unwrap_or_default();
        listing.fuel_type = self
            .resolve(page, structured.fuel_type.as_deref(), Field::FuelType, |s| {
                Some(normalize_fuel_type(s)).filter(|v| v.is_known())
            })
            .unwrap_or_default();
        listing.in_stock_status = self
            .classify(
                page,
                structured.availability.as_deref(),
                Field::Availability,
                |s| Some(normalize_availability(s)).filter(|v| v.is_known()),
            )
            .unwrap_or_default();

        listing.drivetrain = self.resolve(
            page,
            structured.drivetrain.as_deref(),
            Field::Drivetrain,
            normalize_drivetrain,
        );
        listing.transmission = self.resolve(
            page,
            structured.transmission.as_deref(),
            Field::Transmission,
            |s| normalize_short_text(s, 60),
        );
        listing.body_style = self.resolve(
            page,
            structured.body_style.as_deref(),
            Field::BodyStyle,
            |s| normalize_short_text(s, 40),
        );
        listing.exterior_color = self.resolve(
            page,
            structured.exterior_color.as_deref(),
            Field::ExteriorColor,
            normalize_color,
        );
        listing.interior_color = self.resolve(
            page,
            structured.interior_color.as_deref(),
            Field::InteriorColor,
            normalize_color,
        );

        self.fill_prices(page, &structured, &mut listing);

        listing.images = self.images(page, &structured);
        listing.features = self.features(page);
        listing.description = description(page, &structured);
        listing.dealer_location_city = dealer.city.clone();
        listing.dealer_location_state = dealer.state.clone();

        Some(listing)
    }

    /// Structured value if it survives normalization, then the labeled value,
    /// then the document-wide scan.
    fn resolve<T>(
        &self,
        page: &HtmlPage,
        structured: Option<&str>,
        field: Field,
        normalize: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        structured
            .and_then(&normalize)
            .or_else(|| extract_labeled(page, &self.keywords, field).and_then(|v| normalize(&v)))
            .or_else(|| scan_fallback(page, field).and_then(|v| normalize(&v)))
    }

    /// Like [`Self::resolve`], but the labeled value and every page-wide hit
    /// are normalized together, so rule precedence picks e.g. a `SOLD` badge
    /// over an `Availability: In Stock` row.
    fn classify<T>(
        &self,
        page: &HtmlPage,
        structured: Option<&str>,
        field: Field,
        normalize: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        if let Some(value) = structured.and_then(&normalize) {
            return Some(value);
        }
        let signals: Vec<String> = [
            extract_labeled(page, &self.keywords, field),
            scan_fallback(page, field),
        ]
        .into_iter()
        .flatten()
        .collect();
        normalize(&signals.join(" | "))
    }

    fn fill_prices(&self, page: &HtmlPage, structured: &StructuredVehicle, listing: &mut CarListing) {
        let mut notes = Vec::new();
        let mut price_for = |field: Field| {
            let raw = extract_labeled(page, &self.keywords, field)
                .or_else(|| scan_fallback(page, field))?;
            let parsed = normalize_price(&raw);
            if let Some(note) = parsed.note {
                notes.push(note);
            }
            parsed.amount
        };

        listing.msrp = price_for(Field::Msrp);
        listing.sale_price = structured
            .price
            .as_deref()
            .and_then(|p| normalize_price(p).amount)
            .or_else(|| price_for(Field::SalePrice));
        listing.total_price = price_for(Field::TotalPrice);
        if listing.effective_price().is_none() {
            listing.sale_price = price_for(Field::Price);
        }

        if let Some(currency) = structured.currency.as_deref().map(str::trim) {
            if currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_alphabetic()) {
                listing.currency = currency.to_ascii_uppercase();
            }
        }

        if listing.effective_price().is_none() {
            listing.price_note = notes
                .into_iter()
                .next()
                .or_else(|| find_price_note(page.text()));
        }
    }

    /// Title sources in order: structured name, `h1`, list-page title, `<title>`.
    fn title(
        &self,
        page: &HtmlPage,
        structured: &StructuredVehicle,
        fallback_title: Option<&str>,
    ) -> ParsedTitle {
        let h1 = H1.as_ref().and_then(|s| page.first_text(s));
        let head_title = TITLE.as_ref().and_then(|s| {
            page.html()
                .select(s)
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .find(|t| !t.is_empty())
        });

        [
            structured.name.clone(),
            h1,
            fallback_title.map(str::to_string),
            head_title,
        ]
        .into_iter()
        .flatten()
        .map(|t| parse_title(&t))
        .find(|t| t.make.is_some() || t.model.is_some())
        .unwrap_or_default()
    }

    fn images(&self, page: &HtmlPage, structured: &StructuredVehicle) -> Vec<String> {
        let from_tags = IMAGES.as_ref().into_iter().flat_map(|s| {
            page.html().select(s).filter_map(|img| {
                let attrs = img.value();
                attrs
                    .attr("data-src")
                    .or_else(|| attrs.attr("data-lazy-src"))
                    .or_else(|| attrs.attr("src"))
                    .map(str::to_string)
            })
        });

        let mut seen = HashSet::new();
        structured
            .images
            .iter()
            .cloned()
            .chain(from_tags)
            .filter_map(|src| page.resolve(&src))
            .filter(|url| is_vehicle_image(url))
            .filter(|url| seen.insert(url.clone()))
            .take(self.max_images)
            .collect()
    }

    fn features(&self, page: &HtmlPage) -> Vec<String> {
        let Some(selector) = FEATURE_ITEMS.as_ref() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        page.select_texts(selector)
            .into_iter()
            .filter_map(|t| normalize_short_text(&t, MAX_FEATURE_CHARS))
            .filter(|t| seen.insert(t.to_ascii_lowercase()))
            .take(self.max_features)
            .collect()
    }
}

fn is_vehicle_image(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        && !IMAGE_NOISE.iter().any(|noise| path.contains(noise))
}

fn description(page: &HtmlPage, structured: &StructuredVehicle) -> Option<String> {
    let text = structured.description.clone().or_else(|| {
        let selector = DESCRIPTION.as_ref()?;
        page.select_texts(selector)
            .into_iter()
            .find(|t| t.chars().count() > MIN_DESCRIPTION_CHARS)
    })?;
    Some(text.chars().take(MAX_DESCRIPTION_CHARS).collect())
}
