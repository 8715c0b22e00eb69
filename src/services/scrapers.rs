// src/services/scrapers.rs

//! Site scrapers: the per-dealership registration interface and its variants.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use crate::error::{AppError, Result};
use crate::extract::ListingAssembler;
use crate::extract::document::{HtmlPage, element_text, parse_selector};
use crate::models::{CarListing, Dealership, SiteSelectors, VehicleSummary};
use crate::utils::get_domain;

/// Card selectors tried in order; the first with at least two hits wins.
const CARD_SELECTORS: &[&str] = &[
    ".vehicle-card",
    ".inventory-item",
    ".vehicle-listing",
    ".car-listing",
    "[data-vehicle-id]",
    "[data-vin]",
    ".inventory-vehicle",
    "article.vehicle",
    "div.vehicle",
    "li.vehicle",
    "tr.vehicle",
    ".srp-vehicle",
    ".result-item",
    r#"[class*="vehicle-card"]"#,
    r#"[class*="inventory-item"]"#,
    r#"[class*="listing-item"]"#,
];

const MIN_CARDS: usize = 2;

/// Detail-page path hints for the link fallback.
const DETAIL_PATH_HINTS: &[&str] = &["/vehicle/", "/inventory/", "/used/", "/new/", "/detail/"];

const MAX_FALLBACK_LINKS: usize = 100;

static CARDS: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    CARD_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok().map(|s| (*css, s)))
        .collect()
});
static LINK: LazyLock<Option<Selector>> = LazyLock::new(|| Selector::parse("a[href]").ok());
static CARD_TITLE: LazyLock<Option<Selector>> = LazyLock::new(|| {
    Selector::parse(r#"h1, h2, h3, h4, [class*="title"], [class*="name"]"#).ok()
});

/// Per-site scraping capability used by the orchestrator.
///
/// Implementations are pure over page content; all I/O happens in the
/// orchestrator through its collaborators.
pub trait SiteScraper: Send + Sync {
    fn dealership(&self) -> &Dealership;

    /// Listing-page URLs: the inventory page, plus `?{param}=N` pages when
    /// pagination is configured.
    fn enumerate_listing_urls(&self) -> Vec<String> {
        let dealer = self.dealership();
        let first = dealer.inventory_url();
        let mut urls = vec![first.clone()];
        if let Some(pagination) = &dealer.pagination {
            let sep = if first.contains('?') { '&' } else { '?' };
            urls.extend(
                (2..=pagination.max_pages).map(|n| format!("{first}{sep}{}={n}", pagination.param)),
            );
        }
        urls
    }

    fn parse_list_page(&self, content: &str, page_url: &str) -> Result<Vec<VehicleSummary>>;

    fn parse_detail_page(&self, content: &str, detail_url: &str) -> Result<Option<CarListing>>;

    /// Parse a detail page with its list-page summary at hand.
    fn parse_detail_for(&self, content: &str, summary: &VehicleSummary) -> Result<Option<CarListing>> {
        self.parse_detail_page(content, &summary.detail_url)
    }
}

/// Heuristic scraper for sites without configured selectors.
pub struct GenericDealerScraper {
    dealer: Dealership,
    assembler: ListingAssembler,
}

impl GenericDealerScraper {
    pub fn new(dealer: Dealership, assembler: ListingAssembler) -> Self {
        Self { dealer, assembler }
    }

    fn find_cards<'a>(&self, page: &'a HtmlPage) -> Vec<ElementRef<'a>> {
        for (css, selector) in CARDS.iter() {
            let cards: Vec<_> = page.html().select(selector).collect();
            if cards.len() >= MIN_CARDS {
                log::debug!("{}: {} cards via {}", self.dealer.id, cards.len(), css);
                return cards;
            }
        }
        self.vehicle_links(page)
    }

    /// Same-host links whose path and text look like a vehicle detail page.
    fn vehicle_links<'a>(&self, page: &'a HtmlPage) -> Vec<ElementRef<'a>> {
        let Some(link) = LINK.as_ref() else {
            return Vec::new();
        };
        let host = get_domain(&self.dealer.base_url);
        page.html()
            .select(link)
            .filter(|a| {
                let Some(url) = a.value().attr("href").and_then(|h| page.resolve(h)) else {
                    return false;
                };
                let lower = url.to_ascii_lowercase();
                let same_host = host.is_none() || get_domain(&url) == host;
                same_host
                    && DETAIL_PATH_HINTS.iter().any(|hint| lower.contains(hint))
                    && looks_like_vehicle(&element_text(*a))
            })
            .take(MAX_FALLBACK_LINKS)
            .collect()
    }
}

impl SiteScraper for GenericDealerScraper {
    fn dealership(&self) -> &Dealership {
        &self.dealer
    }

    fn parse_list_page(&self, content: &str, page_url: &str) -> Result<Vec<VehicleSummary>> {
        let page = list_page(content, page_url)?;
        let cards = self.find_cards(&page);
        Ok(summarize(&page, cards, LINK.as_ref(), CARD_TITLE.as_ref(), "href"))
    }

    fn parse_detail_page(&self, content: &str, detail_url: &str) -> Result<Option<CarListing>> {
        let page = HtmlPage::parse(content, detail_url);
        Ok(self.assembler.assemble(&page, &self.dealer, None))
    }

    fn parse_detail_for(&self, content: &str, summary: &VehicleSummary) -> Result<Option<CarListing>> {
        let page = HtmlPage::parse(content, &summary.detail_url);
        let title = (!summary.title.is_empty()).then_some(summary.title.as_str());
        Ok(self.assembler.assemble(&page, &self.dealer, title))
    }
}

/// Scraper driven by a dealership's configured CSS selectors.
pub struct SelectorDealerScraper {
    dealer: Dealership,
    assembler: ListingAssembler,
    card: Selector,
    link: Option<Selector>,
    title: Option<Selector>,
    attr: String,
}

impl SelectorDealerScraper {
    /// Fails if any configured selector does not parse.
    pub fn new(dealer: Dealership, assembler: ListingAssembler) -> Result<Self> {
        let selectors = dealer.selectors.clone().unwrap_or_else(|| SiteSelectors {
            card: CARD_SELECTORS[0].to_string(),
            link: None,
            title: None,
            attr: "href".to_string(),
        });
        let card = parse_selector(&selectors.card)?;
        let link = selectors.link.as_deref().map(parse_selector).transpose()?;
        let title = selectors.title.as_deref().map(parse_selector).transpose()?;

        Ok(Self {
            dealer,
            assembler,
            card,
            link,
            title,
            attr: selectors.attr,
        })
    }
}

impl SiteScraper for SelectorDealerScraper {
    fn dealership(&self) -> &Dealership {
        &self.dealer
    }

    fn parse_list_page(&self, content: &str, page_url: &str) -> Result<Vec<VehicleSummary>> {
        let page = list_page(content, page_url)?;
        let cards: Vec<_> = page.html().select(&self.card).collect();
        let link = self.link.as_ref().or(LINK.as_ref());
        let title = self.title.as_ref().or(CARD_TITLE.as_ref());
        Ok(summarize(&page, cards, link, title, &self.attr))
    }

    fn parse_detail_page(&self, content: &str, detail_url: &str) -> Result<Option<CarListing>> {
        let page = HtmlPage::parse(content, detail_url);
        Ok(self.assembler.assemble(&page, &self.dealer, None))
    }

    fn parse_detail_for(&self, content: &str, summary: &VehicleSummary) -> Result<Option<CarListing>> {
        let page = HtmlPage::parse(content, &summary.detail_url);
        let title = (!summary.title.is_empty()).then_some(summary.title.as_str());
        Ok(self.assembler.assemble(&page, &self.dealer, title))
    }
}

/// Pick the scraper variant for a dealership.
pub fn build_scraper(dealer: Dealership, assembler: ListingAssembler) -> Result<Box<dyn SiteScraper>> {
    if dealer.selectors.is_some() {
        Ok(Box::new(SelectorDealerScraper::new(dealer, assembler)?))
    } else {
        Ok(Box::new(GenericDealerScraper::new(dealer, assembler)))
    }
}

/// Parse a list page; relative links need an absolute page URL.
fn list_page(content: &str, page_url: &str) -> Result<HtmlPage> {
    url::Url::parse(page_url).map_err(|e| AppError::parse(page_url, e))?;
    Ok(HtmlPage::parse(content, page_url))
}

/// Turn cards into summaries, first occurrence of each detail URL kept.
fn summarize(
    page: &HtmlPage,
    cards: Vec<ElementRef<'_>>,
    link: Option<&Selector>,
    title: Option<&Selector>,
    attr: &str,
) -> Vec<VehicleSummary> {
    let mut seen = HashSet::new();
    let mut summaries = Vec::new();

    for card in cards {
        let anchor = if card.value().name() == "a" {
            Some(card)
        } else {
            link.and_then(|s| card.select(s).next())
        };
        let href = anchor
            .and_then(|a| a.value().attr(attr))
            .or_else(|| card.value().attr("data-url"))
            .or_else(|| card.value().attr("data-href"));
        let Some(detail_url) = href.and_then(|h| page.resolve(h)) else {
            continue;
        };
        if !seen.insert(detail_url.clone()) {
            continue;
        }

        let title = title
            .and_then(|s| card.select(s).map(element_text).find(|t| !t.is_empty()))
            .or_else(|| anchor.map(element_text))
            .unwrap_or_default();
        summaries.push(VehicleSummary { detail_url, title });
    }
    summaries
}

fn looks_like_vehicle(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("new")
        || lower.contains("used")
        || lower.split_whitespace().any(|w| {
            w.len() == 4 && w.bytes().all(|b| b.is_ascii_digit()) && (w.starts_with("19") || w.starts_with("20"))
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::extract::KeywordTable;
    use crate::models::Pagination;

    fn assembler() -> ListingAssembler {
        ListingAssembler::new(Arc::new(KeywordTable::builtin()))
    }

    fn dealer() -> Dealership {
        Dealership::new("demo", "Demo Motors", "https://demo.test")
    }

    #[test]
    fn test_card_selectors_compile() {
        assert_eq!(CARDS.len(), CARD_SELECTORS.len());
        assert!(LINK.is_some());
        assert!(CARD_TITLE.is_some());
    }

    #[test]
    fn test_enumerate_listing_urls() {
        let scraper = GenericDealerScraper::new(dealer(), assembler());
        assert_eq!(scraper.enumerate_listing_urls(), vec!["https://demo.test/inventory"]);

        let mut d = dealer();
        d.inventory_url = Some("https://demo.test/search?type=used".to_string());
        d.pagination = Some(Pagination {
            param: "pg".to_string(),
            max_pages: 3,
        });
        let scraper = GenericDealerScraper::new(d, assembler());
        assert_eq!(
            scraper.enumerate_listing_urls(),
            vec![
                "https://demo.test/search?type=used",
                "https://demo.test/search?type=used&pg=2",
                "https://demo.test/search?type=used&pg=3",
            ]
        );
    }

    #[test]
    fn test_generic_cards() {
        let html = r#"<div class="vehicle-card"><h3>2019 Tesla Model 3</h3><a href="/inventory/1">View</a></div>
                      <div class="vehicle-card"><h3>2020 Kia Niro EV</h3><a href="/inventory/2">View</a></div>
                      <div class="vehicle-card"><h3>Duplicate</h3><a href="/inventory/2">View</a></div>"#;
        let scraper = GenericDealerScraper::new(dealer(), assembler());
        let summaries = scraper
            .parse_list_page(html, "https://demo.test/inventory")
            .unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].detail_url, "https://demo.test/inventory/1");
        assert_eq!(summaries[0].title, "2019 Tesla Model 3");
    }

    #[test]
    fn test_generic_link_fallback() {
        let html = r#"<p><a href="/used/2018-honda-civic">2018 Honda Civic</a></p>
                      <p><a href="/about">About us</a></p>
                      <p><a href="https://elsewhere.test/used/x">Used 2017 Ford</a></p>"#;
        let scraper = GenericDealerScraper::new(dealer(), assembler());
        let summaries = scraper
            .parse_list_page(html, "https://demo.test/inventory")
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "2018 Honda Civic");
    }

    #[test]
    fn test_empty_list_page_is_not_an_error() {
        let scraper = GenericDealerScraper::new(dealer(), assembler());
        let summaries = scraper
            .parse_list_page("<html><body><p>No vehicles match.</p></body></html>", "https://demo.test/inventory")
            .unwrap();
        assert!(summaries.is_empty());
    }

    #[test]
    fn test_relative_page_url_is_parse_error() {
        let scraper = GenericDealerScraper::new(dealer(), assembler());
        let result = scraper.parse_list_page("<html></html>", "/inventory");
        assert!(matches!(result, Err(AppError::Parse { .. })));
    }

    #[test]
    fn test_selector_scraper() {
        let mut d = dealer();
        d.selectors = Some(SiteSelectors {
            card: "li.car".to_string(),
            link: Some("a.details".to_string()),
            title: Some(".name".to_string()),
            attr: "data-link".to_string(),
        });
        let scraper = build_scraper(d, assembler()).unwrap();
        let html = r#"<ul><li class="car"><span class="name">2021 Ford Bronco</span>
                      <a class="details" data-link="/v/9">Details</a></li></ul>"#;
        let summaries = scraper
            .parse_list_page(html, "https://demo.test/inventory")
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].detail_url, "https://demo.test/v/9");
        assert_eq!(summaries[0].title, "2021 Ford Bronco");
    }

    #[test]
    fn test_invalid_configured_selector_fails() {
        let mut d = dealer();
        d.selectors = Some(SiteSelectors {
            card: "[[bad".to_string(),
            link: None,
            title: None,
            attr: "href".to_string(),
        });
        assert!(build_scraper(d, assembler()).is_err());
    }

    #[test]
    fn test_detail_uses_summary_title() {
        let scraper = GenericDealerScraper::new(dealer(), assembler());
        let summary = VehicleSummary {
            detail_url: "https://demo.test/inventory/1".to_string(),
            title: "2019 Tesla Model 3".to_string(),
        };
        let listing = scraper
            .parse_detail_for("<html><body><p>VIN: 5YJ3E1EA1KF123456</p></body></html>", &summary)
            .unwrap()
            .unwrap();
        assert_eq!(listing.make, "Tesla");
        assert_eq!(listing.vin.as_deref(), Some("5YJ3E1EA1KF123456"));
    }
}
