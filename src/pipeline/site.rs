// src/pipeline/site.rs

//! Per-site scraping state machine.
//!
//! ```text
//! DISCOVER_LISTINGS → PARSE_LIST_PAGES → FETCH_DETAILS → PARSE_DETAILS → DONE
//!         └──────────────────┴─────────────────────────────────────────→ FAILED
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{CarListing, VehicleSummary};
use crate::services::{Fetcher, RobotsPolicy, SiteScraper, Throttle};
use crate::utils::request_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    DiscoverListings,
    ParseListPages,
    FetchDetails,
    ParseDetails,
    Done,
    Failed,
}

/// Why a site produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteFailure {
    RobotsDisallowed,
    NoListingUrls,
    AllListPagesFailed,
}

impl fmt::Display for SiteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RobotsDisallowed => "robots.txt disallows the inventory",
            Self::NoListingUrls => "no listing URLs",
            Self::AllListPagesFailed => "every list page failed",
        })
    }
}

/// Page counters for one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub list_total: usize,
    pub list_failed: usize,
    pub detail_total: usize,
    pub detail_failed: usize,
    /// Detail pages that parsed but held no vehicle
    pub detail_skipped: usize,
}

impl PageStats {
    pub fn detail_parsed(&self) -> usize {
        self.detail_total - self.detail_failed - self.detail_skipped
    }
}

/// Result of running one site.
#[derive(Debug, Clone)]
pub struct SiteOutcome {
    pub site_id: String,
    pub state: SiteState,
    pub failure: Option<SiteFailure>,
    pub listings: Vec<CarListing>,
    pub stats: PageStats,
    /// States entered, in order
    pub trace: Vec<SiteState>,
}

impl SiteOutcome {
    fn new(site_id: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            state: SiteState::DiscoverListings,
            failure: None,
            listings: Vec::new(),
            stats: PageStats::default(),
            trace: vec![SiteState::DiscoverListings],
        }
    }

    fn enter(&mut self, state: SiteState) {
        log::debug!("{}: {:?} -> {:?}", self.site_id, self.state, state);
        self.state = state;
        self.trace.push(state);
    }

    fn fail(mut self, failure: SiteFailure) -> Self {
        log::warn!("{}: site failed: {}", self.site_id, failure);
        self.enter(SiteState::Failed);
        self.failure = Some(failure);
        self.listings.clear();
        self
    }

    pub fn is_done(&self) -> bool {
        self.state == SiteState::Done
    }
}

/// Drives one site through its states using the injected collaborators.
#[derive(Clone)]
pub struct SiteRunner {
    fetcher: Arc<dyn Fetcher>,
    robots: Arc<dyn RobotsPolicy>,
    throttle: Arc<dyn Throttle>,
    concurrency: usize,
}

impl SiteRunner {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        robots: Arc<dyn RobotsPolicy>,
        throttle: Arc<dyn Throttle>,
    ) -> Self {
        Self {
            fetcher,
            robots,
            throttle,
            concurrency: 1,
        }
    }

    /// Bound on concurrent detail fetches (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run(&self, scraper: &dyn SiteScraper) -> SiteOutcome {
        let dealer = scraper.dealership();
        let mut outcome = SiteOutcome::new(&dealer.id);

        // DISCOVER_LISTINGS
        let listing_urls = scraper.enumerate_listing_urls();
        let Some(first_url) = listing_urls.first() else {
            return outcome.fail(SiteFailure::NoListingUrls);
        };
        if !self
            .robots
            .is_allowed(&dealer.base_url, &request_path(first_url))
            .await
        {
            return outcome.fail(SiteFailure::RobotsDisallowed);
        }

        // PARSE_LIST_PAGES
        outcome.enter(SiteState::ParseListPages);
        outcome.stats.list_total = listing_urls.len();
        let mut seen = HashSet::new();
        let mut summaries = Vec::new();
        for url in &listing_urls {
            match self.list_page(scraper, url).await {
                Ok(page_summaries) => {
                    log::debug!("{}: {} summaries on {}", dealer.id, page_summaries.len(), url);
                    summaries.extend(
                        page_summaries
                            .into_iter()
                            .filter(|s| seen.insert(s.detail_url.clone())),
                    );
                }
                Err(error) => {
                    outcome.stats.list_failed += 1;
                    log::warn!("{}: list page {} failed: {}", dealer.id, url, error);
                }
            }
        }
        if outcome.stats.list_failed == outcome.stats.list_total {
            return outcome.fail(SiteFailure::AllListPagesFailed);
        }

        // FETCH_DETAILS
        outcome.enter(SiteState::FetchDetails);
        outcome.stats.detail_total = summaries.len();
        let fetched: Vec<(VehicleSummary, Result<String>)> = stream::iter(summaries)
            .map(|summary| async move {
                self.throttle.wait(&summary.detail_url).await;
                let content = self
                    .fetcher
                    .fetch(&summary.detail_url)
                    .await
                    .and_then(|page| page.into_content());
                (summary, content)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        // PARSE_DETAILS
        outcome.enter(SiteState::ParseDetails);
        for (summary, content) in fetched {
            let parsed = content.and_then(|body| scraper.parse_detail_for(&body, &summary));
            match parsed {
                Ok(Some(listing)) => outcome.listings.push(listing),
                Ok(None) => {
                    outcome.stats.detail_skipped += 1;
                    log::debug!("{}: no vehicle on {}", dealer.id, summary.detail_url);
                }
                Err(error) => {
                    outcome.stats.detail_failed += 1;
                    log::warn!(
                        "{}: detail page {} failed: {}",
                        dealer.id,
                        summary.detail_url,
                        error
                    );
                }
            }
        }

        outcome.enter(SiteState::Done);
        log::info!(
            "{}: {} listings ({} list pages, {} details, {} failed, {} skipped)",
            dealer.id,
            outcome.listings.len(),
            outcome.stats.list_total,
            outcome.stats.detail_total,
            outcome.stats.detail_failed,
            outcome.stats.detail_skipped
        );
        outcome
    }

    async fn list_page(&self, scraper: &dyn SiteScraper, url: &str) -> Result<Vec<VehicleSummary>> {
        self.throttle.wait(url).await;
        let content = self.fetcher.fetch(url).await?.into_content()?;
        scraper.parse_list_page(&content, url)
    }
}
