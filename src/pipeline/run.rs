// src/pipeline/run.rs

//! Multi-site run with checkpoint resume.

use crate::error::Result;
use crate::models::CarListing;
use crate::pipeline::site::{PageStats, SiteFailure, SiteRunner, SiteState};
use crate::services::SiteScraper;
use crate::storage::{Checkpoint, ListingStorage};

/// Summary line for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteReport {
    pub site_id: String,
    pub state: SiteState,
    pub failure: Option<SiteFailure>,
    pub stats: PageStats,
    pub listing_count: usize,
    /// Listings were taken from the checkpoint instead of scraped
    pub resumed: bool,
}

/// Everything a run produced, in site order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sites: Vec<SiteReport>,
    pub listings: Vec<CarListing>,
}

impl RunReport {
    /// Detail pages that yielded a listing.
    pub fn processed(&self) -> usize {
        self.sites.iter().map(|s| s.stats.detail_parsed()).sum()
    }

    /// Detail pages with no vehicle on them.
    pub fn skipped(&self) -> usize {
        self.sites.iter().map(|s| s.stats.detail_skipped).sum()
    }

    /// Pages that could not be fetched or parsed.
    pub fn failed(&self) -> usize {
        self.sites
            .iter()
            .map(|s| s.stats.detail_failed + s.stats.list_failed)
            .sum()
    }

    pub fn failed_sites(&self) -> usize {
        self.sites
            .iter()
            .filter(|s| s.state == SiteState::Failed)
            .count()
    }
}

/// Run every site in order, collecting listings.
///
/// Completed sites are checkpointed as they finish. With `resume`, sites in
/// an existing checkpoint are not scraped again and their stored listings are
/// reused. Checkpoint write failures are logged and do not stop the run.
pub async fn run_all(
    runner: &SiteRunner,
    scrapers: &[Box<dyn SiteScraper>],
    storage: &dyn ListingStorage,
    resume: bool,
) -> Result<RunReport> {
    let mut checkpoint = if resume {
        match storage.load_checkpoint().await? {
            Some(cp) => {
                log::info!(
                    "Resuming: {} sites and {} listings already done",
                    cp.completed.len(),
                    cp.listing_count()
                );
                cp
            }
            None => {
                log::info!("No checkpoint found, starting fresh");
                Checkpoint::default()
            }
        }
    } else {
        Checkpoint::default()
    };

    let mut report = RunReport::default();
    for (index, scraper) in scrapers.iter().enumerate() {
        let dealer = scraper.dealership();
        log::info!(
            "[{}/{}] {} ({})",
            index + 1,
            scrapers.len(),
            dealer.name,
            dealer.id
        );

        if let Some(done) = checkpoint.completed.get(&dealer.id) {
            log::info!("{}: skipped, {} listings from checkpoint", dealer.id, done.len());
            report.sites.push(SiteReport {
                site_id: dealer.id.clone(),
                state: SiteState::Done,
                failure: None,
                stats: PageStats::default(),
                listing_count: done.len(),
                resumed: true,
            });
            report.listings.extend(done.iter().cloned());
            continue;
        }

        let outcome = runner.run(scraper.as_ref()).await;
        report.sites.push(SiteReport {
            site_id: outcome.site_id.clone(),
            state: outcome.state,
            failure: outcome.failure,
            stats: outcome.stats,
            listing_count: outcome.listings.len(),
            resumed: false,
        });

        if outcome.is_done() {
            checkpoint.record(outcome.site_id.clone(), outcome.listings.clone());
            if let Err(e) = storage.save_checkpoint(&checkpoint).await {
                log::warn!("Checkpoint save failed after {}: {}", outcome.site_id, e);
            }
        }
        report.listings.extend(outcome.listings);
    }

    log::info!(
        "Run finished: {} listings, {} processed, {} skipped, {} failed pages, {} failed sites",
        report.listings.len(),
        report.processed(),
        report.skipped(),
        report.failed(),
        report.failed_sites()
    );
    Ok(report)
}
