//! Collaborators used by the site orchestrator.
//!
//! - `Fetcher`: page retrieval (`HttpFetcher`, `CachingFetcher`)
//! - `RobotsPolicy`: robots.txt gate (`RobotsTxtPolicy`, `AllowAll`)
//! - `Throttle`: request pacing (`FixedDelay`, `NoDelay`)
//! - `SiteScraper`: per-dealership parsing (`GenericDealerScraper`, `SelectorDealerScraper`)

pub mod fetcher;
pub mod robots;
pub mod scrapers;
pub mod throttle;

pub use fetcher::{CachingFetcher, FetchedPage, Fetcher, HttpFetcher};
pub use robots::{AllowAll, RobotsPolicy, RobotsTxt, RobotsTxtPolicy};
pub use scrapers::{GenericDealerScraper, SelectorDealerScraper, SiteScraper, build_scraper};
pub use throttle::{FixedDelay, NoDelay, Throttle};
