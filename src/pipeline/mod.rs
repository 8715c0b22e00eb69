//! Pipeline stages from site scraping to the final listing set.
//!
//! - `site`: per-site state machine (discover, list pages, details)
//! - `run`: drive all sites with checkpoint resume
//! - `validate`: drop implausible or placeholder records
//! - `dedup`: drop repeated vehicles across sites
//! - `filter`: apply user criteria

pub mod dedup;
pub mod filter;
pub mod run;
pub mod site;
pub mod validate;

pub use dedup::{DedupStats, dedup};
pub use run::{RunReport, SiteReport, run_all};
pub use site::{PageStats, SiteFailure, SiteOutcome, SiteRunner, SiteState};
pub use validate::{ValidationReport, validate};
