//! Storage abstractions for listing output and run checkpoints.
//!
//! ## Output Layout
//!
//! ```text
//! {output dir}/
//! ├── cars.json            # {metadata, cars} envelope (or .jsonl / .csv)
//! └── checkpoint.json      # Completed sites of an interrupted run
//! ```

pub mod local;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CarListing, OutputFormat};

// Re-export for convenience
pub use local::LocalStorage;

/// Header written alongside the listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub timestamp: DateTime<Utc>,
    pub total_listings: usize,
    pub source: String,
}

impl RunMetadata {
    pub fn new(total_listings: usize, source: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            total_listings,
            source: source.into(),
        }
    }
}

/// JSON output envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDocument<L> {
    pub metadata: RunMetadata,
    pub cars: Vec<L>,
}

/// Result of a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Progress of an interrupted run: completed site ids and their records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub updated_at: Option<DateTime<Utc>>,
    pub completed: BTreeMap<String, Vec<CarListing>>,
}

impl Checkpoint {
    pub fn is_completed(&self, site_id: &str) -> bool {
        self.completed.contains_key(site_id)
    }

    pub fn record(&mut self, site_id: impl Into<String>, listings: Vec<CarListing>) {
        self.completed.insert(site_id.into(), listings);
        self.updated_at = Some(Utc::now());
    }

    pub fn listing_count(&self) -> usize {
        self.completed.values().map(Vec::len).sum()
    }
}

/// Output collaborator: consumes the final listing sequence.
#[async_trait]
pub trait ListingStorage: Send + Sync {
    /// Write listings in a stable field order, replacing any previous output.
    async fn write_listings(
        &self,
        listings: &[&CarListing],
        metadata: &RunMetadata,
    ) -> Result<WriteMetadata>;

    /// Load listings previously written by `write_listings`.
    async fn load_listings(&self) -> Result<Vec<CarListing>>;

    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>>;

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    async fn clear_checkpoint(&self) -> Result<()>;
}
