// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod criteria;
mod dealership;
mod listing;

// Re-export all public types
pub use config::{Config, LoggingConfig, OutputConfig, OutputFormat, ScraperConfig};
pub use criteria::FilterCriteria;
pub use dealership::{Dealership, Pagination, SiteSelectors};
pub use listing::{CarListing, FuelType, MileageUnit, NewUsed, StockStatus, VehicleSummary};
