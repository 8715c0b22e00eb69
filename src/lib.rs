// src/lib.rs

//! Dealership Inventory Crawler Library
//!
//! Scrapes vehicle listings from dealership websites: list pages are walked
//! for detail links, detail pages are assembled into [`models::CarListing`]
//! records, and the combined set is deduplicated, filtered, and written out.

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
