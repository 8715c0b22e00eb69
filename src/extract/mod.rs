// src/extract/mod.rs

//! Detail-page extraction: locating labels, reading values, normalizing them
//! and assembling the final record.

pub mod assemble;
pub mod document;
pub mod keywords;
pub mod locator;
pub mod normalize;
pub mod structured;
pub mod title;
pub mod value;

pub use assemble::ListingAssembler;
pub use document::{HtmlPage, NodeFilter, TextDocument, parse_selector};
pub use keywords::{Field, KeywordTable};
pub use locator::{Candidate, locate};
pub use structured::{StructuredVehicle, extract_structured};
pub use title::{ParsedTitle, parse_title};
pub use value::{extract_labeled, extract_value, scan_fallback};
