// src/models/criteria.rs

//! User filter criteria for scraped listings.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{FuelType, NewUsed, StockStatus};

/// Filter criteria, usually the `[filters]` table of the config file.
///
/// `Option<Vec<_>>` fields are allow lists: `None` disables the check, while
/// `Some` requires the record to prove membership. Plain `Vec<_>` fields are
/// deny lists: an empty list disables the check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,

    /// Odometer cap in miles; kilometre readings are converted first
    pub max_mileage: Option<u32>,
    /// Keep only new vehicles with a near-zero odometer, see
    /// [`CarListing::is_new`](crate::models::CarListing::is_new)
    pub new_only: bool,
    /// New/used classes to keep, e.g. `["new"]`
    pub conditions: Option<Vec<NewUsed>>,

    pub min_year: Option<i32>,
    pub max_year: Option<i32>,

    pub makes: Option<Vec<String>>,
    pub exclude_makes: Vec<String>,
    pub models: Option<Vec<String>>,
    pub exclude_models: Vec<String>,

    pub drivetrains: Option<Vec<String>>,
    pub exclude_drivetrains: Vec<String>,

    pub fuel_types: Option<Vec<FuelType>>,

    pub dealers: Option<Vec<String>>,
    pub exclude_dealers: Vec<String>,
    pub cities: Option<Vec<String>>,
    pub states: Option<Vec<String>>,

    pub statuses: Option<Vec<StockStatus>>,
    pub exclude_statuses: Vec<StockStatus>,
}

impl FilterCriteria {
    /// Check the criteria for contradictions before any scraping starts.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("min_price", self.min_price), ("max_price", self.max_price)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(AppError::config(format!(
                        "filters.{name} must be a non-negative number, got {v}"
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(AppError::config(format!(
                    "filters.min_price ({min}) is greater than filters.max_price ({max})"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_year, self.max_year) {
            if min > max {
                return Err(AppError::config(format!(
                    "filters.min_year ({min}) is greater than filters.max_year ({max})"
                )));
            }
        }

        check_overlap("makes", self.makes.as_deref(), &self.exclude_makes)?;
        check_overlap("models", self.models.as_deref(), &self.exclude_models)?;
        check_overlap(
            "drivetrains",
            self.drivetrains.as_deref(),
            &self.exclude_drivetrains,
        )?;
        check_overlap("dealers", self.dealers.as_deref(), &self.exclude_dealers)?;

        if let Some(statuses) = &self.statuses {
            if let Some(s) = statuses.iter().find(|s| self.exclude_statuses.contains(s)) {
                return Err(AppError::config(format!(
                    "filters: status '{s}' is both allowed and excluded"
                )));
            }
        }
        Ok(())
    }

    /// True if no criterion is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn check_overlap(dimension: &str, allow: Option<&[String]>, deny: &[String]) -> Result<()> {
    let Some(allow) = allow else {
        return Ok(());
    };
    for value in allow {
        if deny.iter().any(|d| d.eq_ignore_ascii_case(value)) {
            return Err(AppError::config(format!(
                "filters: '{value}' is both in {dimension} and exclude_{dimension}"
            )));
        }
    }
    Ok(())
}
