// src/pipeline/filter.rs

//! Filter chain over assembled listings.
//!
//! Every rule is an independent predicate and a listing must pass all of
//! them. Allow-style checks (bounds and allow lists) reject a listing whose
//! field is absent; deny lists let it through.

use crate::models::{CarListing, FilterCriteria};

/// A named predicate over a listing.
struct Rule {
    name: &'static str,
    passes: fn(&CarListing, &FilterCriteria) -> bool,
}

const RULES: &[Rule] = &[
    Rule {
        name: "price",
        passes: price_in_bounds,
    },
    Rule {
        name: "new_only",
        passes: new_gate,
    },
    Rule {
        name: "mileage",
        passes: mileage_in_bounds,
    },
    Rule {
        name: "condition",
        passes: condition_allowed,
    },
    Rule {
        name: "year",
        passes: year_in_bounds,
    },
    Rule {
        name: "make",
        passes: make_allowed,
    },
    Rule {
        name: "model",
        passes: model_allowed,
    },
    Rule {
        name: "drivetrain",
        passes: drivetrain_allowed,
    },
    Rule {
        name: "fuel_type",
        passes: fuel_type_allowed,
    },
    Rule {
        name: "dealer",
        passes: dealer_allowed,
    },
    Rule {
        name: "location",
        passes: location_allowed,
    },
    Rule {
        name: "status",
        passes: status_allowed,
    },
];

/// Keep the listings that satisfy every criterion, in input order.
pub fn apply<'a>(listings: &'a [CarListing], criteria: &FilterCriteria) -> Vec<&'a CarListing> {
    let kept: Vec<&CarListing> = listings
        .iter()
        .filter(|listing| match rejected_by(listing, criteria) {
            Some(rule) => {
                log::debug!("Filtered out {} ({})", listing.display_name(), rule);
                false
            }
            None => true,
        })
        .collect();
    log::info!("Filter kept {} of {} listings", kept.len(), listings.len());
    kept
}

/// Name of the first rule the listing fails, if any.
pub fn rejected_by(listing: &CarListing, criteria: &FilterCriteria) -> Option<&'static str> {
    RULES
        .iter()
        .find(|rule| !(rule.passes)(listing, criteria))
        .map(|rule| rule.name)
}

fn price_in_bounds(l: &CarListing, c: &FilterCriteria) -> bool {
    within(l.effective_price(), c.min_price, c.max_price)
}

/// Odometer cap applied by `new_only` when `max_mileage` is unset.
pub const NEW_MAX_MILES: u32 = 200;

fn new_gate(l: &CarListing, c: &FilterCriteria) -> bool {
    !c.new_only || l.is_new(c.max_mileage.unwrap_or(NEW_MAX_MILES))
}

fn mileage_in_bounds(l: &CarListing, c: &FilterCriteria) -> bool {
    // The new-vehicle gate owns the odometer check and its year fallback
    c.new_only || within(l.mileage_in_miles(), None, c.max_mileage)
}

fn condition_allowed(l: &CarListing, c: &FilterCriteria) -> bool {
    allow_known(c.conditions.as_deref(), l.new_used, l.new_used.is_known())
}

fn year_in_bounds(l: &CarListing, c: &FilterCriteria) -> bool {
    within(l.year, c.min_year, c.max_year)
}

fn make_allowed(l: &CarListing, c: &FilterCriteria) -> bool {
    let make = known_text(&l.make);
    allow_text(c.makes.as_deref(), make) && deny_text(&c.exclude_makes, make)
}

fn model_allowed(l: &CarListing, c: &FilterCriteria) -> bool {
    let model = known_text(&l.model);
    allow_text(c.models.as_deref(), model) && deny_text(&c.exclude_models, model)
}

fn drivetrain_allowed(l: &CarListing, c: &FilterCriteria) -> bool {
    let drivetrain = l.drivetrain.as_deref();
    allow_text(c.drivetrains.as_deref(), drivetrain) && deny_text(&c.exclude_drivetrains, drivetrain)
}

fn fuel_type_allowed(l: &CarListing, c: &FilterCriteria) -> bool {
    allow_known(c.fuel_types.as_deref(), l.fuel_type, l.fuel_type.is_known())
}

fn dealer_allowed(l: &CarListing, c: &FilterCriteria) -> bool {
    let dealer = known_text(&l.dealer_name);
    allow_text(c.dealers.as_deref(), dealer) && deny_text(&c.exclude_dealers, dealer)
}

fn location_allowed(l: &CarListing, c: &FilterCriteria) -> bool {
    allow_text(c.cities.as_deref(), l.dealer_location_city.as_deref())
        && allow_text(c.states.as_deref(), l.dealer_location_state.as_deref())
}

fn status_allowed(l: &CarListing, c: &FilterCriteria) -> bool {
    let known = l.in_stock_status.is_known();
    allow_known(c.statuses.as_deref(), l.in_stock_status, known)
        && !(known && c.exclude_statuses.contains(&l.in_stock_status))
}

/// Bounds check; an absent value fails any bound that is set.
fn within<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(v) = value else {
        return false;
    };
    min.is_none_or(|m| v >= m) && max.is_none_or(|m| v <= m)
}

/// Text counts as absent when empty or the `Unknown` placeholder.
fn known_text(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty() && !s.eq_ignore_ascii_case("unknown")).then_some(s)
}

fn allow_text(allow: Option<&[String]>, value: Option<&str>) -> bool {
    match allow {
        None => true,
        Some(list) => value.is_some_and(|v| list.iter().any(|a| a.trim().eq_ignore_ascii_case(v.trim()))),
    }
}

fn deny_text(deny: &[String], value: Option<&str>) -> bool {
    value.is_none_or(|v| !deny.iter().any(|d| d.trim().eq_ignore_ascii_case(v.trim())))
}

fn allow_known<T: PartialEq>(allow: Option<&[T]>, value: T, known: bool) -> bool {
    match allow {
        None => true,
        Some(list) => known && list.contains(&value),
    }
}
