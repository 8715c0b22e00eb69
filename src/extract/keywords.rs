// src/extract/keywords.rs

//! Field label vocabulary used to locate values on a detail page.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Logical listing field that can be located on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Unlabeled or generic price
    Price,
    Msrp,
    SalePrice,
    TotalPrice,
    Vin,
    StockNumber,
    Mileage,
    Condition,
    FuelType,
    Availability,
    Drivetrain,
    Transmission,
    BodyStyle,
    ExteriorColor,
    InteriorColor,
}

impl Field {
    pub const ALL: [Field; 15] = [
        Field::Price,
        Field::Msrp,
        Field::SalePrice,
        Field::TotalPrice,
        Field::Vin,
        Field::StockNumber,
        Field::Mileage,
        Field::Condition,
        Field::FuelType,
        Field::Availability,
        Field::Drivetrain,
        Field::Transmission,
        Field::BodyStyle,
        Field::ExteriorColor,
        Field::InteriorColor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Price => "price",
            Field::Msrp => "msrp",
            Field::SalePrice => "sale_price",
            Field::TotalPrice => "total_price",
            Field::Vin => "vin",
            Field::StockNumber => "stock_number",
            Field::Mileage => "mileage",
            Field::Condition => "condition",
            Field::FuelType => "fuel_type",
            Field::Availability => "availability",
            Field::Drivetrain => "drivetrain",
            Field::Transmission => "transmission",
            Field::BodyStyle => "body_style",
            Field::ExteriorColor => "exterior_color",
            Field::InteriorColor => "interior_color",
        }
    }
}

/// Built-in labels, most specific first.
///
/// Classification fields (condition, fuel type, availability) only carry
/// their *labels* here; the value vocabulary lives in the normalizer rules.
const BUILTIN: &[(Field, &[&str])] = &[
    (Field::Price, &["Price"]),
    (
        Field::Msrp,
        &[
            "MSRP",
            "Manufacturer's Suggested Retail Price",
            "Sticker Price",
            "Retail Price",
        ],
    ),
    (
        Field::SalePrice,
        &[
            "Sale Price",
            "Internet Price",
            "Our Price",
            "Dealer Price",
            "No Bull Price",
            "One Price",
            "E-Price",
            "ePrice",
            "Special Price",
            "Your Price",
        ],
    ),
    (
        Field::TotalPrice,
        &["Total Price", "Final Price", "Out the Door", "OTD Price"],
    ),
    (Field::Vin, &["VIN", "Vehicle Identification Number"]),
    (
        Field::StockNumber,
        &["Stock #", "Stock Number", "Stock No", "Stk #", "Stock:"],
    ),
    (Field::Mileage, &["Mileage", "Odometer", "Miles"]),
    (Field::Condition, &["Condition", "Vehicle Type"]),
    (
        Field::FuelType,
        &["Fuel Type", "Fuel", "Powertrain", "Engine Type"],
    ),
    (Field::Availability, &["Availability", "Stock Status", "Status"]),
    (
        Field::Drivetrain,
        &["Drivetrain", "Drive Train", "Drive Type", "Drive Line"],
    ),
    (Field::Transmission, &["Transmission"]),
    (Field::BodyStyle, &["Body Style", "Body Type", "Body"]),
    (
        Field::ExteriorColor,
        &["Exterior Color", "Ext. Color", "Exterior"],
    ),
    (
        Field::InteriorColor,
        &["Interior Color", "Int. Color", "Interior"],
    ),
];

/// Immutable field → labels mapping, built once and shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    entries: HashMap<Field, Vec<String>>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KeywordTable {
    /// The built-in dealership vocabulary.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(field, labels)| (*field, labels.iter().map(|l| l.to_string()).collect()))
            .collect();
        Self { entries }
    }

    /// Built-in table with some fields replaced by configured labels.
    pub fn with_overrides(overrides: &BTreeMap<Field, Vec<String>>) -> Self {
        let mut table = Self::builtin();
        for (field, labels) in overrides {
            let labels: Vec<String> = labels
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            if !labels.is_empty() {
                table.entries.insert(*field, labels);
            }
        }
        table
    }

    /// Labels for a field in priority order.
    pub fn keywords(&self, field: Field) -> &[String] {
        self.entries.get(&field).map_or(&[], Vec::as_slice)
    }
}
