// src/models/listing.rs

//! Vehicle listing records and their classification enums.
//!
//! Field names and enum literals are serialized as-is and form the public
//! output contract; renaming any of them is a breaking change.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// New/used classification of a vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewUsed {
    New,
    Used,
    Cpo,
    #[default]
    Unknown,
}

/// Fuel/powertrain classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FuelType {
    Electric,
    Hybrid,
    PlugInHybrid,
    Gas,
    #[default]
    Unknown,
}

/// Stock availability of a vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    InTransit,
    Sold,
    Reserved,
    #[default]
    Unknown,
}

/// Odometer unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MileageUnit {
    #[default]
    Mi,
    Km,
}

macro_rules! impl_literal {
    ($ty:ty { $($variant:ident => $lit:literal),+ $(,)? }) => {
        impl $ty {
            /// Serialized literal for this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $lit,)+
                }
            }

            /// Inverse of [`Self::as_str`], case-insensitive.
            pub fn from_literal(s: &str) -> Option<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($lit => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_literal!(NewUsed { New => "new", Used => "used", Cpo => "cpo", Unknown => "unknown" });
impl_literal!(FuelType {
    Electric => "electric",
    Hybrid => "hybrid",
    PlugInHybrid => "plug-in-hybrid",
    Gas => "gas",
    Unknown => "unknown",
});
impl_literal!(StockStatus {
    Available => "available",
    InTransit => "in_transit",
    Sold => "sold",
    Reserved => "reserved",
    Unknown => "unknown",
});
impl_literal!(MileageUnit { Mi => "mi", Km => "km" });

impl NewUsed {
    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

impl FuelType {
    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

impl StockStatus {
    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

/// A vehicle link found on an inventory list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleSummary {
    /// Absolute URL of the vehicle detail page
    pub detail_url: String,

    /// Raw card title, may be empty
    pub title: String,
}

/// A single vehicle scraped from a dealership detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarListing {
    pub dealer_name: String,
    pub dealer_website: String,
    pub vehicle_url: String,

    pub year: Option<i32>,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub trim: Option<String>,

    #[serde(default)]
    pub new_used: NewUsed,
    #[serde(default)]
    pub fuel_type: FuelType,
    #[serde(default)]
    pub drivetrain: Option<String>,
    #[serde(default)]
    pub transmission: Option<String>,
    #[serde(default)]
    pub body_style: Option<String>,

    #[serde(default)]
    pub msrp: Option<f64>,
    #[serde(default)]
    pub sale_price: Option<f64>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub price_note: Option<String>,

    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub stock_number: Option<String>,

    #[serde(default)]
    pub mileage: Option<u32>,
    #[serde(default)]
    pub mileage_units: MileageUnit,

    #[serde(default)]
    pub in_stock_status: StockStatus,

    #[serde(default)]
    pub exterior_color: Option<String>,
    #[serde(default)]
    pub interior_color: Option<String>,
    #[serde(default)]
    pub dealer_location_city: Option<String>,
    #[serde(default)]
    pub dealer_location_state: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,

    /// Set once when the record is assembled
    pub scraped_at: DateTime<Utc>,
}

const MILES_PER_KM: f64 = 0.621_371;

pub fn default_currency() -> String {
    "USD".to_string()
}

impl CarListing {
    /// Create a listing with identity fields set and everything else absent.
    pub fn new(
        dealer_name: impl Into<String>,
        dealer_website: impl Into<String>,
        vehicle_url: impl Into<String>,
        make: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            dealer_name: dealer_name.into(),
            dealer_website: dealer_website.into(),
            vehicle_url: vehicle_url.into(),
            year: None,
            make: make.into(),
            model: model.into(),
            trim: None,
            new_used: NewUsed::Unknown,
            fuel_type: FuelType::Unknown,
            drivetrain: None,
            transmission: None,
            body_style: None,
            msrp: None,
            sale_price: None,
            total_price: None,
            currency: default_currency(),
            price_note: None,
            vin: None,
            stock_number: None,
            mileage: None,
            mileage_units: MileageUnit::Mi,
            in_stock_status: StockStatus::Unknown,
            exterior_color: None,
            interior_color: None,
            dealer_location_city: None,
            dealer_location_state: None,
            images: Vec::new(),
            description: None,
            features: Vec::new(),
            scraped_at: Utc::now(),
        }
    }

    /// Price used for bounds checks: sale, then total, then MSRP.
    pub fn effective_price(&self) -> Option<f64> {
        self.sale_price.or(self.total_price).or(self.msrp)
    }

    /// Odometer reading converted to miles.
    pub fn mileage_in_miles(&self) -> Option<u32> {
        self.mileage.map(|m| match self.mileage_units {
            MileageUnit::Mi => m,
            MileageUnit::Km => (f64::from(m) * MILES_PER_KM).round() as u32,
        })
    }

    /// A new vehicle with at most `max_miles` on the odometer.
    ///
    /// Without a reading, only current and last model years count as new.
    pub fn is_new(&self, max_miles: u32) -> bool {
        if self.new_used != NewUsed::New {
            return false;
        }
        match self.mileage_in_miles() {
            Some(miles) => miles <= max_miles,
            None => self.year.is_some_and(|y| y >= Utc::now().year() - 1),
        }
    }

    /// Short human-readable label, e.g. `2019 Tesla Model 3 Long Range`.
    pub fn display_name(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        if let Some(year) = self.year {
            parts.push(year.to_string());
        }
        parts.push(self.make.clone());
        parts.push(self.model.clone());
        if let Some(trim) = &self.trim {
            parts.push(trim.clone());
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_literals_are_stable() {
        assert_eq!(serde_json::to_string(&NewUsed::Cpo).unwrap(), "\"cpo\"");
        assert_eq!(
            serde_json::to_string(&FuelType::PlugInHybrid).unwrap(),
            "\"plug-in-hybrid\""
        );
        assert_eq!(
            serde_json::to_string(&StockStatus::InTransit).unwrap(),
            "\"in_transit\""
        );
        assert_eq!(serde_json::to_string(&MileageUnit::Km).unwrap(), "\"km\"");
        assert_eq!(FuelType::PlugInHybrid.as_str(), "plug-in-hybrid");
        assert_eq!(StockStatus::InTransit.to_string(), "in_transit");
    }

    #[test]
    fn test_effective_price_precedence() {
        let mut car = CarListing::new("D", "https://d.test", "https://d.test/v/1", "Kia", "EV6");
        assert_eq!(car.effective_price(), None);

        car.msrp = Some(50_000.0);
        assert_eq!(car.effective_price(), Some(50_000.0));

        car.total_price = Some(48_000.0);
        assert_eq!(car.effective_price(), Some(48_000.0));

        car.sale_price = Some(45_000.0);
        assert_eq!(car.effective_price(), Some(45_000.0));
    }

    #[test]
    fn test_literal_parsing() {
        assert_eq!(NewUsed::from_literal("CPO"), Some(NewUsed::Cpo));
        assert_eq!(FuelType::from_literal("plug-in-hybrid"), Some(FuelType::PlugInHybrid));
        assert_eq!(StockStatus::from_literal("in_transit"), Some(StockStatus::InTransit));
        assert_eq!(MileageUnit::from_literal("km"), Some(MileageUnit::Km));
        assert_eq!(NewUsed::from_literal("slightly used"), None);
    }

    #[test]
    fn test_mileage_in_miles() {
        let mut car = CarListing::new("D", "https://d.test", "https://d.test/v/1", "Kia", "EV6");
        assert_eq!(car.mileage_in_miles(), None);
        car.mileage = Some(150);
        assert_eq!(car.mileage_in_miles(), Some(150));
        car.mileage_units = MileageUnit::Km;
        assert_eq!(car.mileage_in_miles(), Some(93));
    }

    #[test]
    fn test_is_new() {
        let mut car = CarListing::new("D", "https://d.test", "https://d.test/v/1", "Kia", "EV6");
        car.year = Some(Utc::now().year());
        assert!(!car.is_new(200));

        car.new_used = NewUsed::New;
        assert!(car.is_new(200));
        car.year = Some(Utc::now().year() - 3);
        assert!(!car.is_new(200));

        car.mileage = Some(12);
        assert!(car.is_new(200));
        car.mileage = Some(4_000);
        assert!(!car.is_new(200));
    }

    #[test]
    fn test_display_name() {
        let mut car = CarListing::new("D", "https://d.test", "https://d.test/v/1", "Tesla", "Model 3");
        car.year = Some(2019);
        car.trim = Some("Long Range".to_string());
        assert_eq!(car.display_name(), "2019 Tesla Model 3 Long Range");
    }
}
