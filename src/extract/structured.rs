// src/extract/structured.rs

//! schema.org JSON-LD extraction for vehicle detail pages.

use scraper::Selector;
use serde_json::Value;

use crate::extract::document::{HtmlPage, collapse_whitespace};

const VEHICLE_TYPES: &[&str] = &["Vehicle", "Car", "Automobile", "MotorVehicle"];
const PRODUCT_TYPES: &[&str] = &["Product", "IndividualProduct"];

/// Raw vehicle fields found in embedded structured data.
///
/// Values are kept as text and go through the same normalizers as
/// heuristically extracted values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredVehicle {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub vin: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub availability: Option<String>,
    pub condition: Option<String>,
    pub mileage: Option<String>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub fuel_type: Option<String>,
    pub drivetrain: Option<String>,
    pub transmission: Option<String>,
    pub body_style: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
}

impl StructuredVehicle {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Extract the first vehicle (or, failing that, product) node from the
/// page's JSON-LD blocks. Malformed blocks are ignored.
pub fn extract_structured(page: &HtmlPage) -> StructuredVehicle {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return StructuredVehicle::default();
    };

    let mut candidates = Vec::new();
    for script in page.html().select(&selector) {
        let raw: String = script.text().collect();
        let raw = raw
            .trim()
            .trim_start_matches("<!--")
            .trim_end_matches("-->")
            .trim();
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => collect_nodes(value, &mut candidates),
            Err(e) => log::debug!("Ignoring malformed JSON-LD on {}: {}", page.url_str(), e),
        }
    }

    candidates
        .iter()
        .find(|node| has_type(node, VEHICLE_TYPES))
        .or_else(|| candidates.iter().find(|node| has_type(node, PRODUCT_TYPES)))
        .map(to_vehicle)
        .unwrap_or_default()
}

/// Flatten top-level objects, arrays and `@graph` containers.
fn collect_nodes(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| collect_nodes(item, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                collect_nodes(graph, out);
            }
            out.push(Value::Object(map));
        }
        _ => {}
    }
}

fn has_type(node: &Value, accepted: &[&str]) -> bool {
    let matches = |t: &str| {
        let t = t.rsplit('/').next().unwrap_or(t);
        accepted.iter().any(|a| a.eq_ignore_ascii_case(t))
    };
    match node.get("@type") {
        Some(Value::String(s)) => matches(s),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

fn to_vehicle(node: &Value) -> StructuredVehicle {
    let offer = node.get("offers").map(|o| match o {
        Value::Array(items) => items.first().unwrap_or(o),
        _ => o,
    });

    StructuredVehicle {
        name: text(node.get("name")),
        brand: text(node.get("brand")).or_else(|| text(node.get("manufacturer"))),
        model: text(node.get("model")),
        year: text(node.get("vehicleModelDate"))
            .or_else(|| text(node.get("modelDate")))
            .or_else(|| text(node.get("productionDate"))),
        vin: text(node.get("vehicleIdentificationNumber"))
            .or_else(|| text(node.get("vin")))
            .or_else(|| text(node.get("identifier")))
            .or_else(|| text(node.get("sku"))),
        price: offer.and_then(|o| {
            text(o.get("price")).or_else(|| text(o.get("priceSpecification")?.get("price")))
        }),
        currency: offer.and_then(|o| text(o.get("priceCurrency"))),
        availability: offer.and_then(|o| text(o.get("availability")).map(|v| schema_enum(&v))),
        condition: text(node.get("itemCondition"))
            .or_else(|| offer.and_then(|o| text(o.get("itemCondition"))))
            .map(|v| schema_enum(&v)),
        mileage: node.get("mileageFromOdometer").and_then(mileage_text),
        exterior_color: text(node.get("color")),
        interior_color: text(node.get("vehicleInteriorColor")),
        fuel_type: text(node.get("fuelType")),
        drivetrain: text(node.get("driveWheelConfiguration")).map(|v| schema_enum(&v)),
        transmission: text(node.get("vehicleTransmission")),
        body_style: text(node.get("bodyType")),
        description: text(node.get("description")),
        images: images(node.get("image")),
    }
}

/// Text of a JSON-LD value: strings, numbers, `{name}`/`{value}` objects, or
/// the first element of an array.
fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => collapse_whitespace(s),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => return text(items.first()),
        Value::Object(map) => {
            return text(map.get("name"))
                .or_else(|| text(map.get("value")))
                .or_else(|| text(map.get("@value")));
        }
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// `https://schema.org/UsedCondition` → `Used Condition`.
fn schema_enum(value: &str) -> String {
    let tail = value.rsplit('/').next().unwrap_or(value);
    let mut out = String::with_capacity(tail.len() + 4);
    for (i, c) in tail.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

fn mileage_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            let amount = text(map.get("value"))?;
            let unit = match text(map.get("unitCode")).as_deref() {
                Some("KMT") => "km",
                _ => "mi",
            };
            Some(format!("{amount} {unit}"))
        }
        other => text(Some(other)),
    }
}

fn images(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(map) => text(map.get("url")).or_else(|| text(map.get("contentUrl"))),
                _ => None,
            })
            .collect(),
        Some(Value::Object(map)) => text(map.get("url")).into_iter().collect(),
        _ => Vec::new(),
    }
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(json: &str) -> HtmlPage {
        HtmlPage::parse(
            &format!(
                "<html><head><script type=\"application/ld+json\">{json}</script></head>\
                 <body><h1>x</h1></body></html>"
            ),
            "https://d.test/v/1",
        )
    }

    #[test]
    fn test_vehicle_node() {
        let page = page_with(
            r#"{
                "@context": "https://schema.org",
                "@type": "Car",
                "name": "2022 Kia EV6 Wind",
                "brand": {"@type": "Brand", "name": "Kia"},
                "model": "EV6",
                "vehicleModelDate": "2022",
                "vehicleIdentificationNumber": "KNDC34LA5N5012345",
                "itemCondition": "https://schema.org/UsedCondition",
                "mileageFromOdometer": {"@type": "QuantitativeValue", "value": 18000, "unitCode": "SMI"},
                "color": "Glacier White",
                "fuelType": "Electric",
                "image": ["https://cdn.d.test/1.jpg", {"url": "https://cdn.d.test/2.jpg"}],
                "offers": {"@type": "Offer", "price": 38990, "priceCurrency": "USD",
                           "availability": "https://schema.org/InStock"}
            }"#,
        );
        let v = extract_structured(&page);
        assert_eq!(v.name.as_deref(), Some("2022 Kia EV6 Wind"));
        assert_eq!(v.brand.as_deref(), Some("Kia"));
        assert_eq!(v.model.as_deref(), Some("EV6"));
        assert_eq!(v.year.as_deref(), Some("2022"));
        assert_eq!(v.vin.as_deref(), Some("KNDC34LA5N5012345"));
        assert_eq!(v.price.as_deref(), Some("38990"));
        assert_eq!(v.currency.as_deref(), Some("USD"));
        assert_eq!(v.availability.as_deref(), Some("In Stock"));
        assert_eq!(v.condition.as_deref(), Some("Used Condition"));
        assert_eq!(v.mileage.as_deref(), Some("18000 mi"));
        assert_eq!(v.images.len(), 2);
    }

    #[test]
    fn test_graph_and_array_containers() {
        let page = page_with(
            r#"[{"@type": "WebPage", "name": "Page"},
                {"@graph": [{"@type": "Organization", "name": "Dealer"},
                            {"@type": ["Product", "Vehicle"], "name": "2021 Tesla Model Y",
                             "offers": [{"price": "45,000"}]}]}]"#,
        );
        let v = extract_structured(&page);
        assert_eq!(v.name.as_deref(), Some("2021 Tesla Model Y"));
        assert_eq!(v.price.as_deref(), Some("45,000"));
    }

    #[test]
    fn test_product_used_when_no_vehicle() {
        let page = page_with(r#"{"@type": "Product", "name": "2020 Ford F-150", "sku": "STK1"}"#);
        let v = extract_structured(&page);
        assert_eq!(v.name.as_deref(), Some("2020 Ford F-150"));
        assert_eq!(v.vin.as_deref(), Some("STK1"));
    }

    #[test]
    fn test_malformed_or_absent_is_empty() {
        assert!(extract_structured(&page_with("{not json")).is_empty());
        assert!(extract_structured(&page_with(r#"{"@type": "Organization"}"#)).is_empty());
        let plain = HtmlPage::parse("<html><body>hi</body></html>", "https://d.test/");
        assert!(extract_structured(&plain).is_empty());
    }
}
