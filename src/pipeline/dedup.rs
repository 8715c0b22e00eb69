// src/pipeline/dedup.rs

//! Cross-site duplicate removal.

use std::collections::HashSet;

use crate::models::CarListing;
use crate::utils::url_key;

/// Counts from a dedup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub input: usize,
    pub by_vin: usize,
    pub by_url: usize,
}

impl DedupStats {
    pub fn removed(&self) -> usize {
        self.by_vin + self.by_url
    }
}

/// Drop repeated vehicles, keeping the first occurrence.
///
/// Listings sharing a VIN are duplicates regardless of URL; listings without
/// a VIN are compared by normalized detail URL.
pub fn dedup(listings: Vec<CarListing>) -> (Vec<CarListing>, DedupStats) {
    let mut stats = DedupStats {
        input: listings.len(),
        ..Default::default()
    };
    let mut vins = HashSet::new();
    let mut urls = HashSet::new();
    let mut kept = Vec::with_capacity(listings.len());

    for listing in listings {
        let key = url_key(&listing.vehicle_url);
        if let Some(vin) = listing.vin.as_deref().map(str::to_ascii_uppercase) {
            if !vins.insert(vin) {
                stats.by_vin += 1;
                continue;
            }
        } else if urls.contains(&key) {
            stats.by_url += 1;
            continue;
        }
        urls.insert(key);
        kept.push(listing);
    }

    if stats.removed() > 0 {
        log::info!(
            "Removed {} duplicate listings ({} by VIN, {} by URL)",
            stats.removed(),
            stats.by_vin,
            stats.by_url
        );
    }
    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(url: &str, vin: Option<&str>) -> CarListing {
        let mut c = CarListing::new("Demo", "https://d.test", url, "Tesla", "Model 3");
        c.vin = vin.map(str::to_string);
        c
    }

    #[test]
    fn test_dedup_by_vin_keeps_first() {
        let cars = vec![
            car("https://a.test/1", Some("5YJ3E1EA7KF317000")),
            car("https://b.test/9", Some("5yj3e1ea7kf317000")),
            car("https://a.test/2", Some("1FA6P8TH0J5100000")),
        ];
        let (kept, stats) = dedup(cars);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].vehicle_url, "https://a.test/1");
        assert_eq!(stats.by_vin, 1);
        assert_eq!(stats.input, 3);
    }

    #[test]
    fn test_dedup_by_url_without_vin() {
        let cars = vec![
            car("https://a.test/inventory/1", None),
            car("https://A.test/inventory/1/#gallery", None),
            car("https://a.test/inventory/2", None),
        ];
        let (kept, stats) = dedup(cars);
        assert_eq!(kept.len(), 2);
        assert_eq!(stats.by_url, 1);
        assert_eq!(stats.removed(), 1);
    }

    #[test]
    fn test_vinless_repeat_of_vin_url_is_dropped() {
        let cars = vec![
            car("https://a.test/1", Some("5YJ3E1EA7KF317000")),
            car("https://a.test/1", None),
        ];
        let (kept, stats) = dedup(cars);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.by_url, 1);
    }
}
