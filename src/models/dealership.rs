// src/models/dealership.rs

//! Dealership (site) definitions.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A dealership website to scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dealership {
    /// Stable identifier used for `--site` and checkpoints
    pub id: String,

    /// Display name copied into every listing
    pub name: String,

    /// Site root, e.g. `https://www.example-motors.com`
    pub base_url: String,

    /// Inventory search page; defaults to `{base_url}/inventory`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Query-parameter pagination of the inventory page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,

    /// Site-specific list-page selectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<SiteSelectors>,
}

/// Query-parameter pagination, e.g. `?page=2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page_param")]
    pub param: String,

    /// Highest page number to enumerate (page 1 is the bare inventory URL)
    pub max_pages: u32,
}

fn default_page_param() -> String {
    "page".to_string()
}

/// CSS selectors for a dealership's inventory list page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// Selector for each vehicle card
    pub card: String,

    /// Selector for the link element within a card (defaults to the first `a`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Selector for the title element within a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// HTML attribute holding the detail URL (usually "href")
    #[serde(default = "default_attr_name")]
    pub attr: String,
}

fn default_attr_name() -> String {
    "href".to_string()
}

impl Dealership {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            inventory_url: None,
            city: None,
            state: None,
            pagination: None,
            selectors: None,
        }
    }

    /// Inventory page URL, falling back to `{base_url}/inventory`.
    pub fn inventory_url(&self) -> String {
        self.inventory_url
            .clone()
            .unwrap_or_else(|| format!("{}/inventory", self.base_url.trim_end_matches('/')))
    }

    /// Load dealerships from a CSV file.
    ///
    /// Two header layouts are accepted:
    /// - `id,name,base_url,new_inventory_url[,city][,state]`
    /// - `Dealership Name,Website,City` (ids are derived from the name)
    ///
    /// Rows with missing fields or non-http URLs are skipped with a warning.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path.as_ref())?;
        Self::read_csv(reader)
    }

    fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Self>> {
        let headers: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_ascii_lowercase(), i))
            .collect();
        let legacy = !headers.contains_key("base_url") && headers.contains_key("website");

        let mut dealerships = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let field = |name: &str| {
                headers
                    .get(name)
                    .and_then(|&i| record.get(i))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };

            let parsed = if legacy {
                match (field("dealership name"), field("website")) {
                    (Some(name), Some(website)) => {
                        let mut d = Dealership::new(slugify(&name), name, website);
                        d.city = field("city");
                        Some(d)
                    }
                    _ => None,
                }
            } else {
                match (field("id"), field("name"), field("base_url")) {
                    (Some(id), Some(name), Some(base_url)) => {
                        let mut d = Dealership::new(id, name, base_url);
                        d.inventory_url = field("new_inventory_url").or_else(|| field("inventory_url"));
                        d.city = field("city");
                        d.state = field("state");
                        Some(d)
                    }
                    _ => None,
                }
            };

            match parsed {
                Some(d) if is_http(&d.base_url) && d.inventory_url.as_deref().is_none_or(is_http) => {
                    dealerships.push(d)
                }
                Some(d) => log::warn!("Skipping dealership '{}': base URL is not http(s)", d.name),
                None => log::warn!("Skipping dealership CSV row {}: missing fields", line + 2),
            }
        }
        Ok(dealerships)
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &str) -> Vec<Dealership> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(data.as_bytes());
        Dealership::read_csv(reader).unwrap()
    }

    #[test]
    fn test_inventory_url_default() {
        let d = Dealership::new("a", "A Motors", "https://a-motors.test/");
        assert_eq!(d.inventory_url(), "https://a-motors.test/inventory");
    }

    #[test]
    fn test_csv_standard_layout() {
        let rows = read(
            "id,name,base_url,new_inventory_url,city,state\n\
             sunset,Sunset Auto,https://sunset.test,https://sunset.test/new,Portland,OR\n\
             bad,Bad Row,ftp://bad.test,,,\n\
             ,Missing Id,https://missing.test,,,\n",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "sunset");
        assert_eq!(rows[0].inventory_url.as_deref(), Some("https://sunset.test/new"));
        assert_eq!(rows[0].city.as_deref(), Some("Portland"));
        assert_eq!(rows[0].state.as_deref(), Some("OR"));
    }

    #[test]
    fn test_csv_legacy_layout() {
        let rows = read(
            "Dealership Name,Website,City\n\
             Lakeside Ford & Kia,https://lakeside.test,Seattle\n",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "lakeside-ford-kia");
        assert_eq!(rows[0].base_url, "https://lakeside.test");
        assert_eq!(rows[0].city.as_deref(), Some("Seattle"));
        assert!(rows[0].inventory_url.is_none());
    }

    #[test]
    fn test_load_csv_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dealers.csv");
        std::fs::write(&path, "id,name,base_url\nx,X Cars,https://x.test\n").unwrap();
        let rows = Dealership::load_csv(&path).unwrap();
        assert_eq!(rows[0].name, "X Cars");
    }
}
