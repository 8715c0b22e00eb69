//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::extract::Field;
use crate::models::{Dealership, FilterCriteria};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and scraping behavior settings
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Output file settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Listing filter criteria
    #[serde(default)]
    pub filters: FilterCriteria,

    /// Per-field label overrides, replacing the built-in keyword lists
    #[serde(default)]
    pub keywords: BTreeMap<Field, Vec<String>>,

    /// Optional CSV file with additional dealerships
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dealerships_csv: Option<PathBuf>,

    /// Dealership definitions
    #[serde(default)]
    pub dealerships: Vec<Dealership>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::validation("scraper.user_agent is empty"));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(AppError::validation("scraper.timeout_secs must be > 0"));
        }
        if self.scraper.max_concurrent == 0 {
            return Err(AppError::validation("scraper.max_concurrent must be > 0"));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(AppError::validation("output.path is empty"));
        }
        for (field, labels) in &self.keywords {
            if labels.iter().all(|l| l.trim().is_empty()) {
                return Err(AppError::validation(format!(
                    "keywords.{} has no usable labels",
                    field.as_str()
                )));
            }
        }
        for dealer in &self.dealerships {
            if dealer.id.trim().is_empty() || dealer.name.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "dealership {:?} needs both id and name",
                    dealer.base_url
                )));
            }
            url::Url::parse(&dealer.base_url).map_err(|e| {
                AppError::validation(format!(
                    "dealership '{}' has invalid base_url: {e}",
                    dealer.id
                ))
            })?;
        }
        self.filters.validate()
    }
}

/// HTTP client and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum delay between requests to the same site, in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent detail-page fetches per site
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Honor robots.txt
    #[serde(default = "defaults::enabled")]
    pub respect_robots: bool,

    /// Memoize fetched pages for the lifetime of the run
    #[serde(default = "defaults::enabled")]
    pub cache_pages: bool,

    #[serde(default = "defaults::max_images")]
    pub max_images: usize,

    #[serde(default = "defaults::max_features")]
    pub max_features: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            respect_robots: defaults::enabled(),
            cache_pages: defaults::enabled(),
            max_images: defaults::max_images(),
            max_features: defaults::max_features(),
        }
    }
}

/// Serialization format of the output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pick from the file extension, JSON if unknown
    #[default]
    Auto,
    Json,
    Jsonl,
    Csv,
}

impl OutputFormat {
    /// Resolve `Auto` against a file path.
    pub fn resolve(self, path: &Path) -> Self {
        if self != Self::Auto {
            return self;
        }
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("csv") => Self::Csv,
            Some("jsonl") | Some("ndjson") => Self::Jsonl,
            _ => Self::Json,
        }
    }
}

/// Output file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "defaults::output_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub format: OutputFormat,

    /// Source tag written into the run metadata
    #[serde(default = "defaults::source")]
    pub source: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: defaults::output_path(),
            format: OutputFormat::default(),
            source: defaults::source(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `env_logger` filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; dealer-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn enabled() -> bool {
        true
    }
    pub fn max_images() -> usize {
        10
    }
    pub fn max_features() -> usize {
        20
    }

    pub fn output_path() -> PathBuf {
        PathBuf::from("cars.json")
    }
    pub fn source() -> String {
        "dealer-crawler".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.scraper.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.scraper.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_filters() {
        let mut config = Config::default();
        config.filters.min_year = Some(2030);
        config.filters.max_year = Some(2010);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [scraper]
            request_delay_ms = 250
            respect_robots = false

            [output]
            path = "out/cars.csv"

            [filters]
            max_price = 45000
            exclude_makes = ["Fisker"]

            [keywords]
            vin = ["VIN #", "Serial"]

            [[dealerships]]
            id = "sunset"
            name = "Sunset Auto"
            base_url = "https://sunset.test"
            city = "Portland"
            pagination = { max_pages = 3 }

            [dealerships.selectors]
            card = "div.srp-card"
            link = "a.title"
            "#,
        )
        .unwrap();

        assert_eq!(config.scraper.request_delay_ms, 250);
        assert!(!config.scraper.respect_robots);
        assert_eq!(config.scraper.max_concurrent, 4);
        assert_eq!(config.output.format.resolve(&config.output.path), OutputFormat::Csv);
        assert_eq!(config.filters.exclude_makes, vec!["Fisker".to_string()]);
        assert_eq!(config.keywords[&Field::Vin], vec!["VIN #", "Serial"]);

        let dealer = &config.dealerships[0];
        assert_eq!(dealer.pagination.as_ref().unwrap().param, "page");
        assert_eq!(dealer.selectors.as_ref().unwrap().attr, "href");
        assert!(config.validate().is_ok());
    }
}
