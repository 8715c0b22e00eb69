//! Local filesystem storage implementation.
//!
//! Writes the listing file in JSON, JSON Lines or CSV and keeps the run
//! checkpoint next to it. Every write goes to a temporary file first and is
//! renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CarListing, FuelType, MileageUnit, NewUsed, OutputFormat, StockStatus};
use crate::storage::{Checkpoint, ListingDocument, ListingStorage, RunMetadata, WriteMetadata};

const CHECKPOINT_FILE: &str = "checkpoint.json";

/// CSV column order.
pub const CSV_HEADER: &[&str] = &[
    "dealer_name",
    "dealer_website",
    "vehicle_url",
    "year",
    "make",
    "model",
    "trim",
    "new_used",
    "fuel_type",
    "drivetrain",
    "transmission",
    "body_style",
    "msrp",
    "sale_price",
    "total_price",
    "currency",
    "price_note",
    "vin",
    "stock_number",
    "mileage",
    "mileage_units",
    "in_stock_status",
    "exterior_color",
    "interior_color",
    "dealer_location_city",
    "dealer_location_state",
    "description",
    "features",
    "images",
    "scraped_at",
];

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    output_name: String,
    format: OutputFormat,
}

impl LocalStorage {
    /// Storage writing to `output`; `Auto` is resolved from its extension.
    pub fn new(output: impl AsRef<Path>, format: OutputFormat) -> Self {
        let output = output.as_ref();
        let root_dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let output_name = output
            .file_name()
            .map_or_else(|| "cars.json".to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            root_dir,
            output_name,
            format: format.resolve(output),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn output_path(&self) -> PathBuf {
        self.path(&self.output_name)
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ListingStorage for LocalStorage {
    async fn write_listings(
        &self,
        listings: &[&CarListing],
        metadata: &RunMetadata,
    ) -> Result<WriteMetadata> {
        let bytes = match self.format {
            OutputFormat::Csv => encode_csv(listings)?,
            OutputFormat::Jsonl => encode_jsonl(listings)?,
            OutputFormat::Json | OutputFormat::Auto => serde_json::to_vec_pretty(&ListingDocument {
                metadata: metadata.clone(),
                cars: listings.to_vec(),
            })?,
        };
        self.write_bytes(&self.output_name, &bytes).await?;

        let path = self.output_path();
        log::info!(
            "Wrote {} listings to {} ({:?})",
            listings.len(),
            path.display(),
            self.format
        );
        Ok(WriteMetadata {
            path,
            format: self.format,
            count: listings.len(),
            timestamp: Utc::now(),
        })
    }

    async fn load_listings(&self) -> Result<Vec<CarListing>> {
        let Some(bytes) = self.read_bytes(&self.output_name).await? else {
            log::warn!("No listing file at {}", self.output_path().display());
            return Ok(Vec::new());
        };

        match self.format {
            OutputFormat::Jsonl => bytes
                .split(|b| *b == b'\n')
                .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
                .map(|line| serde_json::from_slice(line).map_err(AppError::from))
                .collect(),
            OutputFormat::Csv => decode_csv(&bytes),
            OutputFormat::Json | OutputFormat::Auto => {
                // Accept both the envelope and a bare array.
                let value: serde_json::Value = serde_json::from_slice(&bytes)?;
                if value.is_array() {
                    Ok(serde_json::from_value(value)?)
                } else {
                    let doc: ListingDocument<CarListing> = serde_json::from_value(value)?;
                    Ok(doc.cars)
                }
            }
        }
    }

    async fn load_checkpoint(&self) -> Result<Option<Checkpoint>> {
        self.read_json(CHECKPOINT_FILE).await
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.write_json(CHECKPOINT_FILE, checkpoint).await
    }

    async fn clear_checkpoint(&self) -> Result<()> {
        match tokio::fs::remove_file(self.path(CHECKPOINT_FILE)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

fn encode_jsonl(listings: &[&CarListing]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for listing in listings {
        serde_json::to_writer(&mut out, listing)?;
        out.push(b'\n');
    }
    Ok(out)
}

fn encode_csv(listings: &[&CarListing]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for listing in listings {
        writer.write_record(csv_row(listing))?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

fn csv_row(l: &CarListing) -> Vec<String> {
    fn opt<T: ToString>(v: &Option<T>) -> String {
        v.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    vec![
        l.dealer_name.clone(),
        l.dealer_website.clone(),
        l.vehicle_url.clone(),
        opt(&l.year),
        l.make.clone(),
        l.model.clone(),
        opt(&l.trim),
        l.new_used.to_string(),
        l.fuel_type.to_string(),
        opt(&l.drivetrain),
        opt(&l.transmission),
        opt(&l.body_style),
        opt(&l.msrp),
        opt(&l.sale_price),
        opt(&l.total_price),
        l.currency.clone(),
        opt(&l.price_note),
        opt(&l.vin),
        opt(&l.stock_number),
        opt(&l.mileage),
        l.mileage_units.to_string(),
        l.in_stock_status.to_string(),
        opt(&l.exterior_color),
        opt(&l.interior_color),
        opt(&l.dealer_location_city),
        opt(&l.dealer_location_state),
        l.description
            .as_deref()
            .map(|d| d.replace(['\n', '\r'], " "))
            .unwrap_or_default(),
        l.features.join("; "),
        l.images.join("; "),
        l.scraped_at.to_rfc3339(),
    ]
}

/// Read rows written by [`encode_csv`]; columns are matched by header name.
fn decode_csv(bytes: &[u8]) -> Result<Vec<CarListing>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();
    let mut listings = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        let row = CsvRow {
            headers: &headers,
            record: &record,
            line,
        };
        listings.push(row.listing()?);
    }
    Ok(listings)
}

struct CsvRow<'a> {
    headers: &'a csv::StringRecord,
    record: &'a csv::StringRecord,
    line: u64,
}

impl CsvRow<'_> {
    /// Trimmed cell, `None` when the column is missing or empty.
    fn get(&self, column: &str) -> Option<&str> {
        let index = self.headers.iter().position(|h| h == column)?;
        self.record
            .get(index)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn text(&self, column: &str) -> String {
        self.get(column).unwrap_or_default().to_string()
    }

    fn opt_text(&self, column: &str) -> Option<String> {
        self.get(column).map(String::from)
    }

    fn number<T: std::str::FromStr>(&self, column: &str) -> Result<Option<T>> {
        self.get(column)
            .map(|v| {
                v.parse().map_err(|_| {
                    AppError::validation(format!("CSV line {}: bad {column} '{v}'", self.line))
                })
            })
            .transpose()
    }

    fn list(&self, column: &str) -> Vec<String> {
        self.get(column)
            .map(|v| {
                v.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn listing(&self) -> Result<CarListing> {
        let mut l = CarListing::new(
            self.text("dealer_name"),
            self.text("dealer_website"),
            self.text("vehicle_url"),
            self.get("make").unwrap_or("Unknown"),
            self.get("model").unwrap_or("Unknown"),
        );
        l.year = self.number("year")?;
        l.trim = self.opt_text("trim");
        l.new_used = self
            .get("new_used")
            .and_then(NewUsed::from_literal)
            .unwrap_or_default();
        l.fuel_type = self
            .get("fuel_type")
            .and_then(FuelType::from_literal)
            .unwrap_or_default();
        l.drivetrain = self.opt_text("drivetrain");
        l.transmission = self.opt_text("transmission");
        l.body_style = self.opt_text("body_style");
        l.msrp = self.number("msrp")?;
        l.sale_price = self.number("sale_price")?;
        l.total_price = self.number("total_price")?;
        if let Some(currency) = self.get("currency") {
            l.currency = currency.to_string();
        }
        l.price_note = self.opt_text("price_note");
        l.vin = self.opt_text("vin");
        l.stock_number = self.opt_text("stock_number");
        l.mileage = self.number("mileage")?;
        l.mileage_units = self
            .get("mileage_units")
            .and_then(MileageUnit::from_literal)
            .unwrap_or_default();
        l.in_stock_status = self
            .get("in_stock_status")
            .and_then(StockStatus::from_literal)
            .unwrap_or_default();
        l.exterior_color = self.opt_text("exterior_color");
        l.interior_color = self.opt_text("interior_color");
        l.dealer_location_city = self.opt_text("dealer_location_city");
        l.dealer_location_state = self.opt_text("dealer_location_state");
        l.description = self.opt_text("description");
        l.features = self.list("features");
        l.images = self.list("images");
        if let Some(ts) = self.get("scraped_at") {
            match DateTime::parse_from_rfc3339(ts) {
                Ok(ts) => l.scraped_at = ts.with_timezone(&Utc),
                Err(e) => log::debug!("CSV line {}: keeping load time, bad scraped_at: {e}", self.line),
            }
        }
        Ok(l)
    }
}
