//! Dealership Inventory Crawler CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use dealer_crawler::{
    config,
    error::{AppError, Result},
    extract::ListingAssembler,
    models::{CarListing, Config, Dealership, OutputFormat},
    pipeline::{self, SiteRunner},
    services::{
        AllowAll, CachingFetcher, Fetcher, FixedDelay, HttpFetcher, RobotsPolicy, RobotsTxtPolicy,
        SiteScraper, build_scraper,
    },
    storage::{ListingStorage, LocalStorage, RunMetadata},
};

/// Dealership inventory crawler
#[derive(Parser, Debug)]
#[command(
    name = "dealer-crawler",
    version,
    about = "Scrapes vehicle listings from dealership websites"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape all (or selected) dealerships
    Scrape {
        /// Only scrape these dealership ids
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Output file (default: output.path from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Skip dealerships completed by an interrupted run
        #[arg(long)]
        resume: bool,

        /// Do not consult robots.txt
        #[arg(long)]
        ignore_robots: bool,

        /// Keep listings that fail the sanity checks
        #[arg(long)]
        no_validate: bool,
    },

    /// Re-apply the configured filters to a previous output file
    Filter {
        /// JSON or JSONL file written by `scrape`
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: `<input stem>_filtered.<ext>`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration and dealership registry
    Validate,

    /// List configured dealerships
    Sites,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Json,
    Jsonl,
    Csv,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Jsonl => OutputFormat::Jsonl,
            FormatArg::Csv => OutputFormat::Csv,
        }
    }
}

/// Initialize logging from the verbosity flag, then the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.verbose, "info");
            log::error!("{e}");
            return Err(e);
        }
    };
    init_logging(cli.verbose, &config.logging.level);
    if !cli.config.exists() {
        log::warn!("{} not found, using default configuration", cli.config.display());
    }
    let base_dir = cli.config.parent().unwrap_or(Path::new("."));
    let dealers = config::load_dealerships(&config, base_dir)?;

    match cli.command {
        Command::Scrape {
            sites,
            output,
            format,
            resume,
            ignore_robots,
            no_validate,
        } => {
            let dealers = select_sites(dealers, &sites)?;
            let output = output.unwrap_or_else(|| config.output.path.clone());
            let format = format.map(OutputFormat::from).unwrap_or(config.output.format);
            let options = ScrapeOptions {
                resume,
                ignore_robots,
                validate: !no_validate,
            };
            scrape(&config, &dealers, LocalStorage::new(&output, format), options).await?;
        }

        Command::Filter { input, output } => {
            let listings = LocalStorage::new(&input, OutputFormat::Auto)
                .load_listings()
                .await?;
            log::info!("Loaded {} listings from {}", listings.len(), input.display());

            let output = output.unwrap_or_else(|| filtered_path(&input));
            let storage = LocalStorage::new(&output, config.output.format);
            write_filtered(&config, &listings, &storage).await?;
        }

        Command::Validate => {
            log::info!(
                "Configuration OK: {} dealerships, {} keyword overrides",
                dealers.len(),
                config.keywords.len()
            );
            let assembler = ListingAssembler::for_config(&config);
            let mut invalid = 0;
            for dealer in &dealers {
                if let Err(e) = build_scraper(dealer.clone(), assembler.clone()) {
                    invalid += 1;
                    log::error!("{}: {}", dealer.id, e);
                }
            }
            if invalid > 0 {
                return Err(AppError::config(format!("{invalid} dealerships have invalid selectors")));
            }
            if config.filters.is_empty() {
                log::info!("No filters configured");
            }
        }

        Command::Sites => {
            for dealer in &dealers {
                let location = match (&dealer.city, &dealer.state) {
                    (Some(city), Some(state)) => format!("{city}, {state}"),
                    (Some(city), None) => city.clone(),
                    (None, Some(state)) => state.clone(),
                    (None, None) => "-".to_string(),
                };
                println!(
                    "{:<24} {:<32} {:<20} {}",
                    dealer.id,
                    dealer.name,
                    location,
                    dealer.inventory_url()
                );
            }
            log::info!("{} dealerships configured", dealers.len());
        }
    }

    Ok(())
}

/// Keep only the requested dealership ids, in registry order.
fn select_sites(dealers: Vec<Dealership>, ids: &[String]) -> Result<Vec<Dealership>> {
    if ids.is_empty() {
        return Ok(dealers);
    }
    if let Some(unknown) = ids.iter().find(|id| !dealers.iter().any(|d| &d.id == *id)) {
        return Err(AppError::config(format!("Unknown dealership id '{unknown}'")));
    }
    Ok(dealers
        .into_iter()
        .filter(|d| ids.contains(&d.id))
        .collect())
}

fn filtered_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cars");
    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or("json");
    input.with_file_name(format!("{stem}_filtered.{ext}"))
}

#[derive(Debug, Clone, Copy)]
struct ScrapeOptions {
    resume: bool,
    ignore_robots: bool,
    validate: bool,
}

async fn scrape(
    config: &Config,
    dealers: &[Dealership],
    storage: LocalStorage,
    options: ScrapeOptions,
) -> Result<()> {
    if dealers.is_empty() {
        return Err(AppError::config("No dealerships configured"));
    }
    log::info!("Scraping {} dealerships", dealers.len());

    let assembler = ListingAssembler::for_config(config);

    let http: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.scraper)?);
    let fetcher: Arc<dyn Fetcher> = if config.scraper.cache_pages {
        Arc::new(CachingFetcher::new(http.clone()))
    } else {
        http.clone()
    };
    let robots: Arc<dyn RobotsPolicy> = if config.scraper.respect_robots && !options.ignore_robots {
        Arc::new(RobotsTxtPolicy::new(http, config.scraper.user_agent.clone()))
    } else {
        Arc::new(AllowAll)
    };
    let throttle = Arc::new(FixedDelay::from_millis(config.scraper.request_delay_ms));
    let runner = SiteRunner::new(fetcher, robots, throttle)
        .with_concurrency(config.scraper.max_concurrent);

    let mut scrapers: Vec<Box<dyn SiteScraper>> = Vec::with_capacity(dealers.len());
    for dealer in dealers {
        match build_scraper(dealer.clone(), assembler.clone()) {
            Ok(scraper) => scrapers.push(scraper),
            Err(e) => log::warn!("Skipping {}: {}", dealer.id, e),
        }
    }

    let report = pipeline::run_all(&runner, &scrapers, &storage, options.resume).await?;
    let listings = if options.validate {
        pipeline::validate(report.listings).0
    } else {
        report.listings
    };
    let (listings, _) = pipeline::dedup(listings);
    write_filtered(config, &listings, &storage).await?;

    if let Err(e) = storage.clear_checkpoint().await {
        log::warn!("Could not remove checkpoint: {e}");
    }
    Ok(())
}

async fn write_filtered(
    config: &Config,
    listings: &[CarListing],
    storage: &dyn ListingStorage,
) -> Result<()> {
    let kept = pipeline::filter::apply(listings, &config.filters);
    let metadata = RunMetadata::new(kept.len(), config.output.source.clone());
    let written = storage.write_listings(&kept, &metadata).await?;
    log::info!(
        "Saved {} listings to {} ({:?})",
        written.count,
        written.path.display(),
        written.format
    );
    Ok(())
}
