use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use pitlane::aggregator::PitStopAggregator;
use pitlane::config::{FIRST_SEASON, LAST_SEASON};
use pitlane::crawler::SeasonCrawler;
use pitlane::harvester::PitStopHarvester;
use pitlane::merger::DatasetMerger;
use pitlane::resolver::{DriverDirectory, DriverResolver};
use pitlane::{FsStore, PipelineConfig, SeasonRange, WebScraper};

#[derive(Parser)]
#[command(name = "pitlane")]
#[command(about = "A Formula 1 race result and pit-stop dataset builder", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Args)]
struct PipelineArgs {
    #[arg(long, global = true, default_value_t = FIRST_SEASON, help = "First season to process")]
    from: i32,

    #[arg(long, global = true, default_value_t = LAST_SEASON, help = "Last season to process")]
    to: i32,

    #[arg(
        long,
        global = true,
        default_value = "cache",
        help = "Directory holding scraped and intermediate tables"
    )]
    cache_dir: PathBuf,

    #[arg(
        long,
        global = true,
        help = "Fetch pit stops and driver mappings again even when cached"
    )]
    refresh: bool,

    #[arg(long, global = true, help = "Base URL of the results API")]
    api_url: Option<String>,

    #[arg(long, global = true, help = "Base URL of the encyclopedia")]
    wiki_url: Option<String>,
}

impl PipelineArgs {
    fn config(&self) -> PipelineConfig {
        let seasons = SeasonRange::new(self.from, self.to).unwrap_or_else(|e| {
            log::error!("Invalid args: {}", e);
            process::exit(1);
        });

        let mut config = PipelineConfig {
            seasons,
            refresh: self.refresh,
            ..Default::default()
        };
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(url) = &self.wiki_url {
            config.wiki_base_url = url.clone();
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the race result tables of every season from the encyclopedia
    Crawl,
    /// Download the raw pit-stop tables of every race
    Pitstops {
        #[arg(long, help = "Also write every pit stop of the range to a single table")]
        combined: bool,
    },
    /// Resolve driver ids to permanent numbers and display names
    Drivers,
    /// Join cached race results and pit-stop aggregates into the final dataset
    Merge {
        #[arg(
            short = 'o',
            long = "output",
            default_value = "dataset.csv",
            help = "Path of the merged dataset"
        )]
        output: PathBuf,
    },
    /// Run every stage: crawl, resolve drivers, aggregate pit stops and merge
    Run {
        #[arg(
            short = 'o',
            long = "output",
            default_value = "dataset.csv",
            help = "Path of the merged dataset"
        )]
        output: PathBuf,
    },
}

async fn resolve_drivers(
    scraper: &WebScraper,
    store: &FsStore,
    config: &PipelineConfig,
) -> DriverDirectory {
    DriverResolver::new(scraper, store, config)
        .resolve()
        .await
        .unwrap_or_else(|e| {
            log::error!("Error resolving drivers: {}", e);
            process::exit(1);
        })
}

fn merge_to(store: &FsStore, output: &Path) {
    let dataset = DatasetMerger::new(store).merge().unwrap_or_else(|e| {
        log::error!("Error merging dataset: {}", e);
        process::exit(1);
    });

    let bytes = dataset.to_csv().unwrap_or_else(|e| {
        log::error!("Error encoding dataset: {}", e);
        process::exit(1);
    });

    if let Err(e) = std::fs::write(output, bytes) {
        log::error!("Error writing {}: {}", output.display(), e);
        process::exit(1);
    }

    log::info!("Wrote {} ({})", output.display(), dataset.summary());
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let config = cli.pipeline.config();
    let store = FsStore::new(&cli.pipeline.cache_dir);

    let scraper = WebScraper::new().unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    match cli.command {
        Commands::Crawl => {
            log::info!("Crawling seasons {}...", config.seasons);
            let stats = SeasonCrawler::new(&scraper, &store, &config).crawl().await;
            log::info!("{}", stats);
        }

        Commands::Pitstops { combined } => {
            log::info!("Harvesting pit stops for seasons {}...", config.seasons);
            let total = PitStopHarvester::new(&scraper, &store, &config)
                .harvest_range(combined)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error harvesting pit stops: {}", e);
                    process::exit(1);
                });
            log::info!("{} pit stop(s) harvested", total);
        }

        Commands::Drivers => {
            let directory = resolve_drivers(&scraper, &store, &config).await;
            log::info!("{} driver(s) resolved", directory.len());
        }

        Commands::Merge { output } => merge_to(&store, &output),

        Commands::Run { output } => {
            log::info!("Crawling seasons {}...", config.seasons);
            let stats = SeasonCrawler::new(&scraper, &store, &config).crawl().await;
            log::info!("{}", stats);

            let directory = resolve_drivers(&scraper, &store, &config).await;

            let stats = PitStopAggregator::new(&scraper, &store, &config, &directory)
                .run()
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error aggregating pit stops: {}", e);
                    process::exit(1);
                });
            for (season, race_number, reason) in &stats.failed {
                log::warn!("Season {} race {} not aggregated: {}", season, race_number, reason);
            }

            merge_to(&store, &output);
        }
    }
}
