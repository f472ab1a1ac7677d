use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use log::LevelFilter;
use serde::de::DeserializeOwned;
use txlege::types::{BillStub, Chamber, CommitteeRecord, SessionContext};
use txlege::utils::{BatchStats, StubFilter};
use txlege::{BillDetailScraper, CommitteeRegistry, ScraperConfig};

#[derive(Parser)]
#[command(name = "txlege")]
#[command(about = "A Texas Legislature Online bill detail scraper", long_about = None)]
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

    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        global = true,
        help = "TOML file with scraper settings"
    )]
    config: Option<PathBuf>,

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

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every bill in a stub file, sharing one committee registry
    Bills {
        #[arg(long, value_name = "FILE", help = "JSON map of bill number to bill stub")]
        stubs: PathBuf,

        #[arg(long, value_name = "FILE", help = "JSON map of committee code to committee")]
        committees: Option<PathBuf>,

        #[arg(
            long,
            value_name = "FILE",
            help = "Write the committee registry, with bill lists, to this file"
        )]
        committees_out: Option<PathBuf>,

        #[arg(long, help = "Legislative session id, e.g. 88R")]
        session: String,

        #[arg(long, value_parser = parse_chamber, help = "Chamber the stubs belong to")]
        chamber: Chamber,

        #[arg(
            long,
            help = "Bills scraped at the same time",
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        concurrency: Option<u16>,

        #[arg(long = "bill", value_name = "NUMBER", help = "Only scrape these bills")]
        bills: Vec<String>,

        #[arg(
            long,
            help = "Maximum number of bills to scrape",
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        limit: Option<u16>,

        #[arg(
            long,
            help = "Number of stubs to skip from the beginning",
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        offset: Option<u16>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Scrape a single bill by number
    Bill {
        #[arg(help = "Bill number, e.g. HB1, or a bare number for the chamber's bills")]
        number: String,

        #[arg(long, help = "Legislative session id, e.g. 88R")]
        session: String,

        #[arg(long, value_parser = parse_chamber, help = "Chamber the bill belongs to")]
        chamber: Chamber,

        #[arg(long, value_name = "FILE", help = "JSON map of committee code to committee")]
        committees: Option<PathBuf>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn parse_chamber(s: &str) -> Result<Chamber, String> {
    Chamber::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> T {
    let contents = fs::read_to_string(path).unwrap_or_else(|e| {
        log::error!("Error reading {}: {}", path.display(), e);
        process::exit(1);
    });
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        log::error!("Error parsing {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn load_registry(path: Option<&Path>) -> CommitteeRegistry {
    match path {
        Some(path) => {
            let committees: IndexMap<String, CommitteeRecord> = read_json(path);
            log::info!("Loaded {} committees from {}", committees.len(), path.display());
            CommitteeRegistry::new(committees)
        }
        None => {
            log::warn!("No committee list given, committee referrals will be skipped");
            CommitteeRegistry::default()
        }
    }
}

fn load_config(path: Option<&Path>, concurrency: Option<u16>) -> ScraperConfig {
    let mut config = match path {
        Some(path) => ScraperConfig::load_from_path(path).unwrap_or_else(|e| {
            log::error!("Error loading config: {}", e);
            process::exit(1);
        }),
        None => ScraperConfig::default(),
    };
    if let Some(concurrency) = concurrency {
        config.concurrency = concurrency.into();
    }
    config.validate().unwrap_or_else(|e| {
        log::error!("Invalid config: {}", e);
        process::exit(1);
    })
}

fn build_scraper(ctx: SessionContext, config: &ScraperConfig) -> BillDetailScraper {
    BillDetailScraper::new(ctx, config).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Bills {
            stubs,
            committees,
            committees_out,
            session,
            chamber,
            concurrency,
            bills,
            limit,
            offset,
            format,
        } => {
            let stub_filter = StubFilter {
                bills,
                limit: limit.map(usize::from),
                offset: offset.map(usize::from),
            };
            let stub_filter = stub_filter.validate().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let config = load_config(cli.config.as_deref(), concurrency);
            let registry = load_registry(committees.as_deref());
            let stubs: IndexMap<String, BillStub> = read_json(&stubs);
            let stubs = stub_filter.apply(stubs);

            let ctx = SessionContext::new(chamber, session).with_base_url(config.base_url.clone());
            let scraper = build_scraper(ctx, &config);

            let bills = scraper.fetch(&stubs, &registry, config.concurrency).await;

            if let Some(path) = committees_out {
                let json = serde_json::to_string_pretty(&registry.snapshot()).unwrap_or_else(|e| {
                    log::error!("Error serializing committees: {}", e);
                    process::exit(1);
                });
                if let Err(e) = fs::write(&path, json) {
                    log::error!("Error writing {}: {}", path.display(), e);
                    process::exit(1);
                }
                log::info!("Wrote committee registry to {}", path.display());
            }

            match format {
                OutputFormat::Json => serialize_json(&bills),
                OutputFormat::Text => {
                    if bills.is_empty() {
                        println!("No bills to display.");
                    } else {
                        for bill in bills.values() {
                            println!("{}", bill);
                        }
                        print!("{}", BatchStats::from_bills(bills.values()));
                    }
                }
            }
        }

        Commands::Bill {
            number,
            session,
            chamber,
            committees,
            format,
        } => {
            let config = load_config(cli.config.as_deref(), None);
            let registry = load_registry(committees.as_deref());
            let ctx = SessionContext::new(chamber, session).with_base_url(config.base_url.clone());
            let stub = BillStub::for_session(&ctx, &number);

            log::info!("Fetching bill detail from {}...", stub.detail_url);

            let scraper = build_scraper(ctx, &config);
            let bill = scraper.fetch_bill(&stub, &registry).await;

            match format {
                OutputFormat::Json => serialize_json(&bill),
                OutputFormat::Text => println!("{}", bill),
            }
        }
    }
}
