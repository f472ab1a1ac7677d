pub mod committees;
pub mod config;
pub mod fetcher;
pub mod links;
pub mod parser;
pub mod scraper;
pub mod types;
pub mod utils;

pub use crate::committees::CommitteeRegistry;
pub use crate::config::ScraperConfig;
pub use crate::scraper::{BillDetailScraper, ScraperError};

pub(crate) const BASE_URL: &str = "https://capitol.texas.gov/";
