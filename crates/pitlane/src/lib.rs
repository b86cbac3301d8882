pub mod aggregator;
pub mod config;
pub mod crawler;
pub mod duration;
pub mod error;
pub mod harvester;
pub mod merger;
mod parser;
pub mod resolver;
pub mod scraper;
pub mod store;
pub mod table;
pub mod types;

pub use config::{PipelineConfig, SeasonRange};
pub use error::PipelineError;
pub use parser::{DriverName, ParseError, TableClass};
pub use scraper::{Fetch, ScraperError, WebScraper};
pub use store::{CacheStore, FsStore, MemoryStore, StoreError};

pub(crate) const WIKI_BASE_URL: &str = "https://en.wikipedia.org";
pub(crate) const API_BASE_URL: &str = "https://ergast.com/api/f1";
