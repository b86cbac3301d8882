use crate::resolver::LookupError;
use crate::config::SeasonRangeError;
use crate::parser::ParseError;
use crate::scraper::ScraperError;
use crate::store::StoreError;

/// Error returned by the pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    SeasonRange(#[from] SeasonRangeError),
}
