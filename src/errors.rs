// errors.rs
use thiserror::Error;

/// Errors raised by the crawl pipeline and the index backends.
///
/// Per-listing problems never surface here; they become a `SkipReason`
/// instead. What remains is either fatal for a region (discovery) or for
/// the whole run (config, index).
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTML parse error: {0}")]
    HtmlParse(String),

    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("{region} still had a next page after {pages} search pages")]
    PageLimit { region: String, pages: usize },

    #[error("No listing id in url: {0}")]
    MissingIdentifier(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CrawlResult<T> = Result<T, CrawlerError>;
