use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::crawler::discovery::DEFAULT_MAX_PAGES;
use crate::crawler::fetcher::RetryPolicy;
use crate::errors::{CrawlResult, CrawlerError};
use crate::regions::{self, Region, DEFAULT_REGION_NAMES};

pub const DEFAULT_BASE_URL: &str = "https://rent.591.com.tw";
pub const DEFAULT_INDEX_NAME: &str = "rental_objs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBackend {
    Elasticsearch { url: String },
    Sqlite { path: PathBuf },
}

/// When records reach the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Single batch after every region has been crawled.
    EndOfRun,
    /// Each record as soon as it is extracted.
    PerRecord,
}

impl FromStr for FlushMode {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "end-of-run" => Ok(FlushMode::EndOfRun),
            "per-record" => Ok(FlushMode::PerRecord),
            other => Err(CrawlerError::Config(format!("unknown flush mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub regions: Vec<Region>,
    pub backend: IndexBackend,
    pub index_name: String,
    pub flush_mode: FlushMode,
    pub clear_index: bool,
    pub retry: RetryPolicy,
    /// Search pages per region before discovery fails the region.
    pub max_pages: usize,
    pub request_timeout: Duration,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> CrawlResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> CrawlResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let region_names: Vec<String> = match lookup("RENTAL_REGIONS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_REGION_NAMES.iter().map(|s| s.to_string()).collect(),
        };
        if region_names.is_empty() {
            return Err(CrawlerError::Config("RENTAL_REGIONS is empty".into()));
        }

        let backend = match get("RENTAL_INDEX_BACKEND", "elasticsearch").as_str() {
            "elasticsearch" => IndexBackend::Elasticsearch {
                url: get("ELASTICSEARCH_URL", "http://localhost:9200"),
            },
            "sqlite" => IndexBackend::Sqlite {
                path: PathBuf::from(get("RENTAL_SQLITE_PATH", "rental_objs.sqlite3")),
            },
            other => {
                return Err(CrawlerError::Config(format!("unknown index backend: {other}")))
            }
        };

        let retry = RetryPolicy {
            max_attempts: parse_num(&lookup, "FETCH_MAX_ATTEMPTS", 5)?,
            base_backoff: Duration::from_millis(parse_num(&lookup, "FETCH_BASE_BACKOFF_MS", 1000)?),
            max_backoff: Duration::from_millis(parse_num(&lookup, "FETCH_MAX_BACKOFF_MS", 10_000)?),
            jitter: Duration::from_millis(parse_num(&lookup, "FETCH_JITTER_MS", 500)?),
        };
        if retry.max_attempts == 0 {
            return Err(CrawlerError::Config("FETCH_MAX_ATTEMPTS must be at least 1".into()));
        }

        let max_pages = parse_num(&lookup, "DISCOVERY_MAX_PAGES", DEFAULT_MAX_PAGES)?;
        if max_pages == 0 {
            return Err(CrawlerError::Config("DISCOVERY_MAX_PAGES must be at least 1".into()));
        }

        Ok(Self {
            base_url: get("RENTAL_BASE_URL", DEFAULT_BASE_URL),
            regions: regions::resolve_all(&region_names)?,
            backend,
            index_name: get("RENTAL_INDEX_NAME", DEFAULT_INDEX_NAME),
            flush_mode: get("RENTAL_FLUSH_MODE", "end-of-run").parse()?,
            clear_index: parse_bool(&lookup, "RENTAL_CLEAR_INDEX")?,
            retry,
            max_pages,
            request_timeout: Duration::from_secs(parse_num(&lookup, "REQUEST_TIMEOUT_SECS", 60)?),
            log_dir: PathBuf::from(get("LOG_DIR", ".")),
        })
    }
}

fn parse_num<F, T>(lookup: &F, key: &str, default: T) -> CrawlResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CrawlerError::Config(format!("{key} is not a number: {raw}"))),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> CrawlResult<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(other) => Err(CrawlerError::Config(format!("{key} is not a boolean: {other}"))),
    }
}
