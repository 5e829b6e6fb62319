// fetcher.rs
use crate::errors::{CrawlResult, CrawlerError};
use rand::Rng;
use reqwest::blocking::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// Raw HTTP outcome. Non-2xx statuses are data here, not errors; callers
/// decide whether a bad status means retry or skip.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One blocking GET. Implemented over reqwest for real runs and over
/// in-memory fixtures in tests.
pub trait PageFetcher {
    fn fetch(&self, url: &str, headers: &[(&str, String)]) -> CrawlResult<FetchedPage>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> CrawlResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlerError::Network(e.to_string()))?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str, headers: &[(&str, String)]) -> CrawlResult<FetchedPage> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, value.as_str());
        }

        let resp = req
            .send()
            .map_err(|e| CrawlerError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = resp
            .text()
            .map_err(|e| CrawlerError::Network(e.to_string()))?;

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Retries without sleeping.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based), before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    fn jittered(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.backoff(attempt) + Duration::from_millis(extra)
    }
}

/// GET until a 2xx arrives or the policy runs out of attempts.
pub fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    headers: &[(&str, String)],
    policy: &RetryPolicy,
) -> CrawlResult<FetchedPage> {
    let mut last_err = String::from("no attempt made");

    for attempt in 1..=policy.max_attempts {
        let start = Instant::now();

        match fetcher.fetch(url, headers) {
            Ok(page) if page.is_success() => {
                debug!(url, final_url = %page.url, attempt, elapsed = ?start.elapsed(), "fetched page");
                return Ok(page);
            }
            Ok(page) => {
                last_err = CrawlerError::HttpStatus {
                    url: url.to_string(),
                    status: page.status,
                }
                .to_string();
            }
            Err(e) => last_err = e.to_string(),
        }

        warn!(url, attempt, error = %last_err, "fetch attempt failed");

        if attempt < policy.max_attempts {
            std::thread::sleep(policy.jittered(attempt));
        }
    }

    Err(CrawlerError::RetriesExhausted {
        url: url.to_string(),
        attempts: policy.max_attempts,
        last: last_err,
    })
}
