use crate::crawler::models::ListingRecord;
use crate::errors::{CrawlResult, CrawlerError};
use crate::index::IndexSink;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

/// Document-per-listing index on an Elasticsearch node.
pub struct ElasticsearchIndex {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticsearchIndex {
    pub fn new(base_url: &str, index: &str, timeout: Duration) -> CrawlResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlerError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}/_doc/{}", self.base_url, self.index, id)
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }
}

impl IndexSink for ElasticsearchIndex {
    fn upsert(&mut self, id: &str, record: &ListingRecord) -> CrawlResult<()> {
        let url = self.document_url(id);
        let resp = self
            .client
            .put(&url)
            .json(record)
            .send()
            .map_err(|e| CrawlerError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(CrawlerError::Index(format!(
                "PUT {url} returned {status}: {text}"
            )));
        }

        debug!(id, index = %self.index, "document indexed");
        Ok(())
    }

    fn clear(&mut self) -> CrawlResult<()> {
        let url = self.index_url();
        let resp = self
            .client
            .delete(&url)
            .send()
            .map_err(|e| CrawlerError::Network(e.to_string()))?;

        // Deleting an index that does not exist is fine.
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
            info!(index = %self.index, %status, "index cleared");
            return Ok(());
        }

        Err(CrawlerError::Index(format!("DELETE {url} returned {status}")))
    }
}
