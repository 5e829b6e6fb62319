use crate::config::FlushMode;
use crate::crawler::discovery::Discovery;
use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{PageFetcher, RetryPolicy};
use crate::crawler::models::{Extraction, ListingRecord, SkipReason};
use crate::errors::CrawlResult;
use crate::index::{self, IndexSink};
use crate::regions::Region;
use std::collections::BTreeMap;
use tracing::{error, info};

/// What a crawl produced, kept in memory until the final upsert.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub records: BTreeMap<String, ListingRecord>,
    pub links_per_region: Vec<(&'static str, usize)>,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub failed_regions: Vec<(&'static str, String)>,
    /// Records already written during the crawl (per-record flush).
    pub flushed: usize,
}

impl RunSummary {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

pub struct Pipeline<'a> {
    discovery: Discovery<'a>,
    extractor: Extractor<'a>,
    flush_mode: FlushMode,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        base_url: &str,
        retry: RetryPolicy,
        flush_mode: FlushMode,
    ) -> CrawlResult<Self> {
        Ok(Self {
            discovery: Discovery::new(fetcher, base_url, retry)?,
            extractor: Extractor::new(fetcher)?,
            flush_mode,
        })
    }

    /// Cap on search pages per region; see `Discovery::with_max_pages`.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.discovery = self.discovery.with_max_pages(max_pages);
        self
    }

    /// Discover and extract every region in order. A region whose discovery
    /// gives up is recorded in the summary and the next region still runs.
    /// With per-record flushing each record is written to `sink` as soon as
    /// it is extracted.
    pub fn crawl(&self, regions: &[Region], sink: &mut dyn IndexSink) -> CrawlResult<RunSummary> {
        let mut summary = RunSummary::default();

        for region in regions {
            let links = match self.discovery.discover(region) {
                Ok(links) => links,
                Err(e) => {
                    error!(region = region.name, error = %e, "discovery failed, skipping region");
                    summary.failed_regions.push((region.name, e.to_string()));
                    continue;
                }
            };
            summary.links_per_region.push((region.name, links.len()));

            for (i, link) in links.iter().enumerate() {
                info!(region = region.name, n = i, url = %link.url, "extracting listing");

                match self.extractor.extract(link) {
                    Extraction::Record(record) => {
                        if self.flush_mode == FlushMode::PerRecord {
                            sink.upsert(&record.id, &record)?;
                            summary.flushed += 1;
                        }
                        summary.records.insert(record.id.clone(), record);
                    }
                    Extraction::Skip(reason) => {
                        *summary.skipped.entry(reason).or_default() += 1;
                    }
                }
            }
        }

        info!(
            records = summary.records.len(),
            skipped = summary.skipped_total(),
            failed_regions = summary.failed_regions.len(),
            "crawl finished"
        );
        Ok(summary)
    }

    /// Crawl, then write everything not yet written. Returns the summary
    /// and the number of documents upserted in total.
    pub fn run(&self, regions: &[Region], sink: &mut dyn IndexSink) -> CrawlResult<(RunSummary, usize)> {
        let summary = self.crawl(regions, sink)?;

        let written = match self.flush_mode {
            FlushMode::EndOfRun => index::upsert_all(sink, &summary.records)?,
            FlushMode::PerRecord => summary.flushed,
        };

        Ok((summary, written))
    }
}
