mod elasticsearch;
mod sqlite;

pub use elasticsearch::ElasticsearchIndex;
pub use sqlite::SqliteIndex;

use crate::config::{Config, IndexBackend};
use crate::crawler::models::ListingRecord;
use crate::errors::CrawlResult;
use std::collections::BTreeMap;
use tracing::info;

/// A document store addressed by listing identifier.
///
/// `upsert` replaces whatever is stored under `id`; there is no merge.
pub trait IndexSink {
    fn upsert(&mut self, id: &str, record: &ListingRecord) -> CrawlResult<()>;

    /// Drop every document in the index. Operator action, not part of a
    /// normal run.
    fn clear(&mut self) -> CrawlResult<()>;
}

/// Write every record keyed by its identifier. Stops at the first failed
/// write and returns how many went through before it.
pub fn upsert_all(
    sink: &mut dyn IndexSink,
    records: &BTreeMap<String, ListingRecord>,
) -> CrawlResult<usize> {
    let mut written = 0;
    for (id, record) in records {
        sink.upsert(id, record)?;
        written += 1;
    }
    info!(written, "index upsert complete");
    Ok(written)
}

/// Open the backend named in the config.
pub fn open(cfg: &Config) -> CrawlResult<Box<dyn IndexSink>> {
    let sink: Box<dyn IndexSink> = match &cfg.backend {
        IndexBackend::Elasticsearch { url } => Box::new(ElasticsearchIndex::new(
            url,
            &cfg.index_name,
            cfg.request_timeout,
        )?),
        IndexBackend::Sqlite { path } => Box::new(SqliteIndex::open(path, &cfg.index_name)?),
    };
    Ok(sink)
}
