use crate::errors::{CrawlResult, CrawlerError};

/// A geographic area as the site names it, plus the numeric code the
/// search endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub site_code: &'static str,
}

pub const REGIONS: &[Region] = &[
    Region {
        name: "台北市",
        site_code: "1",
    },
    Region {
        name: "新北市",
        site_code: "3",
    },
];

/// Regions crawled when `RENTAL_REGIONS` is not set.
pub const DEFAULT_REGION_NAMES: &[&str] = &["台北市", "新北市"];

pub fn lookup(name: &str) -> CrawlResult<Region> {
    REGIONS
        .iter()
        .find(|r| r.name == name.trim())
        .copied()
        .ok_or_else(|| CrawlerError::UnknownRegion(name.to_string()))
}

/// Resolve names in the given order. Any unknown name fails the whole list.
pub fn resolve_all<S: AsRef<str>>(names: &[S]) -> CrawlResult<Vec<Region>> {
    names.iter().map(|n| lookup(n.as_ref())).collect()
}
