// discovery.rs
use crate::crawler::fetcher::{fetch_with_retry, PageFetcher, RetryPolicy};
use crate::crawler::models::ListingLink;
use crate::errors::{CrawlResult, CrawlerError};
use crate::regions::Region;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

/// Listings the search endpoint returns per page.
pub const PAGE_SIZE: usize = 30;

/// Search pages walked per region before discovery gives up on ever seeing
/// the last-page marker.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Everything discovery learned from one search page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub hrefs: Vec<String>,
    pub is_last: bool,
}

struct SearchSelectors {
    result_lists: Selector,
    info_content: Selector,
    title_link: Selector,
    next_page: Selector,
}

impl SearchSelectors {
    fn new() -> CrawlResult<Self> {
        Ok(Self {
            result_lists: parse_selector("#content > ul")?,
            info_content: parse_selector("li.infoContent")?,
            title_link: parse_selector("h3 a")?,
            next_page: parse_selector("a.pageNext")?,
        })
    }
}

pub(crate) fn parse_selector(css: &str) -> CrawlResult<Selector> {
    Selector::parse(css).map_err(|e| CrawlerError::HtmlParse(format!("{css}: {e}")))
}

pub struct Discovery<'a> {
    fetcher: &'a dyn PageFetcher,
    base_url: Url,
    retry: RetryPolicy,
    max_pages: usize,
    selectors: SearchSelectors,
}

impl<'a> Discovery<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, base_url: &str, retry: RetryPolicy) -> CrawlResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| CrawlerError::Config(format!("bad base url {base_url}: {e}")))?;
        // Joins resolve against the last path segment, so keep it a directory.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            fetcher,
            base_url,
            retry,
            max_pages: DEFAULT_MAX_PAGES,
            selectors: SearchSelectors::new()?,
        })
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Search URL for one page of a region. The base URL's path is kept.
    pub fn search_url(&self, region: &Region, offset: usize) -> String {
        let mut url = self.base_url.clone();
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("kind", "0")
            .append_pair("region", region.site_code)
            .append_pair("firstRow", &offset.to_string());
        url.to_string()
    }

    /// Walk the search pages of `region` until the next-page control is
    /// marked last. A page that still fails after the retry policy is
    /// exhausted fails the whole region, and so does running past
    /// `max_pages` without reaching the last page.
    pub fn discover(&self, region: &Region) -> CrawlResult<Vec<ListingLink>> {
        let headers = [("Cookie", format!("urlJumpIp={}", region.site_code))];
        let mut links = Vec::new();
        let mut offset = 0;

        info!(region = region.name, max_pages = self.max_pages, "discovering listings");

        for _ in 0..self.max_pages {
            let url = self.search_url(region, offset);
            debug!(region = region.name, offset, %url, "fetching search page");

            let page = fetch_with_retry(self.fetcher, &url, &headers, &self.retry)?;
            let parsed = self.parse_search_page(&page.body);

            for href in &parsed.hrefs {
                match self.absolute(href) {
                    Some(abs) => match ListingLink::new(abs, *region) {
                        Ok(link) => links.push(link),
                        Err(e) => warn!(region = region.name, error = %e, "ignoring link"),
                    },
                    None => warn!(region = region.name, href = %href, "unresolvable listing href"),
                }
            }

            debug!(
                region = region.name,
                offset,
                found = parsed.hrefs.len(),
                "search page parsed"
            );

            if parsed.is_last {
                info!(region = region.name, total = links.len(), "discovery done");
                return Ok(links);
            }
            offset += PAGE_SIZE;
        }

        warn!(region = region.name, pages = self.max_pages, "page limit reached before last page");
        Err(CrawlerError::PageLimit {
            region: region.name.to_string(),
            pages: self.max_pages,
        })
    }

    /// Pull listing hrefs and the last-page flag out of a search page.
    ///
    /// A page with no next-page control counts as the last one, so a layout
    /// change ends the walk instead of looping.
    pub fn parse_search_page(&self, html: &str) -> SearchPage {
        let document = Html::parse_document(html);
        let sel = &self.selectors;

        let mut hrefs = Vec::new();
        for list in document.select(&sel.result_lists) {
            let Some(info) = list.select(&sel.info_content).next() else {
                continue;
            };
            let href = info
                .select(&sel.title_link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::trim)
                .filter(|h| !h.is_empty());
            if let Some(href) = href {
                hrefs.push(href.to_string());
            }
        }

        let is_last = match document.select(&sel.next_page).next() {
            Some(next) => next.value().classes().any(|c| c == "last"),
            None => {
                warn!("search page has no next-page control, treating as last");
                true
            }
        };

        SearchPage { hrefs, is_last }
    }

    fn absolute(&self, href: &str) -> Option<String> {
        self.base_url.join(href).ok().map(String::from)
    }
}
