use crate::crawler::fetcher::{FetchedPage, PageFetcher};
use crate::crawler::models::ListingRecord;
use crate::errors::{CrawlResult, CrawlerError};
use crate::index::IndexSink;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

pub const BASE_URL: &str = "https://rent.591.com.tw";

/// Serves canned responses by exact URL. Each URL holds a queue; the last
/// response repeats once the queue is down to one. Unknown URLs get a 404.
#[derive(Default)]
pub struct FixtureFetcher {
    responses: RefCell<HashMap<String, VecDeque<(u16, String)>>>,
    requests: RefCell<Vec<(String, Vec<(String, String)>)>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: impl Into<String>) -> Self {
        self.respond(url, 200, body)
    }

    pub fn respond(self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.responses
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back((status, body.into()));
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.requests.borrow().clone()
    }
}

impl PageFetcher for FixtureFetcher {
    fn fetch(&self, url: &str, headers: &[(&str, String)]) -> CrawlResult<FetchedPage> {
        self.requests.borrow_mut().push((
            url.to_string(),
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));

        let mut responses = self.responses.borrow_mut();
        let (status, body) = match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => (404, String::new()),
        };

        Ok(FetchedPage {
            url: url.to_string(),
            status,
            body,
        })
    }
}

/// Fetcher whose transport always fails.
pub struct DeadNetwork;

impl PageFetcher for DeadNetwork {
    fn fetch(&self, url: &str, _headers: &[(&str, String)]) -> CrawlResult<FetchedPage> {
        Err(CrawlerError::Network(format!("connection refused: {url}")))
    }
}

/// In-memory index that remembers every write in order.
#[derive(Default)]
pub struct RecordingIndex {
    pub upserts: Vec<(String, Value)>,
    pub clears: usize,
}

impl RecordingIndex {
    pub fn current(&self, id: &str) -> Option<&Value> {
        self.upserts
            .iter()
            .rev()
            .find(|(i, _)| i == id)
            .map(|(_, body)| body)
    }
}

impl IndexSink for RecordingIndex {
    fn upsert(&mut self, id: &str, record: &ListingRecord) -> CrawlResult<()> {
        self.upserts.push((id.to_string(), record.to_document()));
        Ok(())
    }

    fn clear(&mut self) -> CrawlResult<()> {
        self.clears += 1;
        self.upserts.clear();
        Ok(())
    }
}

pub fn search_url(region_code: &str, offset: usize) -> String {
    format!("{BASE_URL}/?kind=0&region={region_code}&firstRow={offset}")
}

pub fn detail_url(id: &str) -> String {
    format!("{BASE_URL}/rent-detail-{id}.html")
}

/// Search results page listing the given ids, with or without the last
/// marker on the next-page control.
pub fn search_page(ids: &[&str], last: bool) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<ul class="listInfo clearfix"><li class="pull-left infoContent"><h3><a href="//rent.591.com.tw/rent-detail-{id}.html" target="_blank">listing {id}</a></h3></li></ul>"#
            )
        })
        .collect();
    let next_class = if last { "pageNext last" } else { "pageNext" };
    format!(
        r#"<html><body><div id="content">{items}<div class="clear"></div></div><div class="pages"><a class="{next_class}" href="javascript:;">下一頁</a></div></body></html>"#
    )
}

/// Detail page at the given address. Optional parts can be left out.
pub fn detail_page(address: &str, with_phone: bool) -> String {
    let phone = if with_phone {
        r#"<span class="dialPhoneNum" data-value="0912-000-111"></span>"#
    } else {
        ""
    };
    format!(
        r#"<html><body>
        <div id="propNav"><span class="addr">{address}</span><a id="j_addfav">收藏(3)</a></div>
        <div class="pageView"><span class="pc">電腦瀏覽</span><b>41</b><span class="mobile">手機瀏覽</span><b>59</b></div>
        <div class="rightBox">
          <div class="detailInfo">
            <div class="price">25,500 元/月</div>
            <div class="explain">含管理費</div>
            <ul><li>格局&nbsp;:&nbsp;3房2廳</li><li>坪數&nbsp;:&nbsp;28坪</li></ul>
          </div>
          <div class="userInfo"><div class="avatarRight">林先生（仲介）</div>{phone}</div>
        </div>
        <ul class="labelList"><li><div class="one">押金</div><div class="two"><em>兩個月</em></div></li></ul>
        <div class="houseIntro">安靜社區</div>
        </body></html>"#
    )
}

pub fn not_found_page() -> String {
    r#"<html><body><dl class="error_img"><dt>您查詢的物件不存在或已關閉</dt></dl></body></html>"#
        .to_string()
}
