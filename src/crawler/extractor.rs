// extractor.rs
use crate::crawler::discovery::parse_selector;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::models::{AttrValue, Extraction, Field, ListingLink, ListingRecord, SkipReason, ViewCounts};
use crate::crawler::patterns;
use crate::errors::CrawlResult;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Attribute harvested from the detail list that carries the layout.
pub const LAYOUT_LABEL: &str = "格局";
/// Attribute harvested from the detail list that carries the size.
pub const SIZE_LABEL: &str = "坪數";

struct DetailSelectors {
    not_found: Selector,
    prop_nav: Selector,
    address: Selector,
    favorites: Selector,
    page_view: Selector,
    desktop_views: Selector,
    mobile_views: Selector,
    right_box: Selector,
    detail_info: Selector,
    price: Selector,
    explain: Selector,
    info_list: Selector,
    user_info: Selector,
    avatar_right: Selector,
    phone: Selector,
    label_list: Selector,
    label_one: Selector,
    label_two: Selector,
    em: Selector,
    house_intro: Selector,
}

impl DetailSelectors {
    fn new() -> CrawlResult<Self> {
        Ok(Self {
            not_found: parse_selector("dl.error_img")?,
            prop_nav: parse_selector("#propNav")?,
            address: parse_selector("span.addr")?,
            favorites: parse_selector("#j_addfav")?,
            page_view: parse_selector("div.pageView")?,
            desktop_views: parse_selector("span.pc")?,
            mobile_views: parse_selector("span.mobile")?,
            right_box: parse_selector("div.rightBox")?,
            detail_info: parse_selector("div.detailInfo")?,
            price: parse_selector("div.price")?,
            explain: parse_selector("div.explain")?,
            info_list: parse_selector("ul")?,
            user_info: parse_selector("div.userInfo")?,
            avatar_right: parse_selector("div.avatarRight")?,
            phone: parse_selector("span.dialPhoneNum")?,
            label_list: parse_selector("ul.labelList")?,
            label_one: parse_selector("div.one")?,
            label_two: parse_selector("div.two")?,
            em: parse_selector("em")?,
            house_intro: parse_selector("div.houseIntro")?,
        })
    }
}

pub struct Extractor<'a> {
    fetcher: &'a dyn PageFetcher,
    selectors: DetailSelectors,
}

impl<'a> Extractor<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher) -> CrawlResult<Self> {
        Ok(Self {
            fetcher,
            selectors: DetailSelectors::new()?,
        })
    }

    /// Fetch one listing and turn it into a record, or say why not.
    pub fn extract(&self, link: &ListingLink) -> Extraction {
        let page = match self.fetcher.fetch(&link.url, &[]) {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                warn!(
                    id = %link.id,
                    url = %link.url,
                    final_url = %page.url,
                    status = page.status,
                    "detail request failed"
                );
                return Extraction::Skip(SkipReason::FetchFailed);
            }
            Err(e) => {
                warn!(id = %link.id, url = %link.url, error = %e, "detail request failed");
                return Extraction::Skip(SkipReason::FetchFailed);
            }
        };

        self.extract_html(link, &page.body)
    }

    /// Parse an already-fetched detail page.
    pub fn extract_html(&self, link: &ListingLink, html: &str) -> Extraction {
        let doc = Html::parse_document(html);
        let sel = &self.selectors;

        if doc.select(&sel.not_found).next().is_some() {
            warn!(id = %link.id, "listing not found");
            return Extraction::Skip(SkipReason::NotFound);
        }

        let mut record = ListingRecord::new(link.id.clone());

        // Address is the one piece of page structure a record cannot do
        // without: the region check depends on it.
        let prop_nav = doc.select(&sel.prop_nav).next();
        let address = prop_nav
            .and_then(|nav| first_text(nav, &sel.address))
            .map(|t| t.trim().to_string());
        let Some((region, district)) = address.as_deref().and_then(patterns::region_and_district) else {
            warn!(id = %link.id, "detail page has no usable address");
            return Extraction::Skip(SkipReason::Malformed);
        };

        if region != link.region.name {
            warn!(id = %link.id, found = %region, expected = link.region.name, "listing from another region, ignoring");
            return Extraction::Skip(SkipReason::RegionMismatch);
        }

        record.set_opt(Field::Address, address);
        record.set(Field::Region, region);
        record.set(Field::District, district);

        let favorites = prop_nav
            .and_then(|nav| first_text(nav, &sel.favorites))
            .and_then(|t| patterns::favorite_count(&t));
        record.set_opt(Field::Favorites, favorites);

        if let Some(views) = self.view_counts(&doc) {
            record.set(Field::Views, AttrValue::Views(views));
        }

        let detail_info = doc
            .select(&sel.right_box)
            .next()
            .and_then(|rb| rb.select(&sel.detail_info).next());

        if let Some(info) = detail_info {
            let price = first_text(info, &sel.price).and_then(|t| patterns::price(&t));
            record.set_opt(Field::Price, price);
            record.set_opt(Field::PriceIncludes, first_text(info, &sel.explain).map(|t| t.trim().to_string()));

            if let Some(list) = info.select(&sel.info_list).next() {
                let items = list
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "li");
                for item in items {
                    if let Some((label, value)) = patterns::definition_entry(&element_text(item)) {
                        record.set_attribute(label, value);
                    }
                }
            }
        }

        let rooms = record.attribute_text(LAYOUT_LABEL).and_then(patterns::room_count);
        record.set_opt(Field::Rooms, rooms);
        let area = record.attribute_text(SIZE_LABEL).and_then(patterns::area);
        record.set_opt(Field::Area, area);

        let user_info = doc
            .select(&sel.right_box)
            .next()
            .and_then(|rb| rb.select(&sel.user_info).next());

        let landlord = user_info
            .and_then(|ui| first_text(ui, &sel.avatar_right))
            .and_then(|t| patterns::landlord(&t));
        if let Some((name, role)) = landlord {
            record.set(Field::Landlord, name);
            record.set(Field::LandlordRole, role);
        }

        let phone = user_info
            .and_then(|ui| ui.select(&sel.phone).next())
            .and_then(|span| span.value().attr("data-value"))
            .unwrap_or_default();
        record.set(Field::Phone, phone);

        if let Some(list) = doc.select(&sel.label_list).next() {
            let labels = list.select(&sel.label_one);
            let values = list.select(&sel.label_two);
            for (one, two) in labels.zip(values) {
                let Some(value) = first_text(two, &sel.em) else {
                    continue;
                };
                let (label, value) = patterns::label_pair(&element_text(one), &value);
                if !label.is_empty() {
                    record.set_attribute(label, value);
                }
            }
        }

        let description = doc
            .select(&sel.house_intro)
            .next()
            .map(|intro| patterns::strip_nbsp(&element_text(intro)).trim().to_string());
        record.set_opt(Field::Description, description);

        debug!(id = %link.id, "listing extracted");
        Extraction::Record(record)
    }

    fn view_counts(&self, doc: &Html) -> Option<ViewCounts> {
        let sel = &self.selectors;
        let page_view = doc.select(&sel.page_view).next()?;
        let desktop = sibling_number(page_view, &sel.desktop_views)?;
        let mobile = sibling_number(page_view, &sel.mobile_views)?;
        let views = ViewCounts::new(desktop, mobile);
        if views.is_none() {
            warn!(desktop, mobile, "view counts overflow, dropping them");
        }
        views
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(element_text)
}

/// Number in the element right after the labelled span.
fn sibling_number(scope: ElementRef<'_>, label: &Selector) -> Option<i64> {
    let label = scope.select(label).next()?;
    let value = label.next_siblings().find_map(ElementRef::wrap)?;
    patterns::first_number(&element_text(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::FetchedPage;
    use crate::regions;

    struct Unused;

    impl PageFetcher for Unused {
        fn fetch(&self, _url: &str, _headers: &[(&str, String)]) -> CrawlResult<FetchedPage> {
            unreachable!("html-only tests never fetch")
        }
    }

    fn taipei_link() -> ListingLink {
        ListingLink::new(
            "https://rent.591.com.tw/rent-detail-123456.html",
            regions::lookup("台北市").unwrap(),
        )
        .unwrap()
    }

    const FULL_PAGE: &str = r#"
        <html><body>
        <div id="propNav">
          <span class="addr">台北市大安區和平東路二段</span>
          <a id="j_addfav">收藏(7)</a>
        </div>
        <div class="pageView">
          <span class="pc">電腦</span><span>120 次</span>
          <span class="mobile">手機</span><span>80 次</span>
        </div>
        <div class="rightBox">
          <div class="detailInfo">
            <div class="price"> 18,000 元/月 </div>
            <div class="explain">租金含管理費</div>
            <ul>
              <li>格局&nbsp;:&nbsp;2房1廳1衛</li>
              <li>坪數&nbsp;:&nbsp;15坪</li>
              <li>樓層&nbsp;:&nbsp;3F/5F</li>
            </ul>
          </div>
          <div class="userInfo">
            <div class="avatarRight">王小姐（屋主聲明：仲介勿擾）</div>
            <span class="dialPhoneNum" data-value="0912-345-678"></span>
          </div>
        </div>
        <ul class="labelList">
          <li><div class="one">最短 租期</div><div class="two"><em> 一年 </em></div></li>
          <li><div class="one">產權登記非於政府免付費公開資料可查詢</div><div class="two"><em>已登記</em></div></li>
        </ul>
        <div class="houseIntro">&nbsp;近捷運，採光佳&nbsp;</div>
        </body></html>
    "#;

    #[test]
    fn extracts_every_known_field() {
        let extractor = Extractor::new(&Unused).unwrap();
        let Extraction::Record(record) = extractor.extract_html(&taipei_link(), FULL_PAGE) else {
            panic!("expected a record");
        };

        assert_eq!(record.id, "123456");
        assert_eq!(record.text(Field::Address), Some("台北市大安區和平東路二段"));
        assert_eq!(record.text(Field::Region), Some("台北市"));
        assert_eq!(record.text(Field::District), Some("大安區"));
        assert_eq!(record.int(Field::Favorites), Some(7));
        assert_eq!(record.views(), ViewCounts::new(120, 80));
        assert_eq!(record.views().map(|v| v.total()), Some(200));
        assert_eq!(record.int(Field::Price), Some(18000));
        assert_eq!(record.text(Field::PriceIncludes), Some("租金含管理費"));
        assert_eq!(record.attribute_text("格局"), Some("2房1廳1衛"));
        assert_eq!(record.attribute_text("樓層"), Some("3F/5F"));
        assert_eq!(record.int(Field::Rooms), Some(2));
        assert_eq!(record.int(Field::Area), Some(15));
        assert_eq!(record.text(Field::Landlord), Some("王小姐"));
        assert_eq!(record.text(Field::LandlordRole), Some("屋主"));
        assert_eq!(record.text(Field::Phone), Some("0912-345-678"));
        assert_eq!(record.attribute_text("最短租期"), Some("一年"));
        assert_eq!(
            record.attribute_text("產權登記"),
            Some("已登記 (非於政府免付費公開資料可查詢)")
        );
        assert_eq!(record.text(Field::Description), Some("近捷運，採光佳"));
    }

    #[test]
    fn not_found_marker_skips() {
        let extractor = Extractor::new(&Unused).unwrap();
        let html = r#"<dl class="error_img"><dt>物件不存在</dt></dl>"#;
        assert_eq!(
            extractor.extract_html(&taipei_link(), html),
            Extraction::Skip(SkipReason::NotFound)
        );
    }

    #[test]
    fn other_region_skips() {
        let extractor = Extractor::new(&Unused).unwrap();
        let html = FULL_PAGE.replace("台北市大安區", "新北市板橋區");
        assert_eq!(
            extractor.extract_html(&taipei_link(), &html),
            Extraction::Skip(SkipReason::RegionMismatch)
        );
    }

    #[test]
    fn missing_address_is_malformed() {
        let extractor = Extractor::new(&Unused).unwrap();
        let html = r#"<div class="rightBox"><div class="detailInfo"><div class="price">1,000</div></div></div>"#;
        assert_eq!(
            extractor.extract_html(&taipei_link(), html),
            Extraction::Skip(SkipReason::Malformed)
        );
    }

    #[test]
    fn optional_parts_missing_still_yield_record() {
        let extractor = Extractor::new(&Unused).unwrap();
        let html = r#"<div id="propNav"><span class="addr">台北市中山區南京東路</span></div>"#;
        let Extraction::Record(record) = extractor.extract_html(&taipei_link(), html) else {
            panic!("expected a record");
        };
        assert_eq!(record.text(Field::District), Some("中山區"));
        assert_eq!(record.text(Field::Phone), Some(""));
        assert_eq!(record.views(), None);
        assert_eq!(record.int(Field::Price), None);
        assert_eq!(record.int(Field::Rooms), None);
        assert_eq!(record.get(Field::Landlord), None);
        assert_eq!(record.get(Field::Description), None);
    }

    #[test]
    fn missing_phone_is_empty_not_skip() {
        let extractor = Extractor::new(&Unused).unwrap();
        let html = FULL_PAGE.replace(r#"<span class="dialPhoneNum" data-value="0912-345-678"></span>"#, "");
        let Extraction::Record(record) = extractor.extract_html(&taipei_link(), &html) else {
            panic!("expected a record");
        };
        assert_eq!(record.text(Field::Phone), Some(""));
    }

    #[test]
    fn one_missing_view_count_drops_the_breakdown() {
        let extractor = Extractor::new(&Unused).unwrap();
        let html = FULL_PAGE.replace(r#"<span class="mobile">手機</span><span>80 次</span>"#, "");
        let Extraction::Record(record) = extractor.extract_html(&taipei_link(), &html) else {
            panic!("expected a record");
        };
        assert_eq!(record.views(), None);
        assert_eq!(record.int(Field::Price), Some(18000));
    }

    #[test]
    fn view_counts_whose_total_overflows_are_dropped() {
        let extractor = Extractor::new(&Unused).unwrap();
        let html = FULL_PAGE
            .replace("120 次", "9223372036854775807 次")
            .replace("80 次", "1 次");
        let Extraction::Record(record) = extractor.extract_html(&taipei_link(), &html) else {
            panic!("expected a record");
        };
        assert_eq!(record.views(), None);
        assert_eq!(record.to_document().get("瀏覽次數"), None);
        assert_eq!(record.int(Field::Favorites), Some(7));
    }

    #[test]
    fn address_is_stored_trimmed() {
        let extractor = Extractor::new(&Unused).unwrap();
        let html = FULL_PAGE.replace(
            "<span class=\"addr\">台北市大安區和平東路二段</span>",
            "<span class=\"addr\">\n   台北市大安區和平東路二段  \n</span>",
        );
        let Extraction::Record(record) = extractor.extract_html(&taipei_link(), &html) else {
            panic!("expected a record");
        };
        assert_eq!(record.text(Field::Address), Some("台北市大安區和平東路二段"));
        assert_eq!(record.text(Field::District), Some("大安區"));
    }
}
