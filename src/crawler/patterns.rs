//! Text derivations used by the extractor. Each takes a fragment of page
//! text and returns `None` when the pattern does not apply.

use regex::Regex;
use std::sync::LazyLock;

static LISTING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.html").expect("hardcoded regex pattern is valid"));
static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((.*)\)").expect("hardcoded regex pattern is valid"));
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("hardcoded regex pattern is valid"));
static ROOMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)房").expect("hardcoded regex pattern is valid"));
static AREA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)坪").expect("hardcoded regex pattern is valid"));
static NAME_ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<name>.*)[（(](?P<role>.*)").expect("hardcoded regex pattern is valid")
});

/// Site boilerplate that shows up inside some label-list labels.
pub const PUBLIC_RECORD_NOTICE: &str = "非於政府免付費公開資料可查詢";

const NBSP: char = '\u{a0}';

/// Characters of an address that name the region, e.g. `台北市`.
const REGION_WIDTH: usize = 3;
/// Characters after the region that name the district, e.g. `大安區`.
const DISTRICT_WIDTH: usize = 3;

/// `https://.../rent-detail-123456.html` -> `123456`
pub fn listing_id(url: &str) -> Option<String> {
    LISTING_ID.captures(url).map(|c| c[1].to_string())
}

/// `收藏(12)` -> 12
pub fn favorite_count(text: &str) -> Option<i64> {
    let caps = PARENTHESIZED.captures(text)?;
    caps[1].trim().parse().ok()
}

/// First run of ASCII digits. `1,234` yields 1; strip separators first.
pub fn first_number(text: &str) -> Option<i64> {
    DIGITS.find(text)?.as_str().parse().ok()
}

/// Price text such as `18,000 元/月` -> 18000
pub fn price(text: &str) -> Option<i64> {
    first_number(&text.trim().replace(',', ""))
}

/// Layout such as `2房1廳1衛` -> 2
pub fn room_count(layout: &str) -> Option<i64> {
    ROOMS.captures(layout)?[1].parse().ok()
}

/// Size such as `12坪` -> 12
pub fn area(size: &str) -> Option<i64> {
    AREA.captures(size)?[1].parse().ok()
}

/// `王小姐（屋主聲明：仲介勿擾）` -> (`王小姐`, `屋主`)
///
/// The role keeps only its first two characters, which is how the site
/// encodes the landlord type.
pub fn landlord(text: &str) -> Option<(String, String)> {
    let caps = NAME_ROLE.captures(text.trim())?;
    let name = caps["name"].trim().to_string();
    let role: String = caps["role"].chars().take(2).collect();
    Some((name, role))
}

/// Split an address into its region and district prefixes. Returns `None`
/// if the address is too short to hold a region.
pub fn region_and_district(address: &str) -> Option<(String, String)> {
    let address = address.trim();
    if address.chars().count() < REGION_WIDTH {
        return None;
    }
    let region: String = address.chars().take(REGION_WIDTH).collect();
    let district: String = address
        .chars()
        .skip(REGION_WIDTH)
        .take(DISTRICT_WIDTH)
        .collect();
    Some((region, district))
}

/// `租金包含:管理費` style entry -> (`租金包含`, `管理費`). Only the text
/// between the first and second colon is kept as the value.
pub fn definition_entry(text: &str) -> Option<(String, String)> {
    let cleaned = strip_nbsp(text);
    let mut parts = cleaned.split(':');
    let label = parts.next()?.trim();
    let value = parts.next()?.trim();
    if label.is_empty() {
        return None;
    }
    Some((label.to_string(), value.to_string()))
}

/// Label-list pair normalization: spaces are removed from the label, and
/// the public-record notice moves from label to value.
pub fn label_pair(label: &str, value: &str) -> (String, String) {
    let label = label.replace(' ', "");
    let value = value.trim();
    if label.contains(PUBLIC_RECORD_NOTICE) {
        (
            label.replace(PUBLIC_RECORD_NOTICE, ""),
            format!("{value} ({PUBLIC_RECORD_NOTICE})"),
        )
    } else {
        (label, value.to_string())
    }
}

pub fn strip_nbsp(text: &str) -> String {
    text.replace(NBSP, "")
}
