use crate::crawler::patterns;
use crate::errors::{CrawlResult, CrawlerError};
use crate::regions::Region;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// record
//  ├── 物件號        id (from url)
//  ├── 地址 / 縣市 / 鄉鎮區
//  ├── 收藏
//  ├── 瀏覽次數
//  │    ├── 電腦
//  │    ├── 手機
//  │    └── 共      (computed)
//  ├── 租金 / 租金包含
//  ├── 房間數 / 坪   (derived from 格局 / 坪數)
//  ├── 出租者 / 出租者身份 / 聯絡電話
//  ├── 屋況說明
//  └── ...         labels harvested from the page

/// A listing detail URL found during discovery, tagged with the region it
/// was discovered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    pub url: String,
    pub id: String,
    pub region: Region,
}

impl ListingLink {
    /// Fails when the URL carries no `<digits>.html` identifier.
    pub fn new(url: impl Into<String>, region: Region) -> CrawlResult<Self> {
        let url = url.into();
        let id = patterns::listing_id(&url).ok_or_else(|| CrawlerError::MissingIdentifier(url.clone()))?;
        Ok(Self { url, id, region })
    }
}

/// Attributes with a fixed meaning. Everything else lands in
/// `ListingRecord::attributes` under whatever label the page used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Id,
    Address,
    Region,
    District,
    Favorites,
    Views,
    Price,
    PriceIncludes,
    Rooms,
    Area,
    Landlord,
    LandlordRole,
    Phone,
    Description,
}

impl Field {
    #[cfg(test)]
    pub const ALL: [Field; 14] = [
        Field::Id,
        Field::Address,
        Field::Region,
        Field::District,
        Field::Favorites,
        Field::Views,
        Field::Price,
        Field::PriceIncludes,
        Field::Rooms,
        Field::Area,
        Field::Landlord,
        Field::LandlordRole,
        Field::Phone,
        Field::Description,
    ];

    /// Document key used in the index.
    pub fn label(self) -> &'static str {
        match self {
            Field::Id => "物件號",
            Field::Address => "地址",
            Field::Region => "縣市",
            Field::District => "鄉鎮區",
            Field::Favorites => "收藏",
            Field::Views => "瀏覽次數",
            Field::Price => "租金",
            Field::PriceIncludes => "租金包含",
            Field::Rooms => "房間數",
            Field::Area => "坪",
            Field::Landlord => "出租者",
            Field::LandlordRole => "出租者身份",
            Field::Phone => "聯絡電話",
            Field::Description => "屋況說明",
        }
    }
}

/// Desktop and mobile page views. The total is always derived, and only
/// counts whose sum fits in an `i64` can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewCounts {
    desktop: i64,
    mobile: i64,
}

impl ViewCounts {
    pub fn new(desktop: i64, mobile: i64) -> Option<Self> {
        desktop.checked_add(mobile)?;
        Some(Self { desktop, mobile })
    }

    pub fn desktop(&self) -> i64 {
        self.desktop
    }

    pub fn mobile(&self) -> i64 {
        self.mobile
    }

    pub fn total(&self) -> i64 {
        // `new` rejected any pair that overflows.
        self.desktop + self.mobile
    }
}

impl Serialize for ViewCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("電腦", &self.desktop())?;
        map.serialize_entry("手機", &self.mobile())?;
        map.serialize_entry("共", &self.total())?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Text(String),
    Views(ViewCounts),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

/// One extracted listing. `id` is mandatory; the rest is whatever the page
/// offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub id: String,
    fields: BTreeMap<Field, AttrValue>,
    attributes: BTreeMap<String, AttrValue>,
}

impl ListingRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<AttrValue>) {
        if field == Field::Id {
            return;
        }
        self.fields.insert(field, value.into());
    }

    pub fn set_opt<V: Into<AttrValue>>(&mut self, field: Field, value: Option<V>) {
        if let Some(v) = value {
            self.set(field, v);
        }
    }

    #[cfg(test)]
    pub fn get(&self, field: Field) -> Option<&AttrValue> {
        self.fields.get(&field)
    }

    #[cfg(test)]
    pub fn text(&self, field: Field) -> Option<&str> {
        match self.fields.get(&field) {
            Some(AttrValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn int(&self, field: Field) -> Option<i64> {
        match self.fields.get(&field) {
            Some(AttrValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn views(&self) -> Option<ViewCounts> {
        match self.fields.get(&Field::Views) {
            Some(AttrValue::Views(v)) => Some(*v),
            _ => None,
        }
    }

    /// Add a page-harvested attribute. Later values for the same label win.
    pub fn set_attribute(&mut self, label: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(label.into(), value.into());
    }

    pub fn attribute_text(&self, label: &str) -> Option<&str> {
        match self.attributes.get(label) {
            Some(AttrValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Flat index document. First-class fields shadow harvested attributes
    /// that happen to share a label.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        for (label, value) in &self.attributes {
            doc.insert(label.clone(), attr_json(value));
        }
        doc.insert(Field::Id.label().to_string(), Value::String(self.id.clone()));
        for (field, value) in &self.fields {
            doc.insert(field.label().to_string(), attr_json(value));
        }
        Value::Object(doc)
    }
}

fn attr_json(value: &AttrValue) -> Value {
    // AttrValue only holds integers, strings and maps of integers.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl Serialize for ListingRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

/// Why a link produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    FetchFailed,
    NotFound,
    RegionMismatch,
    Malformed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::FetchFailed => "fetch-failed",
            SkipReason::NotFound => "not-found",
            SkipReason::RegionMismatch => "region-mismatch",
            SkipReason::Malformed => "malformed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Record(ListingRecord),
    Skip(SkipReason),
}
