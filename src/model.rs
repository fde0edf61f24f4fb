use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A product as delivered by a source, before normalization. Every field is
/// optional and untyped; `normalize` is the only place these get resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_offer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Value>,
    /// Source fields the pipeline does not interpret (originalPrice, sellerName, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Normalized product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub rating: f64,
    pub review_count: u64,
    pub special_offer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub collected_at: DateTime<Utc>,
}

/// One page of the remote listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageResult {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub products: Vec<RawItem>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    has_next_page: bool,
}

impl PageResult {
    #[cfg(test)]
    pub fn new(products: Vec<RawItem>, has_next_page: bool) -> Self {
        Self {
            products,
            pagination: Some(Pagination { has_next_page }),
        }
    }

    /// Absent pagination info counts as "no next page".
    pub fn has_next_page(&self) -> bool {
        self.pagination.as_ref().is_some_and(|p| p.has_next_page)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<RawItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<RawItem>>::deserialize(deserializer)?.unwrap_or_default())
}

/// All items accumulated across the pages of one listing.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub items: Vec<RawItem>,
    pub pages_visited: u32,
}

/// Result of the `collect` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedBatch {
    pub scraped_at: DateTime<Utc>,
    pub category: String,
    pub total_products: usize,
    pub pages_processed: u32,
    pub products: Vec<CanonicalRecord>,
}

/// Result of the single-page `page` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub page_number: u32,
    pub category: String,
    pub page_size: u32,
    pub product_count: usize,
    pub products: Vec<CanonicalRecord>,
}
