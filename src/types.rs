use serde::{Deserialize, Serialize};

/// One item normalized into the app's fixed content model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    pub id: i64,
    pub name: String,
    pub subtitle: Option<String>,
    pub remarks: Option<String>,
    pub serial_number: Option<i64>,
    pub category_id: i64,
    pub actor: Option<String>,
    pub director: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    pub update_time: Option<String>,
    pub area: Option<String>,
    pub language: Option<String>,
    pub year: Option<i64>,
    pub category_name: Option<String>,
    pub tags: Option<String>,
    pub play_url: Option<String>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalCategory {
    pub id: i64,
    pub name: String,
    /// 0 marks a top-level category.
    pub parent_id: i64,
}

/// Paging metadata reported by a source. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_index: i64,
    pub page_count: i64,
    pub page_size: i64,
    pub record_count: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page_index: 1, page_count: 1, page_size: 20, record_count: 0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResponse {
    pub pagination: Pagination,
    pub categories: Vec<CanonicalCategory>,
    pub items: Vec<CanonicalItem>,
    /// Items dropped for missing required fields when the configuration is not fail-fast.
    #[serde(default)]
    pub skipped_items: usize,
}
