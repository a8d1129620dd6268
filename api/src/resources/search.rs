use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::resources::dataset::Dataset;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SearchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_private: Option<bool>,
    /// Anything else the search action accepts, passed through as is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchParams {
    pub fn with_fq(mut self, fq: impl Into<String>) -> Self {
        self.fq = Some(fq.into());
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SearchResults {
    pub count: u64,
    #[serde(default)]
    pub results: Vec<Dataset>,
    #[serde(default)]
    pub search_facets: BTreeMap<String, SearchFacet>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SearchFacet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<FacetItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FacetItem {
    pub name: String,
    pub display_name: String,
    pub count: u64,
}
