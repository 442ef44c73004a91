//! Product records as supplied by the external catalog source.
//!
//! The core only reads these; extraction (selectors, fallbacks, currency
//! normalization) is the catalog collaborator's problem.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub id: String,
    pub title: String,
    /// Numeric, currency-normalized price. Zero when the source could not
    /// determine one.
    pub price: f64,
    pub rating: Option<f64>,
    pub category: Option<String>,
    pub specs: BTreeMap<String, serde_json::Value>,
    pub brand: Option<String>,
    pub url: String,
    pub site: String,
}

impl Product {
    pub fn new(id: &str, title: &str, price: f64) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            price,
            ..Self::default()
        }
    }
}
