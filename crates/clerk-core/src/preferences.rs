//! Confidence-weighted preference model and short-term session context.
//!
//! Five dimensions are tracked: budget, categories, brands, specs, purposes.
//! Within a dimension every record's confidence is its share of the total
//! observation count, 0–100, renormalized across the whole dimension on
//! every update. Records live in insertion order; sorted accessors break
//! confidence ties by that order.
//!
//! This module is the pure half of the PreferenceStore — durability and
//! change notification live in the store crate.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::query::{Budget, BudgetOperator, StructuredQuery};

/// Session ring buffer capacity: oldest entries are evicted past this.
pub const SESSION_QUERY_CAP: usize = 10;

/// Fixed budget buckets. Amounts are rupees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetBucket {
    #[serde(rename = "Under ₹20k")]
    Under20k,
    #[serde(rename = "₹20k - ₹50k")]
    From20kTo50k,
    #[serde(rename = "₹50k - ₹75k")]
    From50kTo75k,
    #[serde(rename = "₹75k - ₹1L")]
    From75kTo1L,
    #[serde(rename = "₹1L - ₹1.5L")]
    From1LTo1_5L,
    #[serde(rename = "Above ₹1.5L")]
    Above1_5L,
}

impl BudgetBucket {
    pub fn of(amount: f64) -> Self {
        if amount < 20_000.0 {
            BudgetBucket::Under20k
        } else if amount < 50_000.0 {
            BudgetBucket::From20kTo50k
        } else if amount < 75_000.0 {
            BudgetBucket::From50kTo75k
        } else if amount < 100_000.0 {
            BudgetBucket::From75kTo1L
        } else if amount < 150_000.0 {
            BudgetBucket::From1LTo1_5L
        } else {
            BudgetBucket::Above1_5L
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BudgetBucket::Under20k => "Under ₹20k",
            BudgetBucket::From20kTo50k => "₹20k - ₹50k",
            BudgetBucket::From50kTo75k => "₹50k - ₹75k",
            BudgetBucket::From75kTo1L => "₹75k - ₹1L",
            BudgetBucket::From1LTo1_5L => "₹1L - ₹1.5L",
            BudgetBucket::Above1_5L => "Above ₹1.5L",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Under ₹20k" => Some(BudgetBucket::Under20k),
            "₹20k - ₹50k" => Some(BudgetBucket::From20kTo50k),
            "₹50k - ₹75k" => Some(BudgetBucket::From50kTo75k),
            "₹75k - ₹1L" => Some(BudgetBucket::From75kTo1L),
            "₹1L - ₹1.5L" => Some(BudgetBucket::From1LTo1_5L),
            "Above ₹1.5L" => Some(BudgetBucket::Above1_5L),
            _ => None,
        }
    }
}

impl std::fmt::Display for BudgetBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One observed budget bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRecord {
    pub bucket: BudgetBucket,
    pub count: u32,
    pub total_amount: f64,
    /// Most recently observed operator for this bucket.
    pub operator: BudgetOperator,
    pub confidence: f64,
}

/// One observed key (category, brand, or purpose).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub key: String,
    pub count: u32,
    pub confidence: f64,
    /// Unix milliseconds of the most recent observation.
    pub last_seen: u64,
}

/// One observed spec, keyed by `type:value-json` with the decoded parts kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecRecord {
    pub key: String,
    pub spec_type: String,
    pub value: serde_json::Value,
    pub count: u32,
    pub confidence: f64,
    pub last_seen: u64,
}

/// The five learned dimensions. Vectors keep first-insertion order, which
/// is the tie-break for equal confidence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub budget: Vec<BudgetRecord>,
    pub categories: Vec<KeyRecord>,
    pub brands: Vec<KeyRecord>,
    pub specs: Vec<SpecRecord>,
    pub purposes: Vec<KeyRecord>,
}

impl Preferences {
    pub fn is_empty(&self) -> bool {
        self.budget.is_empty()
            && self.categories.is_empty()
            && self.brands.is_empty()
            && self.specs.is_empty()
            && self.purposes.is_empty()
    }

    /// Fold one parsed query into the model. Each populated field upserts
    /// its dimension and renormalizes that whole dimension's confidence.
    /// The exclusive receiver is the atomicity guarantee: no reader can
    /// observe a count bumped but not yet renormalized.
    pub fn learn(&mut self, parsed: &StructuredQuery, now_ms: u64) {
        if let Some(budget) = &parsed.budget {
            self.learn_budget(budget);
        }
        if !parsed.categories.is_empty() {
            learn_keys(&mut self.categories, &parsed.categories, now_ms);
        }
        if !parsed.brands.is_empty() {
            learn_keys(&mut self.brands, &parsed.brands, now_ms);
        }
        let spec_entries = parsed.specs.entries();
        if !spec_entries.is_empty() {
            self.learn_specs(&spec_entries, now_ms);
        }
        if !parsed.purpose.is_empty() {
            learn_keys(&mut self.purposes, std::slice::from_ref(&parsed.purpose), now_ms);
        }
    }

    /// Reset all five dimensions to empty. Session context is untouched.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn learn_budget(&mut self, budget: &Budget) {
        let bucket = BudgetBucket::of(budget.amount);
        match self.budget.iter_mut().find(|r| r.bucket == bucket) {
            Some(record) => {
                record.count += 1;
                record.total_amount += budget.amount;
                record.operator = budget.operator;
            }
            None => self.budget.push(BudgetRecord {
                bucket,
                count: 1,
                total_amount: budget.amount,
                operator: budget.operator,
                confidence: 0.0,
            }),
        }
        let total: u32 = self.budget.iter().map(|r| r.count).sum();
        for record in &mut self.budget {
            record.confidence = share(record.count, total);
        }
    }

    fn learn_specs(&mut self, entries: &[(String, serde_json::Value)], now_ms: u64) {
        for (spec_type, value) in entries {
            let key = format!("{spec_type}:{value}");
            match self.specs.iter_mut().find(|r| r.key == key) {
                Some(record) => {
                    record.count += 1;
                    record.last_seen = now_ms;
                }
                None => self.specs.push(SpecRecord {
                    key,
                    spec_type: spec_type.clone(),
                    value: value.clone(),
                    count: 1,
                    confidence: 0.0,
                    last_seen: now_ms,
                }),
            }
        }
        let total: u32 = self.specs.iter().map(|r| r.count).sum();
        for record in &mut self.specs {
            record.confidence = share(record.count, total);
        }
    }

    // --- Sorted accessors ---

    /// Categories by confidence descending, insertion order on ties.
    pub fn categories_ranked(&self) -> Vec<&KeyRecord> {
        ranked(&self.categories)
    }

    pub fn brands_ranked(&self) -> Vec<&KeyRecord> {
        ranked(&self.brands)
    }

    pub fn purposes_ranked(&self) -> Vec<&KeyRecord> {
        ranked(&self.purposes)
    }

    pub fn specs_ranked(&self) -> Vec<&SpecRecord> {
        let mut records: Vec<&SpecRecord> = self.specs.iter().collect();
        records.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        records
    }

    /// Highest-confidence budget bucket, if any budget was ever observed.
    pub fn top_budget(&self) -> Option<&BudgetRecord> {
        let mut records: Vec<&BudgetRecord> = self.budget.iter().collect();
        records.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        records.first().copied()
    }

    pub fn dominant_purpose(&self) -> Option<&KeyRecord> {
        self.purposes_ranked().first().copied()
    }
}

fn share(count: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((count as f64 / total as f64) * 100.0).min(100.0)
}

fn learn_keys(records: &mut Vec<KeyRecord>, keys: &[String], now_ms: u64) {
    for key in keys {
        match records.iter_mut().find(|r| &r.key == key) {
            Some(record) => {
                record.count += 1;
                record.last_seen = now_ms;
            }
            None => records.push(KeyRecord {
                key: key.clone(),
                count: 1,
                confidence: 0.0,
                last_seen: now_ms,
            }),
        }
    }
    let total: u32 = records.iter().map(|r| r.count).sum();
    for record in records.iter_mut() {
        record.confidence = share(record.count, total);
    }
}

fn ranked(records: &[KeyRecord]) -> Vec<&KeyRecord> {
    let mut out: Vec<&KeyRecord> = records.iter().collect();
    // Stable sort — insertion order survives as the tie-break.
    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    out
}

// --- Session context ---

/// One remembered query in the session ring buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub id: Uuid,
    pub query: String,
    pub parsed: StructuredQuery,
    /// Unix milliseconds.
    pub timestamp: u64,
}

/// Short-term browsing state, persisted alongside the preferences but
/// cleared independently of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionContext {
    pub current_page: String,
    pub product_count: usize,
    pub last_query: String,
    pub session_queries: VecDeque<SessionQuery>,
    pub browsed_products: Vec<String>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            current_page: "Unknown".to_string(),
            product_count: 0,
            last_query: "None".to_string(),
            session_queries: VecDeque::new(),
            browsed_products: Vec::new(),
        }
    }
}

impl SessionContext {
    /// Append to the ring buffer, evicting the oldest entry past the cap.
    pub fn record_query(&mut self, query: &str, parsed: &StructuredQuery, now_ms: u64) {
        self.last_query = query.to_string();
        self.session_queries.push_back(SessionQuery {
            id: Uuid::new_v4(),
            query: query.to_string(),
            parsed: parsed.clone(),
            timestamp: now_ms,
        });
        while self.session_queries.len() > SESSION_QUERY_CAP {
            self.session_queries.pop_front();
        }
    }

    pub fn update_page(&mut self, site: &str, product_count: usize) {
        self.current_page = site.to_string();
        self.product_count = product_count;
    }

    /// Raw text of the most recent `n` queries, chronological order.
    pub fn recent_queries(&self, n: usize) -> Vec<String> {
        let skip = self.session_queries.len().saturating_sub(n);
        self.session_queries
            .iter()
            .skip(skip)
            .map(|q| q.query.clone())
            .collect()
    }
}
