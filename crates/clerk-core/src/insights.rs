//! Contextual insights derived from a preference snapshot.
//!
//! Never persisted — recomputed per request and handed to the funnel and
//! the remote scorer to bias ranking.

use serde::Serialize;

use crate::preferences::{Preferences, SessionContext};
use crate::query::BudgetOperator;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualInsights {
    pub recommended_budget: Option<BudgetInsight>,
    pub preferred_categories: Vec<PreferenceInsight>,
    pub preferred_brands: Vec<PreferenceInsight>,
    pub common_specs: Vec<SpecInsight>,
    pub search_patterns: SearchPatterns,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetInsight {
    pub range: String,
    pub average_amount: i64,
    pub operator: BudgetOperator,
    pub confidence: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceInsight {
    pub key: String,
    pub confidence: f64,
    pub count: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecInsight {
    pub spec_type: String,
    pub value: serde_json::Value,
    pub confidence: f64,
    pub count: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPatterns {
    pub total_queries: usize,
    pub recent_queries: Vec<String>,
    pub dominant_purpose: String,
}

const TOP_N: usize = 3;
const RECENT_N: usize = 3;

/// Pure derivation over a preference + session snapshot.
pub fn synthesize(prefs: &Preferences, session: &SessionContext) -> ContextualInsights {
    let recommended_budget = prefs.top_budget().map(|record| BudgetInsight {
        range: record.bucket.label().to_string(),
        average_amount: (record.total_amount / record.count as f64).round() as i64,
        operator: record.operator,
        confidence: record.confidence,
    });

    let preferred_categories = prefs
        .categories_ranked()
        .into_iter()
        .take(TOP_N)
        .map(|r| PreferenceInsight {
            key: r.key.clone(),
            confidence: r.confidence,
            count: r.count,
        })
        .collect();

    let preferred_brands = prefs
        .brands_ranked()
        .into_iter()
        .take(TOP_N)
        .map(|r| PreferenceInsight {
            key: r.key.clone(),
            confidence: r.confidence,
            count: r.count,
        })
        .collect();

    let common_specs = prefs
        .specs_ranked()
        .into_iter()
        .take(TOP_N)
        .map(|r| SpecInsight {
            spec_type: r.spec_type.clone(),
            value: r.value.clone(),
            confidence: r.confidence,
            count: r.count,
        })
        .collect();

    let search_patterns = SearchPatterns {
        total_queries: session.session_queries.len(),
        recent_queries: session.recent_queries(RECENT_N),
        dominant_purpose: prefs
            .dominant_purpose()
            .map(|r| r.key.clone())
            .unwrap_or_else(|| "general".to_string()),
    };

    ContextualInsights {
        recommended_budget,
        preferred_categories,
        preferred_brands,
        common_specs,
        search_patterns,
    }
}
