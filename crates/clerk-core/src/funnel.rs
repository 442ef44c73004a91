//! Deterministic stages of the recommendation funnel.
//!
//! Stage A filters by budget and category, Stage B caps the candidate list
//! for scoring cost, and the fallback scorer produces a heuristic ranking
//! when the remote AI scorer is unavailable. Stage C orchestration (the
//! actual remote call) lives in the CLI crate; everything here is pure and
//! infallible.

use serde::Serialize;

use crate::product::Product;
use crate::query::{BudgetOperator, StructuredQuery};

/// Candidates passed to the scorer are capped at this many.
pub const SCORING_CAP: usize = 20;
/// Fallback recommendations are limited to this many.
pub const FALLBACK_LIMIT: usize = 5;
/// "Around" budgets accept prices up to amount × (1 + tolerance).
/// One-sided as observed in the source behavior — no lower bound.
pub const AROUND_TOLERANCE: f64 = 0.2;

const FALLBACK_REASON: &str = "Matched based on your search criteria";

/// Why the fallback scorer ran instead of the remote one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No credential for the remote scorer — the caller may prompt for setup.
    MissingCredential,
    /// Network, timeout, non-success status, or malformed response.
    Transient,
}

/// Where the scores in a result came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum ScoreSource {
    Ai,
    Fallback(FallbackReason),
    /// Stage A left nothing to score — a normal outcome, not an error.
    NoMatches,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub product: Product,
    pub score: f64,
    pub reason: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub compatibility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_alignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference_deviation: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub recommendations: Vec<Recommendation>,
    pub summary: String,
    pub build_suggestion: String,
    pub alternatives: String,
    pub context_insights: String,
    pub source: ScoreSource,
    pub total_products: usize,
    pub filtered_products: usize,
}

impl RecommendationResult {
    /// Zero products survived Stage A.
    pub fn no_matches(total_products: usize) -> Self {
        Self {
            recommendations: Vec::new(),
            summary: "No products matched your criteria on this page.".to_string(),
            build_suggestion: String::new(),
            alternatives: String::new(),
            context_insights: String::new(),
            source: ScoreSource::NoMatches,
            total_products,
            filtered_products: 0,
        }
    }
}

/// Stage A: budget and category filter. Never fails; an unconstrained
/// query keeps everything.
pub fn filter_products(products: &[Product], query: &StructuredQuery) -> Vec<Product> {
    products
        .iter()
        .filter(|p| within_budget(p, query) && matches_category(p, query))
        .cloned()
        .collect()
}

fn within_budget(product: &Product, query: &StructuredQuery) -> bool {
    let Some(budget) = &query.budget else {
        return true;
    };
    match budget.operator {
        BudgetOperator::Under => product.price <= budget.amount,
        BudgetOperator::Around => product.price <= budget.amount * (1.0 + AROUND_TOLERANCE),
    }
}

fn matches_category(product: &Product, query: &StructuredQuery) -> bool {
    if query.categories.is_empty() {
        return true;
    }
    let title = product.title.to_lowercase();
    query.categories.iter().any(|category| {
        product.category.as_deref() == Some(category.as_str())
            || title.contains(&category.replace('_', " "))
    })
}

/// Stage B: truncate for scoring cost. Original relative order preserved —
/// truncation only, no re-sort.
pub fn cap_for_scoring(mut products: Vec<Product>) -> Vec<Product> {
    products.truncate(SCORING_CAP);
    products
}

/// Heuristic score for the fallback path: base 50 plus 8 per rating star,
/// capped at 100. A missing rating contributes nothing.
pub fn fallback_score(product: &Product) -> f64 {
    let rating_bonus = product.rating.unwrap_or(0.0) * 8.0;
    (50.0 + rating_bonus).min(100.0)
}

fn fallback_pros(product: &Product) -> Vec<String> {
    if product.rating.is_some_and(|r| r >= 4.0) {
        vec!["High rating".to_string()]
    } else {
        let site = if product.site.is_empty() {
            "this site"
        } else {
            &product.site
        };
        vec![format!("Available on {site}")]
    }
}

/// Deterministic fallback: first `FALLBACK_LIMIT` entries of the already
/// filtered, already capped list, in their existing order.
pub fn fallback_result(
    filtered: &[Product],
    reason: FallbackReason,
    total_products: usize,
) -> RecommendationResult {
    let recommendations = filtered
        .iter()
        .take(FALLBACK_LIMIT)
        .map(|product| Recommendation {
            product: product.clone(),
            score: fallback_score(product),
            reason: FALLBACK_REASON.to_string(),
            pros: fallback_pros(product),
            cons: Vec::new(),
            compatibility: String::new(),
            context_alignment: None,
            preference_deviation: None,
        })
        .collect();

    RecommendationResult {
        recommendations,
        summary: "AI analysis unavailable. Showing products matched by your criteria.".to_string(),
        build_suggestion: String::new(),
        alternatives: String::new(),
        context_insights: String::new(),
        source: ScoreSource::Fallback(reason),
        total_products,
        filtered_products: filtered.len(),
    }
}
