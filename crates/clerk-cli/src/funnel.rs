//! Funnel orchestration: filter, cap, then score remotely with a
//! deterministic fallback when the scorer cannot run.

use clerk_core::{
    ContextualInsights, Product, RecommendationResult, StructuredQuery, cap_for_scoring,
    fallback_result, filter_products,
};

use crate::scorer::ScorerClient;

/// Run the full funnel for one query over one product list. Infallible:
/// every scorer failure degrades to the heuristic fallback, and an empty
/// filter result short-circuits before any network work.
pub async fn recommend(
    scorer: &ScorerClient,
    query: &str,
    parsed: &StructuredQuery,
    products: &[Product],
    insights: Option<&ContextualInsights>,
) -> RecommendationResult {
    let total = products.len();
    let filtered = filter_products(products, parsed);
    let filtered_len = filtered.len();
    if filtered.is_empty() {
        return RecommendationResult::no_matches(total);
    }
    let capped = cap_for_scoring(filtered);

    let mut result = if scorer.has_credential() {
        match scorer.score(query, &capped, parsed, insights).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("remote scoring failed, using fallback: {e}");
                fallback_result(&capped, e.fallback_reason(), total)
            }
        }
    } else {
        tracing::debug!("no API key, using fallback scorer");
        fallback_result(
            &capped,
            clerk_core::FallbackReason::MissingCredential,
            total,
        )
    };

    result.total_products = total;
    result.filtered_products = filtered_len;
    result
}
