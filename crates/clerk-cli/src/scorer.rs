//! Remote AI scorer client (Gemini generateContent).
//!
//! Builds a context-aware prompt from the query, the capped candidate list,
//! and the learned insights, then decodes the model's JSON verdict back
//! into [`Recommendation`]s. Every failure mode maps to a
//! [`FallbackReason`] so the funnel can degrade instead of erroring out.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use clerk_core::{
    ContextualInsights, FallbackReason, Product, Recommendation, RecommendationResult,
    ScoreSource, StructuredQuery,
};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "CLERK_API_KEY";

#[derive(Debug)]
pub enum ScorerError {
    MissingCredential,
    Http(reqwest::Error),
    BadStatus(u16, String),
    Malformed(String),
}

impl fmt::Display for ScorerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScorerError::MissingCredential => {
                write!(f, "no API key set (export {API_KEY_ENV})")
            }
            ScorerError::Http(e) => write!(f, "request failed: {e}"),
            ScorerError::BadStatus(status, body) => {
                write!(f, "scorer returned HTTP {status}: {body}")
            }
            ScorerError::Malformed(msg) => write!(f, "malformed scorer response: {msg}"),
        }
    }
}

impl std::error::Error for ScorerError {}

impl From<reqwest::Error> for ScorerError {
    fn from(e: reqwest::Error) -> Self {
        ScorerError::Http(e)
    }
}

impl ScorerError {
    pub fn fallback_reason(&self) -> FallbackReason {
        match self {
            ScorerError::MissingCredential => FallbackReason::MissingCredential,
            _ => FallbackReason::Transient,
        }
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_k: u32,
    top_p: f64,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// The JSON verdict the model is instructed to emit.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Verdict {
    recommendations: Vec<VerdictEntry>,
    summary: String,
    build_suggestion: String,
    alternatives: String,
    context_insights: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerdictEntry {
    product_id: usize,
    score: f64,
    reason: String,
    #[serde(default)]
    pros: Vec<String>,
    #[serde(default)]
    cons: Vec<String>,
    #[serde(default)]
    compatibility: String,
    #[serde(default)]
    context_alignment: Option<String>,
    #[serde(default)]
    preference_deviation: Option<String>,
}

/// Candidate entry as presented to the model: index-keyed so the verdict
/// can reference products without echoing them back.
#[derive(Serialize)]
struct PromptProduct<'a> {
    id: usize,
    title: &'a str,
    price: f64,
    category: &'a Option<String>,
    specs: &'a std::collections::BTreeMap<String, serde_json::Value>,
    rating: Option<f64>,
    site: &'a str,
}

pub struct ScorerClient {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl ScorerClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(api_key: Option<String>, endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: endpoint.to_string(),
        }
    }

    /// Credential presence is checked before any network work, so the
    /// missing-key path stays fully offline.
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Score an already filtered, already capped candidate list.
    pub async fn score(
        &self,
        query: &str,
        products: &[Product],
        parsed: &StructuredQuery,
        insights: Option<&ContextualInsights>,
    ) -> Result<RecommendationResult, ScorerError> {
        let Some(api_key) = &self.api_key else {
            return Err(ScorerError::MissingCredential);
        };

        let prompt = build_prompt(query, products, parsed, insights);
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig::default(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScorerError::BadStatus(status.as_u16(), body));
        }

        let data: GenerateResponse = response.json().await?;
        let text = data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ScorerError::Malformed("no candidate text".to_string()))?;

        let verdict = parse_verdict(&text)?;
        into_result(verdict, products)
    }
}

/// Prompt for the model: learned context, the current parsed query, and an
/// index-keyed product list, ending with the required JSON shape.
pub fn build_prompt(
    query: &str,
    products: &[Product],
    parsed: &StructuredQuery,
    insights: Option<&ContextualInsights>,
) -> String {
    let prompt_products: Vec<PromptProduct> = products
        .iter()
        .enumerate()
        .map(|(id, p)| PromptProduct {
            id,
            title: &p.title,
            price: p.price,
            category: &p.category,
            specs: &p.specs,
            rating: p.rating,
            site: &p.site,
        })
        .collect();
    let products_json =
        serde_json::to_string_pretty(&prompt_products).unwrap_or_else(|_| "[]".to_string());

    let mut context_section = String::new();
    if let Some(insights) = insights {
        let budget = insights
            .recommended_budget
            .as_ref()
            .map(|b| format!("{} (confidence: {:.0}%)", b.range, b.confidence))
            .unwrap_or_else(|| "None".to_string());
        let categories = join_or_none(
            insights
                .preferred_categories
                .iter()
                .map(|c| format!("{} ({:.0}%)", c.key, c.confidence)),
        );
        let brands = join_or_none(
            insights
                .preferred_brands
                .iter()
                .map(|b| format!("{} ({:.0}%)", b.key, b.confidence)),
        );
        let specs = join_or_none(
            insights
                .common_specs
                .iter()
                .map(|s| format!("{}: {} ({:.0}%)", s.spec_type, s.value, s.confidence)),
        );
        let recent = join_or_none(insights.search_patterns.recent_queries.iter().cloned());

        context_section = format!(
            "LEARNED USER CONTEXT:\n\
             - Previous Budget Preferences: {budget}\n\
             - Preferred Categories: {categories}\n\
             - Preferred Brands: {brands}\n\
             - Common Specs: {specs}\n\
             - Search Patterns: {} total queries, dominant purpose: {}\n\
             - Recent Queries: {recent}\n\n\
             CONTEXT-AWARE INSTRUCTIONS:\n\
             1. Consider the user's learned preferences when making recommendations\n\
             2. If the current query conflicts with learned preferences, gently suggest alternatives\n\
             3. Use the confidence scores to weight your recommendations\n\
             4. Mention how current products align with their typical preferences\n\
             5. If this is a new category for them, provide extra guidance\n",
            insights.search_patterns.total_queries, insights.search_patterns.dominant_purpose,
        );
    }

    let budget_line = parsed
        .budget
        .map(|b| format!("₹{} ({})", b.amount, b.operator))
        .unwrap_or_else(|| "Not specified".to_string());
    let categories_line = if parsed.categories.is_empty() {
        "Not specified".to_string()
    } else {
        parsed.categories.join(", ")
    };
    let brands_line = if parsed.brands.is_empty() {
        "Not specified".to_string()
    } else {
        parsed.brands.join(", ")
    };
    let specs_line =
        serde_json::to_string(&parsed.specs).unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are an expert PC hardware salesman assistant with access to the user's learned \
         preferences and shopping history. Analyze the user's query and recommend the best \
         products from the available options.\n\n\
         {context_section}\n\
         Current User Query: \"{query}\"\n\n\
         Current Query Requirements:\n\
         - Budget: {budget_line}\n\
         - Categories: {categories_line}\n\
         - Purpose: {}\n\
         - Brands: {brands_line}\n\
         - Specs: {specs_line}\n\n\
         Available Products:\n{products_json}\n\n\
         Respond in JSON format:\n\
         {{\n\
           \"recommendations\": [\n\
             {{\n\
               \"productId\": 0,\n\
               \"score\": 95,\n\
               \"reason\": \"Detailed explanation including context alignment\",\n\
               \"pros\": [\"List of advantages\"],\n\
               \"cons\": [\"List of disadvantages or limitations\"],\n\
               \"compatibility\": \"Compatibility notes\",\n\
               \"contextAlignment\": \"How this aligns with learned preferences\",\n\
               \"preferenceDeviation\": \"Any departures from usual preferences\"\n\
             }}\n\
           ],\n\
           \"summary\": \"Context-aware recommendation summary\",\n\
           \"buildSuggestion\": \"Build suggestions considering their typical requirements\",\n\
           \"alternatives\": \"Alternative suggestions based on their preference patterns\",\n\
           \"contextInsights\": \"How this query fits their shopping patterns\"\n\
         }}",
        parsed.purpose,
    )
}

fn join_or_none(parts: impl Iterator<Item = String>) -> String {
    let joined: Vec<String> = parts.collect();
    if joined.is_empty() {
        "None".to_string()
    } else {
        joined.join(", ")
    }
}

/// Models wrap the JSON in prose or code fences; take the outermost braces.
fn extract_json_blob(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

fn parse_verdict(text: &str) -> Result<Verdict, ScorerError> {
    let blob = extract_json_blob(text)
        .ok_or_else(|| ScorerError::Malformed("no JSON object in response".to_string()))?;
    serde_json::from_str(blob).map_err(|e| ScorerError::Malformed(e.to_string()))
}

fn into_result(
    verdict: Verdict,
    products: &[Product],
) -> Result<RecommendationResult, ScorerError> {
    let mut recommendations = Vec::with_capacity(verdict.recommendations.len());
    for entry in verdict.recommendations {
        let product = products.get(entry.product_id).ok_or_else(|| {
            ScorerError::Malformed(format!("productId {} out of range", entry.product_id))
        })?;
        recommendations.push(Recommendation {
            product: product.clone(),
            score: entry.score,
            reason: entry.reason,
            pros: entry.pros,
            cons: entry.cons,
            compatibility: entry.compatibility,
            context_alignment: entry.context_alignment,
            preference_deviation: entry.preference_deviation,
        });
    }

    Ok(RecommendationResult {
        recommendations,
        summary: verdict.summary,
        build_suggestion: verdict.build_suggestion,
        alternatives: verdict.alternatives,
        context_insights: verdict.context_insights,
        source: ScoreSource::Ai,
        total_products: products.len(),
        filtered_products: products.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_core::{Lexicon, parse};

    fn products() -> Vec<Product> {
        vec![
            Product::new("p0", "Gaming Laptop RTX 4060", 72_000.0),
            Product::new("p1", "Office Laptop i5", 45_000.0),
        ]
    }

    #[test]
    fn test_missing_credential_detected_offline() {
        let client = ScorerClient::new(None);
        assert!(!client.has_credential());

        let client = ScorerClient::new(Some(String::new()));
        assert!(!client.has_credential());
    }

    #[tokio::test]
    async fn test_score_without_credential_fails_without_network() {
        // Endpoint is unroutable: proves the credential check comes first.
        let client = ScorerClient::with_endpoint(None, "http://127.0.0.1:1/never");
        let parsed = parse("gaming laptop", &Lexicon::default());
        let err = client
            .score("gaming laptop", &products(), &parsed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScorerError::MissingCredential));
        assert_eq!(err.fallback_reason(), FallbackReason::MissingCredential);
    }

    #[test]
    fn test_extract_json_blob() {
        assert_eq!(
            extract_json_blob("Here you go:\n```json\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(extract_json_blob("no json here"), None);
        assert_eq!(extract_json_blob("} backwards {"), None);
    }

    #[test]
    fn test_parse_verdict_maps_products() {
        let text = r#"Sure! {
            "recommendations": [
                {"productId": 1, "score": 88, "reason": "Fits the budget",
                 "pros": ["Cheap"], "cons": [], "compatibility": "Standalone"}
            ],
            "summary": "One good fit.",
            "buildSuggestion": "",
            "alternatives": "",
            "contextInsights": ""
        }"#;
        let verdict = parse_verdict(text).unwrap();
        let result = into_result(verdict, &products()).unwrap();

        assert_eq!(result.source, ScoreSource::Ai);
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].product.id, "p1");
        assert_eq!(result.recommendations[0].score, 88.0);
        assert_eq!(result.summary, "One good fit.");
    }

    #[test]
    fn test_out_of_range_product_id_is_malformed() {
        let text = r#"{"recommendations": [{"productId": 9, "score": 50, "reason": "x"}],
                       "summary": "", "buildSuggestion": "", "alternatives": "",
                       "contextInsights": ""}"#;
        let verdict = parse_verdict(text).unwrap();
        let err = into_result(verdict, &products()).unwrap_err();
        assert!(matches!(err, ScorerError::Malformed(_)));
        assert_eq!(err.fallback_reason(), FallbackReason::Transient);
    }

    #[test]
    fn test_prompt_includes_context_and_products() {
        let parsed = parse("gaming laptop under 80000", &Lexicon::default());
        let mut prefs = clerk_core::Preferences::default();
        let mut session = clerk_core::SessionContext::default();
        prefs.learn(&parsed, 1);
        session.record_query("gaming laptop under 80000", &parsed, 1);
        let insights = clerk_core::synthesize(&prefs, &session);

        let prompt = build_prompt("gaming laptop under 80000", &products(), &parsed, Some(&insights));
        assert!(prompt.contains("LEARNED USER CONTEXT"));
        assert!(prompt.contains("Gaming Laptop RTX 4060"));
        assert!(prompt.contains("₹80000 (under)"));
        assert!(prompt.contains("\"productId\": 0"));
    }

    #[test]
    fn test_prompt_without_insights_omits_context() {
        let parsed = parse("gaming laptop", &Lexicon::default());
        let prompt = build_prompt("gaming laptop", &products(), &parsed, None);
        assert!(!prompt.contains("LEARNED USER CONTEXT"));
        assert!(prompt.contains("Budget: Not specified"));
    }
}
