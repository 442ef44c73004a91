//! Core recommendation engine: query understanding, preference learning,
//! insight synthesis, and the deterministic stages of the recommendation
//! funnel (filter, cost cap, fallback scorer).
//!
//! Zero I/O — pure logic with no opinions about transport, persistence,
//! or the remote AI scorer.

pub mod funnel;
pub mod insights;
pub mod lexicon;
pub mod preferences;
pub mod product;
pub mod query;
pub mod time;

pub use funnel::{
    FALLBACK_LIMIT, FallbackReason, Recommendation, RecommendationResult, SCORING_CAP,
    ScoreSource, cap_for_scoring, fallback_result, fallback_score, filter_products,
};
pub use insights::{
    BudgetInsight, ContextualInsights, PreferenceInsight, SearchPatterns, SpecInsight, synthesize,
};
pub use lexicon::{KeywordRule, Lexicon};
pub use preferences::{
    BudgetBucket, BudgetRecord, KeyRecord, Preferences, SESSION_QUERY_CAP, SessionContext,
    SessionQuery, SpecRecord,
};
pub use product::Product;
pub use query::{
    Budget, BudgetOperator, Processor, Specs, Storage, StorageKind, StructuredQuery, parse,
    search_terms,
};
pub use time::{now_unix_millis, unix_to_iso8601};
